//! Modbus RTU link over a serial line
//!
//! Wraps a `tokio-modbus` RTU client attached to a `tokio-serial` stream
//! behind the [`ModbusLink`] trait. Framing, CRC and wire retries live in the
//! stack below; this layer only maps serial parameters, enforces the
//! per-request response timeout and flattens every failure into
//! [`LinkError`].

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tokio_modbus::client::{Context, Reader, Writer};
use tokio_modbus::slave::{Slave, SlaveContext};
use tokio_serial::SerialStream;
use tracing::debug;

use super::link::{LinkError, ModbusLink};
use crate::core::topology::{SerialSettings, UnitId};

/// RTU master connection on one serial device
pub struct RtuLink {
    /// Device path, kept for log context
    device: String,
    /// Attached tokio-modbus client
    ctx: Context,
    /// Round-trip deadline for a single operation
    response_timeout: Duration,
}

impl RtuLink {
    /// Open the serial device and attach an RTU client to it
    pub async fn connect(device: &str, settings: &SerialSettings) -> Result<Self, LinkError> {
        let builder = tokio_serial::new(device, settings.baud_rate)
            .data_bits(parse_data_bits(settings.data_bits))
            .parity(parse_parity(&settings.parity))
            .stop_bits(parse_stop_bits(settings.stop_bits));

        let stream = SerialStream::open(&builder)
            .map_err(|e| LinkError::new(format!("failed to open {device}: {e}")))?;

        #[cfg(unix)]
        let stream = {
            let mut stream = stream;
            stream.set_exclusive(false).map_err(|e| {
                LinkError::new(format!("failed to unset exclusive on {device}: {e}"))
            })?;
            stream
        };

        debug!("opened serial device {device}");
        Ok(Self {
            device: device.to_string(),
            ctx: tokio_modbus::client::rtu::attach(stream),
            response_timeout: settings.response_timeout,
        })
    }
}

#[async_trait]
impl ModbusLink for RtuLink {
    fn select(&mut self, unit: UnitId) {
        self.ctx.set_slave(Slave(unit.0));
    }

    async fn read_coil(&mut self, addr: u16) -> Result<bool, LinkError> {
        let device = self.device.clone();
        let deadline = self.response_timeout;
        let reply = bounded(deadline, &device, self.ctx.read_coils(addr, 1)).await?;
        first_bit(&device, reply)
    }

    async fn read_discrete_input(&mut self, addr: u16) -> Result<bool, LinkError> {
        let device = self.device.clone();
        let deadline = self.response_timeout;
        let reply = bounded(deadline, &device, self.ctx.read_discrete_inputs(addr, 1)).await?;
        first_bit(&device, reply)
    }

    async fn read_input_register(&mut self, addr: u16) -> Result<u16, LinkError> {
        let device = self.device.clone();
        let deadline = self.response_timeout;
        let reply = bounded(deadline, &device, self.ctx.read_input_registers(addr, 1)).await?;
        first_word(&device, reply)
    }

    async fn read_holding_register(&mut self, addr: u16) -> Result<u16, LinkError> {
        let device = self.device.clone();
        let deadline = self.response_timeout;
        let reply = bounded(deadline, &device, self.ctx.read_holding_registers(addr, 1)).await?;
        first_word(&device, reply)
    }

    async fn write_coil(&mut self, addr: u16, state: bool) -> Result<(), LinkError> {
        let device = self.device.clone();
        let deadline = self.response_timeout;
        bounded(deadline, &device, self.ctx.write_single_coil(addr, state)).await
    }

    async fn write_register(&mut self, addr: u16, value: u16) -> Result<(), LinkError> {
        let device = self.device.clone();
        let deadline = self.response_timeout;
        bounded(deadline, &device, self.ctx.write_single_register(addr, value)).await
    }

    async fn close(&mut self) -> Result<(), LinkError> {
        match self.ctx.disconnect().await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(exception)) => Err(LinkError::new(format!(
                "{}: modbus exception {exception}",
                self.device
            ))),
            Err(e) => Err(LinkError::new(format!("{}: {e}", self.device))),
        }
    }
}

/// Bound one round-trip with the response timeout and collapse the nested
/// tokio-modbus result into the link error
async fn bounded<T>(
    deadline: Duration,
    device: &str,
    op: impl std::future::Future<Output = tokio_modbus::Result<T>>,
) -> Result<T, LinkError> {
    match timeout(deadline, op).await {
        Ok(Ok(Ok(value))) => Ok(value),
        Ok(Ok(Err(exception))) => Err(LinkError::new(format!(
            "{device}: modbus exception {exception}"
        ))),
        Ok(Err(err)) => Err(LinkError::new(format!("{device}: {err}"))),
        Err(_) => Err(LinkError::new(format!(
            "{device}: no response within {deadline:?}"
        ))),
    }
}

/// Single-element bit response
fn first_bit(device: &str, reply: Vec<bool>) -> Result<bool, LinkError> {
    reply
        .first()
        .copied()
        .ok_or_else(|| LinkError::new(format!("{device}: empty bit response")))
}

/// Single-element word response
fn first_word(device: &str, reply: Vec<u16>) -> Result<u16, LinkError> {
    reply
        .first()
        .copied()
        .ok_or_else(|| LinkError::new(format!("{device}: empty register response")))
}

/// Convert configured parity to tokio_serial parity
fn parse_parity(parity: &str) -> tokio_serial::Parity {
    match parity {
        "Even" => tokio_serial::Parity::Even,
        "Odd" => tokio_serial::Parity::Odd,
        _ => tokio_serial::Parity::None,
    }
}

/// Convert configured data bits to tokio_serial data bits
fn parse_data_bits(data_bits: u8) -> tokio_serial::DataBits {
    match data_bits {
        5 => tokio_serial::DataBits::Five,
        6 => tokio_serial::DataBits::Six,
        7 => tokio_serial::DataBits::Seven,
        _ => tokio_serial::DataBits::Eight,
    }
}

/// Convert configured stop bits to tokio_serial stop bits
fn parse_stop_bits(stop_bits: u8) -> tokio_serial::StopBits {
    match stop_bits {
        2 => tokio_serial::StopBits::Two,
        _ => tokio_serial::StopBits::One,
    }
}
