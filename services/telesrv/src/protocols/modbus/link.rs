//! Modbus link trait
//!
//! The narrow seam between the dispatch core and the byte-level Modbus RTU
//! stack. One link instance owns one serial line; target selection is
//! stateful, so every select/operation pair must run under the port's
//! exclusive session (see `core::dispatch`).
//!
//! The core does not discriminate transport failures: timeout, CRC mismatch
//! and missing response all collapse into one "device unreachable" outcome,
//! and nothing at this layer retries.

use async_trait::async_trait;
use thiserror::Error;

use crate::core::topology::UnitId;

/// Undifferentiated transport-level failure
#[derive(Error, Debug, Clone)]
#[error("device unreachable: {0}")]
pub struct LinkError(pub String);

impl LinkError {
    /// Wrap any transport-layer failure
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl From<LinkError> for crate::error::TeleSrvError {
    fn from(err: LinkError) -> Self {
        crate::error::TeleSrvError::TransportFailure(err.0)
    }
}

/// One Modbus RTU master connection on one serial line
///
/// All operations are single-element and synchronous round-trips bounded by
/// the link's response timeout. [`select`](ModbusLink::select) switches the
/// addressed unit for every subsequent operation.
#[async_trait]
pub trait ModbusLink: Send {
    /// Address all following operations to the given unit
    fn select(&mut self, unit: UnitId);

    /// Read one coil (function code 1)
    async fn read_coil(&mut self, addr: u16) -> Result<bool, LinkError>;

    /// Read one discrete input (function code 2)
    async fn read_discrete_input(&mut self, addr: u16) -> Result<bool, LinkError>;

    /// Read one input register (function code 4)
    async fn read_input_register(&mut self, addr: u16) -> Result<u16, LinkError>;

    /// Read one holding register (function code 3)
    async fn read_holding_register(&mut self, addr: u16) -> Result<u16, LinkError>;

    /// Write one coil (function code 5); the stack encodes the canonical
    /// ON/OFF wire values
    async fn write_coil(&mut self, addr: u16, state: bool) -> Result<(), LinkError>;

    /// Write one holding register (function code 6)
    async fn write_register(&mut self, addr: u16, value: u16) -> Result<(), LinkError>;

    /// Release the serial line
    async fn close(&mut self) -> Result<(), LinkError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_error_display() {
        let err = LinkError::new("response timeout after 100ms");
        assert!(err.to_string().contains("device unreachable"));
        assert!(err.to_string().contains("response timeout"));
    }
}
