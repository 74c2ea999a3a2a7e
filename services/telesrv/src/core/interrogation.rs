//! Interrogation sweeps
//!
//! A general interrogation reads every configured point of one slave and
//! returns a snapshot positionally aligned with the slave's four address
//! lists. The port session is held for the entire sweep; releasing it between
//! reads would let another request re-target the line mid-sweep.
//!
//! Individual read failures do not abort the sweep. Each snapshot slot
//! records whether its point was actually read, so a dead point is reported
//! as failed upstream instead of silently becoming zero.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::dispatch::PortMap;
use crate::core::topology::{Slave, SlaveDirectory, StationId};
use crate::error::{Result, TeleSrvError};

/// Outcome of one point read within a sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointReading<T> {
    /// The device answered with this value
    Value(T),
    /// The read failed; no value is available for this slot
    Failed,
}

impl<T: Copy> PointReading<T> {
    /// The value, when the read succeeded
    pub fn value(self) -> Option<T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Failed => None,
        }
    }

    /// Returns `true` when the read failed
    pub fn is_failed(self) -> bool {
        matches!(self, Self::Failed)
    }
}

/// Result of one full sweep of one slave
///
/// Each list has exactly the length of the slave's corresponding address
/// list, in the same order. Transient: owned by the caller and discarded
/// after translation.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Station the sweep ran against
    pub station: StationId,
    /// Coil states, aligned with the configured coil addresses
    pub coils: Vec<PointReading<bool>>,
    /// Discrete-input states
    pub discrete_inputs: Vec<PointReading<bool>>,
    /// Input-register values
    pub input_registers: Vec<PointReading<u16>>,
    /// Holding-register values
    pub holding_registers: Vec<PointReading<u16>>,
}

impl Snapshot {
    /// Allocate a snapshot sized exactly to the slave's address lists
    fn sized_for(station: StationId, slave: &Slave) -> Self {
        Self {
            station,
            coils: vec![PointReading::Failed; slave.coils.len()],
            discrete_inputs: vec![PointReading::Failed; slave.discrete_inputs.len()],
            input_registers: vec![PointReading::Failed; slave.input_registers.len()],
            holding_registers: vec![PointReading::Failed; slave.holding_registers.len()],
        }
    }

    /// Number of slots whose read failed
    pub fn failed_count(&self) -> usize {
        self.coils.iter().filter(|r| r.is_failed()).count()
            + self.discrete_inputs.iter().filter(|r| r.is_failed()).count()
            + self.input_registers.iter().filter(|r| r.is_failed()).count()
            + self.holding_registers.iter().filter(|r| r.is_failed()).count()
    }
}

/// Runs full sweeps of single slaves
#[derive(Clone)]
pub struct InterrogationEngine {
    directory: Arc<SlaveDirectory>,
    ports: Arc<PortMap>,
}

impl InterrogationEngine {
    /// Create an engine over the directory and the connected ports
    pub fn new(directory: Arc<SlaveDirectory>, ports: Arc<PortMap>) -> Self {
        Self { directory, ports }
    }

    /// Sweep every configured point of one slave
    ///
    /// Read order is fixed: coils, discrete inputs, input registers, holding
    /// registers, each in configuration order.
    pub async fn interrogate(&self, station: StationId) -> Result<Snapshot> {
        let (port, slave) = self
            .directory
            .lookup(station)
            .ok_or(TeleSrvError::UnknownSlave { station })?;
        let session = self.ports.session(port)?;

        debug!(
            "interrogating station {station} ({}) on {port}: {} points",
            slave.name,
            slave.point_count()
        );

        // Exclusive line access for the whole sweep
        let mut state = session.acquire().await;
        state.select(slave.unit_id);

        let mut snapshot = Snapshot::sized_for(station, slave);

        for (i, &addr) in slave.coils.iter().enumerate() {
            snapshot.coils[i] = match state.link.read_coil(addr).await {
                Ok(value) => PointReading::Value(value),
                Err(e) => {
                    warn!("station {station}: coil {addr} read failed: {e}");
                    PointReading::Failed
                },
            };
        }

        for (i, &addr) in slave.discrete_inputs.iter().enumerate() {
            snapshot.discrete_inputs[i] = match state.link.read_discrete_input(addr).await {
                Ok(value) => PointReading::Value(value),
                Err(e) => {
                    warn!("station {station}: discrete input {addr} read failed: {e}");
                    PointReading::Failed
                },
            };
        }

        for (i, &addr) in slave.input_registers.iter().enumerate() {
            snapshot.input_registers[i] = match state.link.read_input_register(addr).await {
                Ok(value) => PointReading::Value(value),
                Err(e) => {
                    warn!("station {station}: input register {addr} read failed: {e}");
                    PointReading::Failed
                },
            };
        }

        for (i, &addr) in slave.holding_registers.iter().enumerate() {
            snapshot.holding_registers[i] = match state.link.read_holding_register(addr).await {
                Ok(value) => PointReading::Value(value),
                Err(e) => {
                    warn!("station {station}: holding register {addr} read failed: {e}");
                    PointReading::Failed
                },
            };
        }

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dispatch::PortSession;
    use crate::core::topology::{PortId, PortTable, SerialSettings, UnitId};
    use crate::protocols::modbus::{LinkOp, MockHandle, MockLink};

    fn fixture() -> (InterrogationEngine, MockHandle) {
        let port = PortId(0);
        let directory = Arc::new(SlaveDirectory::new(vec![PortTable {
            id: port,
            active: true,
            device: "/dev/ttyS1".to_string(),
            serial: SerialSettings::default(),
            slaves: vec![Slave {
                unit_id: UnitId(3),
                station: StationId::encode(port, UnitId(3)),
                name: "bay".to_string(),
                coils: vec![5, 9],
                discrete_inputs: vec![2],
                input_registers: vec![12, 13],
                holding_registers: vec![0],
            }],
        }]));

        let link = MockLink::new();
        let handle = link.handle();
        let mut ports = PortMap::new();
        ports.insert(PortSession::new(port, Box::new(link)));

        (
            InterrogationEngine::new(directory, Arc::new(ports)),
            handle,
        )
    }

    #[tokio::test]
    async fn test_snapshot_lengths_match_configuration() {
        let (engine, _handle) = fixture();
        let snapshot = engine.interrogate(StationId::new(3)).await.unwrap();
        assert_eq!(snapshot.coils.len(), 2);
        assert_eq!(snapshot.discrete_inputs.len(), 1);
        assert_eq!(snapshot.input_registers.len(), 2);
        assert_eq!(snapshot.holding_registers.len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_order_is_fixed() {
        let (engine, handle) = fixture();
        engine.interrogate(StationId::new(3)).await.unwrap();

        assert_eq!(
            handle.journal(),
            vec![
                LinkOp::Select(3),
                LinkOp::ReadCoil(5),
                LinkOp::ReadCoil(9),
                LinkOp::ReadDiscreteInput(2),
                LinkOp::ReadInputRegister(12),
                LinkOp::ReadInputRegister(13),
                LinkOp::ReadHoldingRegister(0),
            ]
        );
    }

    #[tokio::test]
    async fn test_values_are_positionally_aligned() {
        let (engine, handle) = fixture();
        handle.set_coil(3, 9, true);
        handle.set_input_register(3, 13, 777);

        let snapshot = engine.interrogate(StationId::new(3)).await.unwrap();
        assert_eq!(snapshot.coils[0], PointReading::Value(false));
        assert_eq!(snapshot.coils[1], PointReading::Value(true));
        assert_eq!(snapshot.input_registers[1], PointReading::Value(777));
    }

    #[tokio::test]
    async fn test_failed_read_does_not_abort_sweep() {
        let (engine, handle) = fixture();
        handle.fail_address(12);

        let snapshot = engine.interrogate(StationId::new(3)).await.unwrap();
        assert_eq!(snapshot.input_registers[0], PointReading::Failed);
        // The sweep continued past the failure
        assert_eq!(snapshot.input_registers[1], PointReading::Value(0));
        assert_eq!(snapshot.failed_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_station_fails() {
        let (engine, _handle) = fixture();
        let err = engine.interrogate(StationId::new(217)).await.unwrap_err();
        assert!(matches!(err, TeleSrvError::UnknownSlave { .. }));
    }
}
