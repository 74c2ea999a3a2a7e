//! Address resolution
//!
//! Turns an upstream (station, register kind, local address) triple into a
//! concrete dispatch target, or a typed refusal. Membership is literal: an
//! address is valid only when it appears in the slave's configured list for
//! that kind; numerically adjacent addresses are rejected. The scan is linear
//! and the first match wins, which fixes the behavior for duplicated entries.

use std::sync::Arc;

use crate::core::topology::{PortId, RegisterKind, Slave, SlaveDirectory, StationId, UnitId};
use crate::error::{Result, TeleSrvError};

/// Fully resolved dispatch target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    /// Serial port serving the slave
    pub port: PortId,
    /// Unit to select on the line
    pub unit: UnitId,
    /// Local register address to act on
    pub addr: u16,
    /// Position of the first matching entry in the configured list
    pub list_index: usize,
}

/// Resolver over the immutable slave directory
#[derive(Debug, Clone)]
pub struct AddressResolver {
    directory: Arc<SlaveDirectory>,
}

impl AddressResolver {
    /// Create a resolver sharing the directory
    pub fn new(directory: Arc<SlaveDirectory>) -> Self {
        Self { directory }
    }

    /// Shared directory handle
    pub fn directory(&self) -> &Arc<SlaveDirectory> {
        &self.directory
    }

    /// Resolve a station address to its port and slave entry
    pub fn resolve_station(&self, station: StationId) -> Result<(PortId, &Slave)> {
        self.directory
            .lookup(station)
            .ok_or(TeleSrvError::UnknownSlave { station })
    }

    /// Resolve a (station, kind, address) triple to a dispatch target
    pub fn resolve(&self, station: StationId, kind: RegisterKind, addr: u16) -> Result<Target> {
        let (port, slave) = self.resolve_station(station)?;
        let list_index = slave
            .addresses(kind)
            .iter()
            .position(|&configured| configured == addr)
            .ok_or(TeleSrvError::AddressNotConfigured {
                station,
                kind,
                addr,
            })?;
        Ok(Target {
            port,
            unit: slave.unit_id,
            addr,
            list_index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::topology::{PortTable, SerialSettings};

    fn directory() -> Arc<SlaveDirectory> {
        let port = PortId(0);
        Arc::new(SlaveDirectory::new(vec![PortTable {
            id: port,
            active: true,
            device: "/dev/ttyS1".to_string(),
            serial: SerialSettings::default(),
            slaves: vec![Slave {
                unit_id: UnitId(3),
                station: StationId::encode(port, UnitId(3)),
                name: "feeder".to_string(),
                // Duplicate coil address on purpose
                coils: vec![5, 9, 5],
                discrete_inputs: vec![2],
                input_registers: vec![],
                holding_registers: vec![0, 1],
            }],
        }]))
    }

    #[test]
    fn test_resolve_configured_address() {
        let resolver = AddressResolver::new(directory());
        let target = resolver
            .resolve(StationId::new(3), RegisterKind::Coil, 9)
            .unwrap();
        assert_eq!(target.port, PortId(0));
        assert_eq!(target.unit, UnitId(3));
        assert_eq!(target.addr, 9);
        assert_eq!(target.list_index, 1);
    }

    #[test]
    fn test_resolve_duplicate_takes_first_index() {
        let resolver = AddressResolver::new(directory());
        let target = resolver
            .resolve(StationId::new(3), RegisterKind::Coil, 5)
            .unwrap();
        assert_eq!(target.list_index, 0);
    }

    #[test]
    fn test_resolve_rejects_nearby_address() {
        let resolver = AddressResolver::new(directory());
        let err = resolver
            .resolve(StationId::new(3), RegisterKind::Coil, 7)
            .unwrap_err();
        assert_eq!(
            err,
            TeleSrvError::AddressNotConfigured {
                station: StationId::new(3),
                kind: RegisterKind::Coil,
                addr: 7,
            }
        );
    }

    #[test]
    fn test_resolve_checks_kind_list_only() {
        let resolver = AddressResolver::new(directory());
        // Address 2 exists as a discrete input, not as a coil
        assert!(resolver
            .resolve(StationId::new(3), RegisterKind::DiscreteInput, 2)
            .is_ok());
        assert!(resolver
            .resolve(StationId::new(3), RegisterKind::Coil, 2)
            .is_err());
    }

    #[test]
    fn test_resolve_unknown_station() {
        let resolver = AddressResolver::new(directory());
        let err = resolver
            .resolve(StationId::new(412), RegisterKind::Coil, 5)
            .unwrap_err();
        assert_eq!(
            err,
            TeleSrvError::UnknownSlave {
                station: StationId::new(412)
            }
        );
    }
}
