//! Command dispatch
//!
//! Executes the six point primitives against a resolved target. Every
//! operation validates through the resolver first and refuses before the
//! transport is touched; only then is the port session acquired for the
//! select/operation pair.
//!
//! A port's serial connection is a single-owner resource: unit selection and
//! the following read or write are two operations on shared line state with
//! no atomicity between them. The per-port mutex makes the pair atomic
//! against other requests; requests on different ports run in parallel.

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::core::resolver::AddressResolver;
use crate::core::topology::{PortId, RegisterKind, StationId, UnitId, MAX_PORTS};
use crate::error::{Result, TeleSrvError};
use crate::protocols::modbus::{LinkError, ModbusLink};

/// Serialized link state of one port
///
/// Holds the boxed link together with the last-selected-unit cursor; a
/// redundant re-selection of the same unit is skipped.
pub struct LinkState {
    pub(crate) link: Box<dyn ModbusLink>,
    current: Option<UnitId>,
}

impl LinkState {
    /// Point the line at a unit if it is not the current target already
    pub(crate) fn select(&mut self, unit: UnitId) {
        if self.current != Some(unit) {
            self.link.select(unit);
            self.current = Some(unit);
        }
    }
}

/// Exclusive session over one port's transport connection
pub struct PortSession {
    id: PortId,
    state: Mutex<LinkState>,
}

impl PortSession {
    /// Wrap a connected link into a session
    pub fn new(id: PortId, link: Box<dyn ModbusLink>) -> Self {
        Self {
            id,
            state: Mutex::new(LinkState {
                link,
                current: None,
            }),
        }
    }

    /// Port this session serves
    pub fn id(&self) -> PortId {
        self.id
    }

    /// Take the port for one select/operation pair, or a whole sweep
    pub(crate) async fn acquire(&self) -> MutexGuard<'_, LinkState> {
        self.state.lock().await
    }

    /// Close the underlying link
    pub async fn close(&self) -> std::result::Result<(), LinkError> {
        let mut state = self.state.lock().await;
        state.link.close().await
    }
}

/// Connected port sessions, indexed by port
#[derive(Default)]
pub struct PortMap {
    sessions: Vec<Option<Arc<PortSession>>>,
}

impl PortMap {
    /// Empty map with a slot per possible port
    pub fn new() -> Self {
        Self {
            sessions: (0..MAX_PORTS).map(|_| None).collect(),
        }
    }

    /// Register the session of a connected port
    pub fn insert(&mut self, session: PortSession) {
        let index = session.id().index();
        if index < self.sessions.len() {
            self.sessions[index] = Some(Arc::new(session));
        }
    }

    /// Session of one port, or a transport failure when it never connected
    pub fn session(&self, port: PortId) -> Result<&Arc<PortSession>> {
        self.sessions
            .get(port.index())
            .and_then(|slot| slot.as_ref())
            .ok_or_else(|| TeleSrvError::transport(format!("{port} is not connected")))
    }

    /// Number of connected ports
    pub fn connected(&self) -> usize {
        self.sessions.iter().flatten().count()
    }

    /// Close every connected port, logging failures
    pub async fn close_all(&self) {
        for session in self.sessions.iter().flatten() {
            if let Err(e) = session.close().await {
                warn!("failed to close {}: {e}", session.id());
            }
        }
    }
}

/// Raw value read from a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoValue {
    /// Single-bit value (coil, discrete input)
    Bit(bool),
    /// 16-bit register value
    Word(u16),
}

/// Executes point reads and writes against resolved targets
#[derive(Clone)]
pub struct CommandDispatcher {
    resolver: AddressResolver,
    ports: Arc<PortMap>,
}

impl CommandDispatcher {
    /// Create a dispatcher over the resolver and the connected ports
    pub fn new(resolver: AddressResolver, ports: Arc<PortMap>) -> Self {
        Self { resolver, ports }
    }

    /// Read one coil
    pub async fn read_coil(&self, station: StationId, addr: u16) -> Result<bool> {
        let target = self.resolver.resolve(station, RegisterKind::Coil, addr)?;
        let session = self.ports.session(target.port)?;
        let mut state = session.acquire().await;
        state.select(target.unit);
        Ok(state.link.read_coil(addr).await?)
    }

    /// Read one discrete input
    pub async fn read_discrete_input(&self, station: StationId, addr: u16) -> Result<bool> {
        let target = self
            .resolver
            .resolve(station, RegisterKind::DiscreteInput, addr)?;
        let session = self.ports.session(target.port)?;
        let mut state = session.acquire().await;
        state.select(target.unit);
        Ok(state.link.read_discrete_input(addr).await?)
    }

    /// Read one input register
    pub async fn read_input_register(&self, station: StationId, addr: u16) -> Result<u16> {
        let target = self
            .resolver
            .resolve(station, RegisterKind::InputRegister, addr)?;
        let session = self.ports.session(target.port)?;
        let mut state = session.acquire().await;
        state.select(target.unit);
        Ok(state.link.read_input_register(addr).await?)
    }

    /// Read one holding register
    pub async fn read_holding_register(&self, station: StationId, addr: u16) -> Result<u16> {
        let target = self
            .resolver
            .resolve(station, RegisterKind::HoldingRegister, addr)?;
        let session = self.ports.session(target.port)?;
        let mut state = session.acquire().await;
        state.select(target.unit);
        Ok(state.link.read_holding_register(addr).await?)
    }

    /// Read one point of any kind, for callers that dispatch on kind
    pub async fn read_point(
        &self,
        kind: RegisterKind,
        station: StationId,
        addr: u16,
    ) -> Result<IoValue> {
        match kind {
            RegisterKind::Coil => Ok(IoValue::Bit(self.read_coil(station, addr).await?)),
            RegisterKind::DiscreteInput => {
                Ok(IoValue::Bit(self.read_discrete_input(station, addr).await?))
            },
            RegisterKind::InputRegister => {
                Ok(IoValue::Word(self.read_input_register(station, addr).await?))
            },
            RegisterKind::HoldingRegister => Ok(IoValue::Word(
                self.read_holding_register(station, addr).await?,
            )),
        }
    }

    /// Write one coil
    ///
    /// Any non-zero magnitude is normalized to the canonical ON state before
    /// transmission.
    pub async fn write_coil(&self, station: StationId, addr: u16, value: u16) -> Result<()> {
        let state_on = value != 0;
        let target = self.resolver.resolve(station, RegisterKind::Coil, addr)?;
        let session = self.ports.session(target.port)?;
        let mut state = session.acquire().await;
        state.select(target.unit);
        state.link.write_coil(addr, state_on).await?;
        debug!("station {station}: coil {addr} set {}", if state_on { "ON" } else { "OFF" });
        Ok(())
    }

    /// Write one holding register
    pub async fn write_holding_register(
        &self,
        station: StationId,
        addr: u16,
        value: u16,
    ) -> Result<()> {
        let target = self
            .resolver
            .resolve(station, RegisterKind::HoldingRegister, addr)?;
        let session = self.ports.session(target.port)?;
        let mut state = session.acquire().await;
        state.select(target.unit);
        state.link.write_register(addr, value).await?;
        debug!("station {station}: holding register {addr} set to {value}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::topology::{PortTable, SerialSettings, Slave, SlaveDirectory};
    use crate::protocols::modbus::{LinkOp, MockLink};

    fn fixture() -> (CommandDispatcher, crate::protocols::modbus::MockHandle) {
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
                input_registers: vec![12],
                holding_registers: vec![0, 1],
            }],
        }]));

        let link = MockLink::new();
        let handle = link.handle();
        let mut ports = PortMap::new();
        ports.insert(PortSession::new(port, Box::new(link)));

        let dispatcher =
            CommandDispatcher::new(AddressResolver::new(directory), Arc::new(ports));
        (dispatcher, handle)
    }

    #[tokio::test]
    async fn test_read_configured_coil() {
        let (dispatcher, handle) = fixture();
        handle.set_coil(3, 9, true);
        assert!(dispatcher.read_coil(StationId::new(3), 9).await.unwrap());
    }

    #[tokio::test]
    async fn test_unconfigured_address_never_touches_transport() {
        let (dispatcher, handle) = fixture();
        let err = dispatcher.read_coil(StationId::new(3), 7).await.unwrap_err();
        assert!(matches!(err, TeleSrvError::AddressNotConfigured { .. }));
        assert!(handle.journal().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_station_never_touches_transport() {
        let (dispatcher, handle) = fixture();
        let err = dispatcher
            .read_holding_register(StationId::new(205), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, TeleSrvError::UnknownSlave { .. }));
        assert!(handle.journal().is_empty());
    }

    #[tokio::test]
    async fn test_coil_write_normalizes_magnitude() {
        let (dispatcher, handle) = fixture();
        dispatcher
            .write_coil(StationId::new(3), 5, 7)
            .await
            .unwrap();
        dispatcher
            .write_coil(StationId::new(3), 9, 0)
            .await
            .unwrap();

        let journal = handle.journal();
        assert!(journal.contains(&LinkOp::WriteCoil(5, true)));
        assert!(journal.contains(&LinkOp::WriteCoil(9, false)));
    }

    #[tokio::test]
    async fn test_selection_cursor_skips_redundant_selects() {
        let (dispatcher, handle) = fixture();
        let station = StationId::new(3);
        dispatcher.read_coil(station, 5).await.unwrap();
        dispatcher.read_coil(station, 9).await.unwrap();

        let selects = handle
            .journal()
            .iter()
            .filter(|op| matches!(op, LinkOp::Select(_)))
            .count();
        assert_eq!(selects, 1);
    }

    #[tokio::test]
    async fn test_transport_failure_surfaces() {
        let (dispatcher, handle) = fixture();
        handle.fail_address(12);
        let err = dispatcher
            .read_input_register(StationId::new(3), 12)
            .await
            .unwrap_err();
        assert!(matches!(err, TeleSrvError::TransportFailure(_)));
    }
}
