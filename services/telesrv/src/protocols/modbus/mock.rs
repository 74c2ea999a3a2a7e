//! Mock Modbus link for testing
//!
//! In-memory register banks behind the [`ModbusLink`] trait, so dispatch and
//! interrogation logic can be exercised without a serial line. The mock
//! records every link operation in a journal; tests use it to assert
//! select/operation pairing and to prove that rejected requests never reach
//! the transport.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::link::{LinkError, ModbusLink};
use crate::core::topology::UnitId;

/// One recorded link operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOp {
    /// Target unit switched
    Select(u8),
    /// Coil read at address
    ReadCoil(u16),
    /// Discrete-input read at address
    ReadDiscreteInput(u16),
    /// Input-register read at address
    ReadInputRegister(u16),
    /// Holding-register read at address
    ReadHoldingRegister(u16),
    /// Coil write (address, state)
    WriteCoil(u16, bool),
    /// Holding-register write (address, value)
    WriteRegister(u16, u16),
    /// Link closed
    Close,
}

/// Register banks of one simulated unit
#[derive(Debug, Default, Clone)]
struct MockBank {
    coils: HashMap<u16, bool>,
    discrete_inputs: HashMap<u16, bool>,
    input_registers: HashMap<u16, u16>,
    holding_registers: HashMap<u16, u16>,
}

/// Shared mock state, visible to the test through [`MockHandle`]
#[derive(Debug, Default)]
struct MockState {
    banks: HashMap<u8, MockBank>,
    failing: HashSet<u16>,
    journal: Vec<LinkOp>,
}

/// Mock link implementation
pub struct MockLink {
    selected: Option<UnitId>,
    state: Arc<Mutex<MockState>>,
    /// Simulated round-trip duration, zero by default
    op_delay: Duration,
}

/// Test-side handle into a mock link's state
///
/// Stays valid after the link itself moved into a port session.
#[derive(Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockLink {
    /// Create an empty mock link
    pub fn new() -> Self {
        Self {
            selected: None,
            state: Arc::new(Mutex::new(MockState::default())),
            op_delay: Duration::ZERO,
        }
    }

    /// Simulate a round-trip duration per operation
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.op_delay = delay;
        self
    }

    /// Handle for seeding values and inspecting the journal
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            state: Arc::clone(&self.state),
        }
    }

    async fn begin(&self, op: LinkOp, addr: u16) -> Result<UnitId, LinkError> {
        if self.op_delay > Duration::ZERO {
            tokio::time::sleep(self.op_delay).await;
        }
        let unit = self
            .selected
            .ok_or_else(|| LinkError::new("no unit selected"))?;
        let mut state = self.state.lock().unwrap();
        state.journal.push(op);
        if state.failing.contains(&addr) {
            return Err(LinkError::new(format!("simulated failure at {addr}")));
        }
        Ok(unit)
    }
}

impl Default for MockLink {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHandle {
    /// Seed a coil value
    pub fn set_coil(&self, unit: u8, addr: u16, state: bool) {
        let mut s = self.state.lock().unwrap();
        s.banks.entry(unit).or_default().coils.insert(addr, state);
    }

    /// Seed a discrete-input value
    pub fn set_discrete_input(&self, unit: u8, addr: u16, state: bool) {
        let mut s = self.state.lock().unwrap();
        s.banks
            .entry(unit)
            .or_default()
            .discrete_inputs
            .insert(addr, state);
    }

    /// Seed an input-register value
    pub fn set_input_register(&self, unit: u8, addr: u16, value: u16) {
        let mut s = self.state.lock().unwrap();
        s.banks
            .entry(unit)
            .or_default()
            .input_registers
            .insert(addr, value);
    }

    /// Seed a holding-register value
    pub fn set_holding_register(&self, unit: u8, addr: u16, value: u16) {
        let mut s = self.state.lock().unwrap();
        s.banks
            .entry(unit)
            .or_default()
            .holding_registers
            .insert(addr, value);
    }

    /// Make every operation at this address fail
    pub fn fail_address(&self, addr: u16) {
        self.state.lock().unwrap().failing.insert(addr);
    }

    /// Snapshot of the operation journal
    pub fn journal(&self) -> Vec<LinkOp> {
        self.state.lock().unwrap().journal.clone()
    }

    /// Current coil state of a unit, if one was written or seeded
    pub fn coil(&self, unit: u8, addr: u16) -> Option<bool> {
        let s = self.state.lock().unwrap();
        s.banks.get(&unit)?.coils.get(&addr).copied()
    }

    /// Current holding-register value of a unit, if one was written or seeded
    pub fn holding_register(&self, unit: u8, addr: u16) -> Option<u16> {
        let s = self.state.lock().unwrap();
        s.banks.get(&unit)?.holding_registers.get(&addr).copied()
    }
}

#[async_trait]
impl ModbusLink for MockLink {
    fn select(&mut self, unit: UnitId) {
        self.selected = Some(unit);
        self.state.lock().unwrap().journal.push(LinkOp::Select(unit.0));
    }

    async fn read_coil(&mut self, addr: u16) -> Result<bool, LinkError> {
        let unit = self.begin(LinkOp::ReadCoil(addr), addr).await?;
        let state = self.state.lock().unwrap();
        Ok(state
            .banks
            .get(&unit.0)
            .and_then(|bank| bank.coils.get(&addr).copied())
            .unwrap_or(false))
    }

    async fn read_discrete_input(&mut self, addr: u16) -> Result<bool, LinkError> {
        let unit = self.begin(LinkOp::ReadDiscreteInput(addr), addr).await?;
        let state = self.state.lock().unwrap();
        Ok(state
            .banks
            .get(&unit.0)
            .and_then(|bank| bank.discrete_inputs.get(&addr).copied())
            .unwrap_or(false))
    }

    async fn read_input_register(&mut self, addr: u16) -> Result<u16, LinkError> {
        let unit = self.begin(LinkOp::ReadInputRegister(addr), addr).await?;
        let state = self.state.lock().unwrap();
        Ok(state
            .banks
            .get(&unit.0)
            .and_then(|bank| bank.input_registers.get(&addr).copied())
            .unwrap_or(0))
    }

    async fn read_holding_register(&mut self, addr: u16) -> Result<u16, LinkError> {
        let unit = self.begin(LinkOp::ReadHoldingRegister(addr), addr).await?;
        let state = self.state.lock().unwrap();
        Ok(state
            .banks
            .get(&unit.0)
            .and_then(|bank| bank.holding_registers.get(&addr).copied())
            .unwrap_or(0))
    }

    async fn write_coil(&mut self, addr: u16, value: bool) -> Result<(), LinkError> {
        let unit = self.begin(LinkOp::WriteCoil(addr, value), addr).await?;
        let mut state = self.state.lock().unwrap();
        state
            .banks
            .entry(unit.0)
            .or_default()
            .coils
            .insert(addr, value);
        Ok(())
    }

    async fn write_register(&mut self, addr: u16, value: u16) -> Result<(), LinkError> {
        let unit = self.begin(LinkOp::WriteRegister(addr, value), addr).await?;
        let mut state = self.state.lock().unwrap();
        state
            .banks
            .entry(unit.0)
            .or_default()
            .holding_registers
            .insert(addr, value);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), LinkError> {
        self.state.lock().unwrap().journal.push(LinkOp::Close);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_requires_selection() {
        let mut link = MockLink::new();
        assert!(link.read_coil(1).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_read_write_round_trip() {
        let mut link = MockLink::new();
        let handle = link.handle();
        handle.set_coil(3, 9, true);

        link.select(UnitId(3));
        assert!(link.read_coil(9).await.unwrap());
        assert!(!link.read_coil(5).await.unwrap());

        link.write_register(11, 512).await.unwrap();
        assert_eq!(handle.holding_register(3, 11), Some(512));
    }

    #[tokio::test]
    async fn test_mock_journal_records_operations() {
        let mut link = MockLink::new();
        let handle = link.handle();

        link.select(UnitId(2));
        link.write_coil(4, true).await.unwrap();

        assert_eq!(
            handle.journal(),
            vec![LinkOp::Select(2), LinkOp::WriteCoil(4, true)]
        );
    }

    #[tokio::test]
    async fn test_mock_failing_address() {
        let mut link = MockLink::new();
        let handle = link.handle();
        handle.fail_address(7);

        link.select(UnitId(1));
        assert!(link.read_holding_register(7).await.is_err());
        assert!(link.read_holding_register(8).await.is_ok());
    }
}
