//! Modbus transport collaborator
//!
//! The dispatch core talks to field devices exclusively through the
//! [`ModbusLink`] trait. `rtu` carries the production implementation on top
//! of tokio-modbus/tokio-serial; `mock` carries the in-memory implementation
//! used by the test suites.

pub mod link;
pub mod mock;
pub mod rtu;

pub use link::{LinkError, ModbusLink};
pub use mock::{LinkOp, MockHandle, MockLink};
pub use rtu::RtuLink;
