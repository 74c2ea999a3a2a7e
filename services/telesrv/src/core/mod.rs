//! Core dispatch engine
//!
//! The translation path from upstream station/point addresses down to
//! single-register Modbus operations: configuration loading, the slave
//! directory, address resolution, command dispatch and interrogation sweeps.

pub mod config;
pub mod dispatch;
pub mod interrogation;
pub mod resolver;
pub mod topology;
