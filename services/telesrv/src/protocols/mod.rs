//! Protocol boundaries
//!
//! `modbus` is the downstream transport collaborator seam; `iec104` is the
//! upstream telecontrol object model and gateway adapter.

pub mod iec104;
pub mod modbus;
