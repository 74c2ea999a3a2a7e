//! Upstream telecontrol adapter
//!
//! Object model of the IEC 60870-5-104-style upstream interface and the
//! gateway adapter translating between it and the Modbus dispatch core.

pub mod adapter;
pub mod types;

pub use adapter::{serve, GatewayAdapter, UpstreamEnvelope};
pub use types::{
    classify_ioa, ioa_for, Cot, InformationObject, OutboundAsdu, Qoi, TypeId, UpstreamRequest,
};
