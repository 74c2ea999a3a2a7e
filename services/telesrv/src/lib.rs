//! Telecontrol Gateway Service (telesrv)
//!
//! Exposes Modbus RTU field devices, spread over multiple independent serial
//! lines, as a single addressable point database to an upstream telecontrol
//! master. Each device is reachable through one integer station address; each
//! of its points through one information-object address.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐    ┌─────────────────┐
//! │ Topology Loader │───►│ Slave Directory │───►│ Address Resolver│
//! │  (JSON/figment) │    │ (ports→slaves)  │    │ (station+IOA)   │
//! └─────────────────┘    └─────────────────┘    └────────┬────────┘
//!                                                        │
//!                         ┌──────────────────────────────┼─────────┐
//!                         ▼                              ▼         │
//!                ┌─────────────────┐    ┌──────────────────────┐   │
//!                │ Gateway Adapter │───►│  Command Dispatcher  │   │
//!                │ (IEC104 objects)│    │  + Interrogation     │   │
//!                └─────────────────┘    └──────────┬───────────┘   │
//!                                                  ▼               │
//!                                       ┌──────────────────────┐   │
//!                                       │ ModbusLink (per port)│◄──┘
//!                                       │ tokio-modbus RTU     │
//!                                       └──────────────────────┘
//! ```
//!
//! # Address model
//!
//! The station address flattens the two-level topology with the
//! offset-by-port scheme: `station = port * 100 + unit`. The
//! information-object address space is partitioned into four fixed,
//! disjoint sub-ranges (coils, discrete inputs, input registers, holding
//! registers); an IOA's offset within its sub-range is the local Modbus
//! register address.
//!
//! # Concurrency
//!
//! The slave directory is immutable after startup and shared read-only.
//! Every port owns exactly one serial connection guarded by a mutex: unit
//! selection and the following operation form one critical section, and an
//! interrogation sweep holds the port for its full duration. Requests to
//! different ports proceed in parallel.
//!
//! # External collaborators
//!
//! Byte-level Modbus RTU framing comes from `tokio-modbus` over
//! `tokio-serial` behind the [`protocols::modbus::ModbusLink`] trait. The
//! upstream session layer (framing, sequence numbers, timers) delivers
//! decoded [`protocols::iec104::UpstreamRequest`] values and consumes decoded
//! [`protocols::iec104::OutboundAsdu`] sequences.

pub mod core;
pub mod error;
pub mod protocols;

pub use crate::core::config::{build_directory, load_topology};
pub use crate::core::dispatch::{CommandDispatcher, PortMap, PortSession};
pub use crate::core::interrogation::{InterrogationEngine, PointReading, Snapshot};
pub use crate::core::resolver::AddressResolver;
pub use crate::core::topology::{
    PortId, RegisterKind, SlaveDirectory, StationId, UnitId, MAX_PORTS, OFFSET_BY_PORT,
};
pub use crate::error::{Result, TeleSrvError};
pub use crate::protocols::iec104::GatewayAdapter;
