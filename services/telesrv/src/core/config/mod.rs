//! Topology configuration
//!
//! `types` is the serde view of the topology document; `loader` validates it
//! and produces the slave directory.

pub mod loader;
pub mod types;

pub use loader::{build_directory, load_topology};
pub use types::{PortConfig, SlaveConfig, TopologyConfig};
