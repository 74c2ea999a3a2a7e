//! Gateway basic library
//!
//! Provides basic functions shared by the gateway services:
//! - logging bootstrap (tracing subscriber setup)
//! - graceful shutdown signal handling

pub mod logging;
pub mod shutdown;

pub use logging::{init_logging, LoggingOptions};
pub use shutdown::wait_for_shutdown;
