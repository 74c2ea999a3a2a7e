//! Error handling for the telecontrol gateway service
//!
//! The taxonomy follows the failure paths of the dispatch core: configuration
//! load is the only fatal class, everything else is recoverable per request
//! and maps to a specific negative-response cause upstream.

use errors::GatewayError;
use thiserror::Error;

use crate::core::topology::{RegisterKind, StationId};

/// Telecontrol gateway service error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TeleSrvError {
    /// Malformed or missing topology; fatal at startup
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Station address does not resolve to any directory entry
    #[error("Unknown slave: station address {station}")]
    UnknownSlave {
        /// Station address that failed to resolve
        station: StationId,
    },

    /// Slave exists but the address is absent from its configured set
    #[error("Address not configured: station {station}, {kind} {addr}")]
    AddressNotConfigured {
        /// Station address of the slave
        station: StationId,
        /// Register space the lookup ran against
        kind: RegisterKind,
        /// Local register address that is not configured
        addr: u16,
    },

    /// Device unreachable, timeout or framing failure on the serial line;
    /// never retried by this layer
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    /// Request rejected at the protocol boundary before any dispatch
    #[error("Protocol mismatch: {0}")]
    ProtocolMismatch(#[from] ProtocolMismatch),
}

/// Per-message rejection causes of the gateway adapter
///
/// Each variant corresponds to one negative-response cause of transmission
/// sent back upstream.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolMismatch {
    /// Interrogation qualifier other than "whole station"
    #[error("unsupported interrogation qualifier {0}")]
    UnsupportedQualifier(u8),

    /// Cause of transmission not valid for the request type
    #[error("unexpected cause of transmission")]
    UnknownCot,

    /// Station address decodes to a port index outside the configured range
    #[error("station address outside the port range")]
    UnknownCa,

    /// Information-object address outside every mapped sub-range, or in a
    /// sub-range the request type cannot act on
    #[error("information-object address outside the mapped ranges")]
    UnknownIoa,
}

/// Result type alias for the gateway service
pub type Result<T> = std::result::Result<T, TeleSrvError>;

impl TeleSrvError {
    /// Shorthand for configuration failures
    pub fn config(msg: impl Into<String>) -> Self {
        TeleSrvError::ConfigError(msg.into())
    }

    /// Shorthand for transport failures
    pub fn transport(msg: impl Into<String>) -> Self {
        TeleSrvError::TransportFailure(msg.into())
    }
}

// ============================================================================
// Conversion to GatewayError for binary boundaries
// ============================================================================

impl From<TeleSrvError> for GatewayError {
    fn from(err: TeleSrvError) -> Self {
        match err {
            TeleSrvError::ConfigError(msg) => GatewayError::Configuration(msg),
            TeleSrvError::UnknownSlave { station } => GatewayError::NotFound {
                resource: format!("station {station}"),
            },
            TeleSrvError::AddressNotConfigured {
                station,
                kind,
                addr,
            } => GatewayError::NotFound {
                resource: format!("station {station} {kind} {addr}"),
            },
            TeleSrvError::TransportFailure(msg) => GatewayError::Communication(msg),
            TeleSrvError::ProtocolMismatch(cause) => GatewayError::Protocol {
                protocol: "iec104".to_string(),
                message: cause.to_string(),
            },
        }
    }
}

// ============================================================================
// TeleSrvError implements GatewayErrorTrait
// ============================================================================

use errors::{ErrorCategory, GatewayErrorTrait};

impl GatewayErrorTrait for TeleSrvError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigError(_) => "TELESRV_CONFIG_ERROR",
            Self::UnknownSlave { .. } => "TELESRV_UNKNOWN_SLAVE",
            Self::AddressNotConfigured { .. } => "TELESRV_ADDRESS_NOT_CONFIGURED",
            Self::TransportFailure(_) => "TELESRV_TRANSPORT_FAILURE",
            Self::ProtocolMismatch(_) => "TELESRV_PROTOCOL_MISMATCH",
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigError(_) => ErrorCategory::Configuration,
            Self::UnknownSlave { .. } => ErrorCategory::NotFound,
            Self::AddressNotConfigured { .. } => ErrorCategory::NotFound,
            Self::TransportFailure(_) => ErrorCategory::Connection,
            Self::ProtocolMismatch(_) => ErrorCategory::Protocol,
        }
    }
}
