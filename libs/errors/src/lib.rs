//! Unified error handling for the telecontrol gateway workspace
//!
//! This crate provides the workspace-wide error type that binaries and shared
//! libraries use at their boundaries. Services keep their own domain-specific
//! error enums and convert into [`GatewayError`] when crossing crate borders.

use thiserror::Error;

// ============================================================================
// GatewayError - Main error type
// ============================================================================

/// Main error type for the gateway workspace
#[derive(Debug, Error)]
pub enum GatewayError {
    // ======================================
    // Configuration Errors
    // ======================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Missing required configuration: {0}")]
    MissingConfig(String),

    // ======================================
    // Protocol & Communication Errors
    // ======================================
    #[error("Protocol error: {protocol}: {message}")]
    Protocol { protocol: String, message: String },

    #[error("Communication error: {0}")]
    Communication(String),

    #[error("Connection failed: {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    #[error("Timeout waiting for response from {0}")]
    Timeout(String),

    // ======================================
    // Lookup & Validation Errors
    // ======================================
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Out of range: {value} not in [{min}, {max}]")]
    OutOfRange {
        value: String,
        min: String,
        max: String,
    },

    // ======================================
    // File & I/O Errors
    // ======================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {file}: {error}")]
    ParseError { file: String, error: String },

    // ======================================
    // Service & Runtime Errors
    // ======================================
    #[error("Service startup failed: {0}")]
    StartupFailed(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Internal error: {0}")]
    Internal(String),

    // ======================================
    // Catch-all for other errors
    // ======================================
    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using GatewayError
pub type GatewayResult<T> = Result<T, GatewayError>;

impl GatewayError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Communication(_) | Self::ConnectionFailed { .. }
        )
    }
}

// ============================================================================
// Error category and capability trait
// ============================================================================

/// Error category enum - used for classification and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    // Infrastructure layer
    Configuration,
    Timeout,

    // Business logic layer
    Validation,
    NotFound,

    // Protocol/communication layer
    Protocol,
    Connection,

    // System level
    Internal,
    Unknown,
}

/// Gateway error capability trait
///
/// Defines a unified interface that service error types implement. Each
/// service keeps its own domain-specific error type and gains a common
/// outward-facing interface (error code, category, retry hints) through this
/// trait.
pub trait GatewayErrorTrait: std::error::Error + Send + Sync + 'static {
    /// Get error code (for logs and monitoring)
    fn error_code(&self) -> &'static str;

    /// Get error category (for classification/metrics)
    fn category(&self) -> ErrorCategory;

    /// Whether the error is retryable (default implementation is category-based)
    fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Timeout | ErrorCategory::Connection
        )
    }

    /// Recommended retry delay in milliseconds
    fn retry_delay_ms(&self) -> u64 {
        match self.category() {
            ErrorCategory::Timeout => 500,
            ErrorCategory::Connection => 1500,
            _ => 0,
        }
    }

    /// Get log level
    fn log_level(&self) -> tracing::Level {
        use tracing::Level;
        match self.category() {
            ErrorCategory::Internal => Level::ERROR,
            ErrorCategory::Timeout | ErrorCategory::Connection | ErrorCategory::Protocol => {
                Level::WARN
            },
            ErrorCategory::Validation | ErrorCategory::NotFound => Level::INFO,
            _ => Level::WARN,
        }
    }
}

impl GatewayError {
    /// Categorize this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) | Self::InvalidConfig { .. } | Self::MissingConfig(_) => {
                ErrorCategory::Configuration
            },
            Self::Protocol { .. } => ErrorCategory::Protocol,
            Self::Communication(_) | Self::ConnectionFailed { .. } => ErrorCategory::Connection,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Validation(_) | Self::OutOfRange { .. } => ErrorCategory::Validation,
            Self::Io(_) | Self::ParseError { .. } => ErrorCategory::Internal,
            Self::StartupFailed(_) | Self::ShutdownError(_) | Self::Internal(_) => {
                ErrorCategory::Internal
            },
            Self::Unknown(_) | Self::Other(_) => ErrorCategory::Unknown,
        }
    }
}

// Tests
#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        assert!(GatewayError::Timeout("slave 103".into()).is_retryable());
        assert!(GatewayError::Communication("port closed".into()).is_retryable());
        assert!(!GatewayError::Configuration("bad port".into()).is_retryable());
        assert!(!GatewayError::NotFound {
            resource: "station 205".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            GatewayError::Configuration("x".into()).category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            GatewayError::Timeout("x".into()).category(),
            ErrorCategory::Timeout
        );
        assert_eq!(
            GatewayError::Protocol {
                protocol: "iec104".into(),
                message: "bad cot".into()
            }
            .category(),
            ErrorCategory::Protocol
        );
        assert_eq!(
            GatewayError::Validation("x".into()).category(),
            ErrorCategory::Validation
        );
    }

    #[test]
    fn test_error_display() {
        let error = GatewayError::ConnectionFailed {
            endpoint: "/dev/ttyS1".into(),
            reason: "permission denied".into(),
        };
        assert!(error.to_string().contains("/dev/ttyS1"));
        assert!(error.to_string().contains("permission denied"));
    }
}
