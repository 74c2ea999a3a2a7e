//! Logging bootstrap
//!
//! Initializes the global `tracing` subscriber for gateway services. Console
//! output is always enabled; a daily-rotated log file is added when a log
//! directory is configured.
//!
//! Filter priority: `RUST_LOG` environment variable, then the level passed by
//! the service.

use std::path::PathBuf;

use errors::{GatewayError, GatewayResult};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Logging configuration passed by the service binary
#[derive(Debug, Clone)]
pub struct LoggingOptions {
    /// Base log level when `RUST_LOG` is unset (trace, debug, info, warn, error)
    pub level: String,
    /// Disable ANSI colors on console output
    pub no_color: bool,
    /// Optional directory for daily-rotated log files
    pub log_dir: Option<PathBuf>,
    /// Service name, used as the log file prefix
    pub service: String,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            no_color: false,
            log_dir: None,
            service: "gateway".to_string(),
        }
    }
}

/// Initialize the global tracing subscriber
///
/// Returns the worker guard of the file writer when file logging is active.
/// The guard must be kept alive for the lifetime of the process, otherwise
/// buffered log lines are lost on exit.
pub fn init_logging(options: &LoggingOptions) -> GatewayResult<Option<WorkerGuard>> {
    let filter = build_filter(&options.level)?;

    let console_layer = fmt::layer()
        .with_target(true)
        .with_ansi(!options.no_color);

    let (file_layer, guard) = match &options.log_dir {
        Some(dir) => {
            let appender =
                tracing_appender::rolling::daily(dir, format!("{}.log", options.service));
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .boxed();
            (Some(layer), Some(guard))
        },
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| GatewayError::StartupFailed(format!("Logging already initialized: {e}")))?;

    Ok(guard)
}

/// Build the env filter from `RUST_LOG` or the configured level
fn build_filter(level: &str) -> GatewayResult<EnvFilter> {
    if std::env::var("RUST_LOG").is_ok() {
        return EnvFilter::try_from_default_env().map_err(|e| GatewayError::InvalidConfig {
            field: "RUST_LOG".to_string(),
            reason: e.to_string(),
        });
    }

    EnvFilter::try_new(level).map_err(|_| GatewayError::InvalidConfig {
        field: "log_level".to_string(),
        reason: format!("invalid log level '{level}'"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_accepts_levels() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            assert!(build_filter(level).is_ok());
        }
    }

    #[test]
    fn test_build_filter_accepts_directives() {
        assert!(build_filter("info,telesrv=debug").is_ok());
    }

    #[test]
    fn test_build_filter_rejects_garbage() {
        assert!(build_filter("no/such/level").is_err());
    }

    #[test]
    fn test_default_options() {
        let options = LoggingOptions::default();
        assert_eq!(options.level, "info");
        assert!(options.log_dir.is_none());
    }
}
