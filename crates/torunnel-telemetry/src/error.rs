//! Error types for logging and metrics setup.

use std::path::PathBuf;

use prometheus::Error as PrometheusError;
use thiserror::Error;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised by telemetry helpers.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global subscriber was already installed.
    #[error("tracing subscriber already installed")]
    SubscriberInstall {
        /// Underlying tracing subscriber error.
        #[source]
        source: tracing_subscriber::util::TryInitError,
    },
    /// The requested log format is not `json` or `pretty`.
    #[error("unknown log format")]
    UnknownLogFormat {
        /// Value that failed to parse.
        value: String,
    },
    /// A run metric could not be created or registered.
    #[error("metric setup failed")]
    MetricSetup {
        /// Metric name.
        name: &'static str,
        /// Underlying Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// The registry could not be rendered as text exposition.
    #[error("metrics rendering failed")]
    MetricsRender {
        /// Underlying failure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// Writing the exposition file failed.
    #[error("metrics file could not be written")]
    MetricsWrite {
        /// Target file.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}
