//! Error types for transfer sessions and the download wait loops.
//!
//! # Design
//! - Messages stay short; context lives in structured fields.
//! - Source errors are preserved so callers can render the full chain.

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Wait loop that was interrupted by cancellation or a deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPhase {
    /// Waiting for the content name to become known.
    Metadata,
    /// Waiting for the payload to reach the terminal state.
    Completion,
}

impl Display for WaitPhase {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Metadata => "metadata",
            Self::Completion => "completion",
        })
    }
}

/// Primary error type for transfer operations.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The content descriptor could not be parsed or is not supported.
    #[error("invalid content descriptor: {reason}")]
    InvalidDescriptor {
        /// Static reason for the rejection.
        reason: &'static str,
        /// Offending descriptor.
        value: String,
    },
    /// Operation is not supported by the underlying session.
    #[error("transfer operation not supported")]
    Unsupported {
        /// Operation identifier.
        operation: &'static str,
    },
    /// Talking to the underlying session failed.
    #[error("transfer session operation failed")]
    Session {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The session itself reported an unrecoverable condition.
    #[error("transfer failed: {message}")]
    Failed {
        /// Failure description reported by the session.
        message: String,
    },
    /// An external cancellation signal interrupted a wait loop.
    #[error("transfer wait cancelled during {phase}")]
    Cancelled {
        /// Loop that was interrupted.
        phase: WaitPhase,
    },
    /// The run deadline elapsed inside a wait loop.
    #[error("transfer wait timed out during {phase}")]
    TimedOut {
        /// Loop that was interrupted.
        phase: WaitPhase,
        /// Time spent since the orchestrator started.
        waited: Duration,
    },
    /// Local filesystem preparation failed.
    #[error("transfer filesystem operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl TransferError {
    /// Wrap an adapter failure with the operation that produced it.
    pub fn session(operation: &'static str, source: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self::Session {
            operation,
            source: source.into(),
        }
    }

    /// Wrap an IO failure with its operation and path.
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Whether the error came from an external interruption rather than the session.
    #[must_use]
    pub const fn is_interrupted(&self) -> bool {
        matches!(self, Self::Cancelled { .. } | Self::TimedOut { .. })
    }
}

/// Convenience alias for transfer results.
pub type TransferResult<T> = Result<T, TransferError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helpers_build_variants_with_sources() {
        let session = TransferError::session("poll", io::Error::other("connection reset"));
        assert!(matches!(
            session,
            TransferError::Session {
                operation: "poll",
                ..
            }
        ));
        assert!(session.source().is_some());

        let io_err = TransferError::io("create_dir", "/tmp/dl", io::Error::other("denied"));
        assert!(matches!(io_err, TransferError::Io { .. }));
        assert!(io_err.source().is_some());
    }

    #[test]
    fn interruption_variants_are_flagged() {
        assert!(
            TransferError::Cancelled {
                phase: WaitPhase::Metadata
            }
            .is_interrupted()
        );
        assert!(
            TransferError::TimedOut {
                phase: WaitPhase::Completion,
                waited: Duration::from_secs(3),
            }
            .is_interrupted()
        );
        assert!(
            !TransferError::Failed {
                message: "tracker error".into()
            }
            .is_interrupted()
        );
        assert_eq!(
            TransferError::Cancelled {
                phase: WaitPhase::Completion
            }
            .to_string(),
            "transfer wait cancelled during completion"
        );
    }
}
