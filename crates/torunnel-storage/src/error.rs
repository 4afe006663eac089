//! # Design
//!
//! - Keep failure classes explicit so callers can classify per-file outcomes.
//! - Preserve sink diagnostics (status, service code) without parsing them again downstream.

use std::error::Error;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for object sink operations.
pub type SinkResult<T> = Result<T, SinkError>;

/// Coarse class a sink failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkErrorKind {
    /// The local source was missing.
    SourceNotFound,
    /// Credentials were missing or rejected.
    Unauthorized,
    /// Anything else.
    Other,
}

/// Errors produced by an object sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Source file vanished before it could be read.
    #[error("upload source not found")]
    SourceNotFound {
        /// Missing source path.
        path: PathBuf,
    },
    /// The store refused the request because of missing or invalid credentials.
    #[error("object store rejected credentials")]
    Unauthorized {
        /// Target bucket.
        bucket: String,
        /// Target key.
        key: String,
        /// HTTP status when a response was received.
        status: Option<u16>,
        /// Service error code when one was returned.
        code: Option<String>,
        /// Rendered diagnostic.
        detail: String,
    },
    /// The store rejected the request for any other reason.
    #[error("object store rejected upload")]
    Rejected {
        /// Target bucket.
        bucket: String,
        /// Target key.
        key: String,
        /// HTTP status when a response was received.
        status: Option<u16>,
        /// Service error code when one was returned.
        code: Option<String>,
        /// Rendered diagnostic.
        detail: String,
    },
    /// Reading the local source failed.
    #[error("upload source io failure")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Source path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Client-side transport or request construction failure.
    #[error("object store transport failure")]
    Transport {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl SinkError {
    /// Map a local IO failure, promoting `NotFound` to [`SinkError::SourceNotFound`].
    pub fn from_io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            Self::SourceNotFound { path }
        } else {
            Self::Io {
                operation,
                path,
                source,
            }
        }
    }

    /// Failure class used for per-file reporting.
    #[must_use]
    pub const fn kind(&self) -> SinkErrorKind {
        match self {
            Self::SourceNotFound { .. } => SinkErrorKind::SourceNotFound,
            Self::Unauthorized { .. } => SinkErrorKind::Unauthorized,
            Self::Rejected { .. } | Self::Io { .. } | Self::Transport { .. } => {
                SinkErrorKind::Other
            }
        }
    }

    /// One-line description including the most useful context field.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::SourceNotFound { path } => format!("{self}: {}", path.display()),
            Self::Unauthorized { detail, .. } | Self::Rejected { detail, .. } => {
                format!("{self}: {detail}")
            }
            Self::Io { source, path, .. } => format!("{self}: {}: {source}", path.display()),
            Self::Transport { source, .. } => format!("{self}: {source}"),
        }
    }
}
