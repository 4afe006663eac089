//! # Design
//!
//! - Provide structured, constant-message errors for key mapping, enumeration, and cleanup.
//! - Capture operation context (paths, fields, inputs) to make failures reproducible in tests.
//! - Preserve source errors without interpolating context into error messages.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for filesystem operations.
pub type FsOpsResult<T> = Result<T, FsOpsError>;

/// Errors produced by the local side of the upload pipeline.
#[derive(Debug, Error)]
pub enum FsOpsError {
    /// IO failures while interacting with the filesystem.
    #[error("fsops io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Walkdir traversal failures.
    #[error("fsops walkdir failure")]
    Walkdir {
        /// Operation that triggered the walkdir failure.
        operation: &'static str,
        /// Path involved in the walkdir failure.
        path: PathBuf,
        /// Underlying walkdir error.
        source: walkdir::Error,
    },
    /// Input validation failures.
    #[error("fsops invalid input")]
    InvalidInput {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
}

impl FsOpsError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn walkdir(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: walkdir::Error,
    ) -> Self {
        Self::Walkdir {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid_input(
        field: &'static str,
        reason: &'static str,
        value: impl Into<String>,
    ) -> Self {
        Self::InvalidInput {
            field,
            reason,
            value: Some(value.into()),
        }
    }

    /// One-line description including the most useful context field.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Io {
                operation,
                path,
                source,
            } => format!("{self}: {operation} {}: {source}", path.display()),
            Self::Walkdir {
                operation,
                path,
                source,
            } => format!("{self}: {operation} {}: {source}", path.display()),
            Self::InvalidInput {
                field,
                reason,
                value,
            } => match value {
                Some(value) => format!("{self}: {field} {reason} ({value})"),
                None => format!("{self}: {field} {reason}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn io_error_preserves_source_and_context() {
        let err = FsOpsError::io("remove_scratch", "/tmp/x", io::Error::other("busy"));
        assert_eq!(err.to_string(), "fsops io failure");
        assert!(err.source().is_some());
        assert_eq!(
            err.detail(),
            "fsops io failure: remove_scratch /tmp/x: busy"
        );
    }

    #[test]
    fn invalid_input_detail_mentions_field_and_reason() {
        let err = FsOpsError::invalid_input("local_path", "non_utf8", "a\u{fffd}b");
        assert_eq!(err.to_string(), "fsops invalid input");
        assert!(err.detail().contains("local_path non_utf8"));
    }
}
