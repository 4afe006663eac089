//! # Design
//!
//! - Centralize run-level errors for bootstrap and orchestration.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be turned into collaborators.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        #[source]
        source: torunnel_config::ConfigError,
    },
    /// The descriptor was rejected or the download aborted.
    #[error("transfer operation failed")]
    Transfer {
        /// Operation identifier.
        operation: &'static str,
        /// Source transfer error.
        #[source]
        source: torunnel_torrent_core::TransferError,
    },
    /// Local filesystem work or the upload batch failed.
    #[error("filesystem operation failed")]
    FsOps {
        /// Operation identifier.
        operation: &'static str,
        /// Source fsops error.
        #[source]
        source: torunnel_fsops::FsOpsError,
    },
}

impl AppError {
    pub(crate) fn transfer(
        operation: &'static str,
    ) -> impl FnOnce(torunnel_torrent_core::TransferError) -> Self {
        move |source| Self::Transfer { operation, source }
    }

    pub(crate) fn fsops(
        operation: &'static str,
    ) -> impl FnOnce(torunnel_fsops::FsOpsError) -> Self {
        move |source| Self::FsOps { operation, source }
    }

    /// Message followed by every source in the chain, `: `-separated.
    #[must_use]
    pub fn detail(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }

    /// Operation identifier carried by every variant.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Config { operation, .. }
            | Self::Transfer { operation, .. }
            | Self::FsOps { operation, .. } => operation,
        }
    }

    /// Whether the error stems from caller input rather than a failing collaborator.
    #[must_use]
    pub const fn is_invalid_input(&self) -> bool {
        match self {
            Self::Config { .. } => true,
            Self::Transfer { source, .. } => {
                matches!(
                    source,
                    torunnel_torrent_core::TransferError::InvalidDescriptor { .. }
                )
            }
            Self::FsOps { source, .. } => {
                matches!(source, torunnel_fsops::FsOpsError::InvalidInput { .. })
            }
        }
    }
}
