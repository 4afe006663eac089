//! Adapter failures wrapped into [`TransferError::Session`].
//!
//! [`TransferError::Session`]: torunnel_torrent_core::TransferError::Session

use thiserror::Error;

/// Failure reported by the qBittorrent Web API.
#[derive(Debug, Error)]
pub enum QbtError {
    /// The endpoint answered with a non-success HTTP status.
    #[error("web api returned an unexpected status")]
    Status {
        /// Operation identifier.
        operation: &'static str,
        /// HTTP status code.
        status: u16,
    },
    /// The endpoint answered `Fails.`.
    #[error("web api rejected the request")]
    Rejected {
        /// Operation identifier.
        operation: &'static str,
    },
    /// A configured endpoint could not be derived from the base URL.
    #[error("web api endpoint is invalid")]
    Endpoint {
        /// Relative path that failed to join.
        path: &'static str,
        /// Underlying parse error.
        #[source]
        source: url::ParseError,
    },
}
