#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub)]

//! Object storage sink abstraction and its S3 implementation.

pub mod error;
pub mod s3;

use std::path::Path;

use async_trait::async_trait;

pub use error::{SinkError, SinkErrorKind, SinkResult};
pub use s3::{S3Sink, S3SinkOptions};

/// Destination that stores one local file as one object.
#[async_trait]
pub trait ObjectSink: Send + Sync {
    /// Store the contents of `source` under `bucket`/`key`.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::SourceNotFound`] when `source` is missing,
    /// [`SinkError::Unauthorized`] when credentials are absent or rejected, and
    /// another variant for every other failure.
    async fn put_object(&self, source: &Path, bucket: &str, key: &str) -> SinkResult<()>;
}
