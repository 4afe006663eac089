//! Amazon S3 (and S3-compatible) object sink.

use std::error::Error;
use std::io;
use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::put_object::PutObjectError;
use aws_sdk_s3::primitives::ByteStream;
use tracing::{debug, info};

use crate::error::{SinkError, SinkResult};
use crate::ObjectSink;

/// Service error codes that indicate a credential problem rather than a bad request.
const AUTHORIZATION_ERROR_CODES: &[&str] = &[
    "AccessDenied",
    "AccountProblem",
    "AllAccessDisabled",
    "ExpiredToken",
    "InvalidAccessKeyId",
    "InvalidToken",
    "SignatureDoesNotMatch",
    "TokenRefreshRequired",
];

/// Client construction knobs; anything left unset falls back to the AWS default chain.
#[derive(Debug, Clone, Default)]
pub struct S3SinkOptions {
    /// Custom endpoint for S3-compatible stores (`MinIO`, R2, ...).
    pub endpoint: Option<String>,
    /// Region override.
    pub region: Option<String>,
    /// Address buckets as path segments instead of virtual hosts.
    pub force_path_style: bool,
}

/// Object sink that stores files with `PutObject`, streaming them from disk.
#[derive(Clone)]
pub struct S3Sink {
    client: Client,
}

impl S3Sink {
    /// Wrap an already configured client.
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the default credential chain plus the supplied overrides.
    pub async fn from_options(options: &S3SinkOptions) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &options.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &options.endpoint {
            loader = loader.endpoint_url(endpoint.clone());
        }
        let shared = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(options.force_path_style)
            .build();

        info!(
            endpoint = options.endpoint.as_deref().unwrap_or("aws"),
            region = ?shared.region(),
            path_style = options.force_path_style,
            "object sink configured"
        );
        Self::new(Client::from_conf(s3_config))
    }
}

#[async_trait]
impl ObjectSink for S3Sink {
    async fn put_object(&self, source: &Path, bucket: &str, key: &str) -> SinkResult<()> {
        let metadata = tokio::fs::metadata(source)
            .await
            .map_err(|err| SinkError::from_io("stat_source", source, err))?;
        if !metadata.is_file() {
            return Err(SinkError::Io {
                operation: "stat_source",
                path: source.to_path_buf(),
                source: std::io::Error::other("upload source is not a regular file"),
            });
        }

        let body = ByteStream::from_path(source)
            .await
            .map_err(|err| open_error(source, err))?;

        let content_length = i64::try_from(metadata.len()).unwrap_or(i64::MAX);
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_length(content_length)
            .body(body)
            .send()
            .await
            .map_err(|err| classify_put_error(bucket, key, &err))?;

        debug!(bucket, key, bytes = metadata.len(), "object stored");
        Ok(())
    }
}

/// The source can vanish between the metadata check and opening it.
fn open_error<E>(source: &Path, err: E) -> SinkError
where
    E: Error + Send + Sync + 'static,
{
    if is_missing_file(&err) {
        SinkError::SourceNotFound {
            path: source.to_path_buf(),
        }
    } else {
        SinkError::Transport {
            operation: "open_source",
            source: Box::new(err),
        }
    }
}

fn is_missing_file(err: &(dyn Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(error) = current {
        if error
            .downcast_ref::<io::Error>()
            .is_some_and(|io_err| io_err.kind() == io::ErrorKind::NotFound)
        {
            return true;
        }
        current = error.source();
    }
    false
}

fn classify_put_error(bucket: &str, key: &str, err: &SdkError<PutObjectError>) -> SinkError {
    let status = err.raw_response().map(|response| response.status().as_u16());
    let code = err.code().map(str::to_string);
    let detail = DisplayErrorContext(err).to_string();

    if is_authorization_failure(status, code.as_deref(), &detail) {
        SinkError::Unauthorized {
            bucket: bucket.to_string(),
            key: key.to_string(),
            status,
            code,
            detail,
        }
    } else {
        SinkError::Rejected {
            bucket: bucket.to_string(),
            key: key.to_string(),
            status,
            code,
            detail,
        }
    }
}

/// Decide whether a failed request was rejected for credential reasons.
///
/// Requests that never left the client (no credentials resolved) carry no
/// status or code, so the rendered error chain is consulted as a last resort.
pub(crate) fn is_authorization_failure(status: Option<u16>, code: Option<&str>, detail: &str) -> bool {
    if matches!(status, Some(401 | 403)) {
        return true;
    }
    if code.is_some_and(|code| AUTHORIZATION_ERROR_CODES.contains(&code)) {
        return true;
    }
    status.is_none() && detail.to_ascii_lowercase().contains("credential")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SinkErrorKind;
    use std::fmt;

    fn offline_sink() -> S3Sink {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .build();
        S3Sink::new(Client::from_conf(config))
    }

    #[test]
    fn authorization_failures_are_recognised() {
        assert!(is_authorization_failure(Some(403), None, ""));
        assert!(is_authorization_failure(Some(401), None, ""));
        assert!(is_authorization_failure(Some(400), Some("InvalidAccessKeyId"), ""));
        assert!(is_authorization_failure(
            None,
            None,
            "dispatch failure: no credentials in the property bag"
        ));
        assert!(!is_authorization_failure(Some(500), Some("InternalError"), "credential"));
        assert!(!is_authorization_failure(None, None, "connection refused"));
    }

    #[derive(Debug)]
    struct OpenFailed(io::Error);

    impl fmt::Display for OpenFailed {
        fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("failed to open body")
        }
    }

    impl Error for OpenFailed {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn source_vanishing_before_open_is_not_found() {
        let path = Path::new("/tmp/dl/AlbumX/gone.flac");
        let vanished = open_error(path, OpenFailed(io::Error::from(io::ErrorKind::NotFound)));
        assert_eq!(vanished.kind(), SinkErrorKind::SourceNotFound);

        let denied = open_error(
            path,
            OpenFailed(io::Error::from(io::ErrorKind::PermissionDenied)),
        );
        assert!(matches!(
            denied,
            SinkError::Transport {
                operation: "open_source",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn missing_source_is_reported_before_any_request() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("gone.flac");
        let err = offline_sink()
            .put_object(&missing, "bucket", "music/gone.flac")
            .await
            .expect_err("missing file must fail");
        assert_eq!(err.kind(), SinkErrorKind::SourceNotFound);
    }

    #[tokio::test]
    async fn directory_source_is_rejected_as_other_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = offline_sink()
            .put_object(dir.path(), "bucket", "music/dir")
            .await
            .expect_err("directory must fail");
        assert_eq!(err.kind(), SinkErrorKind::Other);
    }
}
