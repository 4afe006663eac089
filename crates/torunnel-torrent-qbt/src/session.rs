//! HTTP session against a running qBittorrent instance.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::Form;
use reqwest::{Client, Response};
use tokio::sync::Mutex;
use torunnel_torrent_core::{
    SessionHandle, TransferDescriptor, TransferError, TransferResult, TransferSession,
    TransferStatus,
};
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

use crate::convert::TorrentInfo;
use crate::error::QbtError;

const LOGIN_PATH: &str = "api/v2/auth/login";
const ADD_PATH: &str = "api/v2/torrents/add";
const INFO_PATH: &str = "api/v2/torrents/info";
const DELETE_PATH: &str = "api/v2/torrents/delete";
const DELETE_TAGS_PATH: &str = "api/v2/torrents/deleteTags";
const TAG_PREFIX: &str = "torunnel-";
const REJECTED_BODY: &str = "Fails.";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for the Web API.
#[derive(Clone)]
pub struct QbtOptions {
    /// Web UI base URL, e.g. `http://127.0.0.1:8080/`.
    pub base_url: Url,
    /// Login name; no login is attempted when absent.
    pub username: Option<String>,
    /// Login password.
    pub password: Option<String>,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl QbtOptions {
    /// Anonymous options with the default timeout.
    #[must_use]
    pub const fn new(base_url: Url) -> Self {
        Self {
            base_url,
            username: None,
            password: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Attach login credentials.
    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}

impl fmt::Debug for QbtOptions {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("QbtOptions")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// [`TransferSession`] backed by the qBittorrent Web API.
///
/// Each transfer is added with a unique tag so it can be looked up before the
/// info hash of a magnet link is resolved. The login cookie is kept in the
/// client's cookie store.
pub struct QbtSession {
    client: Client,
    base_url: Url,
    credentials: Option<(String, String)>,
    authenticated: Mutex<bool>,
}

impl QbtSession {
    /// Build a session; no request is sent until the first transfer begins.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Session`] when the HTTP client cannot be built.
    pub fn new(options: QbtOptions) -> TransferResult<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(options.request_timeout)
            .build()
            .map_err(|err| TransferError::session("build_client", err))?;

        let mut base_url = options.base_url;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let credentials = options
            .username
            .map(|username| (username, options.password.unwrap_or_default()));
        Ok(Self {
            client,
            base_url,
            credentials,
            authenticated: Mutex::new(false),
        })
    }

    fn endpoint(&self, path: &'static str) -> TransferResult<Url> {
        self.base_url
            .join(path)
            .map_err(|source| TransferError::session("endpoint", QbtError::Endpoint { path, source }))
    }

    async fn ensure_login(&self) -> TransferResult<()> {
        let mut authenticated = self.authenticated.lock().await;
        if *authenticated {
            return Ok(());
        }
        let Some((username, password)) = &self.credentials else {
            return Ok(());
        };

        let response = self
            .client
            .post(self.endpoint(LOGIN_PATH)?)
            .header(reqwest::header::REFERER, self.base_url.as_str())
            .form(&[("username", username.as_str()), ("password", password.as_str())])
            .send()
            .await
            .map_err(|err| TransferError::session("login", err))?;
        accept("login", response).await?;

        *authenticated = true;
        debug!(base_url = %self.base_url, "web api login accepted");
        Ok(())
    }

    async fn lookup(&self, operation: &'static str, tag: &str) -> TransferResult<Option<TorrentInfo>> {
        let response = self
            .client
            .get(self.endpoint(INFO_PATH)?)
            .query(&[("tag", tag)])
            .send()
            .await
            .map_err(|err| TransferError::session(operation, err))?;
        let response = check_status(operation, response)?;
        let mut torrents: Vec<TorrentInfo> = response
            .json()
            .await
            .map_err(|err| TransferError::session(operation, err))?;
        if torrents.is_empty() {
            return Ok(None);
        }
        Ok(Some(torrents.swap_remove(0)))
    }

    async fn post_form(
        &self,
        operation: &'static str,
        path: &'static str,
        form: &[(&str, &str)],
    ) -> TransferResult<()> {
        let response = self
            .client
            .post(self.endpoint(path)?)
            .form(form)
            .send()
            .await
            .map_err(|err| TransferError::session(operation, err))?;
        accept(operation, response).await
    }
}

fn check_status(operation: &'static str, response: Response) -> TransferResult<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(TransferError::session(
            operation,
            QbtError::Status {
                operation,
                status: status.as_u16(),
            },
        ))
    }
}

async fn accept(operation: &'static str, response: Response) -> TransferResult<()> {
    let response = check_status(operation, response)?;
    let body = response
        .text()
        .await
        .map_err(|err| TransferError::session(operation, err))?;
    if body.trim() == REJECTED_BODY {
        return Err(TransferError::session(operation, QbtError::Rejected { operation }));
    }
    Ok(())
}

#[async_trait]
impl TransferSession for QbtSession {
    async fn begin(&self, descriptor: &TransferDescriptor) -> TransferResult<SessionHandle> {
        self.ensure_login().await?;

        let save_path = std::path::absolute(descriptor.destination_root()).map_err(|err| {
            TransferError::io("resolve_save_path", descriptor.destination_root(), err)
        })?;
        let id = Uuid::new_v4();
        let tag = format!("{TAG_PREFIX}{}", id.simple());
        let form = Form::new()
            .text("urls", descriptor.uri().to_string())
            .text("savepath", save_path.display().to_string())
            .text("tags", tag.clone())
            .text("contentLayout", "Original");

        let response = self
            .client
            .post(self.endpoint(ADD_PATH)?)
            .multipart(form)
            .send()
            .await
            .map_err(|err| TransferError::session("add_torrent", err))?;
        accept("add_torrent", response).await?;

        info!(
            info_hash = descriptor.info_hash(),
            tag = %tag,
            save_path = %save_path.display(),
            "torrent added to engine"
        );
        Ok(SessionHandle { id, reference: tag })
    }

    async fn poll(&self, handle: &SessionHandle) -> TransferResult<TransferStatus> {
        match self.lookup("poll", &handle.reference).await? {
            Some(info) => info.into_status(),
            None => Ok(TransferStatus::default()),
        }
    }

    async fn stop(&self, handle: &SessionHandle) -> TransferResult<()> {
        let Some(info) = self.lookup("stop", &handle.reference).await? else {
            debug!(tag = %handle.reference, "torrent already gone from engine");
            return Ok(());
        };
        self.post_form(
            "stop",
            DELETE_PATH,
            &[("hashes", info.hash.as_str()), ("deleteFiles", "false")],
        )
        .await?;
        if let Err(err) = self
            .post_form("delete_tag", DELETE_TAGS_PATH, &[("tags", handle.reference.as_str())])
            .await
        {
            debug!(tag = %handle.reference, error = %err, "run tag not removed");
        }
        info!(hash = %info.hash, tag = %handle.reference, "torrent removed from engine");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;
    use torunnel_torrent_core::LifecycleState;

    const MAGNET: &str = "magnet:?xt=urn:btih:5b635ca35e4d2847a83709033333333333333333&dn=AlbumX";

    fn session(server: &MockServer, credentials: bool) -> TransferResult<QbtSession> {
        let base_url = Url::parse(&server.base_url()).map_err(|err| TransferError::session("test", err))?;
        let mut options = QbtOptions::new(base_url);
        if credentials {
            options = options.with_credentials("admin", "secret");
        }
        QbtSession::new(options)
    }

    fn handle(tag: &str) -> SessionHandle {
        SessionHandle {
            id: Uuid::nil(),
            reference: tag.to_string(),
        }
    }

    #[tokio::test]
    async fn begin_logs_in_once_and_tags_the_torrent() -> TransferResult<()> {
        let server = MockServer::start_async().await;
        let login = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v2/auth/login")
                .form_urlencoded_tuple("username", "admin")
                .form_urlencoded_tuple("password", "secret");
            then.status(200).body("Ok.");
        });
        let add = server.mock(|when, then| {
            when.method(POST).path("/api/v2/torrents/add");
            then.status(200).body("Ok.");
        });
        let temp = tempfile::tempdir().map_err(|err| TransferError::io("tempdir", "", err))?;
        let qbt = session(&server, true)?;
        let descriptor = TransferDescriptor::magnet(MAGNET, temp.path())?;

        let first = qbt.begin(&descriptor).await?;
        let second = qbt.begin(&descriptor).await?;

        login.assert_calls(1);
        add.assert_calls(2);
        assert!(first.reference.starts_with(TAG_PREFIX));
        assert_ne!(first.reference, second.reference);
        Ok(())
    }

    #[tokio::test]
    async fn rejected_login_is_a_session_error() -> TransferResult<()> {
        let server = MockServer::start_async().await;
        let login = server.mock(|when, then| {
            when.method(POST).path("/api/v2/auth/login");
            then.status(200).body("Fails.");
        });
        let qbt = session(&server, true)?;
        let descriptor = TransferDescriptor::magnet(MAGNET, "/tmp/torunnel-qbt")?;

        match qbt.begin(&descriptor).await {
            Err(TransferError::Session {
                operation: "login", ..
            }) => {}
            other => panic!("expected login failure, got {other:?}"),
        }
        login.assert();
        Ok(())
    }

    #[tokio::test]
    async fn anonymous_session_skips_login_and_surfaces_add_status() -> TransferResult<()> {
        let server = MockServer::start_async().await;
        let add = server.mock(|when, then| {
            when.method(POST).path("/api/v2/torrents/add");
            then.status(415);
        });
        let qbt = session(&server, false)?;
        let descriptor = TransferDescriptor::magnet(MAGNET, "/tmp/torunnel-qbt")?;

        let err = qbt.begin(&descriptor).await.expect_err("415 rejected");
        assert!(matches!(
            err,
            TransferError::Session {
                operation: "add_torrent",
                ..
            }
        ));
        add.assert();
        Ok(())
    }

    #[tokio::test]
    async fn poll_maps_info_by_tag() -> TransferResult<()> {
        let server = MockServer::start_async().await;
        let info = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v2/torrents/info")
                .query_param("tag", "torunnel-run");
            then.status(200).json_body(json!([{
                "hash": "5b635ca35e4d2847a83709033333333333333333",
                "name": "AlbumX",
                "progress": 0.42,
                "dlspeed": 120_000,
                "upspeed": 3_000,
                "num_seeds": 5,
                "num_leechs": 2,
                "state": "downloading",
                "total_size": 52_428_800,
                "has_metadata": true
            }]));
        });
        let qbt = session(&server, false)?;

        let status = qbt.poll(&handle("torunnel-run")).await?;

        info.assert();
        assert_eq!(status.state, LifecycleState::Downloading);
        assert_eq!(status.resolved_name.as_deref(), Some("AlbumX"));
        assert_eq!(status.peers, 7);
        assert!((status.percent_complete() - 42.0).abs() < 1e-9);
        Ok(())
    }

    #[tokio::test]
    async fn poll_before_listing_reports_queued() -> TransferResult<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/v2/torrents/info");
            then.status(200).json_body(json!([]));
        });
        let qbt = session(&server, false)?;

        let status = qbt.poll(&handle("torunnel-run")).await?;
        assert_eq!(status, TransferStatus::default());
        Ok(())
    }

    #[tokio::test]
    async fn poll_surfaces_engine_error_state() -> TransferResult<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/v2/torrents/info");
            then.status(200)
                .json_body(json!([{ "hash": "abc", "name": "AlbumX", "state": "missingFiles" }]));
        });
        let qbt = session(&server, false)?;

        assert!(matches!(
            qbt.poll(&handle("torunnel-run")).await,
            Err(TransferError::Failed { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn stop_deletes_torrent_but_keeps_files() -> TransferResult<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/v2/torrents/info")
                .query_param("tag", "torunnel-run");
            then.status(200)
                .json_body(json!([{ "hash": "abc", "name": "AlbumX", "state": "stalledUP" }]));
        });
        let delete = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v2/torrents/delete")
                .form_urlencoded_tuple("hashes", "abc")
                .form_urlencoded_tuple("deleteFiles", "false");
            then.status(200);
        });
        let delete_tag = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v2/torrents/deleteTags")
                .form_urlencoded_tuple("tags", "torunnel-run");
            then.status(200);
        });
        let qbt = session(&server, false)?;

        qbt.stop(&handle("torunnel-run")).await?;

        delete.assert();
        delete_tag.assert();
        Ok(())
    }

    #[tokio::test]
    async fn stop_without_listing_is_a_noop() -> TransferResult<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/v2/torrents/info");
            then.status(200).json_body(json!([]));
        });
        let delete = server.mock(|when, then| {
            when.method(POST).path("/api/v2/torrents/delete");
            then.status(200);
        });
        let qbt = session(&server, false)?;

        qbt.stop(&handle("torunnel-run")).await?;
        delete.assert_calls(0);
        Ok(())
    }

    #[test]
    fn base_url_gains_trailing_slash() -> TransferResult<()> {
        let base = Url::parse("http://nas.local:8080/qbt").map_err(|err| TransferError::session("test", err))?;
        let qbt = QbtSession::new(QbtOptions::new(base))?;
        assert_eq!(
            qbt.endpoint(INFO_PATH)?.as_str(),
            "http://nas.local:8080/qbt/api/v2/torrents/info"
        );
        Ok(())
    }

    #[test]
    fn debug_output_redacts_password() {
        let options = QbtOptions::new(Url::parse("http://127.0.0.1:8080/").expect("url"))
            .with_credentials("admin", "hunter2");
        let rendered = format!("{options:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("admin"));
    }
}
