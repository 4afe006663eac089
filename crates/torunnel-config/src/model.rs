//! Typed configuration models for a pipeline run.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use torunnel_torrent_core::SessionDisposition;

use url::Url;

use crate::defaults::{
    DEFAULT_BUCKET, DEFAULT_ENGINE_URL, DEFAULT_NAMESPACE_PREFIX, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_SCRATCH_ROOT,
};
use crate::error::ConfigResult;
use crate::validate::parse_http_url;

/// Everything a run needs, passed explicitly to the entry point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineConfig {
    /// Destination bucket.
    pub bucket: String,
    /// Namespace prefix prepended to every key.
    pub namespace_prefix: String,
    /// Directory the transfer writes into; deleted when the run ends.
    pub scratch_root: PathBuf,
    /// Fixed wait between status polls.
    pub poll_interval: Duration,
    /// Optional upper bound on the download wait.
    pub deadline: Option<Duration>,
    /// Engine-side handling of the transfer once it completes.
    pub disposition: SessionDisposition,
    /// Isolate each run in `scratch_root/<run-id>`.
    pub per_run_scratch: bool,
    /// Transfer engine connection.
    pub engine: EngineSettings,
    /// Object store connection.
    pub sink: SinkSettings,
}

impl PipelineConfig {
    /// Prefix with exactly one trailing `/`, or empty when no prefix is configured.
    #[must_use]
    pub fn normalized_prefix(&self) -> String {
        normalize_prefix(&self.namespace_prefix)
    }

    /// Scratch directory for the given run, honouring `per_run_scratch`.
    #[must_use]
    pub fn scratch_for_run(&self, run_id: &str) -> PathBuf {
        if self.per_run_scratch {
            self.scratch_root.join(run_id)
        } else {
            self.scratch_root.clone()
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            namespace_prefix: DEFAULT_NAMESPACE_PREFIX.to_string(),
            scratch_root: PathBuf::from(DEFAULT_SCRATCH_ROOT),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            deadline: None,
            disposition: SessionDisposition::Stop,
            per_run_scratch: false,
            engine: EngineSettings::default(),
            sink: SinkSettings::default(),
        }
    }
}

/// qBittorrent Web API connection settings.
#[derive(Clone, PartialEq, Serialize)]
pub struct EngineSettings {
    /// Base URL of the Web API; checked to parse as an absolute URL during validation.
    pub base_url: String,
    /// Login name; authentication is skipped when absent.
    pub username: Option<String>,
    /// Login password.
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

impl std::fmt::Debug for EngineSettings {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("EngineSettings")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl EngineSettings {
    /// Parsed base URL.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ConfigError::InvalidField`] when the URL is not absolute http(s).
    pub fn url(&self) -> ConfigResult<Url> {
        parse_http_url("engine", "base_url", &self.base_url)
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ENGINE_URL.to_string(),
            username: None,
            password: None,
        }
    }
}

/// Object store connection settings; unset values defer to the AWS default chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SinkSettings {
    /// Custom endpoint for S3-compatible stores.
    pub endpoint: Option<String>,
    /// Region override.
    pub region: Option<String>,
    /// Use path-style bucket addressing.
    pub force_path_style: bool,
}

/// Command-line values layered over the environment before validation.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Bucket override.
    pub bucket: Option<String>,
    /// Namespace prefix override.
    pub namespace_prefix: Option<String>,
    /// Scratch root override.
    pub scratch_root: Option<PathBuf>,
    /// Poll interval override in milliseconds.
    pub poll_interval_ms: Option<u64>,
    /// Deadline override in seconds.
    pub deadline_secs: Option<u64>,
    /// Keep the engine seeding after completion.
    pub keep_seeding: Option<bool>,
    /// Per-run scratch isolation override.
    pub per_run_scratch: Option<bool>,
    /// Engine base URL override.
    pub engine_url: Option<String>,
}

/// Normalise a namespace prefix: forward slashes only, no leading slash, and
/// exactly one trailing slash unless the prefix is empty.
#[must_use]
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().replace('\\', "/");
    let trimmed = trimmed.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}/")
    }
}

/// True when `path` names no directory of its own (`/`, `.`, `..`, a drive root).
pub(crate) fn is_degenerate_root(path: &Path) -> bool {
    !path
        .components()
        .any(|component| matches!(component, std::path::Component::Normal(_)))
}
