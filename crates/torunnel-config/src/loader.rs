//! Environment loading and override layering.
//!
//! Precedence, lowest first: built-in defaults, `TORUNNEL_*` environment
//! variables, command-line overrides. Validation runs once on the result.

use std::path::PathBuf;
use std::time::Duration;

use torunnel_torrent_core::SessionDisposition;
use tracing::debug;

use crate::error::ConfigResult;
use crate::model::{ConfigOverrides, PipelineConfig};
use crate::validate::{parse_bool, parse_u64};

/// Destination bucket.
pub const ENV_BUCKET: &str = "TORUNNEL_BUCKET";
/// Namespace prefix.
pub const ENV_PREFIX: &str = "TORUNNEL_PREFIX";
/// Scratch root directory.
pub const ENV_SCRATCH_ROOT: &str = "TORUNNEL_SCRATCH_ROOT";
/// Poll interval in milliseconds.
pub const ENV_POLL_INTERVAL_MS: &str = "TORUNNEL_POLL_INTERVAL_MS";
/// Download deadline in seconds.
pub const ENV_DEADLINE_SECS: &str = "TORUNNEL_DEADLINE_SECS";
/// Keep seeding after completion.
pub const ENV_KEEP_SEEDING: &str = "TORUNNEL_KEEP_SEEDING";
/// Per-run scratch isolation.
pub const ENV_PER_RUN_SCRATCH: &str = "TORUNNEL_PER_RUN_SCRATCH";
/// qBittorrent Web API base URL.
pub const ENV_ENGINE_URL: &str = "TORUNNEL_QBT_URL";
/// qBittorrent login name.
pub const ENV_ENGINE_USERNAME: &str = "TORUNNEL_QBT_USERNAME";
/// qBittorrent login password.
pub const ENV_ENGINE_PASSWORD: &str = "TORUNNEL_QBT_PASSWORD";
/// Custom S3 endpoint.
pub const ENV_S3_ENDPOINT: &str = "TORUNNEL_S3_ENDPOINT";
/// S3 region override.
pub const ENV_S3_REGION: &str = "TORUNNEL_S3_REGION";
/// S3 path-style addressing.
pub const ENV_S3_PATH_STYLE: &str = "TORUNNEL_S3_PATH_STYLE";

impl PipelineConfig {
    /// Load from the process environment, apply overrides, and validate.
    ///
    /// # Errors
    ///
    /// Returns an error when a variable cannot be parsed or the result fails
    /// validation.
    pub fn load(overrides: &ConfigOverrides) -> ConfigResult<Self> {
        Self::load_with(|key| std::env::var(key).ok(), overrides)
    }

    /// Same as [`PipelineConfig::load`] with an injectable variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error when a variable cannot be parsed or the result fails
    /// validation.
    pub fn load_with<F>(lookup: F, overrides: &ConfigOverrides) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self::from_lookup(lookup)?.with_overrides(overrides);
        config.validate()?;
        debug!(config = ?config, "configuration loaded");
        Ok(config)
    }

    /// Defaults layered with whatever `lookup` returns; not validated.
    ///
    /// # Errors
    ///
    /// Returns an error when a numeric or boolean variable cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(bucket) = get(ENV_BUCKET) {
            config.bucket = bucket;
        }
        if let Some(prefix) = get(ENV_PREFIX) {
            config.namespace_prefix = prefix;
        }
        if let Some(root) = get(ENV_SCRATCH_ROOT) {
            config.scratch_root = PathBuf::from(root);
        }
        if let Some(raw) = get(ENV_POLL_INTERVAL_MS) {
            config.poll_interval =
                Duration::from_millis(parse_u64("pipeline", "poll_interval", &raw)?);
        }
        if let Some(raw) = get(ENV_DEADLINE_SECS) {
            config.deadline = Some(Duration::from_secs(parse_u64(
                "pipeline", "deadline", &raw,
            )?));
        }
        if let Some(raw) = get(ENV_KEEP_SEEDING) {
            config.disposition = disposition_for(parse_bool("pipeline", "keep_seeding", &raw)?);
        }
        if let Some(raw) = get(ENV_PER_RUN_SCRATCH) {
            config.per_run_scratch = parse_bool("pipeline", "per_run_scratch", &raw)?;
        }

        if let Some(url) = get(ENV_ENGINE_URL) {
            config.engine.base_url = url;
        }
        config.engine.username = get(ENV_ENGINE_USERNAME);
        config.engine.password = lookup(ENV_ENGINE_PASSWORD);

        config.sink.endpoint = get(ENV_S3_ENDPOINT);
        config.sink.region = get(ENV_S3_REGION);
        if let Some(raw) = get(ENV_S3_PATH_STYLE) {
            config.sink.force_path_style = parse_bool("sink", "force_path_style", &raw)?;
        }

        Ok(config)
    }

    /// Apply command-line overrides; unset fields keep their current value.
    #[must_use]
    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(bucket) = &overrides.bucket {
            self.bucket.clone_from(bucket);
        }
        if let Some(prefix) = &overrides.namespace_prefix {
            self.namespace_prefix.clone_from(prefix);
        }
        if let Some(root) = &overrides.scratch_root {
            self.scratch_root.clone_from(root);
        }
        if let Some(ms) = overrides.poll_interval_ms {
            self.poll_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = overrides.deadline_secs {
            self.deadline = Some(Duration::from_secs(secs));
        }
        if let Some(keep) = overrides.keep_seeding {
            self.disposition = disposition_for(keep);
        }
        if let Some(per_run) = overrides.per_run_scratch {
            self.per_run_scratch = per_run;
        }
        if let Some(url) = &overrides.engine_url {
            self.engine.base_url.clone_from(url);
        }
        self
    }
}

const fn disposition_for(keep_seeding: bool) -> SessionDisposition {
    if keep_seeding {
        SessionDisposition::KeepSeeding
    } else {
        SessionDisposition::Stop
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConfigError;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = PipelineConfig::load_with(
            lookup(&[
                (ENV_BUCKET, "archive"),
                (ENV_PREFIX, "audio"),
                (ENV_POLL_INTERVAL_MS, "250"),
                (ENV_DEADLINE_SECS, "3600"),
                (ENV_KEEP_SEEDING, "true"),
                (ENV_ENGINE_USERNAME, "admin"),
                (ENV_ENGINE_PASSWORD, "secret"),
                (ENV_S3_ENDPOINT, "http://localhost:9000"),
                (ENV_S3_PATH_STYLE, "1"),
            ]),
            &ConfigOverrides::default(),
        )
        .expect("config loads");

        assert_eq!(config.bucket, "archive");
        assert_eq!(config.normalized_prefix(), "audio/");
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.deadline, Some(Duration::from_secs(3600)));
        assert_eq!(config.disposition, SessionDisposition::KeepSeeding);
        assert_eq!(config.engine.username.as_deref(), Some("admin"));
        assert_eq!(config.engine.password.as_deref(), Some("secret"));
        assert_eq!(config.sink.endpoint.as_deref(), Some("http://localhost:9000"));
        assert!(config.sink.force_path_style);
    }

    #[test]
    fn blank_variables_fall_back_to_defaults() {
        let config = PipelineConfig::load_with(
            lookup(&[(ENV_BUCKET, "   "), (ENV_S3_REGION, "")]),
            &ConfigOverrides::default(),
        )
        .expect("config loads");
        assert_eq!(config.bucket, "music-app-public-bucket");
        assert!(config.sink.region.is_none());
    }

    #[test]
    fn overrides_win_over_environment() {
        let overrides = ConfigOverrides {
            bucket: Some("cli-bucket".into()),
            poll_interval_ms: Some(50),
            keep_seeding: Some(false),
            per_run_scratch: Some(true),
            ..ConfigOverrides::default()
        };
        let config = PipelineConfig::load_with(
            lookup(&[(ENV_BUCKET, "env-bucket"), (ENV_KEEP_SEEDING, "yes")]),
            &overrides,
        )
        .expect("config loads");
        assert_eq!(config.bucket, "cli-bucket");
        assert_eq!(config.poll_interval, Duration::from_millis(50));
        assert_eq!(config.disposition, SessionDisposition::Stop);
        assert!(config.per_run_scratch);
    }

    #[test]
    fn unparseable_values_name_the_field() {
        let err = PipelineConfig::load_with(
            lookup(&[(ENV_POLL_INTERVAL_MS, "soon")]),
            &ConfigOverrides::default(),
        )
        .expect_err("bad interval");
        assert!(matches!(
            err,
            ConfigError::InvalidField {
                field: "poll_interval",
                reason: "must_be_integer",
                ..
            }
        ));
    }

    #[test]
    fn validation_runs_after_overrides() {
        let overrides = ConfigOverrides {
            poll_interval_ms: Some(0),
            ..ConfigOverrides::default()
        };
        let err = PipelineConfig::load_with(lookup(&[]), &overrides).expect_err("zero interval");
        assert!(matches!(
            err,
            ConfigError::InvalidField {
                field: "poll_interval",
                ..
            }
        ));
    }
}
