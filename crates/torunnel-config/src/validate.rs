//! Validation helpers and parsing utilities for configuration values.

use std::io;

use url::Url;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{PipelineConfig, is_degenerate_root};

impl PipelineConfig {
    /// Check the assembled configuration before any side effect happens.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] naming the first offending field, or
    /// [`ConfigError::Io`] when the scratch root cannot be inspected.
    pub fn validate(&self) -> ConfigResult<()> {
        let bucket = self.bucket.trim();
        if bucket.is_empty() {
            return Err(ConfigError::invalid(
                "pipeline",
                "bucket",
                None,
                "must_not_be_empty",
            ));
        }
        if bucket.contains('/') {
            return Err(ConfigError::invalid(
                "pipeline",
                "bucket",
                Some(bucket),
                "must_not_contain_slash",
            ));
        }

        if self
            .normalized_prefix()
            .split('/')
            .any(|segment| segment == "..")
        {
            return Err(ConfigError::invalid(
                "pipeline",
                "namespace_prefix",
                Some(self.namespace_prefix.as_str()),
                "must_not_traverse",
            ));
        }

        if self.poll_interval.is_zero() {
            return Err(ConfigError::invalid(
                "pipeline",
                "poll_interval",
                None,
                "must_be_positive",
            ));
        }
        if self.deadline.is_some_and(|deadline| deadline.is_zero()) {
            return Err(ConfigError::invalid(
                "pipeline",
                "deadline",
                None,
                "must_be_positive",
            ));
        }

        self.validate_scratch_root()?;

        parse_http_url("engine", "base_url", &self.engine.base_url)?;
        if let Some(endpoint) = &self.sink.endpoint {
            parse_http_url("sink", "endpoint", endpoint)?;
        }
        Ok(())
    }

    fn validate_scratch_root(&self) -> ConfigResult<()> {
        let rendered = self.scratch_root.to_string_lossy();
        if rendered.trim().is_empty() || is_degenerate_root(&self.scratch_root) {
            return Err(ConfigError::invalid(
                "pipeline",
                "scratch_root",
                Some(rendered.as_ref()),
                "must_name_a_directory",
            ));
        }
        match std::fs::metadata(&self.scratch_root) {
            Ok(metadata) if !metadata.is_dir() => Err(ConfigError::invalid(
                "pipeline",
                "scratch_root",
                Some(rendered.as_ref()),
                "must_be_directory",
            )),
            Ok(_) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ConfigError::Io {
                operation: "stat_scratch_root",
                source,
            }),
        }
    }
}

pub(crate) fn parse_bool(
    section: &'static str,
    field: &'static str,
    raw: &str,
) -> ConfigResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(
            section,
            field,
            Some(raw),
            "must_be_boolean",
        )),
    }
}

pub(crate) fn parse_u64(
    section: &'static str,
    field: &'static str,
    raw: &str,
) -> ConfigResult<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::invalid(section, field, Some(raw), "must_be_integer"))
}

pub(crate) fn parse_http_url(
    section: &'static str,
    field: &'static str,
    raw: &str,
) -> ConfigResult<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|_| ConfigError::invalid(section, field, Some(raw), "must_be_url"))?;
    if !matches!(url.scheme(), "http" | "https") || !url.has_host() {
        return Err(ConfigError::invalid(
            section,
            field,
            Some(raw),
            "must_be_http_url",
        ));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn reason_of(result: ConfigResult<()>) -> (&'static str, &'static str) {
        match result {
            Err(ConfigError::InvalidField { field, reason, .. }) => (field, reason),
            other => panic!("expected invalid field, got {other:?}"),
        }
    }

    #[test]
    fn default_configuration_is_valid() {
        PipelineConfig::default()
            .validate()
            .expect("defaults validate");
    }

    #[test]
    fn empty_bucket_and_zero_interval_are_rejected() {
        let config = PipelineConfig {
            bucket: "  ".into(),
            ..PipelineConfig::default()
        };
        assert_eq!(reason_of(config.validate()), ("bucket", "must_not_be_empty"));

        let config = PipelineConfig {
            poll_interval: Duration::ZERO,
            ..PipelineConfig::default()
        };
        assert_eq!(
            reason_of(config.validate()),
            ("poll_interval", "must_be_positive")
        );

        let config = PipelineConfig {
            deadline: Some(Duration::ZERO),
            ..PipelineConfig::default()
        };
        assert_eq!(reason_of(config.validate()), ("deadline", "must_be_positive"));
    }

    #[test]
    fn filesystem_root_scratch_is_rejected() {
        for root in ["/", ".", ""] {
            let config = PipelineConfig {
                scratch_root: PathBuf::from(root),
                ..PipelineConfig::default()
            };
            assert_eq!(
                reason_of(config.validate()),
                ("scratch_root", "must_name_a_directory"),
                "root {root:?}"
            );
        }
    }

    #[test]
    fn traversing_prefix_is_rejected() {
        let config = PipelineConfig {
            namespace_prefix: "music/../secrets".into(),
            ..PipelineConfig::default()
        };
        assert_eq!(
            reason_of(config.validate()),
            ("namespace_prefix", "must_not_traverse")
        );
    }

    #[test]
    fn urls_must_be_http() {
        let mut config = PipelineConfig::default();
        config.engine.base_url = "ftp://engine.local".into();
        assert_eq!(reason_of(config.validate()), ("base_url", "must_be_http_url"));

        let mut config = PipelineConfig::default();
        config.sink.endpoint = Some("not a url".into());
        assert_eq!(reason_of(config.validate()), ("endpoint", "must_be_url"));
    }

    #[test]
    fn scalar_parsers_report_field_context() {
        assert!(parse_bool("pipeline", "per_run_scratch", "YES").expect("bool"));
        assert!(!parse_bool("pipeline", "per_run_scratch", "off").expect("bool"));
        assert!(parse_bool("pipeline", "per_run_scratch", "maybe").is_err());
        assert_eq!(parse_u64("pipeline", "poll_interval", " 250 ").expect("u64"), 250);
        assert!(matches!(
            parse_u64("pipeline", "poll_interval", "-1"),
            Err(ConfigError::InvalidField { reason: "must_be_integer", .. })
        ));
    }
}
