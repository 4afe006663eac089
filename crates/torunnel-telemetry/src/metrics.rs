//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters a single run produces: polls, state changes, upload
//!   outcomes, uploaded bytes, and cleanup results.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared across the pipeline stages.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    transfer_polls_total: IntCounter,
    transfer_state_changes_total: IntCounterVec,
    events_emitted_total: IntCounterVec,
    uploads_total: IntCounterVec,
    upload_bytes_total: IntCounter,
    cleanup_total: IntCounterVec,
    download_duration_ms: IntGauge,
}

/// Snapshot of selected counters for the final run summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Status polls issued against the transfer session.
    pub transfer_polls_total: u64,
    /// Files stored successfully.
    pub uploads_succeeded: u64,
    /// Files that ended in any failure class.
    pub uploads_failed: u64,
    /// Bytes handed to the object sink for successful uploads.
    pub upload_bytes_total: u64,
    /// Cleanup attempts that failed.
    pub cleanup_failures_total: u64,
    /// Wall time spent waiting for the download (ms).
    pub download_duration_ms: i64,
}

fn collector<T>(name: &'static str, built: prometheus::Result<T>) -> Result<T> {
    built.map_err(|source| TelemetryError::MetricSetup { name, source })
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be built or
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let transfer_polls_total = collector(
            "transfer_polls_total",
            IntCounter::with_opts(Opts::new(
                "transfer_polls_total",
                "Status polls issued against the transfer session",
            )),
        )?;
        let transfer_state_changes_total = collector(
            "transfer_state_changes_total",
            IntCounterVec::new(
                Opts::new(
                    "transfer_state_changes_total",
                    "Lifecycle state transitions observed while polling",
                ),
                &["state"],
            ),
        )?;
        let events_emitted_total = collector(
            "events_emitted_total",
            IntCounterVec::new(
                Opts::new("events_emitted_total", "Domain events emitted by type"),
                &["type"],
            ),
        )?;
        let uploads_total = collector(
            "uploads_total",
            IntCounterVec::new(
                Opts::new("uploads_total", "Per-file upload outcomes by class"),
                &["outcome"],
            ),
        )?;
        let upload_bytes_total = collector(
            "upload_bytes_total",
            IntCounter::with_opts(Opts::new(
                "upload_bytes_total",
                "Bytes stored by successful uploads",
            )),
        )?;
        let cleanup_total = collector(
            "cleanup_total",
            IntCounterVec::new(
                Opts::new("cleanup_total", "Scratch cleanup attempts by result"),
                &["result"],
            ),
        )?;
        let download_duration_ms = collector(
            "download_duration_ms",
            IntGauge::with_opts(Opts::new(
                "download_duration_ms",
                "Time spent waiting for the transfer to complete (ms)",
            )),
        )?;

        let register = |name: &'static str, boxed: Box<dyn prometheus::core::Collector>| {
            registry
                .register(boxed)
                .map_err(|source| TelemetryError::MetricSetup { name, source })
        };
        register("transfer_polls_total", Box::new(transfer_polls_total.clone()))?;
        register(
            "transfer_state_changes_total",
            Box::new(transfer_state_changes_total.clone()),
        )?;
        register("events_emitted_total", Box::new(events_emitted_total.clone()))?;
        register("uploads_total", Box::new(uploads_total.clone()))?;
        register("upload_bytes_total", Box::new(upload_bytes_total.clone()))?;
        register("cleanup_total", Box::new(cleanup_total.clone()))?;
        register("download_duration_ms", Box::new(download_duration_ms.clone()))?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                transfer_polls_total,
                transfer_state_changes_total,
                events_emitted_total,
                uploads_total,
                upload_bytes_total,
                cleanup_total,
                download_duration_ms,
            }),
        })
    }

    /// Count one status poll.
    pub fn inc_transfer_poll(&self) {
        self.inner.transfer_polls_total.inc();
    }

    /// Count a lifecycle transition into `state`.
    pub fn inc_state_change(&self, state: &str) {
        self.inner
            .transfer_state_changes_total
            .with_label_values(&[state])
            .inc();
    }

    /// Increment the emitted event counter for the specific event type.
    pub fn inc_event(&self, event_type: &str) {
        self.inner
            .events_emitted_total
            .with_label_values(&[event_type])
            .inc();
    }

    /// Count a per-file upload outcome (`uploaded`, `not_found`, `unauthorized`, `failed`).
    pub fn inc_upload(&self, outcome: &str) {
        self.inner.uploads_total.with_label_values(&[outcome]).inc();
    }

    /// Add bytes stored by a successful upload.
    pub fn add_upload_bytes(&self, bytes: u64) {
        self.inner.upload_bytes_total.inc_by(bytes);
    }

    /// Count a cleanup attempt by result (`removed`, `absent`, `failed`).
    pub fn inc_cleanup(&self, result: &str) {
        self.inner.cleanup_total.with_label_values(&[result]).inc();
    }

    /// Record how long the download phase took.
    pub fn observe_download_duration(&self, duration: Duration) {
        self.inner
            .download_duration_ms
            .set(Self::duration_to_ms(duration));
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsRender {
                source: Box::new(source),
            })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsRender {
            source: Box::new(source),
        })
    }

    /// Render the registry and write it to `path`, returning the rendered text.
    ///
    /// # Errors
    ///
    /// Returns an error when rendering fails or the file cannot be written.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        let rendered = self.render()?;
        std::fs::write(path, &rendered).map_err(|source| TelemetryError::MetricsWrite {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(rendered)
    }

    /// Take a point-in-time snapshot of the run counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let uploads = &self.inner.uploads_total;
        let uploads_succeeded = uploads.with_label_values(&["uploaded"]).get();
        let uploads_failed = ["not_found", "unauthorized", "failed"]
            .iter()
            .map(|label| uploads.with_label_values(&[*label]).get())
            .sum();
        MetricsSnapshot {
            transfer_polls_total: self.inner.transfer_polls_total.get(),
            uploads_succeeded,
            uploads_failed,
            upload_bytes_total: self.inner.upload_bytes_total.get(),
            cleanup_failures_total: self.inner.cleanup_total.with_label_values(&["failed"]).get(),
            download_duration_ms: self.inner.download_duration_ms.get(),
        }
    }

    /// Convert a duration to milliseconds saturating at `i64::MAX`.
    pub(crate) fn duration_to_ms(duration: Duration) -> i64 {
        i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn duration_to_ms_saturates_on_large_values() {
        let duration = Duration::from_secs(u64::MAX / 2);
        assert_eq!(Metrics::duration_to_ms(duration), i64::MAX);
    }

    #[test]
    fn metrics_snapshot_reflects_updates() -> std::result::Result<(), Box<dyn Error>> {
        let metrics = Metrics::new()?;
        metrics.inc_transfer_poll();
        metrics.inc_transfer_poll();
        metrics.inc_state_change("downloading");
        metrics.inc_event("progress");
        metrics.inc_upload("uploaded");
        metrics.inc_upload("uploaded");
        metrics.inc_upload("unauthorized");
        metrics.add_upload_bytes(2_048);
        metrics.inc_cleanup("failed");
        metrics.observe_download_duration(Duration::from_millis(1_500));

        let snapshot = metrics.snapshot();
        assert_eq!(
            snapshot,
            MetricsSnapshot {
                transfer_polls_total: 2,
                uploads_succeeded: 2,
                uploads_failed: 1,
                upload_bytes_total: 2_048,
                cleanup_failures_total: 1,
                download_duration_ms: 1_500,
            }
        );

        let rendered = metrics.render()?;
        assert!(rendered.contains("transfer_polls_total 2"));
        assert!(rendered.contains("uploads_total{outcome=\"unauthorized\"} 1"));
        Ok(())
    }

    #[test]
    fn persist_writes_exposition_file() -> std::result::Result<(), Box<dyn Error>> {
        let metrics = Metrics::new()?;
        metrics.inc_cleanup("removed");
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("run.prom");
        let rendered = metrics.persist(&path)?;
        assert_eq!(std::fs::read_to_string(&path)?, rendered);
        assert!(rendered.contains("cleanup_total"));

        let missing_dir = dir.path().join("missing").join("run.prom");
        assert!(matches!(
            metrics.persist(&missing_dir),
            Err(TelemetryError::MetricsWrite { .. })
        ));
        Ok(())
    }
}
