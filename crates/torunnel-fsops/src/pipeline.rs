//! Sequential upload of a completed download.

use std::path::Path;
use std::sync::Arc;

use torunnel_events::{Event, EventBus};
use torunnel_storage::ObjectSink;
use torunnel_telemetry::Metrics;
use torunnel_torrent_core::DownloadResult;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::FsOpsResult;
use crate::model::{BatchReport, UploadOutcome, UploadRecord, UploadTask};
use crate::plan::{PlannedFile, plan_uploads};

/// Inputs for one batch.
#[derive(Debug, Clone, Copy)]
pub struct UploadRequest<'a> {
    /// Run the batch belongs to.
    pub run_id: Uuid,
    /// Completed download to publish.
    pub download: &'a DownloadResult,
    /// Logical path substituted for the resolved name.
    pub logical_segment: &'a str,
    /// Namespace prefix for every key.
    pub namespace_prefix: &'a str,
    /// Destination bucket.
    pub bucket: &'a str,
}

/// Uploads every file of a download through an object sink, one at a time.
///
/// Per-file failures are classified and recorded; the batch always attempts
/// every file.
#[derive(Clone)]
pub struct UploadPipeline {
    sink: Arc<dyn ObjectSink>,
    events: EventBus,
    metrics: Metrics,
}

impl UploadPipeline {
    /// Construct a pipeline that reports through the shared bus and registry.
    #[must_use]
    pub fn new(sink: Arc<dyn ObjectSink>, events: EventBus, metrics: Metrics) -> Self {
        Self {
            sink,
            events,
            metrics,
        }
    }

    /// Upload the download result and return one record per file, in order.
    ///
    /// # Errors
    ///
    /// Returns an error only when the local result is missing altogether.
    pub async fn run(&self, request: UploadRequest<'_>) -> FsOpsResult<BatchReport> {
        let planned = plan_uploads(
            request.download,
            request.logical_segment,
            request.namespace_prefix,
        )?;
        info!(
            run_id = %request.run_id,
            files = planned.len(),
            local_root = %request.download.local_root.display(),
            "upload batch planned"
        );

        let mut report = BatchReport {
            records: Vec::with_capacity(planned.len()),
        };
        for file in planned {
            let record = match file {
                PlannedFile::Task(task) => self.upload_one(request.run_id, request.bucket, task).await,
                PlannedFile::Unmappable {
                    source_path,
                    detail,
                }
                | PlannedFile::Unreadable {
                    path: source_path,
                    detail,
                } => {
                    warn!(
                        run_id = %request.run_id,
                        source = %source_path.display(),
                        detail = %detail,
                        "file skipped"
                    );
                    let outcome = UploadOutcome::OtherFailure { detail };
                    self.finish(request.run_id, &source_path, "", &outcome);
                    UploadRecord {
                        source_path,
                        object_key: None,
                        outcome,
                    }
                }
            };
            report.records.push(record);
        }

        self.emit(Event::BatchCompleted {
            run_id: request.run_id,
            uploaded: report.uploaded_count(),
            failed: report.failed_count(),
        });
        info!(
            run_id = %request.run_id,
            uploaded = report.uploaded_count(),
            failed = report.failed_count(),
            "upload batch finished"
        );
        Ok(report)
    }

    async fn upload_one(&self, run_id: Uuid, bucket: &str, task: UploadTask) -> UploadRecord {
        let UploadTask {
            source_path,
            object_key,
        } = task;
        self.emit(Event::UploadStarted {
            run_id,
            source: source_path.display().to_string(),
            bucket: bucket.to_string(),
            key: object_key.clone(),
        });
        info!(
            run_id = %run_id,
            source = %source_path.display(),
            bucket,
            key = %object_key,
            "uploading file"
        );

        let size = tokio::fs::metadata(&source_path)
            .await
            .ok()
            .map(|metadata| metadata.len());
        let outcome = match self.sink.put_object(&source_path, bucket, &object_key).await {
            Ok(()) => {
                if let Some(bytes) = size {
                    self.metrics.add_upload_bytes(bytes);
                }
                UploadOutcome::Uploaded
            }
            Err(err) => {
                warn!(
                    run_id = %run_id,
                    key = %object_key,
                    error = %err.detail(),
                    "upload failed"
                );
                UploadOutcome::from_sink_error(&err)
            }
        };

        self.finish(run_id, &source_path, &object_key, &outcome);
        UploadRecord {
            source_path,
            object_key: Some(object_key),
            outcome,
        }
    }

    fn finish(&self, run_id: Uuid, source: &Path, key: &str, outcome: &UploadOutcome) {
        self.metrics.inc_upload(outcome.label());
        self.emit(Event::UploadFinished {
            run_id,
            source: source.display().to_string(),
            key: key.to_string(),
            status: outcome.status(),
            detail: outcome.detail().map(str::to_string),
        });
    }

    fn emit(&self, event: Event) {
        self.metrics.inc_event(event.kind());
        let _ = self.events.publish(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use torunnel_events::UploadStatus;
    use torunnel_test_support::{RecordingSink, SinkFailure};

    fn album(temp: &TempDir, tracks: usize) -> anyhow::Result<DownloadResult> {
        let root = temp.path().join("AlbumX");
        fs::create_dir_all(&root)?;
        for index in 1..=tracks {
            fs::write(root.join(format!("track{index}.flac")), vec![0_u8; index])?;
        }
        Ok(DownloadResult::under(temp.path(), "AlbumX"))
    }

    fn request<'a>(run_id: Uuid, download: &'a DownloadResult) -> UploadRequest<'a> {
        UploadRequest {
            run_id,
            download,
            logical_segment: "Artist/AlbumX",
            namespace_prefix: "music/",
            bucket: "music-app-public-bucket",
        }
    }

    #[tokio::test]
    async fn authorization_failure_does_not_abort_batch() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let download = album(&temp, 5)?;
        let sink = Arc::new(RecordingSink::new().fail_at(2, SinkFailure::Unauthorized));
        let metrics = Metrics::new()?;
        let pipeline = UploadPipeline::new(sink.clone(), EventBus::new(), metrics.clone());

        let report = pipeline.run(request(Uuid::new_v4(), &download)).await?;

        assert_eq!(report.len(), 5);
        assert_eq!(report.uploaded_count(), 4);
        assert_eq!(report.records[2].outcome, UploadOutcome::Unauthorized);
        assert_eq!(
            report.records[2].object_key.as_deref(),
            Some("music/Artist/AlbumX/track3.flac")
        );
        assert_eq!(sink.calls().len(), 5, "every file is attempted");
        assert!(
            sink.calls()
                .iter()
                .all(|call| call.bucket == "music-app-public-bucket")
        );

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.uploads_succeeded, 4);
        assert_eq!(snapshot.uploads_failed, 1);
        assert_eq!(snapshot.upload_bytes_total, 1 + 2 + 4 + 5);
        Ok(())
    }

    #[tokio::test]
    async fn k_failures_yield_k_non_uploaded_outcomes() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let download = album(&temp, 6)?;
        let sink = Arc::new(
            RecordingSink::new()
                .fail_at(0, SinkFailure::NotFound)
                .fail_at(3, SinkFailure::Other("throttled".into()))
                .fail_at(5, SinkFailure::Unauthorized),
        );
        let pipeline = UploadPipeline::new(sink.clone(), EventBus::new(), Metrics::new()?);

        let report = pipeline.run(request(Uuid::new_v4(), &download)).await?;

        assert_eq!(report.len(), 6);
        assert_eq!(report.failed_count(), 3);
        assert_eq!(report.records[0].outcome, UploadOutcome::NotFound);
        assert!(matches!(
            &report.records[3].outcome,
            UploadOutcome::OtherFailure { detail } if detail.contains("throttled")
        ));
        assert_eq!(sink.calls().len(), 6);
        Ok(())
    }

    #[tokio::test]
    async fn events_describe_each_upload_in_order() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let download = album(&temp, 2)?;
        let bus = EventBus::with_capacity(32);
        let sink = Arc::new(RecordingSink::new().fail_at(1, SinkFailure::Unauthorized));
        let pipeline = UploadPipeline::new(sink, bus.clone(), Metrics::new()?);
        let run_id = Uuid::new_v4();

        pipeline.run(request(run_id, &download)).await?;

        let kinds: Vec<_> = bus
            .backlog()
            .into_iter()
            .map(|envelope| envelope.event)
            .collect();
        assert_eq!(kinds.len(), 5);
        assert!(matches!(
            &kinds[0],
            Event::UploadStarted { key, .. } if key == "music/Artist/AlbumX/track1.flac"
        ));
        assert!(matches!(
            &kinds[1],
            Event::UploadFinished { status: UploadStatus::Uploaded, .. }
        ));
        assert!(matches!(
            &kinds[3],
            Event::UploadFinished { status: UploadStatus::Unauthorized, .. }
        ));
        assert!(matches!(
            kinds[4],
            Event::BatchCompleted { uploaded: 1, failed: 1, run_id: id } if id == run_id
        ));
        Ok(())
    }

    #[tokio::test]
    async fn missing_local_root_is_fatal() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let download = DownloadResult::under(temp.path(), "Nothing");
        let sink = Arc::new(RecordingSink::new());
        let pipeline = UploadPipeline::new(sink.clone(), EventBus::new(), Metrics::new()?);

        assert!(pipeline.run(request(Uuid::new_v4(), &download)).await.is_err());
        assert!(sink.calls().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn pipeline_leaves_local_files_untouched() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let download = album(&temp, 3)?;
        let pipeline =
            UploadPipeline::new(Arc::new(RecordingSink::new()), EventBus::new(), Metrics::new()?);
        pipeline.run(request(Uuid::new_v4(), &download)).await?;
        assert_eq!(fs::read_dir(&download.local_root)?.count(), 3);
        Ok(())
    }
}
