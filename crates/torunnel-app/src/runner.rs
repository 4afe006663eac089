use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use torunnel_config::PipelineConfig;
use torunnel_events::{Event, EventBus};
use torunnel_fsops::{
    BatchReport, CleanupOutcome, ScratchRoot, UploadPipeline, UploadRequest,
    validate_logical_segment,
};
use torunnel_storage::ObjectSink;
use torunnel_telemetry::Metrics;
use torunnel_torrent_core::{DownloadResult, TransferDescriptor, TransferSession};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::orchestrator::{DownloadOrchestrator, WaitPolicy};

/// Caller input for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    /// Magnet link to fetch.
    pub descriptor: String,
    /// Logical path that replaces the content name in object keys.
    pub logical_segment: String,
}

/// How the scratch root was left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupStatus {
    /// The scratch root existed and was deleted.
    Removed,
    /// Nothing was left to delete.
    AlreadyAbsent,
    /// Deletion failed; the run result is unaffected.
    Failed {
        /// Failure description.
        message: String,
    },
}

impl CleanupStatus {
    /// Stable label used in status lines.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Removed => "removed",
            Self::AlreadyAbsent => "absent",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Everything a successful run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Identifier shared by every event of the run.
    pub run_id: Uuid,
    /// Completed download.
    pub download: DownloadResult,
    /// Per-file upload outcomes, in upload order.
    pub batch: BatchReport,
    /// Scratch cleanup result.
    pub cleanup: CleanupStatus,
}

impl RunReport {
    /// Whether every file reached the object store.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.batch.is_success()
    }
}

/// Runs descriptor to download to upload to cleanup, one run at a time.
#[derive(Clone)]
pub struct PipelineRunner {
    config: PipelineConfig,
    orchestrator: DownloadOrchestrator,
    uploads: UploadPipeline,
    events: EventBus,
    metrics: Metrics,
}

impl PipelineRunner {
    /// Wire a runner from explicit collaborators.
    #[must_use]
    pub fn new(
        config: PipelineConfig,
        session: Arc<dyn TransferSession>,
        sink: Arc<dyn ObjectSink>,
        events: EventBus,
        metrics: Metrics,
    ) -> Self {
        let orchestrator = DownloadOrchestrator::new(session, events.clone(), metrics.clone())
            .with_disposition(config.disposition);
        let uploads = UploadPipeline::new(sink, events.clone(), metrics.clone());
        Self {
            config,
            orchestrator,
            uploads,
            events,
            metrics,
        }
    }

    /// Configuration the runner was built with.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Execute one run.
    ///
    /// Input is validated before anything touches the filesystem. Once the
    /// scratch root is acquired it is released on every exit path, after all
    /// other work; a failed release is reported but never becomes the error.
    ///
    /// # Errors
    ///
    /// Returns [`AppError`] when the input is invalid, the download fails or
    /// is interrupted, or the download result cannot be enumerated. Per-file
    /// upload failures are part of the report instead.
    pub async fn run(&self, request: &RunRequest, cancel: &CancellationToken) -> AppResult<RunReport> {
        let run_id = Uuid::new_v4();
        let logical_segment = request.logical_segment.trim();
        validate_logical_segment(logical_segment)
            .map_err(AppError::fsops("validate_logical_segment"))?;
        let scratch_path = self.config.scratch_for_run(&run_id.to_string());
        let descriptor = TransferDescriptor::magnet(&request.descriptor, &scratch_path)
            .map_err(AppError::transfer("parse_descriptor"))?;

        let scratch = ScratchRoot::acquire(&scratch_path)
            .map_err(AppError::fsops("acquire_scratch_root"))?;
        info!(
            run_id = %run_id,
            info_hash = descriptor.info_hash(),
            scratch_root = %scratch.path().display(),
            "run started"
        );
        self.emit(Event::RunStarted {
            run_id,
            descriptor: descriptor.uri().to_string(),
            scratch_root: scratch.path().display().to_string(),
        });

        let result = self.execute(run_id, &descriptor, logical_segment, cancel).await;
        if let Err(err) = &result {
            let stage = match err {
                AppError::Transfer { .. } => "download",
                AppError::FsOps { .. } | AppError::Config { .. } => "upload",
            };
            warn!(run_id = %run_id, stage, error = %err.detail(), "run failed");
            self.emit(Event::RunFailed {
                run_id,
                stage: stage.to_string(),
                message: err.detail(),
            });
        }

        let cleanup = self.release(run_id, scratch);
        let (download, batch) = result?;
        info!(
            run_id = %run_id,
            uploaded = batch.uploaded_count(),
            failed = batch.failed_count(),
            cleanup = cleanup.label(),
            "run finished"
        );
        Ok(RunReport {
            run_id,
            download,
            batch,
            cleanup,
        })
    }

    async fn execute(
        &self,
        run_id: Uuid,
        descriptor: &TransferDescriptor,
        logical_segment: &str,
        cancel: &CancellationToken,
    ) -> AppResult<(DownloadResult, BatchReport)> {
        let policy = WaitPolicy {
            poll_interval: self.config.poll_interval,
            deadline: self.config.deadline,
        };
        let (download, seeding) = self
            .orchestrator
            .download(run_id, descriptor, policy, cancel)
            .await
            .map_err(AppError::transfer("download"))?;

        let namespace_prefix = self.config.normalized_prefix();
        let batch = self
            .uploads
            .run(UploadRequest {
                run_id,
                download: &download,
                logical_segment,
                namespace_prefix: &namespace_prefix,
                bucket: &self.config.bucket,
            })
            .await;
        // The scratch root is deleted next; a seeding engine would be left
        // pointing at missing files.
        if let Some(handle) = &seeding {
            self.orchestrator.stop_session(run_id, handle).await;
        }
        let batch = batch.map_err(AppError::fsops("upload"))?;
        Ok((download, batch))
    }

    fn release(&self, run_id: Uuid, scratch: ScratchRoot) -> CleanupStatus {
        let path = scratch.path().display().to_string();
        match scratch.release() {
            Ok(outcome) => {
                self.metrics.inc_cleanup(outcome.as_str());
                info!(run_id = %run_id, path = %path, outcome = outcome.as_str(), "scratch root released");
                self.emit(Event::CleanupCompleted {
                    run_id,
                    path,
                    removed: outcome == CleanupOutcome::Removed,
                });
                match outcome {
                    CleanupOutcome::Removed => CleanupStatus::Removed,
                    CleanupOutcome::AlreadyAbsent => CleanupStatus::AlreadyAbsent,
                }
            }
            Err(err) => {
                let message = err.detail();
                self.metrics.inc_cleanup("failed");
                warn!(run_id = %run_id, path = %path, error = %message, "scratch cleanup failed");
                self.emit(Event::CleanupFailed {
                    run_id,
                    path,
                    message: message.clone(),
                });
                CleanupStatus::Failed { message }
            }
        }
    }

    fn emit(&self, event: Event) {
        self.metrics.inc_event(event.kind());
        let _ = self.events.publish(event);
    }
}
