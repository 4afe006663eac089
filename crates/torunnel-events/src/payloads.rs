//! Event payload types carried between the pipeline stages and the front end.

use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier assigned to each event emitted by a run.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
pub const DEFAULT_REPLAY_CAPACITY: usize = 1_024;

/// Typed domain events surfaced while a run progresses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A run acquired its scratch root and is about to start the transfer.
    RunStarted {
        /// Identifier for the run.
        run_id: Uuid,
        /// Content descriptor supplied by the caller.
        descriptor: String,
        /// Scratch root owned by the run.
        scratch_root: String,
    },
    /// The transfer session reported a lifecycle transition.
    StateChanged {
        /// Identifier for the run.
        run_id: Uuid,
        /// Lifecycle state observed on the latest poll.
        state: LifecycleState,
    },
    /// Metadata arrived and the content name is known.
    MetadataResolved {
        /// Identifier for the run.
        run_id: Uuid,
        /// Name of the top-level entry produced by the transfer.
        name: String,
    },
    /// Snapshot emitted on every poll while the payload downloads.
    Progress {
        /// Identifier for the run.
        run_id: Uuid,
        /// Completion percentage in `[0, 100]`.
        percent: f64,
        /// Current download rate in bytes per second.
        download_bps: u64,
        /// Current upload rate in bytes per second.
        upload_bps: u64,
        /// Connected peers.
        peers: u32,
        /// Lifecycle state at the time of the poll.
        state: LifecycleState,
    },
    /// The transfer reached its terminal state.
    DownloadCompleted {
        /// Identifier for the run.
        run_id: Uuid,
        /// Resolved content name.
        name: String,
        /// Local path of the top-level entry.
        local_root: String,
    },
    /// A file is about to be handed to the object sink.
    UploadStarted {
        /// Identifier for the run.
        run_id: Uuid,
        /// Local source path.
        source: String,
        /// Bucket receiving the object.
        bucket: String,
        /// Object key derived for the file.
        key: String,
    },
    /// The object sink returned for a single file.
    UploadFinished {
        /// Identifier for the run.
        run_id: Uuid,
        /// Local source path.
        source: String,
        /// Object key derived for the file.
        key: String,
        /// Classified result.
        status: UploadStatus,
        /// Failure detail, when the upload did not succeed.
        detail: Option<String>,
    },
    /// Every task in the batch was attempted.
    BatchCompleted {
        /// Identifier for the run.
        run_id: Uuid,
        /// Files stored successfully.
        uploaded: usize,
        /// Files that failed for any reason.
        failed: usize,
    },
    /// The scratch root was released.
    CleanupCompleted {
        /// Identifier for the run.
        run_id: Uuid,
        /// Scratch root path.
        path: String,
        /// Whether anything was present to delete.
        removed: bool,
    },
    /// Releasing the scratch root failed; the run result is unaffected.
    CleanupFailed {
        /// Identifier for the run.
        run_id: Uuid,
        /// Scratch root path.
        path: String,
        /// Human-readable failure description.
        message: String,
    },
    /// A fatal error ended the run.
    RunFailed {
        /// Identifier for the run.
        run_id: Uuid,
        /// Stage that failed (`download`, `upload`).
        stage: String,
        /// Human-readable failure description.
        message: String,
    },
}

impl Event {
    /// Machine-friendly discriminator used by log and render consumers.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run_started",
            Self::StateChanged { .. } => "state_changed",
            Self::MetadataResolved { .. } => "metadata_resolved",
            Self::Progress { .. } => "progress",
            Self::DownloadCompleted { .. } => "download_completed",
            Self::UploadStarted { .. } => "upload_started",
            Self::UploadFinished { .. } => "upload_finished",
            Self::BatchCompleted { .. } => "batch_completed",
            Self::CleanupCompleted { .. } => "cleanup_completed",
            Self::CleanupFailed { .. } => "cleanup_failed",
            Self::RunFailed { .. } => "run_failed",
        }
    }

    /// Run identifier carried by every event.
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        match self {
            Self::RunStarted { run_id, .. }
            | Self::StateChanged { run_id, .. }
            | Self::MetadataResolved { run_id, .. }
            | Self::Progress { run_id, .. }
            | Self::DownloadCompleted { run_id, .. }
            | Self::UploadStarted { run_id, .. }
            | Self::UploadFinished { run_id, .. }
            | Self::BatchCompleted { run_id, .. }
            | Self::CleanupCompleted { run_id, .. }
            | Self::CleanupFailed { run_id, .. }
            | Self::RunFailed { run_id, .. } => *run_id,
        }
    }
}

/// Metadata wrapper around events. Each envelope tracks the event id and
/// emission timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventEnvelope {
    /// Sequential identifier.
    pub id: EventId,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
    /// Event payload.
    pub event: Event,
}

/// Lifecycle states a transfer session moves through.
///
/// The states are observed by polling; the session owns the transitions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Admitted, waiting to start the metadata exchange.
    QueuedForMetadata,
    /// Exchanging metadata with peers.
    RetrievingMetadata,
    /// Metadata is known; payload transfer has not started.
    MetadataAcquired,
    /// Reserving disk space for the payload.
    Allocating,
    /// Verifying pieces already present on disk.
    Checking,
    /// Transferring payload data.
    Downloading,
    /// Payload complete, not yet serving.
    Finished,
    /// Payload complete and served to the swarm.
    Seeding,
}

impl LifecycleState {
    /// Whether the download is complete for pipeline purposes.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Seeding)
    }

    /// Human-readable label used in progress lines.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::QueuedForMetadata => "queued",
            Self::RetrievingMetadata => "downloading metadata",
            Self::MetadataAcquired => "metadata acquired",
            Self::Allocating => "allocating",
            Self::Checking => "checking",
            Self::Downloading => "downloading",
            Self::Finished => "finished",
            Self::Seeding => "seeding",
        }
    }
}

impl Display for LifecycleState {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.label())
    }
}

/// Per-file upload classification carried on the bus.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    /// Stored successfully.
    Uploaded,
    /// Source file disappeared before upload.
    NotFound,
    /// Sink rejected the credentials.
    Unauthorized,
    /// Any other failure.
    Failed,
}

impl UploadStatus {
    /// Lowercase label used in status lines.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::NotFound => "not_found",
            Self::Unauthorized => "unauthorized",
            Self::Failed => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_seeding_is_terminal() {
        let all = [
            LifecycleState::QueuedForMetadata,
            LifecycleState::RetrievingMetadata,
            LifecycleState::MetadataAcquired,
            LifecycleState::Allocating,
            LifecycleState::Checking,
            LifecycleState::Downloading,
            LifecycleState::Finished,
            LifecycleState::Seeding,
        ];
        let terminal: Vec<_> = all.iter().filter(|state| state.is_terminal()).collect();
        assert_eq!(terminal, vec![&LifecycleState::Seeding]);
    }

    #[test]
    fn labels_match_progress_vocabulary() {
        assert_eq!(
            LifecycleState::RetrievingMetadata.to_string(),
            "downloading metadata"
        );
        assert_eq!(LifecycleState::QueuedForMetadata.label(), "queued");
        assert_eq!(UploadStatus::Unauthorized.as_str(), "unauthorized");
    }

    #[test]
    fn events_serialise_with_type_tag() {
        let event = Event::MetadataResolved {
            run_id: Uuid::nil(),
            name: "AlbumX".into(),
        };
        let value = serde_json::to_value(&event).expect("serialise event");
        assert_eq!(value["type"], "metadata_resolved");
        assert_eq!(event.kind(), "metadata_resolved");
        assert_eq!(event.run_id(), Uuid::nil());
    }
}
