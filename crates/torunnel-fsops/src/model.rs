//! Upload tasks, per-file outcomes, and the batch report.

use std::path::PathBuf;

use torunnel_events::UploadStatus;
use torunnel_storage::{SinkError, SinkErrorKind};

/// One file scheduled for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    /// Local file handed to the sink.
    pub source_path: PathBuf,
    /// Key the file is stored under.
    pub object_key: String,
}

/// Classified result for a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Stored successfully.
    Uploaded,
    /// The source disappeared before it could be read.
    NotFound,
    /// Credentials were missing or rejected.
    Unauthorized,
    /// Any other failure, including unreadable entries and files whose key could not be derived.
    OtherFailure {
        /// Human-readable failure description.
        detail: String,
    },
}

impl UploadOutcome {
    /// Classify a sink error.
    #[must_use]
    pub fn from_sink_error(error: &SinkError) -> Self {
        match error.kind() {
            SinkErrorKind::SourceNotFound => Self::NotFound,
            SinkErrorKind::Unauthorized => Self::Unauthorized,
            SinkErrorKind::Other => Self::OtherFailure {
                detail: error.detail(),
            },
        }
    }

    /// Whether the file was stored.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Uploaded)
    }

    /// Stable label used for metrics and rendering.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        self.status().as_str()
    }

    /// Event-level status for this outcome.
    #[must_use]
    pub const fn status(&self) -> UploadStatus {
        match self {
            Self::Uploaded => UploadStatus::Uploaded,
            Self::NotFound => UploadStatus::NotFound,
            Self::Unauthorized => UploadStatus::Unauthorized,
            Self::OtherFailure { .. } => UploadStatus::Failed,
        }
    }

    /// Failure detail, when there is one.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::OtherFailure { detail } => Some(detail),
            _ => None,
        }
    }
}

/// Outcome of one attempted file, in upload order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRecord {
    /// Local file.
    pub source_path: PathBuf,
    /// Key used, absent when it could not be derived.
    pub object_key: Option<String>,
    /// Classified result.
    pub outcome: UploadOutcome,
}

/// Ordered per-file outcomes for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// One record per file, in the order the files were attempted.
    pub records: Vec<UploadRecord>,
}

impl BatchReport {
    /// Number of files attempted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no files were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Files stored successfully.
    #[must_use]
    pub fn uploaded_count(&self) -> usize {
        self.records
            .iter()
            .filter(|record| record.outcome.is_success())
            .count()
    }

    /// Files that ended in any failure class.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.len() - self.uploaded_count()
    }

    /// Records that did not upload.
    pub fn failures(&self) -> impl Iterator<Item = &UploadRecord> {
        self.records
            .iter()
            .filter(|record| !record.outcome.is_success())
    }

    /// True when every attempted file was stored.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }
}
