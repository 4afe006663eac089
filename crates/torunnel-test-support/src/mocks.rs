//! In-memory stand-ins for the transfer engine and the object store.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use torunnel_storage::{ObjectSink, SinkError, SinkResult};
use torunnel_torrent_core::{
    LifecycleState, SessionHandle, TransferDescriptor, TransferError, TransferResult,
    TransferSession, TransferStatus,
};
use uuid::Uuid;

use crate::fixtures::{PayloadFile, status, write_payload};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

enum Step {
    Status(TransferStatus),
    Fail(String),
}

/// Transfer session that replays a fixed sequence of poll results.
///
/// Once the script is exhausted the last status repeats. The payload, if any,
/// is written into the destination root when `begin` is called.
#[derive(Default)]
pub struct ScriptedSession {
    script: Mutex<VecDeque<Step>>,
    last: Mutex<Option<TransferStatus>>,
    payload: Vec<PayloadFile>,
    begin_failure: Option<String>,
    stop_failure: bool,
    begun: Mutex<Vec<TransferDescriptor>>,
    stopped: Mutex<Vec<SessionHandle>>,
    polls: AtomicUsize,
}

impl ScriptedSession {
    /// Empty script; polls report `QueuedForMetadata` forever.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Typical successful run: queued, metadata exchange, downloading, finished, seeding.
    #[must_use]
    pub fn completing(name: &str) -> Self {
        Self::new()
            .then_status(status(LifecycleState::QueuedForMetadata, 0.0, None))
            .then_status(status(LifecycleState::RetrievingMetadata, 0.0, None))
            .then_status(status(LifecycleState::Downloading, 0.25, Some(name)))
            .then_status(status(LifecycleState::Downloading, 0.75, Some(name)))
            .then_status(status(LifecycleState::Finished, 1.0, Some(name)))
            .then_status(status(LifecycleState::Seeding, 1.0, Some(name)))
    }

    /// Append a status to the script.
    #[must_use]
    pub fn then_status(self, status: TransferStatus) -> Self {
        lock(&self.script).push_back(Step::Status(status));
        self
    }

    /// Append a poll failure to the script.
    #[must_use]
    pub fn then_fail(self, message: impl Into<String>) -> Self {
        lock(&self.script).push_back(Step::Fail(message.into()));
        self
    }

    /// Files written into the destination root on `begin`.
    #[must_use]
    pub fn with_payload(mut self, payload: Vec<PayloadFile>) -> Self {
        self.payload = payload;
        self
    }

    /// Make `begin` fail with the given message.
    #[must_use]
    pub fn fail_begin(mut self, message: impl Into<String>) -> Self {
        self.begin_failure = Some(message.into());
        self
    }

    /// Make `stop` fail.
    #[must_use]
    pub const fn fail_stop(mut self) -> Self {
        self.stop_failure = true;
        self
    }

    /// Descriptors passed to `begin`.
    #[must_use]
    pub fn begun(&self) -> Vec<TransferDescriptor> {
        lock(&self.begun).clone()
    }

    /// Handles passed to `stop`.
    #[must_use]
    pub fn stopped(&self) -> Vec<SessionHandle> {
        lock(&self.stopped).clone()
    }

    /// Number of polls served.
    #[must_use]
    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransferSession for ScriptedSession {
    async fn begin(&self, descriptor: &TransferDescriptor) -> TransferResult<SessionHandle> {
        lock(&self.begun).push(descriptor.clone());
        if let Some(message) = &self.begin_failure {
            return Err(TransferError::Failed {
                message: message.clone(),
            });
        }
        write_payload(descriptor.destination_root(), &self.payload).map_err(|err| {
            TransferError::io("write_payload", descriptor.destination_root(), err)
        })?;
        Ok(SessionHandle {
            id: Uuid::new_v4(),
            reference: descriptor.info_hash().to_string(),
        })
    }

    async fn poll(&self, _handle: &SessionHandle) -> TransferResult<TransferStatus> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let next = lock(&self.script).pop_front();
        match next {
            Some(Step::Status(status)) => {
                *lock(&self.last) = Some(status.clone());
                Ok(status)
            }
            Some(Step::Fail(message)) => Err(TransferError::Failed { message }),
            None => Ok(lock(&self.last).clone().unwrap_or_default()),
        }
    }

    async fn stop(&self, handle: &SessionHandle) -> TransferResult<()> {
        lock(&self.stopped).push(handle.clone());
        if self.stop_failure {
            return Err(TransferError::Failed {
                message: "stop rejected".into(),
            });
        }
        Ok(())
    }
}

/// Failure injected into a [`RecordingSink`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkFailure {
    /// Report the source as missing.
    NotFound,
    /// Report rejected credentials.
    Unauthorized,
    /// Report any other failure with the given detail.
    Other(String),
}

impl SinkFailure {
    fn into_error(self, source: &Path, bucket: &str, key: &str) -> SinkError {
        match self {
            Self::NotFound => SinkError::SourceNotFound {
                path: source.to_path_buf(),
            },
            Self::Unauthorized => SinkError::Unauthorized {
                bucket: bucket.to_string(),
                key: key.to_string(),
                status: Some(403),
                code: Some("AccessDenied".into()),
                detail: "Access Denied".into(),
            },
            Self::Other(detail) => SinkError::Rejected {
                bucket: bucket.to_string(),
                key: key.to_string(),
                status: Some(500),
                code: None,
                detail,
            },
        }
    }
}

/// One call observed by a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPut {
    /// Source path passed in.
    pub source: PathBuf,
    /// Bucket passed in.
    pub bucket: String,
    /// Key passed in.
    pub key: String,
}

/// Object sink that records every call and fails on demand.
///
/// Sources that do not exist are reported as [`SinkError::SourceNotFound`],
/// like a real sink would.
#[derive(Debug, Default)]
pub struct RecordingSink {
    by_index: HashMap<usize, SinkFailure>,
    by_key: HashMap<String, SinkFailure>,
    calls: Mutex<Vec<RecordedPut>>,
    stored: Mutex<Vec<String>>,
}

impl RecordingSink {
    /// Sink that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the call with the given zero-based position.
    #[must_use]
    pub fn fail_at(mut self, index: usize, failure: SinkFailure) -> Self {
        self.by_index.insert(index, failure);
        self
    }

    /// Fail every call for `key`.
    #[must_use]
    pub fn fail_key(mut self, key: impl Into<String>, failure: SinkFailure) -> Self {
        self.by_key.insert(key.into(), failure);
        self
    }

    /// Calls observed so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedPut> {
        lock(&self.calls).clone()
    }

    /// Keys of the calls that succeeded, in the order they were stored.
    #[must_use]
    pub fn stored_keys(&self) -> Vec<String> {
        lock(&self.stored).clone()
    }
}

#[async_trait]
impl ObjectSink for RecordingSink {
    async fn put_object(&self, source: &Path, bucket: &str, key: &str) -> SinkResult<()> {
        let index = {
            let mut calls = lock(&self.calls);
            calls.push(RecordedPut {
                source: source.to_path_buf(),
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
            calls.len() - 1
        };

        if let Some(failure) = self
            .by_index
            .get(&index)
            .or_else(|| self.by_key.get(key))
        {
            return Err(failure.clone().into_error(source, bucket, key));
        }
        tokio::fs::metadata(source)
            .await
            .map_err(|err| SinkError::from_io("stat_source", source, err))?;
        lock(&self.stored).push(key.to_string());
        Ok(())
    }
}
