//! Drives a transfer session from `begin` to its terminal state.
//!
//! The orchestrator polls at a fixed interval, first until the content name is
//! known and then until the session reports `Seeding`. Every poll and every wait
//! between polls can be interrupted by the cancellation token or the deadline.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use torunnel_events::{Event, EventBus, LifecycleState};
use torunnel_telemetry::Metrics;
use torunnel_torrent_core::{
    DownloadResult, SessionDisposition, SessionHandle, TransferDescriptor, TransferError,
    TransferResult, TransferSession, TransferStatus, WaitPhase,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How long to wait between polls and overall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Fixed delay between two polls.
    pub poll_interval: Duration,
    /// Upper bound for the whole download; unbounded when absent.
    pub deadline: Option<Duration>,
}

impl WaitPolicy {
    /// Unbounded policy polling every `poll_interval`.
    #[must_use]
    pub const fn every(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            deadline: None,
        }
    }
}

struct Clock {
    started: Instant,
    deadline: Option<Duration>,
}

impl Clock {
    fn start(deadline: Option<Duration>) -> Self {
        Self {
            started: Instant::now(),
            deadline,
        }
    }

    fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|limit| limit.saturating_sub(self.started.elapsed()))
    }
}

async fn sleep_or_forever(remaining: Option<Duration>) {
    match remaining {
        Some(remaining) => tokio::time::sleep(remaining).await,
        None => std::future::pending().await,
    }
}

async fn wait(
    policy: WaitPolicy,
    phase: WaitPhase,
    clock: &Clock,
    cancel: &CancellationToken,
) -> TransferResult<()> {
    interruptible(
        async {
            tokio::time::sleep(policy.poll_interval).await;
            Ok(())
        },
        phase,
        clock,
        cancel,
    )
    .await
}

async fn interruptible<T>(
    operation: impl Future<Output = TransferResult<T>>,
    phase: WaitPhase,
    clock: &Clock,
    cancel: &CancellationToken,
) -> TransferResult<T> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(TransferError::Cancelled { phase }),
        () = sleep_or_forever(clock.remaining()) => Err(TransferError::TimedOut {
            phase,
            waited: clock.started.elapsed(),
        }),
        result = operation => result,
    }
}

/// Poll-driven download of one descriptor.
#[derive(Clone)]
pub struct DownloadOrchestrator {
    session: Arc<dyn TransferSession>,
    events: EventBus,
    metrics: Metrics,
    disposition: SessionDisposition,
}

impl DownloadOrchestrator {
    /// Orchestrator that stops the engine-side transfer once done.
    #[must_use]
    pub fn new(session: Arc<dyn TransferSession>, events: EventBus, metrics: Metrics) -> Self {
        Self {
            session,
            events,
            metrics,
            disposition: SessionDisposition::Stop,
        }
    }

    /// Choose what happens to the engine-side transfer after a successful download.
    ///
    /// Failed or interrupted downloads are always stopped.
    #[must_use]
    pub const fn with_disposition(mut self, disposition: SessionDisposition) -> Self {
        self.disposition = disposition;
        self
    }

    /// Download `descriptor` into its destination root.
    ///
    /// A session kept seeding is left running on the engine; use
    /// [`DownloadOrchestrator::download`] to get its handle back.
    ///
    /// # Errors
    ///
    /// Returns the first session failure, [`TransferError::Cancelled`] when
    /// `cancel` fires, or [`TransferError::TimedOut`] once the deadline passes.
    pub async fn run(
        &self,
        run_id: Uuid,
        descriptor: &TransferDescriptor,
        policy: WaitPolicy,
        cancel: &CancellationToken,
    ) -> TransferResult<DownloadResult> {
        self.download(run_id, descriptor, policy, cancel)
            .await
            .map(|(download, _)| download)
    }

    /// Like [`DownloadOrchestrator::run`], also returning the handle of a
    /// session that was kept seeding.
    ///
    /// The handle is `Some` only for a successful download under
    /// [`SessionDisposition::KeepSeeding`]; the caller must pass it to
    /// [`DownloadOrchestrator::stop_session`] before the downloaded data goes away.
    ///
    /// # Errors
    ///
    /// Same as [`DownloadOrchestrator::run`].
    pub async fn download(
        &self,
        run_id: Uuid,
        descriptor: &TransferDescriptor,
        policy: WaitPolicy,
        cancel: &CancellationToken,
    ) -> TransferResult<(DownloadResult, Option<SessionHandle>)> {
        let clock = Clock::start(policy.deadline);
        let destination = descriptor.destination_root();
        tokio::fs::create_dir_all(destination)
            .await
            .map_err(|err| TransferError::io("create_destination_root", destination, err))?;

        let begin = self.session.begin(descriptor);
        let handle = interruptible(begin, WaitPhase::Metadata, &clock, cancel).await?;
        info!(
            run_id = %run_id,
            info_hash = descriptor.info_hash(),
            display_name = descriptor.display_name().unwrap_or_default(),
            reference = %handle.reference,
            destination = %destination.display(),
            "transfer session started"
        );

        let result = self
            .drive(run_id, descriptor, &handle, policy, &clock, cancel)
            .await;
        let (download, seeding) = match (result, self.disposition) {
            (Ok(download), SessionDisposition::KeepSeeding) => {
                info!(run_id = %run_id, reference = %handle.reference, "transfer left seeding");
                (download, Some(handle))
            }
            (Ok(download), SessionDisposition::Stop) => {
                self.stop_session(run_id, &handle).await;
                (download, None)
            }
            (Err(err), _) => {
                self.stop_session(run_id, &handle).await;
                return Err(err);
            }
        };

        let elapsed = clock.started.elapsed();
        self.metrics.observe_download_duration(elapsed);
        info!(
            run_id = %run_id,
            name = %download.resolved_name,
            local_root = %download.local_root.display(),
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "download completed"
        );
        Ok((download, seeding))
    }

    /// Remove the engine-side transfer. Failures are logged, never returned.
    pub async fn stop_session(&self, run_id: Uuid, handle: &SessionHandle) {
        match self.session.stop(handle).await {
            Ok(()) => debug!(run_id = %run_id, reference = %handle.reference, "transfer stopped"),
            Err(TransferError::Unsupported { .. }) => {
                debug!(run_id = %run_id, "transfer session cannot be stopped");
            }
            Err(err) => warn!(
                run_id = %run_id,
                reference = %handle.reference,
                error = %err,
                "failed to stop transfer"
            ),
        }
    }

    async fn drive(
        &self,
        run_id: Uuid,
        descriptor: &TransferDescriptor,
        handle: &SessionHandle,
        policy: WaitPolicy,
        clock: &Clock,
        cancel: &CancellationToken,
    ) -> TransferResult<DownloadResult> {
        let mut last_state = None;

        let mut status = self
            .poll(run_id, handle, &mut last_state, WaitPhase::Metadata, clock, cancel)
            .await?;
        let name = loop {
            if let Some(name) = status.resolved_name.clone() {
                break name;
            }
            wait(policy, WaitPhase::Metadata, clock, cancel).await?;
            status = self
                .poll(run_id, handle, &mut last_state, WaitPhase::Metadata, clock, cancel)
                .await?;
        };
        info!(run_id = %run_id, name = %name, "transfer metadata resolved");
        self.emit(Event::MetadataResolved {
            run_id,
            name: name.clone(),
        });

        while !status.state.is_terminal() {
            wait(policy, WaitPhase::Completion, clock, cancel).await?;
            status = self
                .poll(run_id, handle, &mut last_state, WaitPhase::Completion, clock, cancel)
                .await?;
        }

        let download =
            DownloadResult::under(descriptor.destination_root(), status.resolved_name.unwrap_or(name));
        self.emit(Event::DownloadCompleted {
            run_id,
            name: download.resolved_name.clone(),
            local_root: download.local_root.display().to_string(),
        });
        Ok(download)
    }

    async fn poll(
        &self,
        run_id: Uuid,
        handle: &SessionHandle,
        last_state: &mut Option<LifecycleState>,
        phase: WaitPhase,
        clock: &Clock,
        cancel: &CancellationToken,
    ) -> TransferResult<TransferStatus> {
        let status = interruptible(self.session.poll(handle), phase, clock, cancel).await?;
        self.metrics.inc_transfer_poll();
        debug!(
            run_id = %run_id,
            state = status.state.label(),
            percent = status.percent_complete(),
            peers = status.peers,
            "transfer polled"
        );

        if *last_state != Some(status.state) {
            *last_state = Some(status.state);
            self.metrics.inc_state_change(status.state.label());
            info!(run_id = %run_id, state = status.state.label(), "transfer state changed");
            self.emit(Event::StateChanged {
                run_id,
                state: status.state,
            });
        }
        self.emit(Event::Progress {
            run_id,
            percent: status.percent_complete(),
            download_bps: status.download_bps,
            upload_bps: status.upload_bps,
            peers: status.peers,
            state: status.state,
        });
        Ok(status)
    }

    fn emit(&self, event: Event) {
        self.metrics.inc_event(event.kind());
        let _ = self.events.publish(event);
    }
}
