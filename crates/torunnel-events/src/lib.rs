#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub)]

//! Event bus shared by the pipeline stages and the CLI renderer.
//!
//! The bus provides a typed event enum, sequential identifiers, and replay of
//! recent events for subscribers that attach late. Internally it uses
//! `tokio::broadcast` with a bounded buffer; when the channel overflows, the
//! oldest events are dropped.

pub mod payloads;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::broadcast::{self, Receiver, Sender};

pub use payloads::{
    DEFAULT_REPLAY_CAPACITY, Event, EventEnvelope, EventId, LifecycleState, UploadStatus,
};

/// Shared event bus built on top of `tokio::broadcast`.
#[derive(Clone)]
pub struct EventBus {
    sender: Sender<EventEnvelope>,
    buffer: Arc<Mutex<VecDeque<EventEnvelope>>>,
    next_id: Arc<AtomicU64>,
    replay_capacity: usize,
}

impl EventBus {
    /// Construct a new bus with the provided broadcast capacity.
    ///
    /// The broadcast channel uses the same capacity as the in-memory replay
    /// buffer, so dropped events impact both structures consistently. A zero
    /// capacity is raised to one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            buffer: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            next_id: Arc::new(AtomicU64::new(1)),
            replay_capacity: capacity,
        }
    }

    /// Construct a bus with the default in-memory buffer size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REPLAY_CAPACITY)
    }

    /// Publish a new event, assigning it a sequential identifier.
    ///
    /// Publishing never fails; events sent while nobody is subscribed are only
    /// kept in the replay ring.
    pub fn publish(&self, event: Event) -> EventId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let envelope = EventEnvelope {
            id,
            timestamp: Utc::now(),
            event,
        };

        {
            let mut buffer = self.lock_buffer();
            if buffer.len() == self.replay_capacity {
                buffer.pop_front();
            }
            buffer.push_back(envelope.clone());
        }

        let _ = self.sender.send(envelope);
        id
    }

    /// Subscribe to the bus, replaying the buffered events before live ones.
    ///
    /// Subscribers that attach after a run has started still see its earlier
    /// events, as long as they have not been evicted from the ring.
    #[must_use]
    pub fn subscribe(&self) -> EventStream {
        let buffer = self.lock_buffer();
        let receiver = self.sender.subscribe();
        let backlog: VecDeque<_> = buffer.iter().cloned().collect();
        let replayed_through = backlog.back().map_or(0, |event| event.id);
        EventStream {
            backlog,
            receiver,
            replayed_through,
        }
    }

    /// Snapshot of the replay ring, oldest first.
    #[must_use]
    pub fn backlog(&self) -> Vec<EventEnvelope> {
        self.lock_buffer().iter().cloned().collect()
    }

    fn lock_buffer(&self) -> MutexGuard<'_, VecDeque<EventEnvelope>> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Stream wrapper that yields events either from the replay backlog or from the
/// live broadcast channel.
pub struct EventStream {
    backlog: VecDeque<EventEnvelope>,
    receiver: Receiver<EventEnvelope>,
    replayed_through: EventId,
}

impl EventStream {
    /// Receive the next event, respecting the replay backlog first.
    ///
    /// Returns `None` once every bus handle has been dropped.
    pub async fn next(&mut self) -> Option<EventEnvelope> {
        if let Some(event) = self.backlog.pop_front() {
            return Some(event);
        }

        loop {
            match self.receiver.recv().await {
                Ok(event) if event.id > self.replayed_through => return Some(event),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
