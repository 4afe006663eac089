#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub)]

//! Run wiring: download orchestration, upload, and scratch cleanup.
//!
//! Layout: `orchestrator.rs` (poll-driven download), `runner.rs` (one full
//! run), `bootstrap.rs` (production collaborators), `error.rs`.

/// Production wiring for the engine session and the object sink.
pub mod bootstrap;
pub mod error;
/// Poll-driven download orchestration.
pub mod orchestrator;
/// One complete run from descriptor to cleanup.
pub mod runner;

pub use bootstrap::build_runner;
pub use error::{AppError, AppResult};
pub use orchestrator::{DownloadOrchestrator, WaitPolicy};
pub use runner::{CleanupStatus, PipelineRunner, RunReport, RunRequest};
