#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub)]
#![allow(clippy::module_name_repetitions)]

//! Local side of a run: object key mapping, sequential upload of the
//! download result, and scratch cleanup.
//!
//! Layout: `key.rs` (path to key mapping), `plan.rs` (file enumeration),
//! `pipeline.rs` (`UploadPipeline`), `cleanup.rs` (`ScratchRoot` guard),
//! `model.rs` (tasks, outcomes, batch report).

pub mod cleanup;
pub mod error;
pub mod key;
pub mod model;
pub mod pipeline;
pub mod plan;

pub use cleanup::{CleanupOutcome, ScratchRoot, cleanup};
pub use error::{FsOpsError, FsOpsResult};
pub use key::{map_key, validate_logical_segment};
pub use model::{BatchReport, UploadOutcome, UploadRecord, UploadTask};
pub use pipeline::{UploadPipeline, UploadRequest};
pub use plan::{FoundEntry, PlannedFile, enumerate_files, plan_uploads};
