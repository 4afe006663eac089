#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub)]

//! Engine-agnostic transfer interfaces and DTOs.
//!
//! Layout: `model/` (descriptor, status, results), `service/` (session trait),
//! `error.rs` (transfer error taxonomy).

pub mod error;
pub mod model;
pub mod service;

pub use error::{TransferError, TransferResult, WaitPhase};
pub use model::{
    DownloadResult, SessionDisposition, SessionHandle, TransferDescriptor, TransferStatus,
};
pub use service::TransferSession;
pub use torunnel_events::LifecycleState;
