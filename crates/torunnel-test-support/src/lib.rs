#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub)]

//! Shared test helpers used across unit and integration suites.
//! Layout: fixtures.rs (payload files, status builders), mocks.rs (scripted
//! transfer session, recording object sink).

pub mod fixtures;
pub mod mocks;

pub use fixtures::{PayloadFile, album_payload, status, write_payload};
pub use mocks::{RecordedPut, RecordingSink, ScriptedSession, SinkFailure};
