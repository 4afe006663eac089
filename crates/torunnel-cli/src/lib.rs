#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub)]
#![allow(clippy::redundant_pub_crate)]

//! Command-line front end: fetch a magnet link and publish its files to S3.
//!
//! Layout:
//! - `cli.rs`: argument parsing, prompting, and the run itself
//! - `error.rs`: CLI error type and exit codes
//! - `output.rs`: progress and status line rendering
//! - `main.rs`: thin entrypoint delegating to `run()`

pub(crate) mod cli;
pub(crate) mod error;
pub(crate) mod output;

pub use cli::run;
