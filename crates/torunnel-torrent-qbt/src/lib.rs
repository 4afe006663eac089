#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub)]

//! qBittorrent Web API adapter implementing [`TransferSession`].
//!
//! Layout: `session.rs` (HTTP session and endpoints), `convert.rs` (engine
//! state and torrent info mapping), `error.rs` (adapter failures).
//!
//! [`TransferSession`]: torunnel_torrent_core::TransferSession

mod convert;
pub mod error;
pub mod session;

pub use error::QbtError;
pub use session::{QbtOptions, QbtSession};
