#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub)]

//! Run configuration: defaults, environment loading, overrides, validation.
//!
//! Layout: `defaults.rs` (built-in values), `model.rs` (typed settings),
//! `loader.rs` (`TORUNNEL_*` variables and override layering), `validate.rs`
//! (validation/parsing helpers).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use model::{
    ConfigOverrides, EngineSettings, PipelineConfig, SinkSettings, normalize_prefix,
};
