//! Default values applied before environment and command-line overrides.
//!
//! # Design
//! - Keep defaults in one place so loader, docs, and tests agree.

/// Bucket receiving uploaded objects.
pub const DEFAULT_BUCKET: &str = "music-app-public-bucket";
/// Namespace prefix prepended to every object key.
pub const DEFAULT_NAMESPACE_PREFIX: &str = "music/";
/// Local directory transfers write into; removed at the end of every run.
pub const DEFAULT_SCRATCH_ROOT: &str = "./temp_downloads";
/// Interval between status polls in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
/// qBittorrent Web API endpoint used when none is configured.
pub const DEFAULT_ENGINE_URL: &str = "http://127.0.0.1:8080/";
