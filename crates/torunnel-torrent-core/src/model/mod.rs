//! Transfer domain types shared across the workspace.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use torunnel_events::LifecycleState;
use url::Url;
use uuid::Uuid;

use crate::error::{TransferError, TransferResult};

const MAGNET_SCHEME: &str = "magnet";
const BTIH_PREFIX: &str = "urn:btih:";
const HEX_INFO_HASH_LEN: usize = 40;
const BASE32_INFO_HASH_LEN: usize = 32;

/// Content descriptor paired with the local directory the transfer writes into.
///
/// Immutable once built; only magnet URIs carrying a BitTorrent info hash are
/// accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferDescriptor {
    uri: String,
    info_hash: String,
    display_name: Option<String>,
    destination_root: PathBuf,
}

impl TransferDescriptor {
    /// Validate a magnet URI and bind it to a destination root.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::InvalidDescriptor`] when the URI is not a magnet
    /// link or lacks a well-formed `xt=urn:btih:` exact topic.
    pub fn magnet(uri: &str, destination_root: impl Into<PathBuf>) -> TransferResult<Self> {
        let trimmed = uri.trim();
        let invalid = |reason: &'static str| TransferError::InvalidDescriptor {
            reason,
            value: trimmed.to_string(),
        };

        let url = Url::parse(trimmed).map_err(|_| invalid("unparseable"))?;
        if url.scheme() != MAGNET_SCHEME {
            return Err(invalid("not_magnet"));
        }

        let mut info_hash = None;
        let mut display_name = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "xt" => {
                    let Some(hash) = strip_prefix_ignore_case(&value, BTIH_PREFIX) else {
                        continue;
                    };
                    if !is_valid_info_hash(hash) {
                        return Err(invalid("invalid_info_hash"));
                    }
                    info_hash = Some(hash.to_ascii_lowercase());
                }
                "dn" if !value.trim().is_empty() => display_name = Some(value.into_owned()),
                _ => {}
            }
        }

        let info_hash = info_hash.ok_or_else(|| invalid("missing_info_hash"))?;
        Ok(Self {
            uri: trimmed.to_string(),
            info_hash,
            display_name,
            destination_root: destination_root.into(),
        })
    }

    /// Original magnet URI.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Info hash as given in the URI (hex or base32), lowercased.
    #[must_use]
    pub fn info_hash(&self) -> &str {
        &self.info_hash
    }

    /// Optional `dn` display name hint carried by the URI.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Directory the transfer writes into.
    #[must_use]
    pub fn destination_root(&self) -> &Path {
        &self.destination_root
    }
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &value[prefix.len()..])
}

fn is_valid_info_hash(hash: &str) -> bool {
    match hash.len() {
        HEX_INFO_HASH_LEN => hash.chars().all(|ch| ch.is_ascii_hexdigit()),
        BASE32_INFO_HASH_LEN => hash
            .chars()
            .all(|ch| ch.is_ascii_alphabetic() || ('2'..='7').contains(&ch)),
        _ => false,
    }
}

/// Opaque reference to a transfer started by a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHandle {
    /// Identifier assigned when the transfer began.
    pub id: Uuid,
    /// Engine-specific lookup key (tag, hash, slot).
    pub reference: String,
}

/// Snapshot returned by a single poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferStatus {
    /// Completion fraction in `[0, 1]`.
    pub progress_fraction: f64,
    /// Current download rate in bytes per second.
    pub download_bps: u64,
    /// Current upload rate in bytes per second.
    pub upload_bps: u64,
    /// Connected peers.
    pub peers: u32,
    /// Observed lifecycle state.
    pub state: LifecycleState,
    /// Content name, absent until metadata is known.
    pub resolved_name: Option<String>,
}

impl TransferStatus {
    /// Completion percentage clamped to `[0, 100]`.
    #[must_use]
    pub fn percent_complete(&self) -> f64 {
        if self.progress_fraction.is_nan() {
            return 0.0;
        }
        self.progress_fraction.clamp(0.0, 1.0) * 100.0
    }
}

impl Default for TransferStatus {
    fn default() -> Self {
        Self {
            progress_fraction: 0.0,
            download_bps: 0,
            upload_bps: 0,
            peers: 0,
            state: LifecycleState::QueuedForMetadata,
            resolved_name: None,
        }
    }
}

/// Local artifact produced once a transfer reaches its terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadResult {
    /// Name of the top-level entry written by the transfer.
    pub resolved_name: String,
    /// Path of that entry: a single file or a directory tree.
    pub local_root: PathBuf,
}

impl DownloadResult {
    /// Locate the top-level entry for `resolved_name` under `destination_root`.
    #[must_use]
    pub fn under(destination_root: &Path, resolved_name: impl Into<String>) -> Self {
        let resolved_name = resolved_name.into();
        let local_root = destination_root.join(&resolved_name);
        Self {
            resolved_name,
            local_root,
        }
    }
}

/// What happens to the engine-side transfer once the download completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionDisposition {
    /// Remove the transfer from the engine, keeping the data on disk.
    #[default]
    Stop,
    /// Leave the engine seeding until the local data is about to be removed.
    KeepSeeding,
}
