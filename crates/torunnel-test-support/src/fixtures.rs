//! Payload fixtures and status builders.

use std::io;
use std::path::{Path, PathBuf};

use torunnel_torrent_core::{LifecycleState, TransferStatus};

/// File a fake transfer writes under its destination root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadFile {
    /// Path relative to the destination root.
    pub relative: PathBuf,
    /// File contents.
    pub contents: Vec<u8>,
}

impl PayloadFile {
    /// Build a payload entry.
    pub fn new(relative: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            relative: relative.into(),
            contents: contents.into(),
        }
    }
}

/// `<name>/track01.flac` .. `<name>/trackNN.flac`, each a few bytes long.
#[must_use]
pub fn album_payload(name: &str, tracks: usize) -> Vec<PayloadFile> {
    (1..=tracks)
        .map(|index| {
            PayloadFile::new(
                Path::new(name).join(format!("track{index:02}.flac")),
                format!("audio-{index}").into_bytes(),
            )
        })
        .collect()
}

/// Write `files` under `root`, creating parent directories.
///
/// # Errors
///
/// Returns the first IO failure.
pub fn write_payload(root: &Path, files: &[PayloadFile]) -> io::Result<()> {
    for file in files {
        let path = root.join(&file.relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, &file.contents)?;
    }
    Ok(())
}

/// Status snapshot with zeroed rates.
#[must_use]
pub fn status(state: LifecycleState, fraction: f64, name: Option<&str>) -> TransferStatus {
    TransferStatus {
        progress_fraction: fraction,
        download_bps: 0,
        upload_bps: 0,
        peers: 0,
        state,
        resolved_name: name.map(str::to_string),
    }
}
