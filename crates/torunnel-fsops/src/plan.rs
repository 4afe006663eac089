//! Enumeration of the files a completed download produced.

use std::path::{Path, PathBuf};

use torunnel_torrent_core::DownloadResult;
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

use crate::error::{FsOpsError, FsOpsResult};
use crate::key::map_key;
use crate::model::UploadTask;

/// An entry the walk turned up under the download result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FoundEntry {
    /// Regular file.
    File(PathBuf),
    /// Entry the walk could not read; nothing below it is reachable.
    Unreadable {
        /// Entry that failed, or the walk root when the error carries no path.
        path: PathBuf,
        /// Why the walk failed there.
        detail: String,
    },
}

/// A file found under the download result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedFile {
    /// Key derived; ready for the sink.
    Task(UploadTask),
    /// The file exists but no key could be derived for it.
    Unmappable {
        /// Local file.
        source_path: PathBuf,
        /// Why mapping failed.
        detail: String,
    },
    /// Part of the tree could not be read.
    Unreadable {
        /// Entry that failed.
        path: PathBuf,
        /// Why the walk failed there.
        detail: String,
    },
}

/// Regular files under `local_root` and the directory keys are computed against.
///
/// A single file yields itself; a directory yields every regular file below
/// it, recursively, sorted by file name at each level. Symlinks are not
/// followed. The anchor is the parent of `local_root`. Entries the walk cannot
/// read are listed as [`FoundEntry::Unreadable`] and the walk moves on.
///
/// # Errors
///
/// Returns an error when `local_root` itself is missing.
pub fn enumerate_files(local_root: &Path) -> FsOpsResult<(PathBuf, Vec<FoundEntry>)> {
    let metadata = std::fs::metadata(local_root)
        .map_err(|err| FsOpsError::io("stat_local_root", local_root, err))?;
    let anchor = local_root
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

    if metadata.is_file() {
        return Ok((anchor, vec![FoundEntry::File(local_root.to_path_buf())]));
    }
    let entries = collect_entries(local_root, WalkDir::new(local_root).sort_by_file_name());
    Ok((anchor, entries))
}

fn collect_entries(
    root: &Path,
    walk: impl IntoIterator<Item = walkdir::Result<DirEntry>>,
) -> Vec<FoundEntry> {
    let mut found = Vec::new();
    for entry in walk {
        match entry {
            Ok(entry) if entry.file_type().is_file() => found.push(FoundEntry::File(entry.into_path())),
            Ok(_) => {}
            Err(err) => {
                let path = err.path().unwrap_or(root).to_path_buf();
                let detail = FsOpsError::walkdir("walk_local_root", &path, err).detail();
                warn!(path = %path.display(), detail = %detail, "skipping unreadable entry");
                found.push(FoundEntry::Unreadable { path, detail });
            }
        }
    }
    found
}

/// Enumerate the download result and derive a key for every file, in upload order.
///
/// # Errors
///
/// Returns an error only when `local_root` is missing; per-file mapping and
/// walk failures are reported as [`PlannedFile::Unmappable`] and
/// [`PlannedFile::Unreadable`].
pub fn plan_uploads(
    download: &DownloadResult,
    logical_segment: &str,
    namespace_prefix: &str,
) -> FsOpsResult<Vec<PlannedFile>> {
    let (anchor, entries) = enumerate_files(&download.local_root)?;
    Ok(entries
        .into_iter()
        .map(|entry| {
            let source_path = match entry {
                FoundEntry::File(source_path) => source_path,
                FoundEntry::Unreadable { path, detail } => {
                    return PlannedFile::Unreadable { path, detail };
                }
            };
            match map_key(
                &source_path,
                &anchor,
                &download.resolved_name,
                logical_segment,
                namespace_prefix,
            ) {
                Ok(object_key) => PlannedFile::Task(UploadTask {
                    source_path,
                    object_key,
                }),
                Err(err) => PlannedFile::Unmappable {
                    source_path,
                    detail: err.detail(),
                },
            }
        })
        .collect())
}
