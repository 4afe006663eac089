//! Scratch root lifecycle.
//!
//! A run acquires its scratch root before the transfer begins and releases it
//! on every exit path. Explicit release reports the outcome; dropping an
//! unreleased guard (panic, cancelled future) still deletes the directory and
//! logs any failure.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{FsOpsError, FsOpsResult};

/// What a cleanup call found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// The path existed and was deleted.
    Removed,
    /// Nothing was there.
    AlreadyAbsent,
}

impl CleanupOutcome {
    /// Stable label used for metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Removed => "removed",
            Self::AlreadyAbsent => "absent",
        }
    }
}

/// Recursively delete `path`. An absent path is not an error.
///
/// # Errors
///
/// Returns [`FsOpsError::Io`] when the path exists but cannot be removed.
pub fn cleanup(path: &Path) -> FsOpsResult<CleanupOutcome> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Ok(CleanupOutcome::AlreadyAbsent);
        }
        Err(err) => return Err(FsOpsError::io("stat_scratch_root", path, err)),
    };

    let removed = if metadata.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    match removed {
        Ok(()) => Ok(CleanupOutcome::Removed),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(CleanupOutcome::AlreadyAbsent),
        Err(err) => Err(FsOpsError::io("remove_scratch_root", path, err)),
    }
}

/// Scratch directory exclusively owned by one run.
#[derive(Debug)]
pub struct ScratchRoot {
    path: PathBuf,
    released: bool,
}

impl ScratchRoot {
    /// Create the directory (and parents) and take ownership of it.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::Io`] when the directory cannot be created.
    pub fn acquire(path: impl Into<PathBuf>) -> FsOpsResult<Self> {
        let path = path.into();
        std::fs::create_dir_all(&path)
            .map_err(|err| FsOpsError::io("create_scratch_root", &path, err))?;
        debug!(path = %path.display(), "scratch root acquired");
        Ok(Self {
            path,
            released: false,
        })
    }

    /// Directory owned by the run.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the directory now and report the result.
    ///
    /// # Errors
    ///
    /// Returns the cleanup failure; the guard is consumed either way and will
    /// not retry on drop.
    pub fn release(mut self) -> FsOpsResult<CleanupOutcome> {
        self.released = true;
        cleanup(&self.path)
    }
}

impl Drop for ScratchRoot {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match cleanup(&self.path) {
            Ok(outcome) => debug!(
                path = %self.path.display(),
                outcome = outcome.as_str(),
                "scratch root released on drop"
            ),
            Err(err) => warn!(
                path = %self.path.display(),
                error = %err.detail(),
                "scratch root cleanup failed on drop"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn cleanup_twice_is_a_noop_the_second_time() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let root = temp.path().join("scratch");
        fs::create_dir_all(root.join("AlbumX"))?;
        fs::write(root.join("AlbumX").join("a.flac"), b"a")?;

        assert_eq!(cleanup(&root)?, CleanupOutcome::Removed);
        assert!(!root.exists());
        assert_eq!(cleanup(&root)?, CleanupOutcome::AlreadyAbsent);
        Ok(())
    }

    #[test]
    fn cleanup_removes_a_plain_file() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let file = temp.path().join("stray");
        fs::write(&file, b"x")?;
        assert_eq!(cleanup(&file)?, CleanupOutcome::Removed);
        assert!(!file.exists());
        Ok(())
    }

    #[test]
    fn release_deletes_once_and_drop_does_not_retry() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let root = temp.path().join("run");
        let guard = ScratchRoot::acquire(&root)?;
        assert!(guard.path().is_dir());
        fs::write(guard.path().join("a"), b"a")?;

        assert_eq!(guard.release()?, CleanupOutcome::Removed);
        assert!(!root.exists());
        Ok(())
    }

    #[test]
    fn dropping_unreleased_guard_still_cleans_up() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let root = temp.path().join("run");
        {
            let guard = ScratchRoot::acquire(&root)?;
            fs::write(guard.path().join("partial.part"), b"p")?;
        }
        assert!(!root.exists());
        Ok(())
    }

    #[test]
    fn release_after_external_removal_reports_absent() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let root = temp.path().join("run");
        let guard = ScratchRoot::acquire(&root)?;
        fs::remove_dir_all(&root)?;
        assert_eq!(guard.release()?, CleanupOutcome::AlreadyAbsent);
        Ok(())
    }
}
