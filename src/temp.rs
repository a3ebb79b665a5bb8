//! Temporary file management module
//!
//! Store files are replaced by writing a sibling temporary file and renaming
//! it over the target. The guard removes the temporary file if anything fails
//! before the rename.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Guard for a temporary file that is deleted on drop unless persisted
#[derive(Debug)]
pub(crate) struct TempGuard {
    /// `None` once the file was renamed into place and is no longer ours
    path: Option<PathBuf>,
}

impl TempGuard {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    /// Renames the temporary file to `target`, disarming the guard.
    ///
    /// If the rename fails the guard stays armed and removes the file on drop.
    pub(crate) fn persist(mut self, target: &Path) -> io::Result<()> {
        if let Some(path) = &self.path {
            fs::rename(path, target)?;
        }
        self.path = None;
        Ok(())
    }
}

impl Drop for TempGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            // Silently ignore errors during cleanup
            let _ = fs::remove_file(path);
        }
    }
}

/// Replaces `target` with `contents` in a single rename.
///
/// The temporary file lives next to the target so the rename never crosses
/// file systems. Its name carries a ULID to keep concurrent writers apart.
pub(crate) fn write_atomically(target: &Path, contents: &[u8]) -> io::Result<()> {
    let file_name = target
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("store");
    let temp_path = target.with_file_name(format!(".{}_{}.tmp", file_name, ulid::Ulid::new()));

    let guard = TempGuard::new(temp_path.clone());
    fs::write(&temp_path, contents)?;
    guard.persist(target)
}
