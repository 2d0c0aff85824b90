//! Per-directory run exclusion.
//!
//! Cleaning and emitting mutate a shared directory, so at most one run per
//! models directory may be active. Runs of the same process are tracked in a
//! process-wide set; runs of other processes are kept out by an exclusive
//! lock file in the models directory. A second run is rejected, not queued.

use crate::error::{GenerateError, WriteError};
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, PoisonError};

/// Lock file created in a models directory while a run owns it.
pub const LOCK_FILE_NAME: &str = ".modelgen.lock";

static ACTIVE: LazyLock<Mutex<HashSet<PathBuf>>> = LazyLock::new(|| Mutex::new(HashSet::new()));

/// Guard owning a models directory for the duration of a run.
#[derive(Debug)]
pub struct DirectoryLock {
    key: PathBuf,
    /// Lock file to remove on release; `None` while the directory is absent.
    file: Option<PathBuf>,
}

impl DirectoryLock {
    /// Claim `dir`, or fail with [`GenerateError::InProgress`].
    ///
    /// A lock file left behind by a crashed process keeps the directory
    /// locked until it is removed by hand.
    pub fn acquire(dir: &Path) -> Result<Self, GenerateError> {
        let key = lock_key(dir);
        let mut active = ACTIVE.lock().unwrap_or_else(PoisonError::into_inner);
        if active.contains(&key) {
            return Err(GenerateError::InProgress {
                path: dir.to_path_buf(),
            });
        }

        let file = if dir.is_dir() {
            let path = dir.join(LOCK_FILE_NAME);
            create_lock_file(&path)?;
            Some(path)
        } else {
            None
        };

        active.insert(key.clone());
        Ok(Self { key, file })
    }

    /// Whether some run currently owns `dir`.
    pub fn is_locked(dir: &Path) -> bool {
        let in_process = ACTIVE
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&lock_key(dir));
        in_process || dir.join(LOCK_FILE_NAME).exists()
    }
}

impl Drop for DirectoryLock {
    fn drop(&mut self) {
        if let Some(path) = &self.file {
            if let Err(e) = std::fs::remove_file(path) {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove lock file");
            }
        }
        ACTIVE
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

fn create_lock_file(path: &Path) -> Result<(), GenerateError> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut file) => {
            // The owner's pid helps when a stale lock has to be cleared by hand.
            if let Err(e) = writeln!(file, "{}", std::process::id()) {
                tracing::debug!(path = %path.display(), error = %e, "failed to record lock owner");
            }
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            tracing::warn!(path = %path.display(), "models directory locked by another process");
            Err(GenerateError::InProgress {
                path: path.to_path_buf(),
            })
        }
        Err(e) => Err(GenerateError::Clean(WriteError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })),
    }
}

/// Canonical form of a directory; falls back to the path as given while the
/// directory does not exist yet.
fn lock_key(dir: &Path) -> PathBuf {
    std::fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf())
}
