//! File store used by the generator.
//!
//! The orchestrator touches the disk only through [`FileStore`], so hosts can
//! substitute their own storage. [`FsFileStore`] is the local file system
//! implementation, with dry-run support.

use crate::error::WriteError;
use std::path::{Path, PathBuf};

/// Result of a write operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// File was written successfully.
    Written {
        /// Path to the written file.
        path: PathBuf,
        /// Number of bytes written.
        bytes: usize,
    },
    /// Dry run - content was not written.
    DryRun {
        /// Content that would have been written.
        content: String,
        /// Path where content would have been written.
        path: PathBuf,
    },
}

/// Storage operations the generator relies on.
///
/// Implementations must be strongly consistent within one run.
pub trait FileStore: Send + Sync {
    /// Read a whole file as UTF-8 text.
    fn read_all_text(&self, path: &Path) -> Result<String, WriteError>;

    /// Write a whole file, creating parent directories when needed.
    fn write_all_text(&self, path: &Path, content: &str) -> Result<WriteResult, WriteError>;

    /// Create a directory and its parents.
    fn create_dir_all(&self, path: &Path) -> Result<(), WriteError>;

    /// List the files of `dir` whose name matches the glob `pattern`, sorted.
    ///
    /// A missing directory lists as empty.
    fn list(&self, dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, WriteError>;

    /// Delete a file. Returns whether a file was actually removed.
    fn delete(&self, path: &Path) -> Result<bool, WriteError>;

    /// Whether mutations are only simulated.
    fn is_dry_run(&self) -> bool {
        false
    }
}

/// Local file system store with dry-run support.
#[derive(Debug, Default)]
pub struct FsFileStore {
    /// Whether to run in dry-run mode.
    dry_run: bool,
}

impl FsFileStore {
    /// Create a new file store.
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }
}

impl FileStore for FsFileStore {
    fn read_all_text(&self, path: &Path) -> Result<String, WriteError> {
        std::fs::read_to_string(path).map_err(|e| WriteError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn write_all_text(&self, path: &Path, content: &str) -> Result<WriteResult, WriteError> {
        if self.dry_run {
            return Ok(WriteResult::DryRun {
                content: content.to_string(),
                path: path.to_path_buf(),
            });
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                self.create_dir_all(parent)?;
            }
        }

        std::fs::write(path, content).map_err(|e| WriteError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(WriteResult::Written {
            path: path.to_path_buf(),
            bytes: content.len(),
        })
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), WriteError> {
        if self.dry_run {
            return Ok(());
        }

        std::fs::create_dir_all(path).map_err(|e| WriteError::CreateDir {
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn list(&self, dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, WriteError> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let dir_text = dir.to_str().ok_or_else(|| WriteError::List {
            pattern: pattern.to_string(),
            message: format!("{} is not valid UTF-8", dir.display()),
        })?;
        let full_pattern = format!("{}/{}", glob::Pattern::escape(dir_text), pattern);

        let entries = glob::glob(&full_pattern).map_err(|e| WriteError::List {
            pattern: full_pattern.clone(),
            message: e.to_string(),
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| WriteError::List {
                pattern: full_pattern.clone(),
                message: e.to_string(),
            })?;
            if path.is_file() {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }

    fn delete(&self, path: &Path) -> Result<bool, WriteError> {
        if self.dry_run {
            return Ok(false);
        }

        match std::fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(WriteError::DeleteFile {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

impl WriteResult {
    /// Get the path associated with this result.
    pub fn path(&self) -> &Path {
        match self {
            WriteResult::Written { path, .. } => path,
            WriteResult::DryRun { path, .. } => path,
        }
    }

    /// Check if the write was successful (not dry-run).
    pub fn was_written(&self) -> bool {
        matches!(self, WriteResult::Written { .. })
    }

    /// Get the number of bytes written (0 for dry-run).
    pub fn bytes(&self) -> usize {
        match self {
            WriteResult::Written { bytes, .. } => *bytes,
            WriteResult::DryRun { .. } => 0,
        }
    }
}
