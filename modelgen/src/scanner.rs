//! Discovery of hand-authored source files.
//!
//! Generated and hand-authored files share one models directory and are told
//! apart only by the [`GENERATED_SUFFIX`] of their file name.

use crate::error::WriteError;
use crate::store::FileStore;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File name suffix of every generated file.
pub const GENERATED_SUFFIX: &str = ".generated.rs";

/// Glob matching every generated file.
pub const GENERATED_PATTERN: &str = "*.generated.rs";

/// A discovered source file with its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path to the file.
    pub path: PathBuf,

    /// File content.
    pub content: String,
}

/// Scanner for the hand-authored files of a models directory.
#[derive(Debug)]
pub struct SourceScanner {
    /// Models directory; not searched recursively.
    root: PathBuf,
}

impl SourceScanner {
    /// Create a new scanner for the given models directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Read every hand-authored `.rs` file, sorted by path.
    pub fn scan(&self, store: &dyn FileStore) -> Result<Vec<SourceFile>, WriteError> {
        let mut files = Vec::new();

        for path in store.list(&self.root, "*.rs")? {
            if is_generated(&path) {
                continue;
            }

            let content = store.read_all_text(&path)?;
            files.push(SourceFile { path, content });
        }

        tracing::debug!(
            root = %self.root.display(),
            count = files.len(),
            "scanned hand-authored files"
        );

        Ok(files)
    }

    /// List previously generated files.
    pub fn generated_files(&self, store: &dyn FileStore) -> Result<Vec<PathBuf>, WriteError> {
        store.list(&self.root, GENERATED_PATTERN)
    }

    /// Get the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Check whether a path names a generated file.
pub fn is_generated(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(GENERATED_SUFFIX))
}

/// Key a set of source files by path.
pub fn into_file_map(files: &[SourceFile]) -> BTreeMap<PathBuf, String> {
    files
        .iter()
        .map(|f| (f.path.clone(), f.content.clone()))
        .collect()
}
