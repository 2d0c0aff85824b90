//! File watcher for development mode.
//!
//! Watches the schema snapshot and the hand-authored files of the models
//! directory so models can be regenerated when either changes. Writes to
//! generated files are filtered out, otherwise every run would trigger the
//! next one.

use crate::error::{CliResult, WatchError};
use modelgen::scanner::is_generated;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, Debouncer};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::time::Duration;

/// Event types for relevant file changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// The schema snapshot changed.
    SchemaChanged(PathBuf),
    /// A hand-authored model file was modified or created.
    SourceChanged(PathBuf),
    /// A hand-authored model file was deleted.
    SourceDeleted(PathBuf),
    /// An error occurred.
    Error(String),
}

/// Watches a models directory and its schema snapshot.
#[derive(Debug, Clone)]
pub struct FileWatcher {
    models_dir: PathBuf,
    schema: PathBuf,
    /// Debounce duration in milliseconds.
    debounce_ms: u64,
}

impl FileWatcher {
    /// Create a new file watcher.
    pub fn new(models_dir: impl Into<PathBuf>, schema: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: absolute(&models_dir.into()),
            schema: absolute(&schema.into()),
            debounce_ms: 500,
        }
    }

    /// Set the debounce duration in milliseconds.
    pub fn with_debounce(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn schema(&self) -> &Path {
        &self.schema
    }

    /// Map a changed path to an event, or `None` when the change is irrelevant.
    pub fn classify(&self, path: &Path) -> Option<WatchEvent> {
        let path = absolute(path);

        if path == self.schema {
            return Some(WatchEvent::SchemaChanged(path));
        }

        if path.parent() != Some(self.models_dir.as_path())
            || path.extension().map_or(true, |ext| ext != "rs")
            || is_generated(&path)
        {
            return None;
        }

        if path.exists() {
            Some(WatchEvent::SourceChanged(path))
        } else {
            Some(WatchEvent::SourceDeleted(path))
        }
    }

    /// Start watching for file changes.
    ///
    /// Returns the debouncer, which must be kept alive, and a receiver that
    /// yields watch events.
    pub fn watch(&self) -> CliResult<(Debouncer<RecommendedWatcher>, Receiver<WatchEvent>)> {
        let (tx, rx) = channel::<WatchEvent>();
        let filter = self.clone();

        let mut debouncer = new_debouncer(
            Duration::from_millis(self.debounce_ms),
            move |result: Result<Vec<DebouncedEvent>, notify::Error>| match result {
                Ok(events) => {
                    for event in events {
                        if let Some(watch_event) = filter.classify(&event.path) {
                            let _ = tx.send(watch_event);
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(WatchEvent::Error(e.to_string()));
                }
            },
        )
        .map_err(|e| WatchError::Init(e.to_string()))?;

        // Editors often replace files instead of writing in place, so the
        // schema is watched through its parent directory.
        let schema_dir = self
            .schema
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        for dir in [&self.models_dir, &schema_dir] {
            debouncer
                .watcher()
                .watch(dir, RecursiveMode::NonRecursive)
                .map_err(|e| WatchError::Path {
                    path: dir.clone(),
                    message: e.to_string(),
                })?;
        }

        Ok((debouncer, rx))
    }
}

impl WatchEvent {
    /// Get the path associated with this event.
    pub fn path(&self) -> Option<&Path> {
        match self {
            WatchEvent::SchemaChanged(p)
            | WatchEvent::SourceChanged(p)
            | WatchEvent::SourceDeleted(p) => Some(p),
            WatchEvent::Error(_) => None,
        }
    }

    /// Check if this is an error event.
    pub fn is_error(&self) -> bool {
        matches!(self, WatchEvent::Error(_))
    }

    /// Get the error message if this is an error event.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            WatchEvent::Error(msg) => Some(msg),
            _ => None,
        }
    }
}

fn absolute(path: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return canonical;
    }
    // Deleted files no longer canonicalize; resolve through the parent.
    if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
        let parent = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };
        if let Ok(parent) = std::fs::canonicalize(parent) {
            return parent.join(name);
        }
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FileWatcher) {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("models")).unwrap();
        std::fs::write(dir.path().join("schema.json"), "{\"types\":[]}").unwrap();
        let watcher = FileWatcher::new(dir.path().join("models"), dir.path().join("schema.json"));
        (dir, watcher)
    }

    #[test]
    fn test_classify_schema_change() {
        let (dir, watcher) = setup();
        let event = watcher.classify(&dir.path().join("schema.json"));
        assert!(matches!(event, Some(WatchEvent::SchemaChanged(_))));
    }

    #[test]
    fn test_classify_hand_authored_source() {
        let (dir, watcher) = setup();
        let path = dir.path().join("models/article.rs");
        std::fs::write(&path, "").unwrap();

        assert!(matches!(
            watcher.classify(&path),
            Some(WatchEvent::SourceChanged(_))
        ));

        std::fs::remove_file(&path).unwrap();
        assert!(matches!(
            watcher.classify(&path),
            Some(WatchEvent::SourceDeleted(_))
        ));
    }

    #[test]
    fn test_classify_ignores_generated_and_foreign_files() {
        let (dir, watcher) = setup();
        let generated = dir.path().join("models/article.generated.rs");
        std::fs::write(&generated, "").unwrap();
        let status = dir.path().join("models/status.json");
        std::fs::write(&status, "{}").unwrap();
        let other = dir.path().join("other.rs");
        std::fs::write(&other, "").unwrap();

        assert_eq!(watcher.classify(&generated), None);
        assert_eq!(watcher.classify(&status), None);
        assert_eq!(watcher.classify(&other), None);
        assert_eq!(
            watcher.classify(&dir.path().join("models/_models.generated.rs")),
            None
        );
    }

    #[test]
    fn test_watch_event_path() {
        let path = PathBuf::from("/test/article.rs");

        let changed = WatchEvent::SourceChanged(path.clone());
        assert_eq!(changed.path(), Some(path.as_path()));

        let schema = WatchEvent::SchemaChanged(path.clone());
        assert_eq!(schema.path(), Some(path.as_path()));

        let error = WatchEvent::Error("test error".to_string());
        assert_eq!(error.path(), None);
        assert!(error.is_error());
        assert_eq!(error.error_message(), Some("test error"));
        assert_eq!(changed.error_message(), None);
    }

    #[test]
    fn test_file_watcher_with_debounce() {
        let (_dir, watcher) = setup();
        assert_eq!(watcher.debounce_ms, 500);
        assert_eq!(watcher.with_debounce(1000).debounce_ms, 1000);
    }
}
