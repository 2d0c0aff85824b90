//! Externally visible generation status.
//!
//! The orchestrator reports every run outcome to a [`StatusSink`] and never
//! reads it back. Dashboards read the state through [`Dashboard`].

use crate::diagnostic::Diagnostic;
use crate::orchestrator::GenerationMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Receiver of run outcomes.
pub trait StatusSink: Send + Sync {
    /// A run failed; `message` is the summarised reason.
    fn report_failure(&self, message: &str);

    /// A run completed, possibly with non-fatal diagnostics.
    fn report_success(&self, diagnostics: &[Diagnostic]);
}

/// Persistable status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusState {
    /// Last failure, or summary of the errors of the last run.
    pub last_error: Option<String>,
    /// Whether the schema changed since the last successful run.
    pub out_of_date: bool,
}

impl StatusState {
    fn record_failure(&mut self, message: &str) {
        self.last_error = Some(message.to_string());
    }

    fn record_success(&mut self, diagnostics: &[Diagnostic]) {
        self.out_of_date = false;
        self.last_error = summarize_errors(diagnostics);
    }

    /// Out-of-date indicator for the given mode.
    pub fn out_of_date_status(&self, mode: GenerationMode) -> OutOfDateStatus {
        if !mode.is_enabled() {
            OutOfDateStatus::Unknown
        } else if self.out_of_date {
            OutOfDateStatus::OutOfDate
        } else {
            OutOfDateStatus::Current
        }
    }

    /// Dashboard view of this state.
    pub fn dashboard(&self, mode: GenerationMode) -> Dashboard {
        let text = match mode {
            GenerationMode::Nothing => "Models generation is disabled.".to_string(),
            mode => format!("Models generation is enabled in {} mode.", mode),
        };
        Dashboard {
            enable: mode.is_enabled(),
            text,
            can_generate: mode.is_enabled(),
            generate_causes_restart: false,
            out_of_date_models: self.out_of_date,
            last_error: self.last_error.clone(),
        }
    }
}

fn summarize_errors(diagnostics: &[Diagnostic]) -> Option<String> {
    let errors: Vec<String> = diagnostics
        .iter()
        .filter(|d| d.is_error())
        .map(|d| d.to_string())
        .collect();
    if errors.is_empty() {
        return None;
    }
    Some(format!(
        "Models generated with {} error(s):\n{}",
        errors.len(),
        errors.join("\n")
    ))
}

/// Whether generated models reflect the current schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutOfDateStatus {
    Current,
    OutOfDate,
    Unknown,
}

/// What a dashboard shows about models generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub enable: bool,
    pub text: String,
    pub can_generate: bool,
    /// Generated models are picked up without restarting the host.
    #[serde(default)]
    pub generate_causes_restart: bool,
    pub out_of_date_models: bool,
    pub last_error: Option<String>,
}

/// In-process status sink.
#[derive(Debug, Default)]
pub struct GenerationStatus {
    state: Mutex<StatusState>,
}

impl GenerationStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> StatusState {
        self.lock().clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    pub fn is_out_of_date(&self) -> bool {
        self.lock().out_of_date
    }

    /// Flag models as stale after a schema change.
    pub fn mark_out_of_date(&self) {
        self.lock().out_of_date = true;
    }

    /// Reset to the initial state.
    pub fn clear(&self) {
        *self.lock() = StatusState::default();
    }

    pub fn dashboard(&self, mode: GenerationMode) -> Dashboard {
        self.lock().dashboard(mode)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StatusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StatusSink for GenerationStatus {
    fn report_failure(&self, message: &str) {
        self.lock().record_failure(message);
    }

    fn report_success(&self, diagnostics: &[Diagnostic]) {
        self.lock().record_success(diagnostics);
    }
}

/// Status sink persisted as a JSON document.
///
/// Lets a separate process (the `status` command, a dashboard) observe runs.
#[derive(Debug)]
pub struct JsonStatusFile {
    path: PathBuf,
    guard: Mutex<()>,
}

impl JsonStatusFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted state; a missing file is the initial state.
    pub fn load(&self) -> std::io::Result<StatusState> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StatusState::default()),
            Err(e) => Err(e),
        }
    }

    /// Persist a state.
    pub fn save(&self, state: &StatusState) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(state)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(&self.path, content)
    }

    /// Flag models as stale after a schema change.
    pub fn mark_out_of_date(&self) {
        self.update(|state| state.out_of_date = true);
    }

    fn update(&self, apply: impl FnOnce(&mut StatusState)) {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);

        let mut state = self.load().unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "resetting unreadable status file");
            StatusState::default()
        });
        apply(&mut state);

        if let Err(e) = self.save(&state) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to persist status");
        }
    }
}

impl StatusSink for JsonStatusFile {
    fn report_failure(&self, message: &str) {
        self.update(|state| state.record_failure(message));
    }

    fn report_success(&self, diagnostics: &[Diagnostic]) {
        self.update(|state| state.record_success(diagnostics));
    }
}
