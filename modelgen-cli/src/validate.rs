//! Drift detection between the schema and the generated files on disk.
//!
//! Validation performs a dry run and compares what would be written with
//! what is there, so nothing in the models directory is touched.

use crate::error::CliResult;
use modelgen::scanner::GENERATED_PATTERN;
use modelgen::{
    Diagnostic, FileStore, FsFileStore, GenerationMode, GenerationStatus, GeneratorSettings,
    Orchestrator, SchemaProvider,
};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// How a generated file differs from the expected output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftKind {
    /// The file should exist but does not.
    Missing,
    /// The file exists with different content.
    Changed,
    /// The file exists but would no longer be generated.
    Stale,
}

/// One out-of-date generated file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drift {
    pub path: PathBuf,
    pub kind: DriftKind,
}

/// Outcome of a validation.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Number of files that would be generated.
    pub checked: usize,
    pub drift: Vec<Drift>,
    /// Non-fatal problems of the dry run.
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationReport {
    pub fn is_up_to_date(&self) -> bool {
        self.drift.is_empty()
    }
}

impl fmt::Display for DriftKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DriftKind::Missing => "missing",
            DriftKind::Changed => "changed",
            DriftKind::Stale => "stale",
        };
        f.write_str(label)
    }
}

/// Compare the generated files of `settings.models_dir` with a fresh dry run.
pub fn validate(
    settings: &GeneratorSettings,
    schema: &dyn SchemaProvider,
) -> CliResult<ValidationReport> {
    // Artifacts are not compared, and a disabled mode would refuse the dry run.
    let settings = settings.clone().with_mode(GenerationMode::SourceOnly);
    let models_dir = settings.models_dir.clone();

    let report = Orchestrator::new(settings)
        .with_store(Arc::new(FsFileStore::new(true)))
        .with_status(Arc::new(GenerationStatus::new()))
        .run(schema)?;

    let mut drift = Vec::new();
    for (path, expected) in &report.generated {
        match std::fs::read_to_string(path) {
            Ok(actual) if actual == *expected => {}
            Ok(_) => drift.push(Drift {
                path: path.clone(),
                kind: DriftKind::Changed,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => drift.push(Drift {
                path: path.clone(),
                kind: DriftKind::Missing,
            }),
            Err(e) => return Err(e.into()),
        }
    }

    let expected: BTreeSet<&PathBuf> = report.generated.keys().collect();
    for path in generated_on_disk(&models_dir)? {
        if !expected.contains(&path) {
            drift.push(Drift {
                path,
                kind: DriftKind::Stale,
            });
        }
    }

    tracing::debug!(
        checked = report.generated.len(),
        drift = drift.len(),
        "validated generated models"
    );

    Ok(ValidationReport {
        checked: report.generated.len(),
        drift,
        diagnostics: report.diagnostics,
    })
}

fn generated_on_disk(models_dir: &Path) -> CliResult<Vec<PathBuf>> {
    Ok(FsFileStore::new(true).list(models_dir, GENERATED_PATTERN)?)
}
