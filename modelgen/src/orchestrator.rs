//! Generation run state machine.
//!
//! ```text
//! Idle -> Cleaning -> Scanning -> Planning -> Emitting -> (Compiling) -> Done
//!   \________\___________\___________\___________\____________\-------> Failed
//! ```
//!
//! The schema snapshot is taken while `Idle`, so an unavailable schema fails
//! the run before any file is touched. Type-local and file-local problems are
//! collected as diagnostics; anything else moves the run to `Failed` and is
//! reported to the status sink.

use crate::compiler::{self, CompileRequest, CompiledArtifact, CompilerBackend, RustcCompiler};
use crate::diagnostic::Diagnostic;
use crate::emitter::{self, INDEX_FILE_NAME};
use crate::error::{GenerateError, GenerateResult};
use crate::lock::DirectoryLock;
use crate::parser::CodeParser;
use crate::planner::{GenerationPlan, GenerationPlanner, SkippedType};
use crate::scanner::{self, SourceScanner};
use crate::schema::SchemaProvider;
use crate::status::{GenerationStatus, StatusSink};
use crate::store::{FileStore, FsFileStore, WriteResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Directory under the models directory receiving artifacts by default.
pub const DEFAULT_ARTIFACT_DIR: &str = ".modelgen";

/// What a run produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GenerationMode {
    /// Generation is switched off.
    Nothing,
    /// Source files only.
    #[default]
    SourceOnly,
    /// Source files plus a compiled artifact.
    Artifact,
}

impl GenerationMode {
    pub fn is_enabled(self) -> bool {
        self != GenerationMode::Nothing
    }

    pub fn requires_artifact(self) -> bool {
        self == GenerationMode::Artifact
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GenerationMode::Nothing => "nothing",
            GenerationMode::SourceOnly => "source-only",
            GenerationMode::Artifact => "artifact",
        };
        f.write_str(name)
    }
}

impl FromStr for GenerationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "nothing" | "off" => Ok(GenerationMode::Nothing),
            "source-only" | "source" => Ok(GenerationMode::SourceOnly),
            "artifact" => Ok(GenerationMode::Artifact),
            other => Err(format!(
                "unknown generation mode '{}' (expected nothing, source-only or artifact)",
                other
            )),
        }
    }
}

/// States of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Cleaning,
    Scanning,
    Planning,
    Emitting,
    Compiling,
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Where and how models are generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorSettings {
    pub models_dir: PathBuf,
    pub namespace: String,
    pub mode: GenerationMode,
    /// Artifact directory; `<models_dir>/.modelgen` when unset.
    pub artifact_dir: Option<PathBuf>,
}

impl GeneratorSettings {
    pub fn new(models_dir: impl Into<PathBuf>, namespace: impl Into<String>) -> Self {
        Self {
            models_dir: models_dir.into(),
            namespace: namespace.into(),
            mode: GenerationMode::default(),
            artifact_dir: None,
        }
    }

    pub fn with_mode(mut self, mode: GenerationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = Some(dir.into());
        self
    }

    /// Path the artifact is compiled to.
    pub fn artifact_path(&self) -> PathBuf {
        let dir = self
            .artifact_dir
            .clone()
            .unwrap_or_else(|| self.models_dir.join(DEFAULT_ARTIFACT_DIR));
        dir.join(compiler::artifact_file_name(&self.namespace))
    }

    /// Path of the module index.
    pub fn index_path(&self) -> PathBuf {
        self.models_dir.join(INDEX_FILE_NAME)
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// States in the order they were entered.
    pub states: Vec<RunState>,
    /// Previously generated files that were removed.
    pub deleted: Vec<PathBuf>,
    /// Write results, one per generated file.
    pub written: Vec<WriteResult>,
    /// Generated file contents by path.
    pub generated: BTreeMap<PathBuf, String>,
    pub plans: Vec<GenerationPlan>,
    pub skipped_types: Vec<SkippedType>,
    /// Non-fatal problems in discovery order.
    pub diagnostics: Vec<Diagnostic>,
    pub artifact: Option<CompiledArtifact>,
}

impl RunReport {
    fn enter(&mut self, state: RunState) {
        tracing::info!(%state, "models generation state");
        self.states.push(state);
    }

    /// Number of diagnostics at error level.
    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }
}

/// Drives a generation run end to end.
pub struct Orchestrator {
    settings: GeneratorSettings,
    store: Arc<dyn FileStore>,
    status: Arc<dyn StatusSink>,
    compiler: Arc<dyn CompilerBackend>,
    parser: CodeParser,
    planner: GenerationPlanner,
}

impl Orchestrator {
    /// Orchestrator on the local file system, reporting to an in-process
    /// status and compiling with `rustc`.
    pub fn new(settings: GeneratorSettings) -> Self {
        Self {
            settings,
            store: Arc::new(FsFileStore::new(false)),
            status: Arc::new(GenerationStatus::new()),
            compiler: Arc::new(RustcCompiler::new()),
            parser: CodeParser::new(),
            planner: GenerationPlanner::new(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn FileStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_status(mut self, status: Arc<dyn StatusSink>) -> Self {
        self.status = status;
        self
    }

    pub fn with_compiler(mut self, compiler: Arc<dyn CompilerBackend>) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    pub fn models_dir(&self) -> &Path {
        &self.settings.models_dir
    }

    /// Run generation against a schema snapshot.
    ///
    /// Every outcome is reported to the status sink before returning.
    pub fn run(&self, schema: &dyn SchemaProvider) -> GenerateResult<RunReport> {
        let mut report = RunReport::default();
        report.enter(RunState::Idle);

        match self.execute(schema, &mut report) {
            Ok(()) => {
                report.enter(RunState::Done);
                tracing::info!(
                    written = report.written.len(),
                    deleted = report.deleted.len(),
                    diagnostics = report.diagnostics.len(),
                    "models generation completed"
                );
                self.status.report_success(&report.diagnostics);
                Ok(report)
            }
            Err(e) => {
                report.enter(RunState::Failed);
                tracing::error!(error = %e, "models generation failed");
                self.status.report_failure(&e.to_string());
                Err(e)
            }
        }
    }

    fn execute(&self, schema: &dyn SchemaProvider, report: &mut RunReport) -> GenerateResult<()> {
        if !self.settings.mode.is_enabled() {
            return Err(GenerateError::Disabled);
        }

        let models_dir = &self.settings.models_dir;
        let schema = schema.snapshot()?;
        let store = self.store.as_ref();
        let scanner = SourceScanner::new(models_dir);

        report.enter(RunState::Cleaning);
        store
            .create_dir_all(models_dir)
            .map_err(GenerateError::Clean)?;
        // Taken once the directory exists, so the lock file can be created.
        let _lock = DirectoryLock::acquire(models_dir)?;
        for path in scanner.generated_files(store).map_err(GenerateError::Clean)? {
            if store.delete(&path).map_err(GenerateError::Clean)? {
                tracing::debug!(path = %path.display(), "deleted generated file");
                report.deleted.push(path);
            }
        }

        report.enter(RunState::Scanning);
        let sources = scanner.scan(store).map_err(GenerateError::Scan)?;
        let outcome = self.parser.parse_files(&sources);
        report
            .diagnostics
            .extend(outcome.errors.iter().map(Diagnostic::from_parse_error));

        report.enter(RunState::Planning);
        let plan_set = self.planner.plan(&schema, &outcome.existing);
        report.diagnostics.extend(plan_set.diagnostics);
        report.skipped_types = plan_set.skipped_types;
        report.plans = plan_set.plans;

        report.enter(RunState::Emitting);
        let namespace = &self.settings.namespace;
        let mut generated = BTreeMap::new();
        for plan in &report.plans {
            let path = models_dir.join(emitter::generated_file_name(&plan.class_name));
            generated.insert(path, emitter::emit_model(plan, namespace));
        }
        let hand_files: Vec<PathBuf> = sources.iter().map(|s| s.path.clone()).collect();
        generated.insert(
            self.settings.index_path(),
            emitter::emit_index(namespace, &report.plans, &hand_files),
        );
        for (path, content) in &generated {
            let result = store
                .write_all_text(path, content)
                .map_err(GenerateError::Emit)?;
            report.written.push(result);
        }

        if self.settings.mode.requires_artifact() && !store.is_dry_run() {
            report.enter(RunState::Compiling);
            let mut files = scanner::into_file_map(&sources);
            files.extend(generated.iter().map(|(p, c)| (p.clone(), c.clone())));
            let request = CompileRequest::new(namespace.clone(), files, self.settings.artifact_path());
            let artifact = self.compiler.compile(&request)?;
            for warning in &artifact.warnings {
                tracing::debug!(%warning, "compiler warning");
            }
            report.artifact = Some(artifact);
        }

        report.generated = generated;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CompileError, CompilerDiagnostic, SchemaError};
    use crate::schema::{PropertyModel, Schema, TypeModel};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct Unavailable;

    impl SchemaProvider for Unavailable {
        fn snapshot(&self) -> Result<Schema, SchemaError> {
            Err(SchemaError::Unavailable("database offline".into()))
        }
    }

    /// Records requests and answers with a canned outcome.
    #[derive(Default)]
    struct RecordingCompiler {
        fail: bool,
        requests: Mutex<Vec<CompileRequest>>,
    }

    impl CompilerBackend for RecordingCompiler {
        fn compile(&self, request: &CompileRequest) -> Result<CompiledArtifact, CompileError> {
            self.requests.lock().unwrap().push(request.clone());
            if self.fail {
                return Err(CompileError::Failed {
                    diagnostics: vec![CompilerDiagnostic {
                        file: None,
                        line: 1,
                        column: 1,
                        message: "mismatched types".into(),
                    }],
                });
            }
            Ok(CompiledArtifact {
                path: request.output.clone(),
                warnings: Vec::new(),
            })
        }
    }

    fn schema() -> Schema {
        Schema::new(vec![
            TypeModel::new("article")
                .with_mixin("seo")
                .with_property(PropertyModel::new("title", "String")),
            TypeModel::element("seo").with_property(PropertyModel::new("metaTitle", "String")),
        ])
    }

    #[test]
    fn test_generation_mode_parsing() {
        assert_eq!("source-only".parse::<GenerationMode>(), Ok(GenerationMode::SourceOnly));
        assert_eq!("Artifact".parse::<GenerationMode>(), Ok(GenerationMode::Artifact));
        assert_eq!("nothing".parse::<GenerationMode>(), Ok(GenerationMode::Nothing));
        assert!("dll".parse::<GenerationMode>().is_err());
        assert_eq!(GenerationMode::SourceOnly.to_string(), "source-only");
    }

    #[test]
    fn test_settings_paths() {
        let settings = GeneratorSettings::new("/site/models", "site");
        assert_eq!(
            settings.artifact_path(),
            PathBuf::from("/site/models/.modelgen/libsite.rlib")
        );
        let settings = settings.with_artifact_dir("/site/bin");
        assert_eq!(settings.artifact_path(), PathBuf::from("/site/bin/libsite.rlib"));
        assert_eq!(
            settings.index_path(),
            PathBuf::from("/site/models/_models.generated.rs")
        );
    }

    #[test]
    fn test_source_only_run_visits_states_in_order() {
        let dir = TempDir::new().unwrap();
        let orchestrator = Orchestrator::new(GeneratorSettings::new(dir.path(), "site"));

        let report = orchestrator.run(&schema()).unwrap();

        assert_eq!(
            report.states,
            vec![
                RunState::Idle,
                RunState::Cleaning,
                RunState::Scanning,
                RunState::Planning,
                RunState::Emitting,
                RunState::Done,
            ]
        );
        assert_eq!(report.written.len(), 3);
        assert!(dir.path().join("article.generated.rs").exists());
        assert!(dir.path().join("seo.generated.rs").exists());
        assert!(dir.path().join(INDEX_FILE_NAME).exists());
        assert!(report.artifact.is_none());
    }

    #[test]
    fn test_cleaning_removes_stale_generated_files_only() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("retired.generated.rs"), "// stale").unwrap();
        std::fs::write(dir.path().join("helpers.rs"), "pub fn helper() {}").unwrap();

        let report = Orchestrator::new(GeneratorSettings::new(dir.path(), "site"))
            .run(&schema())
            .unwrap();

        assert_eq!(report.deleted, vec![dir.path().join("retired.generated.rs")]);
        assert!(!dir.path().join("retired.generated.rs").exists());
        assert!(dir.path().join("helpers.rs").exists());
        let index = std::fs::read_to_string(dir.path().join(INDEX_FILE_NAME)).unwrap();
        assert!(index.contains("pub mod helpers;"));
    }

    #[test]
    fn test_disabled_mode() {
        let dir = TempDir::new().unwrap();
        let status = Arc::new(GenerationStatus::new());
        let orchestrator = Orchestrator::new(
            GeneratorSettings::new(dir.path(), "site").with_mode(GenerationMode::Nothing),
        )
        .with_status(status.clone());

        let err = orchestrator.run(&schema()).unwrap_err();

        assert!(matches!(err, GenerateError::Disabled));
        assert!(status.last_error().is_some());
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn test_unavailable_schema_touches_nothing() {
        let dir = TempDir::new().unwrap();
        let existing = dir.path().join("article.generated.rs");
        std::fs::write(&existing, "// previous run").unwrap();
        let status = Arc::new(GenerationStatus::new());

        let err = Orchestrator::new(GeneratorSettings::new(dir.path(), "site"))
            .with_status(status.clone())
            .run(&Unavailable)
            .unwrap_err();

        assert!(matches!(err, GenerateError::SchemaUnavailable(_)));
        assert_eq!(std::fs::read_to_string(&existing).unwrap(), "// previous run");
        assert!(status.last_error().unwrap().contains("database offline"));
    }

    #[test]
    fn test_artifact_mode_compiles_merged_file_set() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("article.rs"),
            "use super::Article;\nimpl Article { pub fn slug(&self) -> String { String::new() } }",
        )
        .unwrap();
        let compiler = Arc::new(RecordingCompiler::default());

        let report = Orchestrator::new(
            GeneratorSettings::new(dir.path(), "site").with_mode(GenerationMode::Artifact),
        )
        .with_compiler(compiler.clone())
        .run(&schema())
        .unwrap();

        assert_eq!(report.states[report.states.len() - 2], RunState::Compiling);
        let requests = compiler.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let files: Vec<_> = requests[0]
            .files
            .keys()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            files,
            vec![
                "_models.generated.rs",
                "article.generated.rs",
                "article.rs",
                "seo.generated.rs"
            ]
        );
        assert_eq!(
            report.artifact.unwrap().path,
            dir.path().join(".modelgen/libsite.rlib")
        );
    }

    #[test]
    fn test_compile_failure_keeps_sources() {
        let dir = TempDir::new().unwrap();
        let status = Arc::new(GenerationStatus::new());
        let compiler = Arc::new(RecordingCompiler {
            fail: true,
            ..Default::default()
        });

        let err = Orchestrator::new(
            GeneratorSettings::new(dir.path(), "site").with_mode(GenerationMode::Artifact),
        )
        .with_status(status.clone())
        .with_compiler(compiler)
        .run(&schema())
        .unwrap_err();

        assert!(matches!(err, GenerateError::Compilation(_)));
        assert!(dir.path().join("article.generated.rs").exists());
        assert!(status.last_error().unwrap().contains("mismatched types"));
    }

    #[test]
    fn test_dry_run_skips_compilation() {
        let dir = TempDir::new().unwrap();
        let compiler = Arc::new(RecordingCompiler::default());

        let report = Orchestrator::new(
            GeneratorSettings::new(dir.path(), "site").with_mode(GenerationMode::Artifact),
        )
        .with_store(Arc::new(FsFileStore::new(true)))
        .with_compiler(compiler.clone())
        .run(&schema())
        .unwrap();

        assert!(!report.states.contains(&RunState::Compiling));
        assert!(compiler.requests.lock().unwrap().is_empty());
        assert!(report.written.iter().all(|w| !w.was_written()));
        assert_eq!(report.generated.len(), 3);
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }
}
