//! Artifact compiler.
//!
//! Compiles the merged file set (hand-authored files plus freshly generated
//! ones) into a library artifact. [`RustcCompiler`] drives `rustc` directly:
//! the files are staged flat into a temporary directory next to the output,
//! the module index serves as crate root, and the artifact is renamed into
//! place only when compilation succeeds.

use crate::emitter::INDEX_FILE_NAME;
use crate::error::{CompileError, CompilerDiagnostic};
use crate::naming;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Environment variable overriding the `rustc` binary.
pub const RUSTC_ENV: &str = "RUSTC";

/// Crate name an artifact is compiled under.
pub fn crate_name(namespace: &str) -> String {
    match namespace.trim() {
        "" => "models".to_string(),
        namespace => naming::module_ident(namespace),
    }
}

/// File name of the artifact for a namespace (`site` -> `libsite.rlib`).
pub fn artifact_file_name(namespace: &str) -> String {
    format!("lib{}.rlib", crate_name(namespace))
}

/// Input of a compilation.
#[derive(Debug, Clone)]
pub struct CompileRequest {
    /// Namespace, used as crate name.
    pub namespace: String,
    /// Every source file by path. Must contain the module index.
    pub files: BTreeMap<PathBuf, String>,
    /// Where the artifact goes.
    pub output: PathBuf,
}

impl CompileRequest {
    pub fn new(
        namespace: impl Into<String>,
        files: BTreeMap<PathBuf, String>,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            files,
            output: output.into(),
        }
    }
}

/// A successfully produced artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledArtifact {
    pub path: PathBuf,
    /// Warnings reported while compiling.
    pub warnings: Vec<CompilerDiagnostic>,
}

/// Anything able to turn a file set into an artifact.
pub trait CompilerBackend: Send + Sync {
    /// Compile the request.
    ///
    /// On `Err` no new file exists at `request.output`.
    fn compile(&self, request: &CompileRequest) -> Result<CompiledArtifact, CompileError>;
}

/// Compiler backend invoking `rustc`.
#[derive(Debug, Clone)]
pub struct RustcCompiler {
    rustc: PathBuf,
    edition: String,
}

impl Default for RustcCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl RustcCompiler {
    /// Use `$RUSTC`, or `rustc` from `PATH`.
    pub fn new() -> Self {
        let rustc = std::env::var_os(RUSTC_ENV).unwrap_or_else(|| OsString::from("rustc"));
        Self {
            rustc: PathBuf::from(rustc),
            edition: "2021".to_string(),
        }
    }

    /// Use an explicit `rustc` binary.
    pub fn with_rustc(mut self, rustc: impl Into<PathBuf>) -> Self {
        self.rustc = rustc.into();
        self
    }

    /// Compile with another language edition.
    pub fn with_edition(mut self, edition: impl Into<String>) -> Self {
        self.edition = edition.into();
        self
    }

    pub fn rustc(&self) -> &Path {
        &self.rustc
    }
}

impl CompilerBackend for RustcCompiler {
    fn compile(&self, request: &CompileRequest) -> Result<CompiledArtifact, CompileError> {
        let output_dir = match request.output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&output_dir)
            .map_err(|e| CompileError::environment(&output_dir, e.to_string()))?;

        let has_index = request
            .files
            .keys()
            .any(|path| path.file_name().is_some_and(|name| name == INDEX_FILE_NAME));
        if !has_index {
            return Err(CompileError::environment(
                &request.output,
                format!("file set has no {}", INDEX_FILE_NAME),
            ));
        }

        let staging = tempfile::Builder::new()
            .prefix(".modelgen-")
            .tempdir_in(&output_dir)
            .map_err(|e| CompileError::environment(&output_dir, e.to_string()))?;

        let mut originals: HashMap<OsString, PathBuf> = HashMap::new();
        for (path, content) in &request.files {
            let Some(name) = path.file_name() else {
                return Err(CompileError::environment(path, "not a file path"));
            };
            if let Some(previous) = originals.insert(name.to_os_string(), path.clone()) {
                return Err(CompileError::environment(
                    path,
                    format!("file name clashes with {}", previous.display()),
                ));
            }
            let staged = staging.path().join(name);
            std::fs::write(&staged, content)
                .map_err(|e| CompileError::environment(&staged, e.to_string()))?;
        }

        let krate = crate_name(&request.namespace);
        let staged_output = staging.path().join("out.rlib");

        tracing::debug!(
            rustc = %self.rustc.display(),
            crate_name = %krate,
            files = request.files.len(),
            "invoking compiler"
        );

        let result = Command::new(&self.rustc)
            .arg("--crate-type")
            .arg("rlib")
            .arg("--crate-name")
            .arg(&krate)
            .arg("--edition")
            .arg(&self.edition)
            .arg("--error-format=json")
            .arg("-o")
            .arg(&staged_output)
            .arg(staging.path().join(INDEX_FILE_NAME))
            .current_dir(staging.path())
            .output()
            .map_err(|e| {
                CompileError::environment(&self.rustc, format!("failed to run compiler: {}", e))
            })?;

        let stderr = String::from_utf8_lossy(&result.stderr);
        let (errors, warnings) = parse_diagnostics(&stderr, &originals);

        if !result.status.success() {
            let diagnostics = if errors.is_empty() {
                vec![CompilerDiagnostic {
                    file: None,
                    line: 0,
                    column: 0,
                    message: format!("compiler exited with {}", result.status),
                }]
            } else {
                errors
            };
            return Err(CompileError::Failed { diagnostics });
        }

        std::fs::rename(&staged_output, &request.output)
            .map_err(|e| CompileError::environment(&request.output, e.to_string()))?;

        tracing::info!(artifact = %request.output.display(), "compiled models");

        Ok(CompiledArtifact {
            path: request.output.clone(),
            warnings,
        })
    }
}

/// One line of `rustc --error-format=json` output.
#[derive(Debug, Deserialize)]
struct RustcMessage {
    message: String,
    level: String,
    #[serde(default)]
    spans: Vec<RustcSpan>,
}

#[derive(Debug, Deserialize)]
struct RustcSpan {
    file_name: String,
    line_start: usize,
    column_start: usize,
    #[serde(default)]
    is_primary: bool,
}

/// Split compiler output into (errors, warnings), mapping staged files back.
///
/// Summary lines without a location are dropped when located errors exist.
fn parse_diagnostics(
    stderr: &str,
    originals: &HashMap<OsString, PathBuf>,
) -> (Vec<CompilerDiagnostic>, Vec<CompilerDiagnostic>) {
    let mut errors = Vec::new();
    let mut unlocated = Vec::new();
    let mut warnings = Vec::new();

    for line in stderr.lines() {
        let Ok(message) = serde_json::from_str::<RustcMessage>(line) else {
            continue;
        };

        let span = message
            .spans
            .iter()
            .find(|s| s.is_primary)
            .or_else(|| message.spans.first());
        let diagnostic = match span {
            Some(span) => {
                let staged = Path::new(&span.file_name);
                let file = staged
                    .file_name()
                    .and_then(|name| originals.get(name))
                    .cloned()
                    .unwrap_or_else(|| staged.to_path_buf());
                CompilerDiagnostic {
                    file: Some(file),
                    line: span.line_start,
                    column: span.column_start,
                    message: message.message,
                }
            }
            None => CompilerDiagnostic {
                file: None,
                line: 0,
                column: 0,
                message: message.message,
            },
        };

        match message.level.as_str() {
            level if level.starts_with("error") => {
                if diagnostic.file.is_some() {
                    errors.push(diagnostic);
                } else {
                    unlocated.push(diagnostic);
                }
            }
            "warning" if diagnostic.file.is_some() => warnings.push(diagnostic),
            _ => {}
        }
    }

    if errors.is_empty() {
        errors = unlocated;
    }
    (errors, warnings)
}
