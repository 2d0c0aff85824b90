//! Error types for model generation.
//!
//! Errors are split by blast radius: [`GenerateError`] aborts a whole run,
//! [`ParseError`] is local to one hand-authored file and [`PlanError`] is
//! local to one content type. File and type errors never stop their siblings.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for run-level operations.
pub type GenerateResult<T> = Result<T, GenerateError>;

/// Run-level error: the orchestrator moves to `Failed` when one of these occurs.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// Generation is switched off by the configured mode.
    #[error("Models generation is not enabled")]
    Disabled,

    /// Another run currently owns the models directory.
    #[error("Models generation already in progress for {path}")]
    InProgress { path: PathBuf },

    /// The schema provider could not deliver a snapshot.
    #[error("Schema unavailable: {0}")]
    SchemaUnavailable(#[from] SchemaError),

    /// Previously generated files could not be listed or removed.
    #[error("Failed to clean generated files: {0}")]
    Clean(#[source] WriteError),

    /// Hand-authored files could not be listed or read.
    #[error("Failed to scan models directory: {0}")]
    Scan(#[source] WriteError),

    /// A generated file could not be written.
    #[error("Failed to write generated models: {0}")]
    Emit(#[source] WriteError),

    /// The artifact could not be produced.
    #[error("Failed to compile models: {0}")]
    Compilation(#[from] CompileError),
}

/// Error raised by a schema provider.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The schema source could not be read.
    #[error("Failed to read schema {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The schema document is malformed.
    #[error("Invalid schema document {path}: {message}")]
    Invalid { path: PathBuf, message: String },

    /// The provider has no schema to offer.
    #[error("{0}")]
    Unavailable(String),
}

/// Error while parsing a hand-authored source file.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    /// Syntax error in Rust source; the whole file contributes nothing.
    #[error("Syntax error in {file}:{line}:{column}: {message}")]
    Syntax {
        file: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },

    /// Malformed marker macro; only that marker is dropped.
    #[error("Invalid marker in {file}:{line}: {message}")]
    Marker {
        file: PathBuf,
        line: usize,
        message: String,
    },
}

/// Error that makes a single content type unresolvable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// Base/mixin composition loops back on itself.
    #[error("Circular composition detected: {}", .cycle.join(" -> "))]
    CircularComposition { cycle: Vec<String> },

    /// A base or mixin reference points to a type missing from the schema.
    #[error("Type '{type_alias}' is composed of unknown type '{dependency}'")]
    MissingComposition {
        type_alias: String,
        dependency: String,
    },

    /// Two declarations of one property alias carry incompatible value types.
    #[error(
        "Property '{alias}' of type '{type_alias}' is declared as `{kept}` by {kept_origin} \
         and as `{dropped}` by {dropped_origin}"
    )]
    IncompatibleProperty {
        type_alias: String,
        alias: String,
        kept: String,
        kept_origin: String,
        dropped: String,
        dropped_origin: String,
    },

    /// Two different aliases resolve to the same accessor name.
    #[error("Properties '{first}' and '{second}' of type '{type_alias}' both map to `{local_name}`")]
    LocalNameCollision {
        type_alias: String,
        first: String,
        second: String,
        local_name: String,
    },

    /// Another type already claimed the model name.
    #[error("Type '{type_alias}' maps to model `{class_name}` already used by '{owner}'")]
    DuplicateClassName {
        type_alias: String,
        class_name: String,
        owner: String,
    },

    /// The model's generated file name is already taken.
    #[error("Type '{type_alias}' maps to file `{file_name}` already used by {owner}")]
    GeneratedFileCollision {
        type_alias: String,
        file_name: String,
        owner: String,
    },
}

/// Error writing, listing or deleting files.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Failed to create directory.
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write file.
    #[error("Failed to write file {path}: {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to read file.
    #[error("Failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to delete file.
    #[error("Failed to delete file {path}: {source}")]
    DeleteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to list a directory.
    #[error("Failed to list {pattern}: {message}")]
    List { pattern: String, message: String },
}

/// Error produced by the artifact compiler.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The code was rejected; nothing was written at the output path.
    #[error("Compilation failed with {} error(s):\n{}", .diagnostics.len(), format_diagnostics(.diagnostics))]
    Failed { diagnostics: Vec<CompilerDiagnostic> },

    /// The environment prevented compilation (paths, missing toolchain).
    #[error("Compilation environment error at {path}: {message}")]
    Environment { path: PathBuf, message: String },
}

/// One compiler diagnostic, with its location in the merged file set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerDiagnostic {
    /// Source file the diagnostic points at, if any.
    pub file: Option<PathBuf>,
    /// Line number (1-indexed), 0 when unknown.
    pub line: usize,
    /// Column number (1-indexed), 0 when unknown.
    pub column: usize,
    /// Diagnostic message as reported by the compiler.
    pub message: String,
}

impl std::fmt::Display for CompilerDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.file {
            Some(file) => write!(
                f,
                "{}:{}:{}: {}",
                file.display(),
                self.line,
                self.column,
                self.message
            ),
            None => write!(f, "{}", self.message),
        }
    }
}

fn format_diagnostics(diagnostics: &[CompilerDiagnostic]) -> String {
    diagnostics
        .iter()
        .enumerate()
        .map(|(i, d)| format!("  {}. {}", i + 1, d))
        .collect::<Vec<_>>()
        .join("\n")
}

impl ParseError {
    /// Create a syntax error with location information.
    pub fn syntax(file: PathBuf, line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            file,
            line,
            column,
            message: message.into(),
        }
    }

    /// Create a marker error.
    pub fn marker(file: PathBuf, line: usize, message: impl Into<String>) -> Self {
        Self::Marker {
            file,
            line,
            message: message.into(),
        }
    }

    /// File the error belongs to.
    pub fn file(&self) -> &std::path::Path {
        match self {
            Self::Syntax { file, .. } | Self::Marker { file, .. } => file,
        }
    }
}

impl CompileError {
    /// Create an environment error.
    pub fn environment(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Environment {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Check whether the failure lies in the code rather than the environment.
    pub fn is_code_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}
