//! # modelgen
//!
//! Schema-driven generator of Rust content models that merges with
//! hand-authored code.
//!
//! Given a snapshot of content types and a models directory, a run deletes
//! previously generated files, scans the hand-authored ones, plans which
//! accessors are still missing and emits one `*.generated.rs` file per model
//! plus a module index. Optionally the merged file set is compiled into an
//! `rlib`.
//!
//! ## Architecture
//!
//! - [`schema`] - Content type snapshot and providers
//! - [`naming`] - Alias to identifier rules
//! - [`scanner`] - Discovery of hand-authored files
//! - [`parser`] - Existing-code scanner (members, markers, imports)
//! - [`planner`] - Generation plans, mixin composition and conflicts
//! - [`emitter`] - Deterministic source text
//! - [`compiler`] - Artifact compilation
//! - [`store`] - File store and dry-run support
//! - [`status`] - Externally visible status and dashboard
//! - [`lock`] - Per-directory run exclusion
//! - [`orchestrator`] - Run state machine
//! - [`error`] / [`diagnostic`] - Fatal errors and non-fatal diagnostics

pub mod compiler;
pub mod diagnostic;
pub mod emitter;
pub mod error;
pub mod lock;
pub mod naming;
pub mod orchestrator;
pub mod parser;
pub mod planner;
pub mod scanner;
pub mod schema;
pub mod status;
pub mod store;

// Re-export main types for convenience
pub use compiler::{CompileRequest, CompiledArtifact, CompilerBackend, RustcCompiler};
pub use diagnostic::{Diagnostic, DiagnosticKind, Severity};
pub use error::{CompileError, GenerateError, GenerateResult, PlanError, SchemaError};
pub use orchestrator::{GenerationMode, GeneratorSettings, Orchestrator, RunReport, RunState};
pub use parser::{CodeParser, ExistingCode};
pub use planner::{GenerationPlan, GenerationPlanner, PlanSet};
pub use schema::{ItemKind, JsonSchemaFile, PropertyModel, Schema, SchemaProvider, TypeModel};
pub use status::{Dashboard, GenerationStatus, JsonStatusFile, OutOfDateStatus, StatusSink};
pub use store::{FileStore, FsFileStore, WriteResult};
