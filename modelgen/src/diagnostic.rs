//! Non-fatal problems collected during a run.

use crate::error::{ParseError, PlanError};
use std::fmt;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

/// What a diagnostic is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A hand-authored file failed to parse and was treated as empty.
    ParseFailure,
    /// A marker macro was malformed and dropped.
    InvalidMarker,
    /// Two declarations of a property disagreed; one was picked.
    MixinConflict,
    /// A content type could not be planned and was skipped.
    UnresolvableType,
}

/// A problem that did not abort the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    /// File path or content type alias the diagnostic is about.
    pub subject: String,
    pub message: String,
}

impl Diagnostic {
    /// Diagnostic for a hand-authored file problem.
    pub fn from_parse_error(error: &ParseError) -> Self {
        let kind = match error {
            ParseError::Syntax { .. } => DiagnosticKind::ParseFailure,
            ParseError::Marker { .. } => DiagnosticKind::InvalidMarker,
        };
        Self {
            severity: Severity::Error,
            kind,
            subject: error.file().display().to_string(),
            message: error.to_string(),
        }
    }

    /// Diagnostic for a content type that had to be skipped.
    pub fn unresolvable(type_alias: &str, error: &PlanError) -> Self {
        Self {
            severity: Severity::Error,
            kind: DiagnosticKind::UnresolvableType,
            subject: type_alias.to_string(),
            message: error.to_string(),
        }
    }

    /// Diagnostic for a property conflict settled by precedence.
    pub fn mixin_conflict(type_alias: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            kind: DiagnosticKind::MixinConflict,
            subject: type_alias.to_string(),
            message: message.into(),
        }
    }

    /// Whether this diagnostic is an error.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{} [{}]: {}", level, self.subject, self.message)
    }
}
