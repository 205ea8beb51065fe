//! Diagnostic records shared by every compiler stage.

use super::span::Span;
use serde::Serialize;
use std::fmt;

/// The pipeline stage that produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Stage {
    Syntax,
    Semantic,
    Binding,
    CodeGen,
}

impl Stage {
    /// Error class reported for error-severity diagnostics of this stage.
    pub fn error_kind(self) -> &'static str {
        match self {
            Stage::Syntax => "SyntaxError",
            Stage::Semantic => "SemanticError",
            Stage::Binding => "BindingConflictError",
            Stage::CodeGen => "CodeGenError",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Syntax => "parsing",
            Stage::Semantic => "semantic analysis",
            Stage::Binding => "binding",
            Stage::CodeGen => "code generation",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Error,
    Warning,
}

/// Secondary location attached to a diagnostic ("first declared here").
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Label {
    pub span: Span,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub stage: Stage,
    pub severity: Severity,
    pub message: String,
    pub span: Option<Span>,
    pub notes: Vec<Label>,
}

impl Diagnostic {
    pub fn error(stage: Stage, message: impl Into<String>) -> Self {
        Diagnostic {
            stage,
            severity: Severity::Error,
            message: message.into(),
            span: None,
            notes: Vec::new(),
        }
    }

    pub fn warning(stage: Stage, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            ..Diagnostic::error(stage, message)
        }
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_note(mut self, span: Span, message: impl Into<String>) -> Self {
        self.notes.push(Label {
            span,
            message: message.into(),
        });
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// `SyntaxError`, `SemanticError`, ... for errors, `warning` otherwise.
    pub fn kind_name(&self) -> &'static str {
        match self.severity {
            Severity::Error => self.stage.error_kind(),
            Severity::Warning => "warning",
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind_name(), self.message)
    }
}

impl std::error::Error for Diagnostic {}

pub fn has_errors(diags: &[Diagnostic]) -> bool {
    diags.iter().any(Diagnostic::is_error)
}

/// Output of a stage that completed: its value plus non-fatal warnings.
#[derive(Debug)]
pub struct Staged<T> {
    pub value: T,
    pub warnings: Vec<Diagnostic>,
}

impl<T> Staged<T> {
    pub fn new(value: T, warnings: Vec<Diagnostic>) -> Self {
        Staged { value, warnings }
    }
}

/// A stage either completes or hands back every diagnostic it collected
/// (at least one of them an error).
pub type StageResult<T> = Result<Staged<T>, Vec<Diagnostic>>;
