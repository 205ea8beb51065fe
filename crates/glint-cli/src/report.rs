//! Failure reports: every diagnostic of a failed compilation rendered as one
//! stable block of text.
//!
//! ```text
//! Error generated when compiling shader 'blur.comp' (semantic analysis)
//! blur.comp:4:5: SemanticError: 'tmp' is not declared
//! blur.comp:9:1: warning: unused parameter 'n'
//!   note: blur.comp:2:3: declared here
//! 1 compilation errors.  No code generated.
//! ```

use std::fmt::Write;

use glint_ast::diag::{Diagnostic, Stage};
use glint_ast::span::{LineIndex, Span};

/// The trailer a failed stage leaves in its log.
pub fn debug_log(diagnostics: &[Diagnostic]) -> String {
    let errors = diagnostics.iter().filter(|d| d.is_error()).count();
    format!("{} compilation errors.  No code generated.", errors)
}

/// Render the report for a compilation that failed in `stage`.
///
/// Diagnostics keep the order they are given in. Spans are resolved against
/// `source`; a diagnostic without a span is reported against the name alone.
pub fn render_report(
    debug_name: &str,
    source: &str,
    stage: Stage,
    diagnostics: &[Diagnostic],
    debug_log: &str,
) -> String {
    let index = LineIndex::new(source);
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(
        out,
        "Error generated when compiling shader '{}' ({})",
        debug_name, stage
    );
    for d in diagnostics {
        let _ = writeln!(
            out,
            "{}: {}: {}",
            position(debug_name, &index, d.span),
            d.kind_name(),
            d.message
        );
        for note in &d.notes {
            let _ = writeln!(
                out,
                "  note: {}: {}",
                position(debug_name, &index, Some(note.span)),
                note.message
            );
        }
    }
    out.push_str(debug_log);
    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    out
}

fn position(name: &str, index: &LineIndex, span: Option<Span>) -> String {
    match span {
        Some(span) => {
            let loc = index.location(span);
            format!("{}:{}:{}", name, loc.line, loc.column)
        }
        None => name.to_string(),
    }
}
