//! The per-call compile pipeline.
//!
//! One [`Compilation`] walks `Idle -> Parsing -> Analyzing -> Mapping ->
//! Generating -> Done`. Transitions only move forward and the first stage
//! that reports an error ends the walk with a failure. Warnings collected
//! along the way are logged and appear in a failure report, but never block
//! success.

use std::fmt;

use glint_ast::diag::{Diagnostic, Stage};
use glint_parse::parse_str;
use glint_spirv::BinaryModule;
use glint_types::{map_bindings, CapabilityProfile, TypeChecker};

use crate::report::{debug_log, render_report};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum State {
    Idle,
    Parsing,
    Analyzing,
    Mapping,
    Generating,
    Done,
}

impl State {
    /// The diagnostic stage a pipeline state reports under.
    fn stage(self) -> Stage {
        match self {
            State::Idle | State::Parsing => Stage::Syntax,
            State::Analyzing => Stage::Semantic,
            State::Mapping => Stage::Binding,
            State::Generating | State::Done => Stage::CodeGen,
        }
    }
}

/// Why a compilation produced no module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileFailure {
    /// Stage that halted the pipeline; `None` when no runtime was running.
    pub stage: Option<Stage>,
    /// Warnings from earlier stages followed by the failing stage's output.
    pub diagnostics: Vec<Diagnostic>,
    pub report: String,
}

impl fmt::Display for CompileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.report)
    }
}

impl std::error::Error for CompileFailure {}

impl CompileFailure {
    pub(crate) fn not_running(debug_name: &str) -> Self {
        CompileFailure {
            stage: None,
            diagnostics: Vec::new(),
            report: format!(
                "Error generated when compiling shader '{}' (start-up)\n\
                 the shader compiler runtime is not running",
                debug_name
            ),
        }
    }
}

/// Outcome of one call: a module or a failure, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileResult {
    Success(BinaryModule),
    Failure(CompileFailure),
}

impl CompileResult {
    pub fn is_success(&self) -> bool {
        matches!(self, CompileResult::Success(_))
    }

    pub fn module(&self) -> Option<&BinaryModule> {
        match self {
            CompileResult::Success(m) => Some(m),
            CompileResult::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&CompileFailure> {
        match self {
            CompileResult::Success(_) => None,
            CompileResult::Failure(f) => Some(f),
        }
    }

    pub fn into_result(self) -> Result<BinaryModule, CompileFailure> {
        match self {
            CompileResult::Success(m) => Ok(m),
            CompileResult::Failure(f) => Err(f),
        }
    }
}

/// A single run of the pipeline over one source text.
pub struct Compilation<'a> {
    profile: &'a CapabilityProfile,
    source: &'a str,
    debug_name: &'a str,
    state: State,
    visited: Vec<State>,
    warnings: Vec<Diagnostic>,
}

impl<'a> Compilation<'a> {
    pub fn new(profile: &'a CapabilityProfile, source: &'a str, debug_name: &'a str) -> Self {
        Compilation {
            profile,
            source,
            debug_name,
            state: State::Idle,
            visited: vec![State::Idle],
            warnings: Vec::new(),
        }
    }

    fn enter(&mut self, next: State) {
        debug_assert!(next > self.state, "{:?} -> {:?}", self.state, next);
        log::debug!("{}: {:?} -> {:?}", self.debug_name, self.state, next);
        self.state = next;
        self.visited.push(next);
    }

    fn warn(&mut self, warnings: Vec<Diagnostic>) {
        for w in &warnings {
            log::warn!("{}: {}", self.debug_name, w);
        }
        self.warnings.extend(warnings);
    }

    /// Ends the walk with a failure reported under the current state.
    fn fail(&mut self, diagnostics: Vec<Diagnostic>) -> CompileResult {
        let stage = self.state.stage();
        self.enter(State::Done);
        let mut all = std::mem::take(&mut self.warnings);
        all.extend(diagnostics);
        let report = render_report(self.debug_name, self.source, stage, &all, &debug_log(&all));
        log::debug!("{}: failed during {} ({:?})", self.debug_name, stage, self.visited);
        CompileResult::Failure(CompileFailure {
            stage: Some(stage),
            diagnostics: all,
            report,
        })
    }

    /// Run every stage to completion.
    pub fn run(mut self) -> CompileResult {
        self.walk()
    }

    fn walk(&mut self) -> CompileResult {
        self.enter(State::Parsing);
        let unit = match parse_str(self.source, &self.profile.limits) {
            Ok(staged) => {
                self.warn(staged.warnings);
                staged.value
            }
            Err(diags) => return self.fail(diags),
        };

        self.enter(State::Analyzing);
        let mut program = match TypeChecker::new(self.profile).check(&unit) {
            Ok(staged) => {
                self.warn(staged.warnings);
                staged.value
            }
            Err(diags) => return self.fail(diags),
        };

        self.enter(State::Mapping);
        match map_bindings(&mut program) {
            Ok(warnings) => self.warn(warnings),
            Err(diags) => return self.fail(diags),
        }

        self.enter(State::Generating);
        match glint_spirv::generate(&program) {
            Ok(module) => {
                self.enter(State::Done);
                log::debug!(
                    "{}: generated {} words",
                    self.debug_name,
                    module.words().len()
                );
                CompileResult::Success(module)
            }
            Err(d) => self.fail(vec![d]),
        }
    }
}

/// Compile `source` against `profile` in one go.
pub fn compile_with(profile: &CapabilityProfile, source: &str, debug_name: &str) -> CompileResult {
    Compilation::new(profile, source, debug_name).run()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = "#version 450\n\
                           layout(local_size_x = 1) in;\n\
                           layout(std430, binding = 0) buffer Data { uint v[]; } data;\n\
                           void main() {}\n";

    #[test]
    fn success_visits_every_state_in_order() {
        let profile = CapabilityProfile::default();
        let mut c = Compilation::new(&profile, MINIMAL, "minimal");
        assert_eq!(c.state, State::Idle);
        assert!(c.walk().is_success());
        assert_eq!(
            c.visited,
            [
                State::Idle,
                State::Parsing,
                State::Analyzing,
                State::Mapping,
                State::Generating,
                State::Done
            ]
        );
    }

    #[test]
    fn syntax_error_skips_later_stages() {
        let profile = CapabilityProfile::default();
        let mut c = Compilation::new(&profile, "void main() { undeclared = ; }", "bad");
        let result = c.walk();
        assert_eq!(c.visited, [State::Idle, State::Parsing, State::Done]);
        let failure = result.failure().unwrap();
        assert_eq!(failure.stage, Some(Stage::Syntax));
        assert!(failure.diagnostics.iter().all(|d| d.stage == Stage::Syntax));
        assert!(failure.report.contains("SyntaxError"));
        assert!(!failure.report.contains("SemanticError"));
    }

    #[test]
    fn semantic_failure_reports_its_stage() {
        let profile = CapabilityProfile::default();
        let result = compile_with(&profile, "void main() { undeclared = 1; }", "sem.comp");
        let failure = result.into_result().unwrap_err();
        assert_eq!(failure.stage, Some(Stage::Semantic));
        assert!(failure
            .report
            .starts_with("Error generated when compiling shader 'sem.comp' (semantic analysis)"));
        assert!(failure.report.ends_with("compilation errors.  No code generated."));
    }
}
