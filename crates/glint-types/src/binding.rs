//! Descriptor binding assignment and link-time checks.
//!
//! Runs after semantic analysis on a program that type-checked. Explicit
//! `set`/`binding` pairs are kept as written; every other resource receives
//! the lowest free binding of its set, in declaration order, once all
//! explicit bindings have been reserved.

use std::collections::{BTreeSet, HashMap};

use crate::tir::{ExprKind, FuncId, GlobalId, Program};
use crate::types::Type;
use glint_ast::diag::{Diagnostic, Stage};
use glint_ast::span::Span;

/// Assign descriptor slots and run the link checks.
///
/// On success the warnings are returned; on failure every diagnostic
/// (warnings included) is.
pub fn map_bindings(program: &mut Program) -> Result<Vec<Diagnostic>, Vec<Diagnostic>> {
    let mut linker = Linker::default();
    linker.entry_point(program);
    linker.undefined_calls(program);
    linker.recursion(program);
    linker.descriptors(program);
    linker.locations(program);
    linker.local_size(program);

    let Linker { errors, mut warnings } = linker;
    if errors.is_empty() {
        return Ok(warnings);
    }
    log::debug!("binding found {} errors", errors.len());
    warnings.extend(errors);
    warnings.sort_by_key(|d| d.span.map_or(u32::MAX, |s| s.start));
    Err(warnings)
}

#[derive(Default)]
struct Linker {
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
}

impl Linker {
    /// Link checks other than slot collisions report as semantic errors.
    fn error(&mut self, message: impl Into<String>, span: Span) {
        self.errors.push(Diagnostic::error(Stage::Semantic, message).at(span));
    }

    fn entry_point(&mut self, program: &Program) {
        let Some(entry) = program.entry else {
            self.errors.push(Diagnostic::error(
                Stage::Semantic,
                "missing entry point: no 'main' function is defined",
            ));
            return;
        };
        let f = program.function(entry);
        if f.ret != Type::Void || !f.params.is_empty() {
            self.error("the entry point must be declared as 'void main()'", f.span);
        }
    }

    fn undefined_calls(&mut self, program: &Program) {
        let mut reported = BTreeSet::new();
        for f in program.functions.iter().filter(|f| f.defined) {
            let mut calls = Vec::new();
            for s in &f.body {
                s.walk_exprs(&mut |e| {
                    if let ExprKind::Call(callee, _) = &e.kind {
                        calls.push((*callee, e.span));
                    }
                });
            }
            for (callee, span) in calls {
                let target = program.function(callee);
                if !target.defined && reported.insert(callee) {
                    self.errors.push(
                        Diagnostic::error(
                            Stage::Semantic,
                            format!("function '{}' is called but never defined", target.name),
                        )
                        .at(span)
                        .with_note(target.span, "declared here"),
                    );
                }
            }
        }
    }

    /// Static recursion through any call chain is rejected.
    fn recursion(&mut self, program: &Program) {
        let graph: Vec<Vec<FuncId>> = program
            .functions
            .iter()
            .map(|f| {
                let mut callees = Vec::new();
                for s in &f.body {
                    s.walk_exprs(&mut |e| {
                        if let ExprKind::Call(callee, _) = &e.kind {
                            if !callees.contains(callee) {
                                callees.push(*callee);
                            }
                        }
                    });
                }
                callees
            })
            .collect();

        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            Active,
            Done,
        }
        let mut marks = vec![Mark::New; graph.len()];
        let mut path: Vec<FuncId> = Vec::new();

        fn visit(
            node: FuncId,
            graph: &[Vec<FuncId>],
            marks: &mut [Mark],
            path: &mut Vec<FuncId>,
            cycles: &mut Vec<Vec<FuncId>>,
        ) {
            marks[node.0 as usize] = Mark::Active;
            path.push(node);
            for &next in &graph[node.0 as usize] {
                match marks[next.0 as usize] {
                    Mark::New => visit(next, graph, marks, path, cycles),
                    Mark::Active => {
                        let start = path.iter().position(|f| *f == next).unwrap_or(0);
                        cycles.push(path[start..].to_vec());
                    }
                    Mark::Done => {}
                }
            }
            path.pop();
            marks[node.0 as usize] = Mark::Done;
        }

        let mut cycles = Vec::new();
        for i in 0..graph.len() {
            if marks[i] == Mark::New {
                visit(FuncId(i as u32), &graph, &mut marks, &mut path, &mut cycles);
            }
        }
        for cycle in cycles {
            let names: Vec<&str> = cycle
                .iter()
                .chain(cycle.first())
                .map(|f| program.function(*f).name.as_str())
                .collect();
            let head = program.function(cycle[0]);
            self.error(
                format!("recursion is not allowed: {}", names.join(" -> ")),
                head.span,
            );
        }
    }

    fn descriptors(&mut self, program: &mut Program) {
        let resources: Vec<usize> = program
            .globals
            .iter()
            .enumerate()
            .filter(|(_, g)| g.resource.is_some())
            .map(|(i, _)| i)
            .collect();
        log::debug!("mapping {} descriptor resources", resources.len());

        let mut taken: HashMap<(u32, u32), GlobalId> = HashMap::new();
        for &i in &resources {
            let g = &mut program.globals[i];
            let set = *g.set.get_or_insert(0);
            let Some(binding) = g.binding else {
                continue;
            };
            if let Some(&first) = taken.get(&(set, binding)) {
                self.conflict(program, first, GlobalId(i as u32), format!("set {}, binding {}", set, binding));
            } else {
                taken.insert((set, binding), GlobalId(i as u32));
            }
        }

        for &i in &resources {
            let g = &mut program.globals[i];
            if g.binding.is_some() {
                continue;
            }
            let set = g.set.unwrap_or(0);
            let binding = (0u32..)
                .find(|b| !taken.contains_key(&(set, *b)))
                .unwrap_or(u32::MAX);
            g.binding = Some(binding);
            taken.insert((set, binding), GlobalId(i as u32));
            log::trace!("'{}' -> set {}, binding {}", g.name, set, binding);
        }
    }

    fn locations(&mut self, program: &Program) {
        let mut taken: HashMap<u32, GlobalId> = HashMap::new();
        for (i, g) in program.globals.iter().enumerate() {
            let Some(location) = g.location else {
                continue;
            };
            let id = GlobalId(i as u32);
            match taken.get(&location) {
                Some(&first) => self.conflict(program, first, id, format!("location {}", location)),
                None => {
                    taken.insert(location, id);
                }
            }
        }
    }

    fn conflict(&mut self, program: &Program, first: GlobalId, second: GlobalId, slot: String) {
        let a = program.global(first);
        let b = program.global(second);
        let d = Diagnostic::error(
            Stage::Binding,
            format!("'{}' and '{}' both use {}", b.name, a.name, slot),
        )
        .at(b.span)
        .with_note(a.span, format!("'{}' is declared here", a.name));
        self.errors.push(d);
    }

    fn local_size(&mut self, program: &mut Program) {
        if program.local_size.is_some() {
            return;
        }
        program.local_size = Some([1, 1, 1]);
        let mut d = Diagnostic::warning(
            Stage::Binding,
            "no local_size_x/y/z declared; using a work group size of 1, 1, 1",
        );
        if let Some(entry) = program.entry {
            d = d.at(program.function(entry).span);
        }
        log::warn!("{}", d.message);
        self.warnings.push(d);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tir::{Function, GlobalVar, MemoryFlags, ResourceKind, Storage};

    fn resource(name: &str, set: Option<u32>, binding: Option<u32>, at: u32) -> GlobalVar {
        GlobalVar {
            name: name.to_string(),
            ty: Type::Void,
            storage: Storage::Uniform,
            resource: Some(ResourceKind::Image),
            set,
            binding,
            location: None,
            memory: MemoryFlags::default(),
            init: None,
            read_only: false,
            span: Span::new(at, at + 1),
        }
    }

    fn program(globals: Vec<GlobalVar>) -> Program {
        Program {
            globals,
            functions: vec![Function {
                name: "main".to_string(),
                params: Vec::new(),
                ret: Type::Void,
                locals: Vec::new(),
                body: Vec::new(),
                defined: true,
                span: Span::new(100, 104),
            }],
            entry: Some(FuncId(0)),
            local_size: Some([4, 4, 1]),
            ..Program::default()
        }
    }

    #[test]
    fn implicit_bindings_skip_explicit_ones() {
        let mut p = program(vec![
            resource("a", None, None, 0),
            resource("b", None, Some(0), 10),
            resource("c", None, None, 20),
            resource("d", Some(1), None, 30),
        ]);
        let warnings = map_bindings(&mut p).unwrap();
        assert!(warnings.is_empty());
        let slots: Vec<_> = p.globals.iter().map(|g| (g.set, g.binding)).collect();
        assert_eq!(
            slots,
            vec![(Some(0), Some(1)), (Some(0), Some(0)), (Some(0), Some(2)), (Some(1), Some(0))]
        );
    }

    #[test]
    fn explicit_collision_names_both_sites() {
        let mut p = program(vec![resource("a", None, Some(2), 0), resource("b", Some(0), Some(2), 10)]);
        let diags = map_bindings(&mut p).unwrap_err();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind_name(), "BindingConflictError");
        assert_eq!(diags[0].message, "'b' and 'a' both use set 0, binding 2");
        assert_eq!(diags[0].span, Some(Span::new(10, 11)));
        assert_eq!(diags[0].notes[0].span, Span::new(0, 1));
    }

    #[test]
    fn missing_local_size_defaults_with_warning() {
        let mut p = program(Vec::new());
        p.local_size = None;
        let warnings = map_bindings(&mut p).unwrap();
        assert_eq!(p.local_size, Some([1, 1, 1]));
        assert_eq!(warnings.len(), 1);
        assert!(!warnings[0].is_error());
    }

    #[test]
    fn entry_point_must_return_void() {
        let mut p = program(Vec::new());
        p.functions[0].ret = crate::types::INT;
        let diags = map_bindings(&mut p).unwrap_err();
        assert!(diags[0].message.contains("void main()"));
    }
}
