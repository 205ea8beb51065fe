//! Descriptor binding assignment and link checks over checked programs.

use glint_ast::diag::{Diagnostic, Stage};
use glint_parse::parse_str;
use glint_types::tir::Program;
use glint_types::{map_bindings, CapabilityProfile, TypeChecker};

fn checked(src: &str) -> Program {
    let profile = CapabilityProfile::default();
    let unit = parse_str(src, &profile.limits)
        .unwrap_or_else(|e| panic!("parse failed: {:?}", e))
        .value;
    TypeChecker::new(&profile)
        .check(&unit)
        .unwrap_or_else(|e| panic!("check failed: {:?}", e))
        .value
}

fn link_ok(src: &str) -> (Program, Vec<Diagnostic>) {
    let mut p = checked(src);
    let warnings = map_bindings(&mut p).unwrap_or_else(|e| panic!("link failed: {:?}", e));
    (p, warnings)
}

fn link_err(src: &str) -> Vec<Diagnostic> {
    let mut p = checked(src);
    map_bindings(&mut p)
        .expect_err("expected a link error")
        .into_iter()
        .filter(Diagnostic::is_error)
        .collect()
}

fn slots(p: &Program) -> Vec<(&str, u32, u32)> {
    p.globals
        .iter()
        .filter(|g| g.resource.is_some())
        .map(|g| (g.name.as_str(), g.set.unwrap(), g.binding.unwrap()))
        .collect()
}

const MAIN: &str = "layout(local_size_x = 1) in;\nvoid main() {}\n";

#[test]
fn bindings_follow_declaration_order() {
    let src = format!(
        "layout(std430) buffer A {{ float a[]; }} a;\n\
         layout(std430, binding = 1) buffer B {{ float b[]; }} b;\n\
         layout(r32f) uniform image2D img;\n\
         layout(std140) uniform C {{ vec4 c; }};\n{MAIN}"
    );
    let (p, warnings) = link_ok(&src);
    assert!(warnings.is_empty(), "{warnings:?}");
    assert_eq!(slots(&p), vec![("a", 0, 0), ("b", 0, 1), ("img", 0, 2), ("C", 0, 3)]);
}

#[test]
fn mapping_is_deterministic() {
    let src = format!(
        "layout(rgba8) uniform image2D x;\nlayout(set = 1) uniform sampler2D y;\nlayout(rgba8) uniform image2D z;\n{MAIN}"
    );
    let first = slots(&link_ok(&src).0).into_iter().map(|(n, s, b)| (n.to_string(), s, b)).collect::<Vec<_>>();
    let second = slots(&link_ok(&src).0).into_iter().map(|(n, s, b)| (n.to_string(), s, b)).collect::<Vec<_>>();
    assert_eq!(first, second);
    assert_eq!(
        first,
        vec![("x".to_string(), 0, 0), ("y".to_string(), 1, 0), ("z".to_string(), 0, 1)]
    );
}

#[test]
fn sets_are_numbered_independently() {
    let src = format!(
        "layout(set = 2, binding = 0, r32f) uniform image2D a;\nlayout(set = 2, r32f) uniform image2D b;\nlayout(r32f) uniform image2D c;\n{MAIN}"
    );
    let (p, _) = link_ok(&src);
    assert_eq!(slots(&p), vec![("a", 2, 0), ("b", 2, 1), ("c", 0, 0)]);
}

#[test]
fn resource_arrays_use_one_binding() {
    let src = format!("layout(r32f) uniform image2D maps[4];\nlayout(r32f) uniform image2D next;\n{MAIN}");
    let (p, _) = link_ok(&src);
    assert_eq!(slots(&p), vec![("maps", 0, 0), ("next", 0, 1)]);
}

#[test]
fn explicit_binding_collision() {
    let src = format!(
        "layout(binding = 3) buffer A {{ float a[]; }};\nlayout(binding = 3) buffer B {{ float b[]; }};\n{MAIN}"
    );
    let errs = link_err(&src);
    assert_eq!(errs.len(), 1);
    let d = &errs[0];
    assert_eq!(d.stage, Stage::Binding);
    assert_eq!(d.kind_name(), "BindingConflictError");
    assert_eq!(d.message, "'B' and 'A' both use set 0, binding 3");
    assert_eq!(d.notes.len(), 1);
    assert!(d.notes[0].span.start < d.span.unwrap().start);
}

#[test]
fn location_collision() {
    let src = format!(
        "layout(location = 1, r32f) uniform image2D a;\nlayout(location = 1, r32f) uniform image2D b;\n{MAIN}"
    );
    let errs = link_err(&src);
    assert_eq!(errs[0].message, "'b' and 'a' both use location 1");
}

#[test]
fn missing_local_size_is_defaulted_with_a_warning() {
    let (p, warnings) = link_ok("void main() {}");
    assert_eq!(p.local_size, Some([1, 1, 1]));
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("1, 1, 1"));
}

#[test]
fn undefined_function_is_reported_at_the_call() {
    let errs = link_err("void helper();\nvoid main() { helper(); }");
    assert_eq!(errs[0].message, "function 'helper' is called but never defined");
    assert_eq!(errs[0].notes[0].message, "declared here");
    assert_eq!(errs[0].kind_name(), "SemanticError");
}

#[test]
fn recursion_is_rejected() {
    let errs = link_err("int f(int n) { return n > 0 ? f(n - 1) : 0; }\nvoid main() { f(3); }");
    assert_eq!(errs[0].message, "recursion is not allowed: f -> f");
    assert_eq!(errs[0].kind_name(), "SemanticError");
}

#[test]
fn mutual_recursion_is_rejected() {
    let errs = link_err("void b();\nvoid a() { b(); }\nvoid b() { a(); }\nvoid main() { a(); }");
    assert_eq!(errs.len(), 1);
    assert_eq!(errs[0].message, "recursion is not allowed: b -> a -> b");
}

#[test]
fn entry_point_signature() {
    let errs = link_err("int main() { return 0; }");
    assert!(errs[0].message.contains("'void main()'"));
    assert_eq!(errs[0].stage, Stage::Semantic);
}
