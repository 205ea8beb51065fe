// crates/glint-types/src/checker_tests.rs
// Comprehensive tests for the semantic checker

use super::checker::{TypeChecker, TypeError};
use crate::profile::CapabilityProfile;
use crate::tir::{ConstValue, ExprKind, Program, Stmt, Storage};
use crate::types::{ScalarKind, Type, FLOAT, INT, UINT};
use glint_ast::ast::{BinOp, Expr, Ident, Lit, UnOp};
use glint_ast::diag::{Diagnostic, Severity, Stage};
use glint_ast::limits::Limits;
use glint_ast::span::Span;
use glint_parse::parse_str;

// Helper functions

fn sp() -> Span {
    Span::default()
}

fn ident(name: &str) -> Ident {
    Ident {
        text: name.to_string(),
        span: sp(),
    }
}

fn int(v: i32) -> Expr {
    Expr::Lit(Lit::Int(v), sp())
}

fn float(v: f32) -> Expr {
    Expr::Lit(Lit::Float(v), sp())
}

fn bin(lhs: Expr, op: BinOp, rhs: Expr) -> Expr {
    Expr::Binary {
        lhs: Box::new(lhs),
        op,
        rhs: Box::new(rhs),
        span: sp(),
    }
}

fn run(src: &str, profile: &CapabilityProfile) -> Result<(Program, Vec<Diagnostic>), Vec<Diagnostic>> {
    let unit = parse_str(src, &profile.limits)
        .unwrap_or_else(|e| panic!("parse failed: {:?}", e))
        .value;
    TypeChecker::new(profile)
        .check(&unit)
        .map(|staged| (staged.value, staged.warnings))
}

fn check_ok(src: &str) -> Program {
    run(src, &CapabilityProfile::default())
        .unwrap_or_else(|e| panic!("expected success, got {:?}", e))
        .0
}

fn check_errs_with(src: &str, profile: &CapabilityProfile) -> Vec<String> {
    let diags = run(src, profile).expect_err("expected semantic errors");
    diags
        .iter()
        .filter(|d| d.is_error())
        .map(|d| d.message.clone())
        .collect()
}

fn check_err(src: &str) -> String {
    let errs = check_errs_with(src, &CapabilityProfile::default());
    assert!(!errs.is_empty(), "no error diagnostics");
    errs[0].clone()
}

fn main_body(program: &Program) -> &[Stmt] {
    let entry = program.entry.expect("entry point");
    &program.function(entry).body
}

// ============================================================================
// POSITIVE TESTS - Expressions checked in isolation
// ============================================================================

#[test]
fn test_integer_arithmetic_folds() {
    let profile = CapabilityProfile::default();
    let mut tc = TypeChecker::new(&profile);
    let e = tc.expr(&bin(int(2), BinOp::Mul, bin(int(3), BinOp::Add, int(4)))).unwrap();
    assert_eq!(e.ty, INT);
    assert_eq!(e.as_const(), Some(&ConstValue::Int(14)));
}

#[test]
fn test_mixed_literal_promotes_to_float() {
    let profile = CapabilityProfile::default();
    let mut tc = TypeChecker::new(&profile);
    let e = tc.expr(&bin(int(1), BinOp::Add, float(0.5))).unwrap();
    assert_eq!(e.ty, FLOAT);
    assert_eq!(e.as_const(), Some(&ConstValue::Float(1.5)));
}

#[test]
fn test_logical_not_folds() {
    let profile = CapabilityProfile::default();
    let mut tc = TypeChecker::new(&profile);
    let e = tc
        .expr(&Expr::Unary {
            op: UnOp::Not,
            expr: Box::new(Expr::Lit(Lit::Bool(false), sp())),
            span: sp(),
        })
        .unwrap();
    assert_eq!(e.as_const(), Some(&ConstValue::Bool(true)));
}

#[test]
fn test_builtin_constant_resolves_from_profile() {
    let profile = CapabilityProfile::builder()
        .max_compute_image_uniforms(4)
        .build();
    let mut tc = TypeChecker::new(&profile);
    let e = tc.expr(&Expr::Var(ident("gl_MaxComputeImageUniforms"))).unwrap();
    assert_eq!(e.ty, INT);
    assert_eq!(e.as_const(), Some(&ConstValue::Int(4)));
}

#[test]
fn test_builtin_input_has_uvec3_type() {
    let profile = CapabilityProfile::default();
    let mut tc = TypeChecker::new(&profile);
    let e = tc.expr(&Expr::Var(ident("gl_GlobalInvocationID"))).unwrap();
    assert_eq!(e.ty, Type::Vector(ScalarKind::Uint, 3));
    assert!(matches!(e.kind, ExprKind::Builtin(_)));
}

// ============================================================================
// POSITIVE TESTS - Whole shaders
// ============================================================================

#[test]
fn test_minimal_shader() {
    let program = check_ok("#version 450\nvoid main() {}");
    assert!(program.entry.is_some());
    assert_eq!(program.local_size, None);
    assert!(program.globals.is_empty());
}

#[test]
fn test_local_size_is_recorded() {
    let program = check_ok(
        "#version 450\nlayout(local_size_x = 64, local_size_y = 2) in;\nvoid main() {}",
    );
    assert_eq!(program.local_size, Some([64, 2, 1]));
}

#[test]
fn test_local_size_may_be_split_across_declarations() {
    let program = check_ok(
        "layout(local_size_x = 8) in;\nlayout(local_size_y = 8) in;\nlayout(local_size_x = 8) in;\nvoid main() {}",
    );
    assert_eq!(program.local_size, Some([8, 8, 1]));
}

#[test]
fn test_workgroup_size_constant_follows_local_size() {
    let program = check_ok(
        "layout(local_size_x = 16) in;\nlayout(std430, binding = 0) buffer B { uint n; };\nvoid main() { n = gl_WorkGroupSize.x; }",
    );
    assert!(program.features.workgroup_size);
    let mut found = false;
    for s in main_body(&program) {
        s.walk_exprs(&mut |e| {
            if e.as_const() == Some(&ConstValue::Uint(16)) {
                found = true;
            }
        });
    }
    assert!(found, "gl_WorkGroupSize.x should fold to 16");
}

#[test]
fn test_buffer_block_members_are_visible() {
    let program = check_ok(
        "layout(std430, binding = 1) buffer Data { float values[]; };\n\
         void main() { values[gl_GlobalInvocationID.x] *= 2.0; }",
    );
    assert_eq!(program.globals.len(), 1);
    let g = &program.globals[0];
    assert_eq!(g.storage, Storage::Buffer);
    assert_eq!(g.binding, Some(1));
    let Type::Struct(id) = g.ty else {
        panic!("block global should have a struct type, got {:?}", g.ty);
    };
    assert!(program.struct_def(id).block.is_some());
}

#[test]
fn test_runtime_array_length() {
    let program = check_ok(
        "layout(std430) buffer Data { uint count; float v[]; } data;\n\
         void main() { data.count = uint(data.v.length()); }",
    );
    let mut saw_length = false;
    for s in main_body(&program) {
        s.walk_exprs(&mut |e| {
            if matches!(e.kind, ExprKind::ArrayLength(_)) {
                saw_length = true;
            }
        });
    }
    assert!(saw_length);
}

#[test]
fn test_fixed_array_length_is_constant() {
    let program = check_ok("void main() { float a[5]; int n = a.length(); }");
    let mut saw = false;
    for s in main_body(&program) {
        s.walk_exprs(&mut |e| {
            if e.as_const() == Some(&ConstValue::Int(5)) {
                saw = true;
            }
        });
    }
    assert!(saw);
}

#[test]
fn test_const_global_sizes_array() {
    let program = check_ok("const int N = 4;\nshared float tile[N * 2];\nvoid main() { tile[0] = 1.0; }");
    let shared = program.globals.iter().find(|g| g.name == "tile").unwrap();
    assert_eq!(shared.storage, Storage::Shared);
    assert_eq!(shared.ty, Type::Array(Box::new(FLOAT), crate::types::ArraySize::Fixed(8)));
}

#[test]
fn test_implicit_conversion_inserts_convert() {
    let program = check_ok("void main() { int i = 3; float f = i; }");
    let body = main_body(&program);
    let Stmt::Init(_, value) = &body[1] else {
        panic!("expected an initializer, got {:?}", body[1]);
    };
    assert_eq!(value.ty, FLOAT);
    assert!(matches!(value.kind, ExprKind::Convert(_)));
}

#[test]
fn test_unsized_local_array_takes_initializer_size() {
    let program = check_ok("void main() { float a[] = float[](1.0, 2.0, 3.0); }");
    let f = program.function(program.entry.unwrap());
    assert_eq!(
        f.locals[0].ty,
        Type::Array(Box::new(FLOAT), crate::types::ArraySize::Fixed(3))
    );
}

#[test]
fn test_vector_constructor_from_parts() {
    let program = check_ok("void main() { vec2 a = vec2(1.0); vec4 b = vec4(a, 0.0, 1.0); }");
    let body = main_body(&program);
    let Stmt::Init(_, value) = &body[0] else { panic!() };
    // constant splat folds to a composite
    assert_eq!(
        value.as_const(),
        Some(&ConstValue::Composite(vec![ConstValue::Float(1.0), ConstValue::Float(1.0)]))
    );
    let Stmt::Init(_, value) = &body[1] else { panic!() };
    assert_eq!(value.ty, Type::Vector(ScalarKind::Float, 4));
}

#[test]
fn test_matrix_from_larger_matrix_resizes() {
    let program = check_ok("void main() { mat3 a = mat3(2.0); mat2 b = mat2(a); }");
    let body = main_body(&program);
    let Stmt::Init(_, value) = &body[1] else { panic!() };
    assert!(matches!(value.kind, ExprKind::MatrixResize(_)));
}

#[test]
fn test_overload_prefers_exact_match() {
    let program = check_ok(
        "float f(float x) { return x; }\nint f(int x) { return x; }\nvoid main() { int r = f(1); }",
    );
    let body = main_body(&program);
    let Stmt::Init(_, value) = &body[0] else { panic!() };
    assert_eq!(value.ty, INT);
}

#[test]
fn test_overload_accepts_implicit_conversion() {
    let program = check_ok("float twice(float x) { return 2.0 * x; }\nvoid main() { float r = twice(3); }");
    let body = main_body(&program);
    let Stmt::Init(_, value) = &body[0] else { panic!() };
    let ExprKind::Call(_, args) = &value.kind else {
        panic!("expected a call, got {:?}", value.kind);
    };
    assert_eq!(args[0].ty, FLOAT);
}

#[test]
fn test_prototype_then_definition() {
    let program = check_ok("float g(float x);\nvoid main() { float y = g(1.0); }\nfloat g(float x) { return x; }");
    let defined: Vec<_> = program.functions.iter().filter(|f| f.defined).map(|f| f.name.as_str()).collect();
    assert!(defined.contains(&"g"));
}

#[test]
fn test_inductive_loop_allows_indexing_when_general_indexing_is_off() {
    let mut profile = CapabilityProfile::default();
    profile.limits = Limits {
        general_variable_indexing: false,
        non_inductive_for_loops: false,
        ..Limits::default()
    };
    let src = "void main() { float a[4]; float s = 0.0; for (int i = 0; i < 4; i++) { s += a[i]; } }";
    assert!(run(src, &profile).is_ok());
}

#[test]
fn test_switch_falls_through_into_cases() {
    let program = check_ok(
        "void main() { int x = 1; switch (x) { case 0: case 1: x = 2; break; default: x = 3; } }",
    );
    let body = main_body(&program);
    let Stmt::Switch { cases, .. } = &body[1] else {
        panic!("expected switch, got {:?}", body[1]);
    };
    assert_eq!(cases.len(), 2);
    assert_eq!(cases[0].values, vec![0, 1]);
    assert!(cases[1].is_default);
}

#[test]
fn test_image_store_with_format() {
    let program = check_ok(
        "layout(local_size_x = 8, local_size_y = 8) in;\n\
         layout(rgba8, binding = 0) uniform image2D img;\n\
         void main() { imageStore(img, ivec2(gl_GlobalInvocationID.xy), vec4(1.0)); }",
    );
    assert!(!program.features.write_without_format);
}

#[test]
fn test_writeonly_image_without_format() {
    let program = check_ok(
        "layout(binding = 0) writeonly uniform image2D img;\nvoid main() { imageStore(img, ivec2(0), vec4(0.0)); }",
    );
    assert!(program.features.write_without_format);
}

#[test]
fn test_shared_atomics() {
    let program = check_ok("shared uint counter;\nvoid main() { uint old = atomicAdd(counter, 1u); }");
    let body = main_body(&program);
    let Stmt::Init(_, value) = &body[0] else { panic!() };
    assert_eq!(value.ty, UINT);
}

#[test]
fn test_non_constant_global_initializer_is_deferred() {
    let program = check_ok("float scale = sqrt(2.0);\nvoid main() { scale += 1.0; }");
    assert_eq!(program.global_inits.len(), 1);
}

#[test]
fn test_reserved_double_underscore_only_warns() {
    let (_, warnings) = run("void main() { int a__b = 1; }", &CapabilityProfile::default()).unwrap();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].severity, Severity::Warning);
    assert!(warnings[0].message.contains("'__'"));
}

// ============================================================================
// NEGATIVE TESTS - Names and declarations
// ============================================================================

#[test]
fn test_undeclared_identifier() {
    assert_eq!(check_err("void main() { x = 1; }"), "undeclared identifier 'x'");
}

#[test]
fn test_redefinition_points_at_first_declaration() {
    let diags = run("void main() { int a; float a; }", &CapabilityProfile::default()).unwrap_err();
    let d = &diags[0];
    assert_eq!(d.message, "redefinition of 'a'");
    assert_eq!(d.stage, Stage::Semantic);
    assert_eq!(d.notes.len(), 1);
    assert!(d.notes[0].message.contains("first declared here"));
    assert!(d.notes[0].span.start < d.span.unwrap().start);
}

#[test]
fn test_gl_prefix_is_reserved() {
    assert!(check_err("void main() { int gl_x; }").contains("reserved"));
}

#[test]
fn test_unknown_type() {
    // inside a body an unknown name never parses as a type; signatures reach the checker
    assert_eq!(
        check_err("void helper(Foo f) {}\nvoid main() {}"),
        "unknown type 'Foo'"
    );
}

#[test]
fn test_errors_from_several_declarations_are_collected() {
    let errs = check_errs_with(
        "uniform float a;\nin vec3 b;\nvoid main() {}",
        &CapabilityProfile::default(),
    );
    assert_eq!(errs.len(), 2, "{errs:?}");
    assert!(errs[0].contains("uniform block"));
    assert!(errs[1].contains("'in' variables"));
}

// ============================================================================
// NEGATIVE TESTS - Entry point and compute restrictions
// ============================================================================

#[test]
fn test_missing_main() {
    assert_eq!(
        check_err("void helper() {}"),
        "missing entry point: no 'main' function is defined"
    );
}

#[test]
fn test_duplicate_main_lists_every_site() {
    let diags = run("void main() {}\nvoid main() {}", &CapabilityProfile::default()).unwrap_err();
    let main_errs: Vec<_> = diags.iter().filter(|d| d.message.contains("'main'")).collect();
    assert!(!main_errs.is_empty());
}

#[test]
fn test_local_size_zero() {
    assert_eq!(
        check_err("layout(local_size_x = 0) in;\nvoid main() {}"),
        "local_size_x must be at least 1"
    );
}

#[test]
fn test_local_size_over_limit() {
    let msg = check_err("layout(local_size_x = 4096) in;\nvoid main() {}");
    assert!(msg.contains("MaxComputeWorkGroupSizeX"), "{msg}");
    assert!(msg.contains("4096"), "{msg}");
}

#[test]
fn test_conflicting_local_size() {
    let msg = check_err("layout(local_size_x = 8) in;\nlayout(local_size_x = 4) in;\nvoid main() {}");
    assert!(msg.contains("redeclared"), "{msg}");
}

#[test]
fn test_discard_is_rejected() {
    assert!(check_err("void main() { discard; }").contains("fragment"));
}

#[test]
fn test_texture_is_unavailable() {
    let msg = check_err(
        "layout(binding = 0) uniform sampler2D s;\nvoid main() { vec4 c = texture(s, vec2(0.0)); }",
    );
    assert!(msg.starts_with("'texture'"), "{msg}");
}

#[test]
fn test_shared_initializer() {
    assert_eq!(
        check_err("shared float s = 1.0;\nvoid main() {}"),
        "shared variables cannot be initialized"
    );
}

#[test]
fn test_double_in_es() {
    let msg = check_err("#version 310 es\nvoid main() { double d = 1.0; }");
    assert!(msg.contains("double-precision"), "{msg}");
}

// ============================================================================
// NEGATIVE TESTS - Resources
// ============================================================================

#[test]
fn test_std430_uniform_block() {
    assert!(check_err("layout(std430) uniform U { float x; };\nvoid main() {}").contains("std430"));
}

#[test]
fn test_runtime_array_must_be_last() {
    let msg = check_err("buffer B { float v[]; float tail; };\nvoid main() {}");
    assert!(msg.contains("only the last member"), "{msg}");
}

#[test]
fn test_readonly_buffer_is_not_assignable() {
    let msg = check_err("readonly buffer B { float v; };\nvoid main() { v = 1.0; }");
    assert!(msg.contains("readonly"), "{msg}");
}

#[test]
fn test_uniform_block_is_not_assignable() {
    let msg = check_err("uniform U { float v; };\nvoid main() { v = 1.0; }");
    assert!(msg.contains("read-only"), "{msg}");
}

#[test]
fn test_image_needs_format() {
    let msg = check_err("layout(binding = 0) uniform image2D img;\nvoid main() {}");
    assert!(msg.contains("format layout qualifier"), "{msg}");
}

#[test]
fn test_image_load_from_writeonly() {
    let msg = check_err(
        "layout(rgba8) writeonly uniform image2D img;\nvoid main() { vec4 c = imageLoad(img, ivec2(0)); }",
    );
    assert_eq!(msg, "cannot load from an image declared writeonly");
}

#[test]
fn test_image_atomic_needs_32_bit_format() {
    let msg = check_err(
        "layout(rgba8ui) uniform uimage2D img;\nvoid main() { imageAtomicAdd(img, ivec2(0), 1u); }",
    );
    assert!(msg.contains("r32i or r32ui"), "{msg}");
}

#[test]
fn test_atomic_on_local_is_rejected() {
    let msg = check_err("void main() { uint x = 0u; atomicAdd(x, 1u); }");
    assert!(msg.contains("buffer or shared"), "{msg}");
}

#[test]
fn test_atomic_counters_are_unsupported() {
    let msg = check_err("layout(binding = 0) uniform atomic_uint c;\nvoid main() {}");
    assert!(msg.contains("not supported when targeting Vulkan"), "{msg}");
}

#[test]
fn test_atomic_counter_limit_is_reported_first() {
    let profile = CapabilityProfile::builder().max_compute_atomic_counters(0).build();
    let errs = check_errs_with("layout(binding = 0) uniform atomic_uint c;\nvoid main() {}", &profile);
    assert!(errs.iter().any(|m| m.contains("MaxComputeAtomicCounters")), "{errs:?}");
}

#[test]
fn test_image_uniform_limit() {
    let profile = CapabilityProfile::builder().max_compute_image_uniforms(1).build();
    let errs = check_errs_with(
        "layout(r32f) uniform image2D a;\nlayout(r32f) uniform image2D b;\nvoid main() {}",
        &profile,
    );
    assert_eq!(errs.len(), 1, "{errs:?}");
    assert!(errs[0].contains("MaxComputeImageUniforms"), "{}", errs[0]);
}

// ============================================================================
// NEGATIVE TESTS - Expressions and calls
// ============================================================================

#[test]
fn test_condition_must_be_bool() {
    let msg = check_err("void main() { int x = 1; if (x) {} }");
    assert_eq!(msg, "type mismatch: expected 'bool', found 'int'");
}

#[test]
fn test_no_implicit_narrowing() {
    let msg = check_err("void main() { float f = 1.0; int i = f; }");
    assert!(msg.starts_with("type mismatch"), "{msg}");
}

#[test]
fn test_constructor_with_too_many_arguments() {
    let msg = check_err("void main() { vec3 v = vec3(1.0, 2.0, 3.0, 4.0); }");
    assert!(msg.contains("too many arguments"), "{msg}");
}

#[test]
fn test_constructor_with_too_few_components() {
    let msg = check_err("void main() { vec3 v = vec3(1.0, 2.0); }");
    assert!(msg.contains("not enough data"), "{msg}");
}

#[test]
fn test_swizzle_with_repeated_components_is_not_assignable() {
    let msg = check_err("void main() { vec4 v; v.xx = vec2(1.0); }");
    assert!(msg.contains("repeated components"), "{msg}");
}

#[test]
fn test_const_local_is_not_assignable() {
    let msg = check_err("void main() { int a = 1; const int k = a; k = 2; }");
    assert!(msg.contains("declared const"), "{msg}");
    let msg = check_err("void main() { const int k = 1; k = 2; }");
    assert_eq!(msg, "cannot assign to a constant expression");
}

#[test]
fn test_constant_index_out_of_range() {
    let msg = check_err("void main() { float a[2]; a[2] = 1.0; }");
    assert!(msg.contains("out of range"), "{msg}");
}

#[test]
fn test_division_by_constant_zero() {
    assert!(check_err("void main() { int x = 1 / 0; }").contains("division by zero"));
}

#[test]
fn test_call_before_declaration() {
    let msg = check_err("void main() { helper(); }\nvoid helper() {}");
    assert!(msg.contains("called before it is declared"), "{msg}");
}

#[test]
fn test_ambiguous_overload() {
    let msg = check_err(
        "void f(float a, int b) {}\nvoid f(int a, float b) {}\nvoid main() { f(1, 1); }",
    );
    assert!(msg.starts_with("ambiguous call"), "{msg}");
}

#[test]
fn test_out_argument_needs_lvalue() {
    let msg = check_err("void set(out float x) { x = 1.0; }\nvoid main() { set(2.0); }");
    assert!(msg.starts_with("cannot assign to"), "{msg}");
}

#[test]
fn test_wrong_arity_of_user_function() {
    let msg = check_err("void f(int a) {}\nvoid main() { f(1, 2); }");
    assert!(msg.contains("no matching overload") || msg.contains("expects"), "{msg}");
}

#[test]
fn test_typed_error_span_and_display() {
    let err = TypeError::LimitExceeded {
        what: "local_size_x".to_string(),
        limit: "MaxComputeWorkGroupSizeX",
        max: 1024,
        found: 2048,
        span: Span::new(3, 9),
    };
    assert_eq!(err.span(), Some(Span::new(3, 9)));
    assert_eq!(
        err.to_string(),
        "local_size_x (2048) exceeds MaxComputeWorkGroupSizeX (1024)"
    );
    let d = err.to_diagnostic();
    assert_eq!(d.kind_name(), "SemanticError");
}

// ============================================================================
// NEGATIVE TESTS - Statements
// ============================================================================

#[test]
fn test_break_outside_loop() {
    assert_eq!(
        check_err("void main() { break; }"),
        "'break' outside of a loop or switch"
    );
}

#[test]
fn test_return_value_from_void_function() {
    assert_eq!(
        check_err("void main() { return 1; }"),
        "a void function cannot return a value"
    );
}

#[test]
fn test_duplicate_case_label() {
    let diags = run(
        "void main() { int x = 0; switch (x) { case 1: break; case 1: break; } }",
        &CapabilityProfile::default(),
    )
    .unwrap_err();
    assert_eq!(diags[0].message, "duplicate case label '1' in switch statement");
    assert_eq!(diags[0].notes[0].message, "first used here");
}

#[test]
fn test_statement_before_first_case() {
    let msg = check_err("void main() { int x = 0; switch (x) { x = 1; case 0: break; } }");
    assert!(msg.contains("before the first case label"), "{msg}");
}

#[test]
fn test_switch_ending_with_label() {
    let msg = check_err("void main() { int x = 0; switch (x) { case 0: break; case 1: } }");
    assert!(msg.contains("cannot end with a case label"), "{msg}");
}

#[test]
fn test_non_inductive_loop_rejected_when_disabled() {
    let mut profile = CapabilityProfile::default();
    profile.limits.non_inductive_for_loops = false;
    let errs = check_errs_with("void main() { int n = 3; for (int i = 0; i < n; i++) {} }", &profile);
    assert!(errs[0].contains("'for' loops of the form"), "{}", errs[0]);
}

#[test]
fn test_loop_index_modified_in_body_when_strict() {
    let mut profile = CapabilityProfile::default();
    profile.limits.non_inductive_for_loops = false;
    let errs = check_errs_with("void main() { for (int i = 0; i < 4; i++) { i = 2; } }", &profile);
    assert!(errs[0].contains("cannot be modified"), "{}", errs[0]);
}

#[test]
fn test_variable_indexing_rejected_when_disabled() {
    let mut profile = CapabilityProfile::default();
    profile.limits.general_variable_indexing = false;
    let errs = check_errs_with("void main() { float a[4]; int k = 1; k += 1; a[k] = 0.0; }", &profile);
    assert!(errs[0].contains("general_variable_indexing"), "{}", errs[0]);
}

#[test]
fn test_opaque_local_rejected() {
    let msg = check_err("void main() { image2D img; }");
    assert!(msg.contains("opaque type"), "{msg}");
}
