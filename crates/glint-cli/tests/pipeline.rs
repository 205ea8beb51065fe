//! Whole-pipeline behaviour through an explicit runtime: determinism,
//! fail-fast ordering, resource limits and the failure report.

use glint_ast::diag::Stage;
use glint_cli::{CompileFailure, CompileResult, Runtime};
use glint_spirv::binary::literal_string;
use glint_spirv::BinaryModule;
use glint_types::CapabilityProfile;
use rspirv::spirv::{Decoration, ExecutionMode, Op};

fn runtime() -> Runtime {
    Runtime::startup(CapabilityProfile::default()).expect("default profile starts")
}

fn ok(src: &str) -> BinaryModule {
    match runtime().compile(src, "test.comp") {
        CompileResult::Success(m) => m,
        CompileResult::Failure(f) => panic!("compile failed:\n{}", f.report),
    }
}

fn fail(src: &str, name: &str) -> CompileFailure {
    runtime()
        .compile(src, name)
        .into_result()
        .expect_err("expected a compile failure")
}

fn ops(m: &BinaryModule) -> Vec<(Op, Vec<u32>)> {
    m.instructions()
        .map(|i| {
            let i = i.expect("well-formed instruction");
            (i.op().expect("known opcode"), i.operands.to_vec())
        })
        .collect()
}

/// `Binding` decoration of the global named `name`.
fn binding_of(m: &BinaryModule, name: &str) -> u32 {
    let all = ops(m);
    let id = all
        .iter()
        .find(|(o, x)| *o == Op::Name && literal_string(&x[1..]) == name)
        .map(|(_, x)| x[0])
        .unwrap_or_else(|| panic!("no global '{}'", name));
    all.iter()
        .find(|(o, x)| *o == Op::Decorate && x[0] == id && x[1] == Decoration::Binding as u32)
        .map(|(_, x)| x[2])
        .unwrap_or_else(|| panic!("'{}' has no binding", name))
}

const MINIMAL: &str = "#version 450\n\
                       layout(local_size_x = 1, local_size_y = 1, local_size_z = 1) in;\n\
                       layout(std430, binding = 0) buffer Data { uint values[]; } data;\n\
                       void main() {}\n";

#[test]
fn minimal_shader_round_trip() {
    let m = ok(MINIMAL);
    assert!(m.header().bound > 0);
    let all = ops(&m);
    let entries: Vec<_> = all.iter().filter(|(o, _)| *o == Op::EntryPoint).collect();
    assert_eq!(entries.len(), 1);
    let modes: Vec<_> = all.iter().filter(|(o, _)| *o == Op::ExecutionMode).collect();
    assert_eq!(modes.len(), 1);
    assert_eq!(modes[0].1[1..], [ExecutionMode::LocalSize as u32, 1, 1, 1]);

    let copy = BinaryModule::from_bytes(&m.to_bytes()).unwrap();
    assert_eq!(copy, m);
}

#[test]
fn repeated_compiles_are_identical() {
    let src = "layout(local_size_x = 32) in;\n\
               layout(std430) buffer In { float x[]; } inp;\n\
               layout(std430) buffer Out { float y[]; } outp;\n\
               void main() { uint i = gl_GlobalInvocationID.x; outp.y[i] = exp(inp.x[i]); }\n";
    let r = runtime();
    assert_eq!(r.compile(src, "a"), r.compile(src, "a"));

    let bad = "void main() { float x = ; }";
    let first = r.compile(bad, "bad.comp").into_result().unwrap_err();
    let second = r.compile(bad, "bad.comp").into_result().unwrap_err();
    assert_eq!(first.report, second.report);
}

#[test]
fn debug_name_only_changes_failure_text() {
    let r = runtime();
    assert_eq!(r.compile(MINIMAL, "one"), r.compile(MINIMAL, "two"));
    let a = r.compile("", "one").into_result().unwrap_err();
    let b = r.compile("", "two").into_result().unwrap_err();
    assert_ne!(a.report, b.report);
    assert_eq!(a.report.replace("one", "two"), b.report);
}

#[test]
fn syntax_errors_stop_before_semantic_analysis() {
    // `missing` is undeclared, but the unterminated statement is found first
    let f = fail("void main() { missing = 1 }\n", "order.comp");
    assert_eq!(f.stage, Some(Stage::Syntax));
    assert!(f.report.contains("SyntaxError"), "{}", f.report);
    assert!(!f.report.contains("SemanticError"), "{}", f.report);
}

#[test]
fn work_group_size_limit() {
    assert!(runtime()
        .compile("layout(local_size_x = 1024) in;\nvoid main() {}\n", "edge")
        .is_success());
    let f = fail("layout(local_size_x = 1025) in;\nvoid main() {}\n", "wide.comp");
    assert_eq!(f.stage, Some(Stage::Semantic));
    assert!(f.report.contains("SemanticError"));
    assert!(f.report.contains("MaxComputeWorkGroupSizeX"), "{}", f.report);

    let tight = Runtime::startup(
        CapabilityProfile::builder()
            .max_compute_work_group_size_x(256)
            .build(),
    )
    .unwrap();
    assert!(tight
        .compile("layout(local_size_x = 256) in;\nvoid main() {}\n", "t")
        .is_success());
    assert!(!tight
        .compile("layout(local_size_x = 512) in;\nvoid main() {}\n", "t")
        .is_success());
}

#[test]
fn entry_point_cardinality() {
    let f = fail("void helper() {}\n", "none.comp");
    assert_eq!(f.stage, Some(Stage::Semantic));
    assert!(f.report.contains("missing entry point"), "{}", f.report);

    let f = fail("void main() {}\nvoid main() {}\n", "two.comp");
    assert_eq!(f.stage, Some(Stage::Semantic));
    assert!(f.report.contains("two.comp:1:6"), "{}", f.report);
    assert!(f.report.contains("two.comp:2:6"), "{}", f.report);

    assert!(runtime().compile("void main() {}\n", "one.comp").is_success());
}

#[test]
fn unpinned_bindings_follow_declaration_order() {
    let ab = "layout(std430) buffer A { float a[]; } a;\n\
              layout(std430) buffer B { float b[]; } b;\n\
              void main() { a.a[0] = b.b[0]; }\n";
    let m = ok(ab);
    assert_eq!((binding_of(&m, "a"), binding_of(&m, "b")), (0, 1));

    let ba = "layout(std430) buffer B { float b[]; } b;\n\
              layout(std430) buffer A { float a[]; } a;\n\
              void main() { a.a[0] = b.b[0]; }\n";
    let m = ok(ba);
    assert_eq!((binding_of(&m, "a"), binding_of(&m, "b")), (1, 0));
}

#[test]
fn binding_collisions_are_reported() {
    let f = fail(
        "layout(std430, binding = 2) buffer A { float a[]; } a;\n\
         layout(std430, binding = 2) buffer B { float b[]; } b;\n\
         void main() {}\n",
        "clash.comp",
    );
    assert_eq!(f.stage, Some(Stage::Binding));
    assert!(f.report.contains("BindingConflictError"), "{}", f.report);
    assert!(f.report.contains("note: clash.comp:1:"), "{}", f.report);
}

#[test]
fn empty_source_names_the_shader() {
    let f = fail("", "empty.comp");
    assert_eq!(f.stage, Some(Stage::Syntax));
    assert!(f
        .report
        .starts_with("Error generated when compiling shader 'empty.comp' (parsing)"));
    assert!(f.report.contains("SyntaxError"));
    assert!(f.report.ends_with("1 compilation errors.  No code generated."));
}

#[test]
fn warnings_do_not_block_success() {
    let src = "#version 450\n#extension GL_EXT_unknown_thing : enable\nvoid main() {}\n";
    assert!(runtime().compile(src, "warn.comp").is_success());
}

#[test]
fn long_expression_chains_fail_in_parsing() {
    let terms = vec!["1"; 3000].join(" + ");
    let src = format!("void main() {{ int a = {}; }}\n", terms);
    let f = fail(&src, "chain.comp");
    assert_eq!(f.stage, Some(Stage::Syntax));
    assert!(f.report.contains("nesting deeper than"), "{}", f.report);
}

#[test]
fn link_checks_are_not_binding_conflicts() {
    let f = fail(
        "int f(int x) { return f(x); }\nvoid main() { f(1); }\n",
        "recursion.comp",
    );
    assert_eq!(f.stage, Some(Stage::Binding));
    assert!(f.report.contains("SemanticError: recursion is not allowed"), "{}", f.report);
    assert!(!f.report.contains("BindingConflictError"), "{}", f.report);
}
