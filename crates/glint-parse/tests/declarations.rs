use glint_ast::ast::{
    BuiltinType, ExternalDecl, MemoryQualifier, ScalarKind, Stmt, StorageQualifier, TypeName,
};
use glint_parse::parse_str;
use glint_ast::limits::Limits;

fn items(src: &str) -> Vec<ExternalDecl> {
    parse_str(src, &Limits::default())
        .expect("parse failed")
        .value
        .items
}

#[test]
fn workgroup_layout_is_a_qualifier_declaration() {
    let items = items("layout(local_size_x = 64, local_size_y = 2) in;\nvoid main() {}");
    let ExternalDecl::Qualifier(q) = &items[0] else {
        panic!("expected qualifier declaration");
    };
    assert_eq!(q.qualifier.storage(), Some(StorageQualifier::In));
    assert_eq!(q.qualifier.layout.len(), 2);
    assert!(q.qualifier.layout_id("local_size_y").is_some());
}

#[test]
fn buffer_block_with_instance() {
    let src = "layout(std430, set = 1, binding = 2) readonly buffer Data {\n  uint count;\n  float values[];\n} data;\nvoid main() {}";
    let items = items(src);
    let ExternalDecl::Block(b) = &items[0] else {
        panic!("expected block");
    };
    assert_eq!(b.name.text, "Data");
    assert_eq!(b.members.len(), 2);
    assert_eq!(b.instance.as_ref().map(|d| d.name.text.as_str()), Some("data"));
    assert!(b.qualifier.has_memory(MemoryQualifier::ReadOnly));
    assert_eq!(b.qualifier.storage(), Some(StorageQualifier::Buffer));
    let runtime_sized = &b.members[1].declarators[0];
    assert!(matches!(runtime_sized.array.as_ref().map(|a| a.dims[0].is_none()), Some(true)));
}

#[test]
fn anonymous_uniform_block() {
    let items = items("layout(binding = 0) uniform Params { vec4 scale; };\nvoid main() {}");
    let ExternalDecl::Block(b) = &items[0] else {
        panic!("expected block");
    };
    assert!(b.instance.is_none());
}

#[test]
fn image_uniform_and_shared_array() {
    let items = items(
        "layout(binding = 0, rgba8) uniform writeonly image2D img;\nshared float tile[64];\nvoid main() {}",
    );
    let ExternalDecl::Variable(img) = &items[0] else {
        panic!("expected variable");
    };
    assert!(matches!(
        img.ty.name,
        TypeName::Builtin(BuiltinType::Image(_, ScalarKind::Float))
    ));
    let ExternalDecl::Variable(tile) = &items[1] else {
        panic!("expected variable");
    };
    assert_eq!(tile.qualifier.storage(), Some(StorageQualifier::Shared));
}

#[test]
fn struct_names_become_types() {
    let src = "struct Particle { vec3 pos; float mass; };\nParticle make() { return Particle(vec3(0.0), 1.0); }\nvoid main() { Particle p = make(); Particle ps[2]; }";
    let items = items(src);
    assert!(matches!(&items[0], ExternalDecl::Variable(v) if v.declarators.is_empty()));
    let ExternalDecl::Function(main) = &items[2] else {
        panic!("expected main");
    };
    assert!(matches!(main.body.stmts[0], Stmt::Decl(_)));
    assert!(matches!(main.body.stmts[1], Stmt::Decl(_)));
}

#[test]
fn prototypes_and_params() {
    let items = items("float f(in float a, out vec2 b, inout int c[2]);\nvoid g(void) {}\nvoid main() {}");
    let ExternalDecl::Prototype(p) = &items[0] else {
        panic!("expected prototype");
    };
    assert_eq!(p.params.len(), 3);
    assert_eq!(p.params[1].qualifier.storage(), Some(StorageQualifier::Out));
    assert!(p.params[2].array.is_some());
    let ExternalDecl::Function(g) = &items[1] else {
        panic!("expected definition");
    };
    assert!(g.proto.params.is_empty());
}

#[test]
fn control_flow_statements() {
    let src = "\
void main() {
    int acc = 0;
    for (int i = 0; i < 4; ++i) { if (i == 2) continue; acc += i; }
    while (acc > 0) { acc--; }
    do { acc++; } while (acc < 3);
    switch (acc) { case 1: acc = 2; break; default: break; }
    return;
}";
    let items = items(src);
    let ExternalDecl::Function(main) = &items[0] else {
        panic!("expected main");
    };
    let stmts = &main.body.stmts;
    assert!(matches!(stmts[1], Stmt::For { .. }));
    assert!(matches!(stmts[2], Stmt::While { .. }));
    assert!(matches!(stmts[3], Stmt::DoWhile { .. }));
    assert!(matches!(stmts[4], Stmt::Switch { .. }));
    assert!(matches!(stmts[5], Stmt::Return { value: None, .. }));
}

#[test]
fn array_constructor_is_an_expression() {
    let items = items("void main() { float a[2] = float[2](1.0, 2.0); float[3](1.0, 2.0, 3.0); }");
    let ExternalDecl::Function(main) = &items[0] else {
        panic!("expected main");
    };
    assert!(matches!(main.body.stmts[0], Stmt::Decl(_)));
    assert!(matches!(main.body.stmts[1], Stmt::Expr { .. }));
}
