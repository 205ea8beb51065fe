use glint_parse::parse_str;
use glint_ast::limits::Limits;

fn first_error(src: &str) -> String {
    let diags = parse_str(src, &Limits::default()).unwrap_err();
    assert_eq!(diags.len(), 1, "parse errors are fail-fast");
    diags[0].message.clone()
}

#[test]
fn empty_source_is_error() {
    assert_eq!(first_error(""), "shader source is empty");
    assert_eq!(first_error("#version 450\n// nothing\n"), "shader source is empty");
}

#[test]
fn missing_semicolon_is_error() {
    let msg = first_error("void main() { int a = 1 }");
    assert!(msg.contains("expected ';'"), "{msg}");
    assert!(msg.contains("found '}'"), "{msg}");
}

#[test]
fn unterminated_block_comment() {
    assert_eq!(
        first_error("void main() {} /* open"),
        "unterminated block comment"
    );
}

#[test]
fn reserved_words_are_rejected() {
    let msg = first_error("void main() { int goto = 1; }");
    assert_eq!(msg, "'goto' is a reserved word");
}

#[test]
fn unsupported_opaque_type_is_named() {
    let msg = first_error("layout(binding = 0) uniform samplerCube env;\nvoid main() {}");
    assert_eq!(msg, "type 'samplerCube' is not supported");
}

#[test]
fn stray_character() {
    let msg = first_error("void main() { int a = 1 @ 2; }");
    assert!(msg.contains("unexpected character '@'"), "{msg}");
}

#[test]
fn too_many_storage_qualifiers() {
    let msg = first_error("uniform buffer float x;\nvoid main() {}");
    assert_eq!(msg, "too many storage qualifiers");
}

#[test]
fn initializer_lists_are_rejected() {
    let msg = first_error("void main() { int a[2] = {1, 2}; }");
    assert!(msg.starts_with("initializer lists are not supported"), "{msg}");
}

#[test]
fn empty_struct_is_rejected() {
    let msg = first_error("struct S {};\nvoid main() {}");
    assert!(msg.contains("at least one member"), "{msg}");
}

#[test]
fn bare_type_in_expression() {
    let msg = first_error("void main() { float x = vec3; }");
    assert!(msg.contains("type 'vec3' used as an expression"), "{msg}");
}

#[test]
fn syntax_errors_have_spans() {
    let src = "void main() {\n  int a = ;\n}";
    let diags = parse_str(src, &Limits::default()).unwrap_err();
    let span = diags[0].span.expect("span");
    assert_eq!(&src[span.start as usize..span.end as usize], ";");
}

#[test]
fn unknown_type_in_body_is_a_syntax_error() {
    let msg = first_error("void main() { Foo f; }");
    assert!(msg.contains("expected ';'"), "{msg}");
    assert!(msg.contains("identifier 'f'"), "{msg}");
}

#[test]
fn out_of_range_local_size_names_the_literal() {
    let msg = first_error("layout(local_size_x = 4294967295) in;\nvoid main() {}");
    assert!(msg.contains("4294967295 does not fit in 'int'"), "{msg}");
}
