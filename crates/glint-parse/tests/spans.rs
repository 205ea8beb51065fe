//! Span tracking, including spans of macro-expanded tokens.

use glint_ast::ast::{ExternalDecl, Stmt};
use glint_ast::span::LineIndex;
use glint_parse::parse_str;
use glint_ast::limits::Limits;

#[test]
fn function_span_ends_at_closing_brace() {
    let src = "void main() { }";
    let unit = parse_str(src, &Limits::default()).expect("parse failed").value;
    let ExternalDecl::Function(f) = &unit.items[0] else {
        panic!("expected function");
    };
    assert_eq!(f.span.start, 0);
    assert_eq!(f.span.end, src.len() as u32);
    assert_eq!(f.proto.name.span.start, 5);
    assert_eq!(f.proto.name.span.end, 9);
}

#[test]
fn statement_span_ends_at_semicolon() {
    let src = "void main() { int a = 1; }";
    let unit = parse_str(src, &Limits::default()).expect("parse failed").value;
    let ExternalDecl::Function(f) = &unit.items[0] else {
        panic!("expected function");
    };
    let span = f.body.stmts[0].span();
    assert_eq!(&src[span.start as usize..span.end as usize], "int a = 1;");
}

#[test]
fn spans_survive_comments_and_directives() {
    let src = "#version 450\n/* multi\n line */\n#define X 1\nvoid main() { int a = X; }";
    let unit = parse_str(src, &Limits::default()).expect("parse failed").value;
    let ExternalDecl::Function(f) = &unit.items[0] else {
        panic!("expected function");
    };
    let index = LineIndex::new(src);
    let loc = index.location(f.proto.name.span);
    assert_eq!(loc.line, 5);
    assert_eq!(loc.column, 6);
}

#[test]
fn expanded_tokens_point_at_the_macro_use() {
    let src = "#define INIT(v) int v = 3\nvoid main() { INIT(q); }";
    let unit = parse_str(src, &Limits::default()).expect("parse failed").value;
    let ExternalDecl::Function(f) = &unit.items[0] else {
        panic!("expected function");
    };
    let Stmt::Decl(d) = &f.body.stmts[0] else {
        panic!("expected declaration");
    };
    let span = d.declarators[0].name.span;
    assert_eq!(&src[span.start as usize..span.end as usize], "INIT(q)");
}
