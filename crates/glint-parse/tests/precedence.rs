use glint_ast::ast::{BinOp, Expr, ExternalDecl, Stmt, UnOp};
use glint_parse::parse_str;
use glint_ast::limits::Limits;

/// Parse `expr` as the initializer of a local and return it.
fn init_expr(expr: &str) -> Expr {
    let src = format!("void main() {{ int r = {}; }}", expr);
    let unit = parse_str(&src, &Limits::default()).expect("parse failed").value;
    let ExternalDecl::Function(f) = unit.items.into_iter().next().expect("item") else {
        panic!("expected function");
    };
    let Some(Stmt::Decl(d)) = f.body.stmts.into_iter().next() else {
        panic!("expected declaration");
    };
    d.declarators
        .into_iter()
        .next()
        .and_then(|d| d.init)
        .expect("initializer")
}

fn render(e: &Expr) -> String {
    match e {
        Expr::Lit(l, _) => format!("{:?}", l),
        Expr::Var(id) => id.text.clone(),
        Expr::Binary { lhs, op, rhs, .. } => {
            format!("({} {} {})", render(lhs), op.symbol(), render(rhs))
        }
        Expr::Unary { op, expr, .. } => match op {
            UnOp::PostInc | UnOp::PostDec => format!("({}{})", render(expr), op.symbol()),
            _ => format!("({}{})", op.symbol(), render(expr)),
        },
        Expr::Ternary {
            cond, then_, else_, ..
        } => format!("({} ? {} : {})", render(cond), render(then_), render(else_)),
        Expr::Assign { op, lhs, rhs, .. } => {
            let sym = op.map(BinOp::symbol).unwrap_or("");
            format!("({} {}= {})", render(lhs), sym, render(rhs))
        }
        Expr::Paren { inner, .. } => render(inner),
        Expr::Index { base, index, .. } => format!("{}[{}]", render(base), render(index)),
        Expr::Field { base, field, .. } => format!("{}.{}", render(base), field.text),
        other => format!("{:?}", other),
    }
}

#[test]
fn multiplicative_binds_tighter_than_additive() {
    assert_eq!(render(&init_expr("a + b * c")), "(a + (b * c))");
    assert_eq!(render(&init_expr("a - b - c")), "((a - b) - c)");
}

#[test]
fn shift_relational_equality_chain() {
    assert_eq!(
        render(&init_expr("a << 1 < b == c")),
        "(((a << Int(1)) < b) == c)"
    );
}

#[test]
fn bitwise_and_logical_levels() {
    assert_eq!(
        render(&init_expr("a | b ^ c & d")),
        "(a | (b ^ (c & d)))"
    );
    assert_eq!(
        render(&init_expr("a || b ^^ c && d")),
        "(a || (b ^^ (c && d)))"
    );
}

#[test]
fn ternary_is_right_associative() {
    assert_eq!(
        render(&init_expr("a ? b : c ? d : e")),
        "(a ? b : (c ? d : e))"
    );
}

#[test]
fn assignment_is_right_associative() {
    assert_eq!(render(&init_expr("a = b += c")), "(a = (b += c))");
}

#[test]
fn prefix_and_postfix() {
    assert_eq!(render(&init_expr("-a[i]++")), "(-(a[i]++))");
    assert_eq!(render(&init_expr("!b.x")), "(!b.x)");
}

#[test]
fn length_method_call() {
    let e = init_expr("data.values.length()");
    assert!(matches!(e, Expr::Method { ref name, .. } if name.text == "length"));
}
