//! Grammar-level profile toggles and the nesting guard.

use glint_parse::{parse_str, MAX_NESTING};
use glint_ast::limits::Limits;

#[test]
fn while_loops_can_be_disabled() {
    let src = "void main() { int i = 0; while (i < 3) { i++; } }";
    assert!(parse_str(src, &Limits::default()).is_ok());

    let limits = Limits {
        while_loops: false,
        ..Limits::default()
    };
    let diags = parse_str(src, &limits).unwrap_err();
    assert!(diags[0].message.contains("'while' loops are not supported"));
}

#[test]
fn do_while_loops_can_be_disabled() {
    let src = "void main() { int i = 0; do { i++; } while (i < 3); }";
    let limits = Limits {
        do_while_loops: false,
        ..Limits::default()
    };
    let diags = parse_str(src, &limits).unwrap_err();
    assert!(diags[0].message.contains("'do-while' loops are not supported"));

    // disabling plain while loops leaves do-while alone
    let limits = Limits {
        while_loops: false,
        ..Limits::default()
    };
    assert!(parse_str(src, &limits).is_ok());
}

#[test]
fn moderate_nesting_works() {
    let mut body = String::new();
    for _ in 0..40 {
        body.push('{');
    }
    for _ in 0..40 {
        body.push('}');
    }
    let src = format!("void main() {} ", body);
    assert!(parse_str(&src, &Limits::default()).is_ok());

    let expr = format!("{}1{}", "(".repeat(40), ")".repeat(40));
    let src = format!("void main() {{ int a = {}; }}", expr);
    assert!(parse_str(&src, &Limits::default()).is_ok());
}

#[test]
fn excessive_nesting_is_rejected() {
    // unoptimized builds need more than the default test stack to reach the limit
    let handle = std::thread::Builder::new()
        .stack_size(64 << 20)
        .spawn(|| {
            let depth = MAX_NESTING + 10;
            let expr = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
            let src = format!("void main() {{ int a = {}; }}", expr);
            parse_str(&src, &Limits::default()).unwrap_err()
        })
        .expect("spawn");
    let diags = handle.join().expect("parser thread");
    assert!(diags[0].message.contains("nesting deeper than"));
}

fn parse_on_big_stack(src: String) -> Result<(), Vec<glint_ast::diag::Diagnostic>> {
    std::thread::Builder::new()
        .stack_size(64 << 20)
        .spawn(move || parse_str(&src, &Limits::default()).map(|_| ()))
        .expect("spawn")
        .join()
        .expect("parser thread")
}

#[test]
fn long_operator_chains_count_against_nesting() {
    let terms = vec!["1"; 100].join(" + ");
    let src = format!("void main() {{ int a = {}; }}", terms);
    assert!(parse_on_big_stack(src).is_ok());

    // a flat chain folds into a left-deep tree
    let terms = vec!["1"; 3000].join(" + ");
    let src = format!("void main() {{ int a = {}; }}", terms);
    let diags = parse_on_big_stack(src).unwrap_err();
    assert_eq!(diags[0].kind_name(), "SyntaxError");
    assert!(diags[0].message.contains("nesting deeper than"));

    let terms = vec!["a"; MAX_NESTING + 10].join(", ");
    let src = format!("void main() {{ int a = 0; a = ({}); }}", terms);
    let diags = parse_on_big_stack(src).unwrap_err();
    assert!(diags[0].message.contains("nesting deeper than"));
}

#[test]
fn long_postfix_chains_count_against_nesting() {
    let src = format!("void main() {{ vec4 v; float f = v{}; }}", ".x".repeat(20));
    assert!(parse_on_big_stack(src).is_ok());

    let src = format!(
        "void main() {{ vec4 v; float f = v{}; }}",
        ".x".repeat(MAX_NESTING + 10)
    );
    let diags = parse_on_big_stack(src).unwrap_err();
    assert!(diags[0].message.contains("nesting deeper than"));

    let src = format!("void main() {{ int i = 0; i{}; }}", "++".repeat(3000));
    let diags = parse_on_big_stack(src).unwrap_err();
    assert!(diags[0].message.contains("nesting deeper than"));
}
