//! Statement checking and local declarations.

use super::{invalid, unsupported, Symbol, TypeChecker, TypeError};
use crate::consteval;
use crate::tir::{Expr, ExprKind, LocalId, LoopKind, ParamDir, Program, Stmt, SwitchCase};
use crate::types::{ScalarKind, Type};
use glint_ast::ast::{self, BinOp, StorageQualifier};
use glint_ast::span::Span;
use std::collections::HashMap;

impl<'p> TypeChecker<'p> {
    /// Check a statement list in the current scope, collecting errors per
    /// statement.
    pub(super) fn stmts(&mut self, stmts: &[ast::Stmt]) -> Vec<Stmt> {
        let mut out = Vec::new();
        for s in stmts {
            if let Err(e) = self.stmt(s, &mut out) {
                self.errors.push(e);
            }
        }
        out
    }

    /// A sub-statement with its own scope.
    fn scoped(&mut self, s: &ast::Stmt) -> Vec<Stmt> {
        self.push_scope();
        let mut out = Vec::new();
        if let Err(e) = self.stmt(s, &mut out) {
            self.errors.push(e);
        }
        self.pop_scope();
        out
    }

    fn loop_body(&mut self, s: &ast::Stmt) -> Vec<Stmt> {
        self.with_state(|f| f.loops += 1);
        let body = self.scoped(s);
        self.with_state(|f| f.loops -= 1);
        body
    }

    fn with_state(&mut self, f: impl FnOnce(&mut super::FnState)) {
        if let Some(state) = self.func.as_mut() {
            f(state);
        }
    }

    fn stmt(&mut self, s: &ast::Stmt, out: &mut Vec<Stmt>) -> Result<(), TypeError> {
        match s {
            ast::Stmt::Decl(d) => self.local_decl(d, out),
            ast::Stmt::Expr { expr, .. } => {
                let e = self.expr(expr)?;
                out.push(Stmt::Expr(e));
                Ok(())
            }
            ast::Stmt::Block(b) => {
                self.push_scope();
                let body = self.stmts(&b.stmts);
                self.pop_scope();
                out.push(Stmt::Block(body));
                Ok(())
            }
            ast::Stmt::If {
                cond, then_, else_, ..
            } => {
                let cond = self.condition(cond)?;
                let then_ = self.scoped(then_);
                let else_ = match else_ {
                    Some(e) => self.scoped(e),
                    None => Vec::new(),
                };
                out.push(Stmt::If { cond, then_, else_ });
                Ok(())
            }
            ast::Stmt::Switch { selector, body, .. } => {
                let selector = self.expr(selector)?;
                let kind = match selector.ty {
                    Type::Scalar(k @ (ScalarKind::Int | ScalarKind::Uint)) => k,
                    _ => {
                        return Err(invalid(
                            format!(
                                "switch selector must be a scalar integer, found '{}'",
                                self.type_name(&selector.ty)
                            ),
                            selector.span,
                        ))
                    }
                };
                self.push_scope();
                self.with_state(|f| f.switches += 1);
                let cases = self.switch_body(kind, &body.stmts);
                self.with_state(|f| f.switches -= 1);
                self.pop_scope();
                out.push(Stmt::Switch {
                    selector,
                    cases: cases?,
                });
                Ok(())
            }
            ast::Stmt::Case { span, .. } | ast::Stmt::Default { span } => {
                Err(invalid("case label outside of a switch statement", *span))
            }
            ast::Stmt::For {
                init,
                cond,
                step,
                body,
                span,
            } => {
                self.push_scope();
                let result = self.for_loop(init.as_deref(), cond.as_ref(), step.as_ref(), body, *span);
                self.pop_scope();
                out.push(result?);
                Ok(())
            }
            ast::Stmt::While { cond, body, span } => {
                if !self.profile.limits.while_loops {
                    return Err(unsupported(
                        "'while' loops are disabled by the target profile",
                        *span,
                    ));
                }
                self.push_scope();
                let cond = self.condition(cond);
                let body = self.loop_body(body);
                self.pop_scope();
                out.push(Stmt::Loop {
                    kind: LoopKind::Pre,
                    cond: Some(cond?),
                    step: None,
                    body,
                });
                Ok(())
            }
            ast::Stmt::DoWhile { body, cond, span } => {
                if !self.profile.limits.do_while_loops {
                    return Err(unsupported(
                        "'do-while' loops are disabled by the target profile",
                        *span,
                    ));
                }
                let body = self.loop_body(body);
                let cond = self.condition(cond)?;
                out.push(Stmt::Loop {
                    kind: LoopKind::Post,
                    cond: Some(cond),
                    step: None,
                    body,
                });
                Ok(())
            }
            ast::Stmt::Break { span } => {
                let inside = self.func.as_ref().is_some_and(|f| f.loops + f.switches > 0);
                if !inside {
                    return Err(invalid("'break' outside of a loop or switch", *span));
                }
                out.push(Stmt::Break);
                Ok(())
            }
            ast::Stmt::Continue { span } => {
                let inside = self.func.as_ref().is_some_and(|f| f.loops > 0);
                if !inside {
                    return Err(invalid("'continue' outside of a loop", *span));
                }
                out.push(Stmt::Continue);
                Ok(())
            }
            ast::Stmt::Return { value, span } => {
                let ret = match &self.func {
                    Some(f) => f.ret.clone(),
                    None => return Err(invalid("'return' outside of a function", *span)),
                };
                let value = match value {
                    None if ret != Type::Void => {
                        return Err(invalid(
                            format!("function returning '{}' must return a value", self.type_name(&ret)),
                            *span,
                        ))
                    }
                    None => None,
                    Some(_) if ret == Type::Void => {
                        return Err(invalid("a void function cannot return a value", *span))
                    }
                    Some(v) => {
                        let v = self.expr(v)?;
                        Some(self.coerce(v, &ret)?)
                    }
                };
                out.push(Stmt::Return(value));
                Ok(())
            }
            ast::Stmt::Discard { span } => Err(unsupported(
                "'discard' is only available in fragment shaders",
                *span,
            )),
            ast::Stmt::Empty { .. } => Ok(()),
        }
    }

    fn switch_body(&mut self, kind: ScalarKind, stmts: &[ast::Stmt]) -> Result<Vec<SwitchCase>, TypeError> {
        let mut cases: Vec<SwitchCase> = Vec::new();
        let mut seen: HashMap<i64, Span> = HashMap::new();
        let mut default: Option<Span> = None;
        // a label directly after another label joins its case
        let mut after_label = false;
        let mut last_label = None;

        for s in stmts {
            match s {
                ast::Stmt::Case { value, span } => {
                    let value = self.case_value(kind, value)?;
                    if let Some(prev) = seen.insert(value, *span) {
                        return Err(TypeError::DuplicateLabel {
                            label: format!("case label '{}'", value),
                            span: *span,
                            previous: prev,
                        });
                    }
                    match cases.last_mut() {
                        Some(case) if after_label => case.values.push(value),
                        _ => cases.push(SwitchCase {
                            values: vec![value],
                            is_default: false,
                            body: Vec::new(),
                        }),
                    }
                    after_label = true;
                    last_label = Some(*span);
                }
                ast::Stmt::Default { span } => {
                    if let Some(prev) = default.replace(*span) {
                        return Err(TypeError::DuplicateLabel {
                            label: "default label".to_string(),
                            span: *span,
                            previous: prev,
                        });
                    }
                    match cases.last_mut() {
                        Some(case) if after_label => case.is_default = true,
                        _ => cases.push(SwitchCase {
                            values: Vec::new(),
                            is_default: true,
                            body: Vec::new(),
                        }),
                    }
                    after_label = true;
                    last_label = Some(*span);
                }
                other => {
                    let Some(case) = cases.last_mut() else {
                        self.errors.push(invalid(
                            "statement in a switch body before the first case label",
                            other.span(),
                        ));
                        continue;
                    };
                    let mut body = std::mem::take(&mut case.body);
                    if let Err(e) = self.stmt(other, &mut body) {
                        self.errors.push(e);
                    }
                    if let Some(case) = cases.last_mut() {
                        case.body = body;
                    }
                    after_label = false;
                }
            }
        }
        if let (true, Some(span)) = (after_label, last_label) {
            return Err(invalid(
                "a switch statement cannot end with a case label",
                span,
            ));
        }
        Ok(cases)
    }

    fn case_value(&mut self, kind: ScalarKind, value: &ast::Expr) -> Result<i64, TypeError> {
        let span = value.span();
        let e = self.expr(value)?;
        let converts = matches!(
            (e.ty.scalar_kind(), kind),
            (Some(ScalarKind::Int), _) | (Some(ScalarKind::Uint), ScalarKind::Uint)
        );
        match e.as_const() {
            Some(v) if e.ty.is_scalar() && converts => {
                consteval::as_i64(&consteval::convert(v, kind))
                    .ok_or_else(|| invalid("case label must be a constant integer expression", span))
            }
            Some(_) if e.ty.is_integer() => Err(TypeError::Mismatch {
                expected: crate::types::scalar_name(kind).to_string(),
                found: self.type_name(&e.ty),
                span,
            }),
            _ => Err(invalid("case label must be a constant integer expression", span)),
        }
    }

    fn for_loop(
        &mut self,
        init: Option<&ast::Stmt>,
        cond: Option<&ast::Expr>,
        step: Option<&ast::Expr>,
        body: &ast::Stmt,
        span: Span,
    ) -> Result<Stmt, TypeError> {
        let mut init_out = Vec::new();
        if let Some(init) = init {
            self.stmt(init, &mut init_out)?;
        }
        let cond = cond.map(|c| self.condition(c)).transpose()?;
        let step = step.map(|s| self.expr(s)).transpose()?;

        let index = self.inductive_index(&init_out, cond.as_ref(), step.as_ref());
        let strict = !self.profile.limits.non_inductive_for_loops;
        if index.is_none() && strict {
            return Err(unsupported(
                "the target profile only supports 'for' loops of the form 'for (int i = c; i < c; i++)'",
                span,
            ));
        }

        if let Some(i) = index {
            self.with_state(|f| f.inductive.push(i));
        }
        let body = self.loop_body(body);
        if let Some(i) = index {
            self.with_state(|f| {
                f.inductive.pop();
            });
            if strict && modifies_local(&self.program, &body, i) {
                return Err(unsupported(
                    "the loop index cannot be modified inside the loop body",
                    span,
                ));
            }
        }

        let lp = Stmt::Loop {
            kind: LoopKind::Pre,
            cond,
            step,
            body,
        };
        if init_out.is_empty() {
            return Ok(lp);
        }
        init_out.push(lp);
        Ok(Stmt::Block(init_out))
    }

    /// The loop index when the loop is `for (T i = c; i relop c; i op c)`.
    fn inductive_index(&self, init: &[Stmt], cond: Option<&Expr>, step: Option<&Expr>) -> Option<LocalId> {
        let [Stmt::Init(id, value)] = init else {
            return None;
        };
        value.as_const()?;
        let f = self.func.as_ref()?;
        if !f.locals[id.0 as usize].ty.is_numeric() || !f.locals[id.0 as usize].ty.is_scalar() {
            return None;
        }
        let is_index = |e: &Expr| match &e.kind {
            ExprKind::Local(l) => l == id,
            ExprKind::Convert(inner) => matches!(inner.kind, ExprKind::Local(l) if l == *id),
            _ => false,
        };

        let cond_ok = match cond.map(|c| &c.kind) {
            Some(ExprKind::Binary(op, l, r)) => {
                matches!(
                    op,
                    BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge | BinOp::Eq | BinOp::Ne
                ) && is_index(l)
                    && r.as_const().is_some()
            }
            _ => false,
        };
        let step_ok = match step.map(|s| &s.kind) {
            Some(ExprKind::IncDec { target, .. }) => is_index(target),
            Some(ExprKind::Assign {
                target,
                op: Some(BinOp::Add | BinOp::Sub),
                value,
            }) => is_index(target) && value.as_const().is_some(),
            _ => false,
        };
        (cond_ok && step_ok).then_some(*id)
    }

    fn local_decl(&mut self, d: &ast::VarDecl, out: &mut Vec<Stmt>) -> Result<(), TypeError> {
        let q = &d.qualifier;
        let is_const = match q.storage {
            None => false,
            Some((StorageQualifier::Const, _)) => true,
            Some((_, span)) => {
                return Err(invalid(
                    "local variables can only be qualified with 'const'",
                    span,
                ))
            }
        };
        if let Some(id) = q.layout.first() {
            return Err(invalid("layout qualifiers are not allowed on local variables", id.span));
        }
        if let Some((_, span)) = q.memory.first() {
            return Err(invalid("memory qualifiers are not allowed on local variables", *span));
        }
        let base = self.resolve_base(&d.ty)?;
        if d.declarators.is_empty() {
            if !matches!(d.ty.name, ast::TypeName::Struct(_)) {
                self.warn("declaration does not declare anything", d.span);
            }
            return Ok(());
        }
        for decl in &d.declarators {
            if let Err(e) = self.local_declarator(&base, is_const, decl, out) {
                self.errors.push(e);
            }
        }
        Ok(())
    }

    fn local_declarator(
        &mut self,
        base: &Type,
        is_const: bool,
        d: &ast::Declarator,
        out: &mut Vec<Stmt>,
    ) -> Result<(), TypeError> {
        self.check_name(&d.name)?;
        let ty = self.apply_dims(base.clone(), d.array.as_ref())?;
        if ty == Type::Void || ty.element_root() == &Type::Void {
            return Err(invalid(
                format!("'{}' cannot have type 'void'", d.name.text),
                d.name.span,
            ));
        }
        if ty.is_opaque() {
            return Err(unsupported(
                format!(
                    "'{}': opaque type '{}' is only allowed as a uniform or function parameter",
                    d.name.text,
                    self.type_name(&ty)
                ),
                d.name.span,
            ));
        }
        let init = match &d.init {
            Some(e) => Some(self.expr(e)?),
            None => None,
        };
        let ty = self.size_from_init(ty, init.as_ref(), &d.name)?;
        let init = init.map(|e| self.coerce(e, &ty)).transpose()?;

        if is_const {
            let Some(init) = init else {
                return Err(invalid(
                    format!("'const' variable '{}' must be initialized", d.name.text),
                    d.name.span,
                ));
            };
            if let Some(v) = init.as_const() {
                return self.declare(&d.name, Symbol::Const(v.clone(), ty));
            }
            let id = self.add_local(&d.name.text, ty, d.name.span)?;
            self.with_state(|f| {
                f.read_only.insert(id);
            });
            out.push(Stmt::Init(id, init));
            return self.declare(&d.name, Symbol::Local(id));
        }

        let id = self.add_local(&d.name.text, ty, d.name.span)?;
        if let Some(init) = init {
            out.push(Stmt::Init(id, init));
        }
        // visible only after its own initializer
        self.declare(&d.name, Symbol::Local(id))
    }
}

/// Whether `body` writes local `id` through assignment, increment or an
/// `out`/`inout` argument.
fn modifies_local(program: &Program, body: &[Stmt], id: LocalId) -> bool {
    let mut found = false;
    let writes = |e: &Expr| matches!(e.root().kind, ExprKind::Local(l) if l == id);
    let mut visit = |e: &Expr| match &e.kind {
        ExprKind::Assign { target, .. } | ExprKind::IncDec { target, .. } => {
            found |= writes(target);
        }
        ExprKind::Call(f, args) => {
            let params = &program.function(*f).params;
            for (p, a) in params.iter().zip(args) {
                if p.dir != ParamDir::In {
                    found |= writes(a);
                }
            }
        }
        _ => {}
    };
    for s in body {
        s.walk_exprs(&mut visit);
    }
    found
}
