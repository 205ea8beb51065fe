//! Expression checking: name resolution, operators, swizzles, indexing and
//! l-values.

use super::{invalid, unsupported, Symbol, TypeChecker, TypeError};
use crate::builtins::{builtin_constant, BuiltinVar};
use crate::consteval;
use crate::tir::{ConstValue, Expr, ExprKind, Storage};
use crate::types::{
    common_kind, type_converts_to, ArraySize, ScalarKind, Type, BOOL, INT, UINT,
};
use glint_ast::ast::{self, BinOp, UnOp};
use glint_ast::span::Span;

impl<'p> TypeChecker<'p> {
    pub(crate) fn expr(&mut self, e: &ast::Expr) -> Result<Expr, TypeError> {
        match e {
            ast::Expr::Lit(lit, span) => Ok(literal(*lit, *span)),
            ast::Expr::Var(id) => self.var(id),
            ast::Expr::Paren { inner, .. } => self.expr(inner),
            ast::Expr::Unary { op, expr, span } => {
                let operand = self.expr(expr)?;
                self.unary(*op, operand, *span)
            }
            ast::Expr::Binary { lhs, op, rhs, span } => {
                let l = self.expr(lhs)?;
                let r = self.expr(rhs)?;
                self.binary(*op, l, r, *span)
            }
            ast::Expr::Assign { op, lhs, rhs, span } => {
                let l = self.expr(lhs)?;
                let r = self.expr(rhs)?;
                self.assign(*op, l, r, *span)
            }
            ast::Expr::Ternary {
                cond,
                then_,
                else_,
                span,
            } => {
                let c = self.condition(cond)?;
                let a = self.expr(then_)?;
                let b = self.expr(else_)?;
                self.ternary(c, a, b, *span)
            }
            ast::Expr::Call { callee, args, span } => self.call(callee, args, *span),
            ast::Expr::Field { base, field, span } => {
                let base = self.expr(base)?;
                self.field(base, field, *span)
            }
            ast::Expr::Method {
                base,
                name,
                args,
                span,
            } => {
                let base = self.expr(base)?;
                self.method(base, name, args, *span)
            }
            ast::Expr::Index { base, index, span } => {
                let base = self.expr(base)?;
                let index = self.expr(index)?;
                self.index(base, index, *span)
            }
            ast::Expr::Comma { lhs, rhs, span } => {
                let l = self.expr(lhs)?;
                let r = self.expr(rhs)?;
                let ty = r.ty.clone();
                Ok(Expr::new(ExprKind::Comma(Box::new(l), Box::new(r)), ty, *span))
            }
        }
    }

    /// Boolean scalar condition of `if`, loops and `?:`.
    pub(super) fn condition(&mut self, e: &ast::Expr) -> Result<Expr, TypeError> {
        let c = self.expr(e)?;
        if c.ty != BOOL {
            return Err(TypeError::Mismatch {
                expected: "bool".to_string(),
                found: self.type_name(&c.ty),
                span: c.span,
            });
        }
        Ok(c)
    }

    fn var(&mut self, id: &ast::Ident) -> Result<Expr, TypeError> {
        let span = id.span;
        if let Some(symbol) = self.lookup(&id.text) {
            return Ok(match symbol.clone() {
                Symbol::Global(g) => {
                    let ty = self.program.global(g).ty.clone();
                    Expr::new(ExprKind::Global(g), ty, span)
                }
                Symbol::BlockMember(g, i) => {
                    let block = self.program.global(g);
                    let Type::Struct(sid) = block.ty else {
                        return Err(invalid("block member of a non-block variable", span));
                    };
                    let base = Expr::new(ExprKind::Global(g), block.ty.clone(), span);
                    let ty = self.program.struct_def(sid).members[i as usize].ty.clone();
                    Expr::new(ExprKind::Member(Box::new(base), i), ty, span)
                }
                Symbol::Local(l) => {
                    let ty = match &self.func {
                        Some(f) => f.locals[l.0 as usize].ty.clone(),
                        None => return Err(invalid("local variable outside of a function", span)),
                    };
                    Expr::new(ExprKind::Local(l), ty, span)
                }
                Symbol::Const(v, ty) => Expr::constant(v, ty, span),
            });
        }
        if let Some(b) = BuiltinVar::from_name(&id.text) {
            return Ok(Expr::new(ExprKind::Builtin(b), b.ty(), span));
        }
        if id.text == "gl_WorkGroupSize" {
            self.program.features.workgroup_size = true;
            let size = self.current_local_size();
            let value = ConstValue::Composite(size.iter().map(|v| ConstValue::Uint(*v)).collect());
            return Ok(Expr::constant(value, Type::Vector(ScalarKind::Uint, 3), span));
        }
        if let Some((v, ty)) = builtin_constant(&id.text, self.profile) {
            return Ok(Expr::constant(v, ty, span));
        }
        Err(TypeError::UnknownIdentifier {
            name: id.text.clone(),
            span,
        })
    }

    // -----------------------------------------------------------------------
    // Operators
    // -----------------------------------------------------------------------

    fn unary(&mut self, op: UnOp, e: Expr, span: Span) -> Result<Expr, TypeError> {
        let ok = match op {
            UnOp::Neg | UnOp::Plus => e.ty.is_numeric(),
            UnOp::Not => e.ty == BOOL,
            UnOp::BitNot => e.ty.is_integer(),
            UnOp::PreInc | UnOp::PreDec | UnOp::PostInc | UnOp::PostDec => e.ty.is_numeric(),
        };
        if !ok {
            return Err(invalid(
                format!(
                    "no operator '{}' for an operand of type '{}'",
                    op.symbol(),
                    self.type_name(&e.ty)
                ),
                span,
            ));
        }
        let ty = e.ty.clone();
        match op {
            UnOp::PreInc | UnOp::PreDec | UnOp::PostInc | UnOp::PostDec => {
                self.check_lvalue(&e)?;
                Ok(Expr::new(
                    ExprKind::IncDec {
                        target: Box::new(e),
                        increment: matches!(op, UnOp::PreInc | UnOp::PostInc),
                        prefix: matches!(op, UnOp::PreInc | UnOp::PreDec),
                    },
                    ty,
                    span,
                ))
            }
            _ => {
                if let Some(v) = e.as_const().and_then(|v| consteval::fold_unary(op, v)) {
                    return Ok(Expr::constant(v, ty, span));
                }
                Ok(Expr::new(ExprKind::Unary(op, Box::new(e)), ty, span))
            }
        }
    }

    fn bad_operands(&self, op: BinOp, l: &Expr, r: &Expr, span: Span) -> TypeError {
        invalid(
            format!(
                "no operator '{}' for operands of type '{}' and '{}'",
                op.symbol(),
                self.type_name(&l.ty),
                self.type_name(&r.ty)
            ),
            span,
        )
    }

    pub(super) fn binary(&mut self, op: BinOp, l: Expr, r: Expr, span: Span) -> Result<Expr, TypeError> {
        let (l, r, ty) = match op {
            BinOp::And | BinOp::Or => {
                if l.ty != BOOL || r.ty != BOOL {
                    return Err(self.bad_operands(op, &l, &r, span));
                }
                if let (Some(a), Some(b)) = (l.as_const(), r.as_const()) {
                    if let Ok(Some(v)) = consteval::fold_binary(op, a, b) {
                        return Ok(Expr::constant(v, BOOL, span));
                    }
                }
                return Ok(Expr::new(
                    ExprKind::Logical(op == BinOp::And, Box::new(l), Box::new(r)),
                    BOOL,
                    span,
                ));
            }
            BinOp::Xor => {
                if l.ty != BOOL || r.ty != BOOL {
                    return Err(self.bad_operands(op, &l, &r, span));
                }
                (l, r, BOOL)
            }
            BinOp::Eq | BinOp::Ne => self.equality_operands(op, l, r, span)?,
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                let (Type::Scalar(a), Type::Scalar(b)) = (&l.ty, &r.ty) else {
                    return Err(self.bad_operands(op, &l, &r, span));
                };
                let k = match common_kind(*a, *b) {
                    Some(k) if k != ScalarKind::Bool => k,
                    _ => return Err(self.bad_operands(op, &l, &r, span)),
                };
                let l = self.convert_to(l, Type::Scalar(k));
                let r = self.convert_to(r, Type::Scalar(k));
                (l, r, BOOL)
            }
            _ => self.arith_operands(op, l, r, span)?,
        };

        let foldable = l.ty == r.ty && !(op == BinOp::Mul && l.ty.is_matrix())
            || matches!(op, BinOp::Shl | BinOp::Shr);
        if foldable {
            if let (Some(a), Some(b)) = (l.as_const(), r.as_const()) {
                match consteval::fold_binary(op, a, b) {
                    Ok(Some(v)) => return Ok(Expr::constant(v, ty, span)),
                    Ok(None) => {}
                    Err(message) => return Err(invalid(message, span)),
                }
            }
        }
        Ok(Expr::new(ExprKind::Binary(op, Box::new(l), Box::new(r)), ty, span))
    }

    fn equality_operands(
        &self,
        op: BinOp,
        l: Expr,
        r: Expr,
        span: Span,
    ) -> Result<(Expr, Expr, Type), TypeError> {
        if l.ty.is_opaque() || r.ty.is_opaque() || l.ty == Type::Void || l.ty.has_runtime_array() {
            return Err(self.bad_operands(op, &l, &r, span));
        }
        match (l.ty.scalar_kind(), r.ty.scalar_kind()) {
            (Some(a), Some(b)) => {
                let k = common_kind(a, b).ok_or_else(|| self.bad_operands(op, &l, &r, span))?;
                if l.ty.with_kind(k) != r.ty.with_kind(k) {
                    return Err(self.bad_operands(op, &l, &r, span));
                }
                let lt = l.ty.with_kind(k);
                let l = self.convert_to(l, lt.clone());
                let r = self.convert_to(r, lt);
                Ok((l, r, BOOL))
            }
            _ if l.ty == r.ty => Ok((l, r, BOOL)),
            _ => Err(self.bad_operands(op, &l, &r, span)),
        }
    }

    /// Normalizes the operands of arithmetic, bitwise and shift operators:
    /// both sides take one component kind and scalars are splatted against
    /// vectors (matrix arithmetic keeps its scalar operand). Returns the
    /// converted operands and the result type.
    pub(super) fn arith_operands(
        &self,
        op: BinOp,
        l: Expr,
        r: Expr,
        span: Span,
    ) -> Result<(Expr, Expr, Type), TypeError> {
        let (Some(lk), Some(rk)) = (l.ty.scalar_kind(), r.ty.scalar_kind()) else {
            return Err(self.bad_operands(op, &l, &r, span));
        };
        if lk == ScalarKind::Bool || rk == ScalarKind::Bool {
            return Err(self.bad_operands(op, &l, &r, span));
        }

        if matches!(op, BinOp::Shl | BinOp::Shr) {
            if !l.ty.is_integer() || !r.ty.is_integer() {
                return Err(self.bad_operands(op, &l, &r, span));
            }
            let r = match (&l.ty, &r.ty) {
                (Type::Vector(_, n), Type::Scalar(_)) => splat(r, *n),
                (Type::Vector(_, n), Type::Vector(_, m)) if n == m => r,
                (Type::Scalar(_), Type::Scalar(_)) => r,
                _ => return Err(self.bad_operands(op, &l, &r, span)),
            };
            let ty = l.ty.clone();
            return Ok((l, r, ty));
        }

        let integral = matches!(op, BinOp::Mod | BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor);
        let Some(k) = common_kind(lk, rk) else {
            return Err(self.bad_operands(op, &l, &r, span));
        };
        if integral && (!l.ty.is_integer() || !r.ty.is_integer()) {
            return Err(self.bad_operands(op, &l, &r, span));
        }
        let lt = l.ty.with_kind(k);
        let rt = r.ty.with_kind(k);
        let is_mul = op == BinOp::Mul;

        let result = match (&lt, &rt) {
            (Type::Scalar(_), Type::Scalar(_)) => lt.clone(),
            (Type::Scalar(_), Type::Vector(..)) | (Type::Vector(..), Type::Scalar(_)) => {
                let width = lt.width().max(rt.width()).unwrap_or(1);
                Type::Vector(k, width)
            }
            (Type::Vector(_, n), Type::Vector(_, m)) if n == m => lt.clone(),
            (Type::Matrix { .. }, Type::Scalar(_)) => lt.clone(),
            (Type::Scalar(_), Type::Matrix { .. }) => rt.clone(),
            (
                Type::Matrix { cols: c1, rows: r1, .. },
                Type::Matrix { cols: c2, rows: r2, .. },
            ) => {
                if is_mul && c1 == r2 {
                    Type::Matrix {
                        scalar: k,
                        cols: *c2,
                        rows: *r1,
                    }
                } else if !is_mul && c1 == c2 && r1 == r2 {
                    lt.clone()
                } else {
                    return Err(self.bad_operands(op, &l, &r, span));
                }
            }
            (Type::Matrix { cols, rows, .. }, Type::Vector(_, n)) if is_mul && cols == n => {
                Type::Vector(k, *rows)
            }
            (Type::Vector(_, n), Type::Matrix { cols, rows, .. }) if is_mul && rows == n => {
                Type::Vector(k, *cols)
            }
            _ => return Err(self.bad_operands(op, &l, &r, span)),
        };

        let mut l = self.convert_to(l, lt);
        let mut r = self.convert_to(r, rt);
        if let Type::Vector(_, n) = result {
            if l.ty.is_scalar() {
                l = splat(l, n);
            }
            if r.ty.is_scalar() {
                r = splat(r, n);
            }
        }
        Ok((l, r, result))
    }

    fn assign(&mut self, op: Option<BinOp>, target: Expr, value: Expr, span: Span) -> Result<Expr, TypeError> {
        self.check_lvalue(&target)?;
        let value = match op {
            None => self.coerce(value, &target.ty)?,
            Some(op) => {
                let (l, r, ty) = self.arith_operands(op, target.clone(), value, span)?;
                if ty != target.ty || l.ty != target.ty {
                    return Err(TypeError::Mismatch {
                        expected: self.type_name(&target.ty),
                        found: self.type_name(&ty),
                        span,
                    });
                }
                r
            }
        };
        let ty = target.ty.clone();
        Ok(Expr::new(
            ExprKind::Assign {
                target: Box::new(target),
                op,
                value: Box::new(value),
            },
            ty,
            span,
        ))
    }

    fn ternary(&mut self, c: Expr, a: Expr, b: Expr, span: Span) -> Result<Expr, TypeError> {
        if a.ty.is_opaque() || b.ty.is_opaque() {
            return Err(invalid("opaque values cannot be selected with '?:'", span));
        }
        let (a, b) = match (a.ty.scalar_kind(), b.ty.scalar_kind()) {
            (Some(x), Some(y)) if a.ty.with_kind(x) == b.ty.with_kind(x) => {
                let Some(k) = common_kind(x, y) else {
                    return Err(self.branch_mismatch(&a, &b));
                };
                let (at, bt) = (a.ty.with_kind(k), b.ty.with_kind(k));
                (self.convert_to(a, at), self.convert_to(b, bt))
            }
            _ if a.ty == b.ty => (a, b),
            _ => return Err(self.branch_mismatch(&a, &b)),
        };
        if let Some(chosen) = c.as_const().and_then(consteval::as_bool) {
            let pick = if chosen { &a } else { &b };
            if let Some(v) = pick.as_const() {
                return Ok(Expr::constant(v.clone(), pick.ty.clone(), span));
            }
        }
        let ty = a.ty.clone();
        Ok(Expr::new(
            ExprKind::Ternary(Box::new(c), Box::new(a), Box::new(b)),
            ty,
            span,
        ))
    }

    fn branch_mismatch(&self, a: &Expr, b: &Expr) -> TypeError {
        TypeError::Mismatch {
            expected: self.type_name(&a.ty),
            found: self.type_name(&b.ty),
            span: b.span,
        }
    }

    // -----------------------------------------------------------------------
    // Member access
    // -----------------------------------------------------------------------

    fn field(&mut self, base: Expr, field: &ast::Ident, span: Span) -> Result<Expr, TypeError> {
        match base.ty.clone() {
            Type::Struct(sid) => {
                let def = self.program.struct_def(sid);
                let Some(index) = def.members.iter().position(|m| m.name == field.text) else {
                    return Err(invalid(
                        format!("'{}' has no member named '{}'", def.name, field.text),
                        field.span,
                    ));
                };
                let ty = def.members[index].ty.clone();
                if let Some(ConstValue::Composite(parts)) = base.as_const() {
                    if let Some(v) = parts.get(index) {
                        return Ok(Expr::constant(v.clone(), ty, span));
                    }
                }
                Ok(Expr::new(ExprKind::Member(Box::new(base), index as u32), ty, span))
            }
            Type::Scalar(k) | Type::Vector(k, _) => {
                let width = base.ty.width().unwrap_or(1);
                let comps = swizzle_indices(&field.text).ok_or_else(|| {
                    invalid(format!("invalid swizzle '{}'", field.text), field.span)
                })?;
                if comps.iter().any(|c| *c >= width) {
                    return Err(invalid(
                        format!(
                            "swizzle '{}' is out of range for '{}'",
                            field.text,
                            self.type_name(&base.ty)
                        ),
                        field.span,
                    ));
                }
                let ty = Type::vector(k, comps.len() as u8);
                if base.ty.is_scalar() {
                    return Ok(match comps.len() {
                        1 => base,
                        n => splat(base, n as u8),
                    });
                }
                if let Some(ConstValue::Composite(parts)) = base.as_const() {
                    let picked: Vec<ConstValue> =
                        comps.iter().map(|c| parts[*c as usize].clone()).collect();
                    let value = match picked.as_slice() {
                        [one] => one.clone(),
                        _ => ConstValue::Composite(picked),
                    };
                    return Ok(Expr::constant(value, ty, span));
                }
                Ok(Expr::new(ExprKind::Swizzle(Box::new(base), comps), ty, span))
            }
            other => Err(invalid(
                format!(
                    "type '{}' has no member named '{}'",
                    self.type_name(&other),
                    field.text
                ),
                field.span,
            )),
        }
    }

    fn method(
        &mut self,
        base: Expr,
        name: &ast::Ident,
        args: &[ast::Expr],
        span: Span,
    ) -> Result<Expr, TypeError> {
        if name.text != "length" {
            return Err(invalid(format!("unknown method '{}'", name.text), name.span));
        }
        if !args.is_empty() {
            return Err(TypeError::ArityMismatch {
                name: "length".to_string(),
                expected: 0,
                found: args.len(),
                span,
            });
        }
        let n = match &base.ty {
            Type::Array(_, ArraySize::Fixed(n)) => *n,
            Type::Array(_, ArraySize::Runtime) => {
                if !matches!(base.kind, ExprKind::Member(..)) {
                    return Err(invalid(
                        "length() of an unsized array requires a buffer block member",
                        span,
                    ));
                }
                return Ok(Expr::new(ExprKind::ArrayLength(Box::new(base)), INT, span));
            }
            Type::Vector(_, n) => *n as u32,
            Type::Matrix { cols, .. } => *cols as u32,
            other => {
                return Err(invalid(
                    format!("length() is not defined for type '{}'", self.type_name(other)),
                    span,
                ))
            }
        };
        Ok(Expr::constant(ConstValue::Int(n as i32), INT, span))
    }

    fn index(&mut self, base: Expr, index: Expr, span: Span) -> Result<Expr, TypeError> {
        if index.ty != INT && index.ty != UINT {
            return Err(invalid(
                format!(
                    "array index must be a scalar integer, found '{}'",
                    self.type_name(&index.ty)
                ),
                index.span,
            ));
        }
        let (elem, bound) = match &base.ty {
            Type::Array(elem, ArraySize::Fixed(n)) => ((**elem).clone(), Some(*n)),
            Type::Array(elem, ArraySize::Runtime) => ((**elem).clone(), None),
            Type::Vector(k, n) => (Type::Scalar(*k), Some(*n as u32)),
            Type::Matrix { scalar, cols, rows } => (Type::Vector(*scalar, *rows), Some(*cols as u32)),
            other => {
                return Err(invalid(
                    format!("type '{}' cannot be indexed", self.type_name(other)),
                    span,
                ))
            }
        };

        match index.as_const().and_then(consteval::as_i64) {
            Some(i) => {
                if i < 0 || bound.is_some_and(|n| i >= n as i64) {
                    return Err(invalid(
                        format!("index {} is out of range for '{}'", i, self.type_name(&base.ty)),
                        index.span,
                    ));
                }
                if let Some(ConstValue::Composite(parts)) = base.as_const() {
                    if let Some(v) = parts.get(i as usize) {
                        return Ok(Expr::constant(v.clone(), elem, span));
                    }
                }
            }
            None => self.check_index_generality(&base, &index)?,
        }
        Ok(Expr::new(ExprKind::Index(Box::new(base), Box::new(index)), elem, span))
    }

    fn check_index_generality(&self, base: &Expr, index: &Expr) -> Result<(), TypeError> {
        if self.is_constant_index(index) {
            return Ok(());
        }
        let limits = &self.profile.limits;
        let (allowed, flag) = if base.ty.is_opaque() {
            (limits.general_sampler_indexing, "general_sampler_indexing")
        } else if base.as_const().is_some() && (base.ty.is_vector() || base.ty.is_matrix()) {
            (
                limits.general_constant_matrix_vector_indexing,
                "general_constant_matrix_vector_indexing",
            )
        } else {
            match base.root().kind {
                ExprKind::Global(g) => match self.program.global(g).storage {
                    Storage::Uniform => (limits.general_uniform_indexing, "general_uniform_indexing"),
                    Storage::Buffer => (true, ""),
                    _ => (limits.general_variable_indexing, "general_variable_indexing"),
                },
                _ => (limits.general_variable_indexing, "general_variable_indexing"),
            }
        };
        if allowed {
            return Ok(());
        }
        Err(unsupported(
            format!(
                "index must be a constant-index expression: the target profile disables {}",
                flag
            ),
            index.span,
        ))
    }

    /// Constants, inductive loop indices and operators over them.
    pub(super) fn is_constant_index(&self, e: &Expr) -> bool {
        match &e.kind {
            ExprKind::Const(_) => true,
            ExprKind::Local(id) => self.func.as_ref().is_some_and(|f| f.inductive.contains(id)),
            ExprKind::Unary(_, x) | ExprKind::Convert(x) | ExprKind::Splat(x) | ExprKind::Swizzle(x, _) => {
                self.is_constant_index(x)
            }
            ExprKind::Binary(_, a, b) | ExprKind::Logical(_, a, b) => {
                self.is_constant_index(a) && self.is_constant_index(b)
            }
            ExprKind::Ternary(c, a, b) => {
                self.is_constant_index(c) && self.is_constant_index(a) && self.is_constant_index(b)
            }
            ExprKind::Construct(args) => args.iter().all(|a| self.is_constant_index(a)),
            _ => false,
        }
    }

    // -----------------------------------------------------------------------
    // L-values and conversions
    // -----------------------------------------------------------------------

    pub(super) fn check_lvalue(&self, e: &Expr) -> Result<(), TypeError> {
        let deny = |target: String| {
            Err(TypeError::NotAssignable {
                target,
                span: e.span,
            })
        };
        match &e.kind {
            ExprKind::Local(id) => {
                let Some(f) = &self.func else {
                    return deny("a local outside of a function".to_string());
                };
                if f.read_only.contains(id) {
                    return deny(format!("'{}' (declared const)", f.locals[id.0 as usize].name));
                }
                Ok(())
            }
            ExprKind::Global(g) => {
                let g = self.program.global(*g);
                if g.read_only {
                    deny(format!("'{}' (declared const)", g.name))
                } else if g.storage == Storage::Uniform {
                    deny(format!("'{}' (uniforms are read-only)", g.name))
                } else if g.memory.readonly {
                    deny(format!("'{}' (declared readonly)", g.name))
                } else if g.ty.is_opaque() {
                    deny(format!("opaque variable '{}'", g.name))
                } else {
                    Ok(())
                }
            }
            ExprKind::Builtin(b) => deny(format!("built-in input '{}'", b.name())),
            ExprKind::Member(base, i) => {
                if let Type::Struct(sid) = &base.ty {
                    let m = &self.program.struct_def(*sid).members[*i as usize];
                    if m.memory.readonly {
                        return deny(format!("'{}' (declared readonly)", m.name));
                    }
                }
                self.check_lvalue(base)
            }
            ExprKind::Swizzle(base, comps) => {
                let repeated = comps.iter().enumerate().any(|(i, c)| comps[..i].contains(c));
                if repeated {
                    return deny("a swizzle with repeated components".to_string());
                }
                self.check_lvalue(base)
            }
            ExprKind::Index(base, _) => self.check_lvalue(base),
            ExprKind::Const(_) => deny("a constant expression".to_string()),
            _ => deny("an expression that is not an l-value".to_string()),
        }
    }

    /// Implicitly convert `e` to `to`, or fail with a type mismatch.
    pub(super) fn coerce(&self, e: Expr, to: &Type) -> Result<Expr, TypeError> {
        if &e.ty == to {
            return Ok(e);
        }
        if type_converts_to(&e.ty, to) {
            return Ok(self.convert_to(e, to.clone()));
        }
        Err(TypeError::Mismatch {
            expected: self.type_name(to),
            found: self.type_name(&e.ty),
            span: e.span,
        })
    }

    /// Component-wise conversion between same-shaped types; constants are
    /// converted in place.
    pub(super) fn convert_to(&self, e: Expr, to: Type) -> Expr {
        if e.ty == to {
            return e;
        }
        let span = e.span;
        if let (Some(v), Some(k)) = (e.as_const(), to.scalar_kind()) {
            return Expr::constant(consteval::convert(v, k), to, span);
        }
        Expr::new(ExprKind::Convert(Box::new(e)), to, span)
    }
}

fn literal(lit: ast::Lit, span: Span) -> Expr {
    let (v, ty) = match lit {
        ast::Lit::Int(i) => (ConstValue::Int(i), INT),
        ast::Lit::Uint(u) => (ConstValue::Uint(u), UINT),
        ast::Lit::Float(f) => (ConstValue::Float(f), Type::Scalar(ScalarKind::Float)),
        ast::Lit::Double(d) => (ConstValue::Double(d), Type::Scalar(ScalarKind::Double)),
        ast::Lit::Bool(b) => (ConstValue::Bool(b), BOOL),
    };
    Expr::constant(v, ty, span)
}

/// Broadcast a scalar to an `n`-component vector.
pub(super) fn splat(e: Expr, n: u8) -> Expr {
    let Type::Scalar(k) = e.ty else {
        return e;
    };
    let ty = Type::Vector(k, n);
    let span = e.span;
    if let Some(v) = e.as_const() {
        return Expr::constant(ConstValue::Composite(vec![v.clone(); n as usize]), ty, span);
    }
    Expr::new(ExprKind::Splat(Box::new(e)), ty, span)
}

/// Component indices of a swizzle; all letters must come from one set.
fn swizzle_indices(text: &str) -> Option<Vec<u8>> {
    const SETS: [&str; 3] = ["xyzw", "rgba", "stpq"];
    if text.is_empty() || text.len() > 4 {
        return None;
    }
    let first = text.chars().next()?;
    let set = SETS.iter().find(|s| s.contains(first))?;
    text.chars()
        .map(|c| set.find(c).map(|i| i as u8))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::swizzle_indices;

    #[test]
    fn swizzle_sets_do_not_mix() {
        assert_eq!(swizzle_indices("xyz"), Some(vec![0, 1, 2]));
        assert_eq!(swizzle_indices("bgra"), Some(vec![2, 1, 0, 3]));
        assert_eq!(swizzle_indices("xg"), None);
        assert_eq!(swizzle_indices("xyzwx"), None);
        assert_eq!(swizzle_indices("q"), Some(vec![3]));
    }
}
