use rspirv::spirv::{self, Op, StorageClass, Word};

use glint_ast::ast::{BinOp, UnOp};
use glint_ast::diag::{Diagnostic, Stage};
use glint_ast::span::Span;
use glint_types::consteval;
use glint_types::tir::{ConstValue, Expr, ExprKind, FuncId, ParamDir};
use glint_types::types::{ArraySize, ScalarKind, Type, BOOL, UINT};

use super::{error, Layout, Lowerer, Place, Result};
use crate::builder::TypeKey;

/// Opcode for a comparison of `kind` operands.
pub(super) fn compare_op(op: BinOp, kind: ScalarKind) -> Option<Op> {
    use ScalarKind::*;
    let float = matches!(kind, Float | Double);
    Some(match op {
        BinOp::Lt if float => Op::FOrdLessThan,
        BinOp::Lt if kind == Int => Op::SLessThan,
        BinOp::Lt => Op::ULessThan,
        BinOp::Le if float => Op::FOrdLessThanEqual,
        BinOp::Le if kind == Int => Op::SLessThanEqual,
        BinOp::Le => Op::ULessThanEqual,
        BinOp::Gt if float => Op::FOrdGreaterThan,
        BinOp::Gt if kind == Int => Op::SGreaterThan,
        BinOp::Gt => Op::UGreaterThan,
        BinOp::Ge if float => Op::FOrdGreaterThanEqual,
        BinOp::Ge if kind == Int => Op::SGreaterThanEqual,
        BinOp::Ge => Op::UGreaterThanEqual,
        BinOp::Eq if float => Op::FOrdEqual,
        BinOp::Eq if kind == Bool => Op::LogicalEqual,
        BinOp::Eq => Op::IEqual,
        BinOp::Ne if float => Op::FUnordNotEqual,
        BinOp::Ne if kind == Bool => Op::LogicalNotEqual,
        BinOp::Ne => Op::INotEqual,
        _ => return None,
    })
}

/// Opcode for component-wise arithmetic, bitwise and logical operators.
fn arith_op(op: BinOp, kind: ScalarKind) -> Option<Op> {
    let float = matches!(kind, ScalarKind::Float | ScalarKind::Double);
    let signed = kind == ScalarKind::Int;
    Some(match op {
        BinOp::Add if float => Op::FAdd,
        BinOp::Add => Op::IAdd,
        BinOp::Sub if float => Op::FSub,
        BinOp::Sub => Op::ISub,
        BinOp::Mul if float => Op::FMul,
        BinOp::Mul => Op::IMul,
        BinOp::Div if float => Op::FDiv,
        BinOp::Div if signed => Op::SDiv,
        BinOp::Div => Op::UDiv,
        BinOp::Mod if float => Op::FMod,
        BinOp::Mod if signed => Op::SMod,
        BinOp::Mod => Op::UMod,
        BinOp::BitAnd => Op::BitwiseAnd,
        BinOp::BitOr => Op::BitwiseOr,
        BinOp::BitXor => Op::BitwiseXor,
        BinOp::Shl => Op::ShiftLeftLogical,
        BinOp::Shr if signed => Op::ShiftRightArithmetic,
        BinOp::Shr => Op::ShiftRightLogical,
        BinOp::And => Op::LogicalAnd,
        BinOp::Or => Op::LogicalOr,
        BinOp::Xor => Op::LogicalNotEqual,
        _ => return None,
    })
}

impl<'p> Lowerer<'p> {
    // -----------------------------------------------------------------------
    // Instruction helpers
    // -----------------------------------------------------------------------

    /// Emit an instruction with a result of type `t`.
    pub(super) fn op(&mut self, op: Op, t: Word, operands: &[Word]) -> Word {
        let id = self.b.id();
        let mut ops = Vec::with_capacity(operands.len() + 2);
        ops.push(t);
        ops.push(id);
        ops.extend_from_slice(operands);
        self.w.emit(op, &ops);
        id
    }

    pub(super) fn extract(&mut self, t: Word, composite: Word, indices: &[u32]) -> Word {
        let mut ops = vec![composite];
        ops.extend_from_slice(indices);
        self.op(Op::CompositeExtract, t, &ops)
    }

    pub(super) fn construct(&mut self, t: Word, parts: &[Word]) -> Word {
        self.op(Op::CompositeConstruct, t, parts)
    }

    /// Scalar `v` replicated into a vector of `n` components.
    pub(super) fn splat(&mut self, v: Word, kind: ScalarKind, n: u8) -> Word {
        let t = self.ty(&Type::Vector(kind, n));
        self.construct(t, &vec![v; n as usize])
    }

    // -----------------------------------------------------------------------
    // Memory
    // -----------------------------------------------------------------------

    /// Pointer to the storage `e` designates, if it designates any.
    /// Nothing is emitted when the answer is `None`.
    pub(super) fn place(&mut self, e: &Expr) -> Result<Option<Place>> {
        let place = match &e.kind {
            ExprKind::Local(l) => self
                .locals
                .get(l.0 as usize)
                .copied()
                .ok_or_else(|| error("reference to an unknown local variable", e.span))?,
            ExprKind::Global(g) => self
                .globals
                .get(g.0 as usize)
                .copied()
                .ok_or_else(|| error("reference to an unknown global variable", e.span))?,
            ExprKind::Builtin(b) => Place {
                ptr: self.builtin(*b),
                class: StorageClass::Input,
                layout: None,
            },
            ExprKind::Member(base, i) => {
                let Some(p) = self.place(base)? else {
                    return Ok(None);
                };
                let layout = match (&base.ty, p.layout) {
                    (Type::Struct(id), Some(l)) => {
                        let def = self.program.struct_def(*id);
                        Some(Layout {
                            rule: l.rule,
                            row_major: def.members.get(*i as usize).is_some_and(|m| m.row_major),
                        })
                    }
                    _ => p.layout,
                };
                let index = self.int_const(*i as i32);
                self.access(p, &e.ty, layout, index)
            }
            ExprKind::Index(base, index) => {
                let Some(p) = self.place(base)? else {
                    return Ok(None);
                };
                let index = self.value(index)?;
                self.access(p, &e.ty, p.layout, index)
            }
            _ => return Ok(None),
        };
        Ok(Some(place))
    }

    fn access(&mut self, p: Place, ty: &Type, layout: Option<Layout>, index: Word) -> Place {
        let t = self.ty_in(ty, layout);
        let ptr_ty = self.b.type_id(TypeKey::Pointer(p.class, t));
        let ptr = self.op(Op::AccessChain, ptr_ty, &[p.ptr, index]);
        Place {
            ptr,
            class: p.class,
            layout,
        }
    }

    pub(super) fn load(&mut self, p: Place, ty: &Type) -> Word {
        let t = self.ty_in(ty, p.layout);
        let v = self.op(Op::Load, t, &[p.ptr]);
        match p.layout {
            Some(l) => self.relayout(v, ty, Some(l), None),
            None => v,
        }
    }

    pub(super) fn store(&mut self, p: Place, ty: &Type, value: Word) {
        let v = match p.layout {
            Some(l) => self.relayout(value, ty, None, Some(l)),
            None => value,
        };
        self.w.emit(Op::Store, &[p.ptr, v]);
    }

    /// Rebuild an aggregate between the plain and a block representation.
    /// Scalars, vectors and matrices share one type in both.
    fn relayout(&mut self, v: Word, ty: &Type, from: Option<Layout>, to: Option<Layout>) -> Word {
        match ty {
            Type::Array(elem, ArraySize::Fixed(n)) => {
                let from_elem = self.ty_in(elem, from);
                let mut parts = Vec::with_capacity(*n as usize);
                for i in 0..*n {
                    let x = self.extract(from_elem, v, &[i]);
                    parts.push(self.relayout(x, elem, from, to));
                }
                let t = self.ty_in(ty, to);
                self.construct(t, &parts)
            }
            Type::Struct(id) => {
                let program = self.program;
                let def = program.struct_def(*id);
                let mut parts = Vec::with_capacity(def.members.len());
                for (i, m) in def.members.iter().enumerate() {
                    let from_m = from.map(|l| Layout {
                        row_major: m.row_major,
                        ..l
                    });
                    let to_m = to.map(|l| Layout {
                        row_major: m.row_major,
                        ..l
                    });
                    let t = self.ty_in(&m.ty, from_m);
                    let x = self.extract(t, v, &[i as u32]);
                    parts.push(self.relayout(x, &m.ty, from_m, to_m));
                }
                let t = self.ty_in(ty, to);
                self.construct(t, &parts)
            }
            _ => v,
        }
    }

    /// Store `value` into the l-value `target`.
    pub(super) fn assign_to(&mut self, target: &Expr, value: Word) -> Result<()> {
        if let ExprKind::Swizzle(base, comps) = &target.kind {
            return match self.place(base)? {
                Some(p) => {
                    let cur = self.load(p, &base.ty);
                    let new = self.write_swizzle(&base.ty, cur, comps, value);
                    self.store(p, &base.ty, new);
                    Ok(())
                }
                None => {
                    let cur = self.value(base)?;
                    let new = self.write_swizzle(&base.ty, cur, comps, value);
                    self.assign_to(base, new)
                }
            };
        }
        let p = self
            .place(target)?
            .ok_or_else(|| error("expression cannot be assigned to", target.span))?;
        self.store(p, &target.ty, value);
        Ok(())
    }

    fn write_swizzle(&mut self, vec_ty: &Type, cur: Word, comps: &[u8], value: Word) -> Word {
        let t = self.ty(vec_ty);
        if let [c] = comps {
            return self.op(Op::CompositeInsert, t, &[value, cur, *c as u32]);
        }
        let n = vec_ty.width().unwrap_or(1) as u32;
        let mut select: Vec<u32> = (0..n).collect();
        for (k, c) in comps.iter().enumerate() {
            if let Some(slot) = select.get_mut(*c as usize) {
                *slot = n + k as u32;
            }
        }
        let mut ops = vec![cur, value];
        ops.extend(select);
        self.op(Op::VectorShuffle, t, &ops)
    }

    /// Read-modify-write of `target`; returns the old and new values.
    fn update(&mut self, target: &Expr, op: BinOp, rhs: Word, rhs_ty: &Type) -> Result<(Word, Word)> {
        let ty = &target.ty;
        if !matches!(target.kind, ExprKind::Swizzle(..)) {
            if let Some(p) = self.place(target)? {
                let old = self.load(p, ty);
                let new = self.binary(op, old, ty, rhs, rhs_ty, ty, target.span)?;
                self.store(p, ty, new);
                return Ok((old, new));
            }
        }
        let old = self.value(target)?;
        let new = self.binary(op, old, ty, rhs, rhs_ty, ty, target.span)?;
        self.assign_to(target, new)?;
        Ok((old, new))
    }

    fn inc_dec(&mut self, target: &Expr, increment: bool, prefix: bool) -> Result<Word> {
        let kind = target.ty.scalar_kind().unwrap_or(ScalarKind::Int);
        let one = self.constant(&consteval::one(kind), &Type::Scalar(kind));
        let op = if increment { BinOp::Add } else { BinOp::Sub };
        let (old, new) = self.update(target, op, one, &Type::Scalar(kind))?;
        Ok(if prefix { new } else { old })
    }

    // -----------------------------------------------------------------------
    // Values
    // -----------------------------------------------------------------------

    /// Lower `e` and return the id of its value (0 for `void`).
    pub(super) fn value(&mut self, e: &Expr) -> Result<Word> {
        match &e.kind {
            ExprKind::Const(v) => Ok(self.constant(v, &e.ty)),
            ExprKind::Local(_) | ExprKind::Global(_) | ExprKind::Builtin(_) => {
                let p = self
                    .place(e)?
                    .ok_or_else(|| error("variable has no storage", e.span))?;
                Ok(self.load(p, &e.ty))
            }
            ExprKind::Member(base, i) => {
                if let Some(p) = self.place(e)? {
                    return Ok(self.load(p, &e.ty));
                }
                let b = self.value(base)?;
                let t = self.ty(&e.ty);
                Ok(self.extract(t, b, &[*i]))
            }
            ExprKind::Index(base, index) => {
                if let Some(p) = self.place(e)? {
                    return Ok(self.load(p, &e.ty));
                }
                let b = self.value(base)?;
                let t = self.ty(&e.ty);
                if let Some(i) = index.as_const().and_then(consteval::as_i64) {
                    return Ok(self.extract(t, b, &[i as u32]));
                }
                let i = self.value(index)?;
                if base.ty.is_vector() {
                    return Ok(self.op(Op::VectorExtractDynamic, t, &[b, i]));
                }
                // dynamic index into a temporary: spill it
                let bt = self.ty(&base.ty);
                let var = self.temp(bt);
                self.w.emit(Op::Store, &[var, b]);
                let p = Place {
                    ptr: var,
                    class: StorageClass::Function,
                    layout: None,
                };
                let p = self.access(p, &e.ty, None, i);
                Ok(self.load(p, &e.ty))
            }
            ExprKind::Swizzle(base, comps) => {
                let b = self.value(base)?;
                let t = self.ty(&e.ty);
                if base.ty.is_scalar() {
                    if comps.len() == 1 {
                        return Ok(b);
                    }
                    return Ok(self.construct(t, &vec![b; comps.len()]));
                }
                if let [c] = comps.as_slice() {
                    return Ok(self.extract(t, b, &[*c as u32]));
                }
                let mut ops = vec![b, b];
                ops.extend(comps.iter().map(|c| *c as u32));
                Ok(self.op(Op::VectorShuffle, t, &ops))
            }
            ExprKind::Unary(op, x) => self.unary(*op, x, &e.ty),
            ExprKind::Binary(op, l, r) => {
                let a = self.value(l)?;
                let b = self.value(r)?;
                self.binary(*op, a, &l.ty, b, &r.ty, &e.ty, e.span)
            }
            ExprKind::Logical(is_and, l, r) => self.short_circuit(*is_and, l, r),
            ExprKind::Convert(x) => {
                let v = self.value(x)?;
                Ok(self.convert(v, &x.ty, &e.ty))
            }
            ExprKind::Construct(args) => self.construct_expr(&e.ty, args),
            ExprKind::Splat(x) => {
                let v = self.value(x)?;
                match e.ty {
                    Type::Vector(k, n) => Ok(self.splat(v, k, n)),
                    _ => Ok(v),
                }
            }
            ExprKind::MatrixDiagonal(x) => {
                let v = self.value(x)?;
                Ok(self.matrix_diagonal(v, &e.ty))
            }
            ExprKind::MatrixResize(x) => {
                let v = self.value(x)?;
                Ok(self.matrix_resize(v, &x.ty, &e.ty))
            }
            ExprKind::Call(f, args) => self.call(*f, args, &e.ty, e.span),
            ExprKind::Intrinsic(op, args) => self.intrinsic(*op, args, e),
            ExprKind::Assign { target, op, value } => {
                let v = self.value(value)?;
                match op {
                    Some(op) => Ok(self.update(target, *op, v, &value.ty)?.1),
                    None => {
                        self.assign_to(target, v)?;
                        Ok(v)
                    }
                }
            }
            ExprKind::IncDec {
                target,
                increment,
                prefix,
            } => self.inc_dec(target, *increment, *prefix),
            ExprKind::Ternary(c, a, b) => self.ternary(c, a, b, &e.ty),
            ExprKind::ArrayLength(x) => {
                let ExprKind::Member(base, i) = &x.kind else {
                    return Err(error("length() requires a runtime-sized block member", x.span));
                };
                let p = self
                    .place(base)?
                    .ok_or_else(|| error("length() requires a runtime-sized block member", x.span))?;
                let uint = self.ty(&UINT);
                let len = self.op(Op::ArrayLength, uint, &[p.ptr, *i]);
                Ok(self.convert(len, &UINT, &e.ty))
            }
            ExprKind::Comma(a, b) => {
                self.value(a)?;
                self.value(b)
            }
        }
    }

    fn unary(&mut self, op: UnOp, x: &Expr, ty: &Type) -> Result<Word> {
        match op {
            UnOp::Plus => self.value(x),
            UnOp::Neg => {
                let v = self.value(x)?;
                Ok(self.negate(v, ty))
            }
            UnOp::Not => {
                let v = self.value(x)?;
                let t = self.ty(ty);
                Ok(self.op(Op::LogicalNot, t, &[v]))
            }
            UnOp::BitNot => {
                let v = self.value(x)?;
                let t = self.ty(ty);
                Ok(self.op(Op::Not, t, &[v]))
            }
            UnOp::PreInc => self.inc_dec(x, true, true),
            UnOp::PreDec => self.inc_dec(x, false, true),
            UnOp::PostInc => self.inc_dec(x, true, false),
            UnOp::PostDec => self.inc_dec(x, false, false),
        }
    }

    fn negate(&mut self, v: Word, ty: &Type) -> Word {
        if let Type::Matrix { scalar, cols, rows } = ty {
            let col_ty = Type::Vector(*scalar, *rows);
            let ct = self.ty(&col_ty);
            let mut columns = Vec::with_capacity(*cols as usize);
            for c in 0..*cols as u32 {
                let col = self.extract(ct, v, &[c]);
                columns.push(self.negate(col, &col_ty));
            }
            let t = self.ty(ty);
            return self.construct(t, &columns);
        }
        let t = self.ty(ty);
        let op = if ty.is_float_like() { Op::FNegate } else { Op::SNegate };
        self.op(op, t, &[v])
    }

    /// Splat a scalar operand against a vector one.
    fn match_shapes(&mut self, a: Word, at: &Type, b: Word, bt: &Type) -> (Word, Word) {
        match (at, bt) {
            (Type::Scalar(k), Type::Vector(_, n)) => (self.splat(a, *k, *n), b),
            (Type::Vector(_, n), Type::Scalar(k)) => (a, self.splat(b, *k, *n)),
            _ => (a, b),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn binary(
        &mut self,
        op: BinOp,
        a: Word,
        at: &Type,
        b: Word,
        bt: &Type,
        ty: &Type,
        span: Span,
    ) -> Result<Word> {
        if matches!(op, BinOp::Eq | BinOp::Ne) {
            let eq = self.equal(a, b, at, span)?;
            if op == BinOp::Ne {
                let t = self.ty(&BOOL);
                return Ok(self.op(Op::LogicalNot, t, &[eq]));
            }
            return Ok(eq);
        }
        if at.is_matrix() || bt.is_matrix() {
            return self.matrix_arith(op, a, at, b, bt, ty, span);
        }
        let kind = at
            .scalar_kind()
            .ok_or_else(|| error("operator applied to a non-numeric value", span))?;
        let (a, b) = self.match_shapes(a, at, b, bt);
        let opcode = compare_op(op, kind)
            .filter(|_| matches!(op, BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge))
            .or_else(|| arith_op(op, kind))
            .ok_or_else(|| error("operator has no SPIR-V equivalent", span))?;
        let t = self.ty(ty);
        Ok(self.op(opcode, t, &[a, b]))
    }

    #[allow(clippy::too_many_arguments)]
    fn matrix_arith(
        &mut self,
        op: BinOp,
        a: Word,
        at: &Type,
        b: Word,
        bt: &Type,
        ty: &Type,
        span: Span,
    ) -> Result<Word> {
        let t = self.ty(ty);
        if op == BinOp::Mul {
            let (opcode, operands) = match (at, bt) {
                (Type::Matrix { .. }, Type::Matrix { .. }) => (Op::MatrixTimesMatrix, [a, b]),
                (Type::Matrix { .. }, Type::Vector(..)) => (Op::MatrixTimesVector, [a, b]),
                (Type::Vector(..), Type::Matrix { .. }) => (Op::VectorTimesMatrix, [a, b]),
                (Type::Matrix { .. }, _) => (Op::MatrixTimesScalar, [a, b]),
                _ => (Op::MatrixTimesScalar, [b, a]),
            };
            return Ok(self.op(opcode, t, &operands));
        }
        let Type::Matrix { scalar, cols, rows } = ty else {
            return Err(error("matrix operation with a non-matrix result", span));
        };
        let col_ty = Type::Vector(*scalar, *rows);
        let ct = self.ty(&col_ty);
        let opcode = arith_op(op, *scalar).ok_or_else(|| error("operator is not defined on matrices", span))?;
        let mut columns = Vec::with_capacity(*cols as usize);
        for c in 0..*cols as u32 {
            let x = if at.is_matrix() {
                self.extract(ct, a, &[c])
            } else {
                self.splat(a, *scalar, *rows)
            };
            let y = if bt.is_matrix() {
                self.extract(ct, b, &[c])
            } else {
                self.splat(b, *scalar, *rows)
            };
            columns.push(self.op(opcode, ct, &[x, y]));
        }
        Ok(self.construct(t, &columns))
    }

    /// `a == b` for any comparable type, reduced to one `bool`.
    fn equal(&mut self, a: Word, b: Word, ty: &Type, span: Span) -> Result<Word> {
        let bool_t = self.ty(&BOOL);
        match ty {
            Type::Scalar(k) => {
                let op = compare_op(BinOp::Eq, *k).unwrap_or(Op::IEqual);
                Ok(self.op(op, bool_t, &[a, b]))
            }
            Type::Vector(k, n) => {
                let op = compare_op(BinOp::Eq, *k).unwrap_or(Op::IEqual);
                let bv = self.ty(&Type::Vector(ScalarKind::Bool, *n));
                let each = self.op(op, bv, &[a, b]);
                Ok(self.op(Op::All, bool_t, &[each]))
            }
            Type::Matrix { scalar, cols, rows } => {
                let col_ty = Type::Vector(*scalar, *rows);
                let parts: Vec<(u32, Type)> = (0..*cols as u32).map(|c| (c, col_ty.clone())).collect();
                self.equal_parts(a, b, &parts, span)
            }
            Type::Array(elem, ArraySize::Fixed(n)) => {
                let parts: Vec<(u32, Type)> = (0..*n).map(|i| (i, (**elem).clone())).collect();
                self.equal_parts(a, b, &parts, span)
            }
            Type::Struct(id) => {
                let parts: Vec<(u32, Type)> = self
                    .program
                    .struct_def(*id)
                    .members
                    .iter()
                    .enumerate()
                    .map(|(i, m)| (i as u32, m.ty.clone()))
                    .collect();
                self.equal_parts(a, b, &parts, span)
            }
            _ => Err(error(
                format!("values of type '{}' cannot be compared", self.program.type_name(ty)),
                span,
            )),
        }
    }

    fn equal_parts(&mut self, a: Word, b: Word, parts: &[(u32, Type)], span: Span) -> Result<Word> {
        let bool_t = self.ty(&BOOL);
        let mut acc: Option<Word> = None;
        for (i, ty) in parts {
            let t = self.ty(ty);
            let x = self.extract(t, a, &[*i]);
            let y = self.extract(t, b, &[*i]);
            let eq = self.equal(x, y, ty, span)?;
            acc = Some(match acc {
                Some(prev) => self.op(Op::LogicalAnd, bool_t, &[prev, eq]),
                None => eq,
            });
        }
        Ok(match acc {
            Some(v) => v,
            None => self.constant(&ConstValue::Bool(true), &BOOL),
        })
    }

    fn short_circuit(&mut self, is_and: bool, lhs: &Expr, rhs: &Expr) -> Result<Word> {
        let bool_t = self.ty(&BOOL);
        let a = self.value(lhs)?;
        let from = self.w.current;
        let rhs_l = self.b.id();
        let merge = self.b.id();
        self.w.emit(Op::SelectionMerge, &[merge, spirv::SelectionControl::NONE.bits()]);
        let targets = if is_and { [rhs_l, merge] } else { [merge, rhs_l] };
        self.w.terminate(Op::BranchConditional, &[a, targets[0], targets[1]]);

        self.w.label(rhs_l);
        let b = self.value(rhs)?;
        let rhs_end = self.w.current;
        self.branch(merge);

        self.w.label(merge);
        Ok(self.op(Op::Phi, bool_t, &[a, from, b, rhs_end]))
    }

    fn ternary(&mut self, c: &Expr, a: &Expr, b: &Expr, ty: &Type) -> Result<Word> {
        if let Some(cond) = c.as_const().and_then(consteval::as_bool) {
            return self.value(if cond { a } else { b });
        }
        let cond = self.value(c)?;
        let then_l = self.b.id();
        let else_l = self.b.id();
        let merge = self.b.id();
        self.w.emit(Op::SelectionMerge, &[merge, spirv::SelectionControl::NONE.bits()]);
        self.w.terminate(Op::BranchConditional, &[cond, then_l, else_l]);

        self.w.label(then_l);
        let x = self.value(a)?;
        let x_end = self.w.current;
        self.branch(merge);

        self.w.label(else_l);
        let y = self.value(b)?;
        let y_end = self.w.current;
        self.branch(merge);

        self.w.label(merge);
        if *ty == Type::Void {
            return Ok(0);
        }
        let t = self.ty(ty);
        Ok(self.op(Op::Phi, t, &[x, x_end, y, y_end]))
    }

    // -----------------------------------------------------------------------
    // Conversions and construction
    // -----------------------------------------------------------------------

    /// Component-wise conversion between two types of the same shape.
    pub(super) fn convert(&mut self, v: Word, from: &Type, to: &Type) -> Word {
        let (Some(fk), Some(tk)) = (from.scalar_kind(), to.scalar_kind()) else {
            return v;
        };
        if fk == tk {
            return v;
        }
        if let (Type::Matrix { cols, rows, .. }, Type::Matrix { .. }) = (from, to) {
            let from_col = Type::Vector(fk, *rows);
            let to_col = Type::Vector(tk, *rows);
            let fct = self.ty(&from_col);
            let mut columns = Vec::with_capacity(*cols as usize);
            for c in 0..*cols as u32 {
                let col = self.extract(fct, v, &[c]);
                columns.push(self.convert(col, &from_col, &to_col));
            }
            let t = self.ty(to);
            return self.construct(t, &columns);
        }

        use ScalarKind::*;
        let t = self.ty(to);
        let width = to.width().unwrap_or(1);
        match (fk, tk) {
            (Bool, _) => {
                let one = self.splat_const(tk, width, consteval::one(tk));
                let zero = self.splat_const(tk, width, consteval::zero(tk));
                self.op(Op::Select, t, &[v, one, zero])
            }
            (_, Bool) => {
                let zero = self.splat_const(fk, width, consteval::zero(fk));
                let op = if matches!(fk, Float | Double) {
                    Op::FUnordNotEqual
                } else {
                    Op::INotEqual
                };
                self.op(op, t, &[v, zero])
            }
            (Int, Float | Double) => self.op(Op::ConvertSToF, t, &[v]),
            (Uint, Float | Double) => self.op(Op::ConvertUToF, t, &[v]),
            (Float | Double, Int) => self.op(Op::ConvertFToS, t, &[v]),
            (Float | Double, Uint) => self.op(Op::ConvertFToU, t, &[v]),
            (Int | Uint, Int | Uint) => self.op(Op::Bitcast, t, &[v]),
            _ => self.op(Op::FConvert, t, &[v]),
        }
    }

    /// Scalar components of `v`, converted to `kind`, appended to `out`.
    fn flatten(&mut self, v: Word, ty: &Type, kind: ScalarKind, out: &mut Vec<Word>) {
        let Some(k) = ty.scalar_kind() else {
            return;
        };
        let st = self.ty(&Type::Scalar(k));
        let mut push = |l: &mut Self, x: Word| {
            let x = l.convert(x, &Type::Scalar(k), &Type::Scalar(kind));
            out.push(x);
        };
        match ty {
            Type::Scalar(_) => push(self, v),
            Type::Vector(_, n) => {
                for i in 0..*n as u32 {
                    let x = self.extract(st, v, &[i]);
                    push(self, x);
                }
            }
            Type::Matrix { cols, rows, .. } => {
                for c in 0..*cols as u32 {
                    for r in 0..*rows as u32 {
                        let x = self.extract(st, v, &[c, r]);
                        push(self, x);
                    }
                }
            }
            _ => {}
        }
    }

    fn construct_expr(&mut self, ty: &Type, args: &[Expr]) -> Result<Word> {
        let t = self.ty(ty);
        let Some(kind) = ty.scalar_kind() else {
            let mut parts = Vec::with_capacity(args.len());
            for a in args {
                parts.push(self.value(a)?);
            }
            return Ok(self.construct(t, &parts));
        };

        let mut comps = Vec::new();
        for a in args {
            let v = self.value(a)?;
            self.flatten(v, &a.ty, kind, &mut comps);
        }
        match ty {
            Type::Vector(_, n) => {
                comps.truncate(*n as usize);
                Ok(self.construct(t, &comps))
            }
            Type::Matrix { cols, rows, .. } => {
                let ct = self.ty(&Type::Vector(kind, *rows));
                let mut columns = Vec::with_capacity(*cols as usize);
                for c in comps.chunks(*rows as usize).take(*cols as usize) {
                    columns.push(self.construct(ct, c));
                }
                Ok(self.construct(t, &columns))
            }
            _ => comps
                .first()
                .copied()
                .ok_or_else(|| Diagnostic::error(Stage::CodeGen, "empty constructor")),
        }
    }

    fn matrix_diagonal(&mut self, v: Word, ty: &Type) -> Word {
        let Type::Matrix { scalar, cols, rows } = ty else {
            return v;
        };
        let zero = self.constant(&consteval::zero(*scalar), &Type::Scalar(*scalar));
        let ct = self.ty(&Type::Vector(*scalar, *rows));
        let mut columns = Vec::with_capacity(*cols as usize);
        for c in 0..*cols {
            let comps: Vec<Word> = (0..*rows).map(|r| if r == c { v } else { zero }).collect();
            columns.push(self.construct(ct, &comps));
        }
        let t = self.ty(ty);
        self.construct(t, &columns)
    }

    /// Copy the overlapping part of `v`; the rest comes from the identity.
    fn matrix_resize(&mut self, v: Word, from: &Type, to: &Type) -> Word {
        let (
            Type::Matrix {
                cols: fc, rows: fr, ..
            },
            Type::Matrix { scalar, cols, rows },
        ) = (from, to)
        else {
            return v;
        };
        let st = self.ty(&Type::Scalar(*scalar));
        let zero = self.constant(&consteval::zero(*scalar), &Type::Scalar(*scalar));
        let one = self.constant(&consteval::one(*scalar), &Type::Scalar(*scalar));
        let ct = self.ty(&Type::Vector(*scalar, *rows));
        let mut columns = Vec::with_capacity(*cols as usize);
        for c in 0..*cols {
            let mut comps = Vec::with_capacity(*rows as usize);
            for r in 0..*rows {
                comps.push(if c < *fc && r < *fr {
                    self.extract(st, v, &[c as u32, r as u32])
                } else if c == r {
                    one
                } else {
                    zero
                });
            }
            columns.push(self.construct(ct, &comps));
        }
        let t = self.ty(to);
        self.construct(t, &columns)
    }

    // -----------------------------------------------------------------------
    // Calls
    // -----------------------------------------------------------------------

    /// Arguments are copied into temporaries; `out` and `inout` ones are
    /// copied back after the call returns.
    fn call(&mut self, id: FuncId, args: &[Expr], ty: &Type, span: Span) -> Result<Word> {
        let program = self.program;
        let f = program.function(id);
        let callee = self
            .functions
            .get(&id)
            .copied()
            .ok_or_else(|| error(format!("function '{}' has no body", f.name), span))?;

        let mut pointers = Vec::with_capacity(args.len());
        let mut copy_back = Vec::new();
        for (p, a) in f.params.iter().zip(args) {
            if p.ty.is_opaque() {
                let place = self
                    .place(a)?
                    .ok_or_else(|| error("opaque arguments must name a variable", a.span))?;
                pointers.push(place.ptr);
                continue;
            }
            let t = self.ty(&p.ty);
            let tmp = self.temp(t);
            if p.dir != ParamDir::Out {
                let v = self.value(a)?;
                self.w.emit(Op::Store, &[tmp, v]);
            }
            pointers.push(tmp);
            if p.dir != ParamDir::In {
                copy_back.push((tmp, t, a));
            }
        }

        let ret = self.ty(ty);
        let mut ops = vec![callee];
        ops.extend(pointers);
        let result = self.op(Op::FunctionCall, ret, &ops);
        for (tmp, t, a) in copy_back {
            let v = self.op(Op::Load, t, &[tmp]);
            self.assign_to(a, v)?;
        }
        Ok(result)
    }
}
