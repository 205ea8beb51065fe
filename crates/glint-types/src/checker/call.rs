//! Calls: constructors, user functions (with overload resolution) and the
//! built-in function library.

use super::expr::splat;
use super::{invalid, unsupported, TypeChecker, TypeError};
use crate::builtins::{unavailable_in_compute, AtomicOp, Intrinsic};
use crate::consteval;
use crate::tir::{ConstValue, Expr, ExprKind, FuncId, MemoryFlags, ParamDir, Storage};
use crate::types::{
    common_kind, dim_coords, type_converts_to, ArraySize, ImageFormat, ScalarKind, Type, BOOL,
    INT, UINT,
};
use glint_ast::ast;
use glint_ast::span::Span;

/// Component kinds a generic built-in accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kinds {
    /// `genFType`: single precision only.
    Float,
    /// `genFType` and `genDType`.
    FloatLike,
    /// Floating point and signed integers.
    Signed,
    /// Every numeric kind.
    Numeric,
    Integer,
    /// Any kind, booleans included.
    Any,
    Exact(ScalarKind),
}

impl Kinds {
    fn allows(self, k: ScalarKind) -> bool {
        use ScalarKind::*;
        match self {
            Kinds::Float => k == Float,
            Kinds::FloatLike => matches!(k, Float | Double),
            Kinds::Signed => matches!(k, Int | Float | Double),
            Kinds::Numeric => k != Bool,
            Kinds::Integer => matches!(k, Int | Uint),
            Kinds::Any => true,
            Kinds::Exact(want) => k == want,
        }
    }
}

impl<'p> TypeChecker<'p> {
    pub(super) fn call(
        &mut self,
        callee: &ast::Callee,
        args: &[ast::Expr],
        span: Span,
    ) -> Result<Expr, TypeError> {
        let name = match callee {
            ast::Callee::Type(spec) => {
                let ty = self.resolve_base(spec)?;
                let args = self.exprs(args)?;
                return self.construct(ty, args, span);
            }
            ast::Callee::Name(id) => id,
        };
        if let Some((sid, _)) = self.structs.get(&name.text) {
            let ty = Type::Struct(*sid);
            let args = self.exprs(args)?;
            return self.construct(ty, args, span);
        }
        if let Some(candidates) = self.functions.get(&name.text).cloned() {
            let args = self.exprs(args)?;
            return self.user_call(&name.text, &candidates, args, span);
        }
        if let Some(op) = Intrinsic::from_name(&name.text) {
            let args = self.exprs(args)?;
            return self.intrinsic(op, &name.text, args, span);
        }
        if let Some(reason) = unavailable_in_compute(&name.text) {
            return Err(unsupported(format!("'{}': {}", name.text, reason), name.span));
        }
        if self.lookup(&name.text).is_some() {
            return Err(invalid(format!("'{}' is not a function", name.text), name.span));
        }
        Err(invalid(format!("no function named '{}'", name.text), name.span))
    }

    fn exprs(&mut self, args: &[ast::Expr]) -> Result<Vec<Expr>, TypeError> {
        args.iter().map(|a| self.expr(a)).collect()
    }

    fn arg_list(&self, args: &[Expr]) -> String {
        args.iter()
            .map(|a| self.type_name(&a.ty))
            .collect::<Vec<_>>()
            .join(", ")
    }

    // -----------------------------------------------------------------------
    // Constructors
    // -----------------------------------------------------------------------

    fn construct(&mut self, ty: Type, args: Vec<Expr>, span: Span) -> Result<Expr, TypeError> {
        let type_name = self.type_name(&ty);
        if args.is_empty() {
            return Err(invalid(
                format!("constructor of '{}' needs at least one argument", type_name),
                span,
            ));
        }
        if let Some(bad) = args.iter().find(|a| a.ty.is_opaque() || a.ty == Type::Void) {
            return Err(invalid(
                format!("cannot construct '{}' from '{}'", type_name, self.type_name(&bad.ty)),
                bad.span,
            ));
        }

        match ty.clone() {
            Type::Scalar(_) => {
                let mut args = args;
                if args.len() > 1 {
                    return Err(invalid(
                        format!("too many arguments to constructor of '{}'", type_name),
                        args[1].span,
                    ));
                }
                let Some(arg) = args.pop() else {
                    return Err(invalid("empty constructor", span));
                };
                if arg.ty.is_scalar() {
                    let mut e = self.convert_to(arg, ty);
                    e.span = span;
                    return Ok(e);
                }
                self.component_construct(ty, vec![arg], span)
            }
            Type::Vector(k, n) => {
                if let [arg] = args.as_slice() {
                    if arg.ty.is_scalar() {
                        let arg = args.into_iter().next().ok_or_else(|| invalid("empty constructor", span))?;
                        let scalar = self.convert_to(arg, Type::Scalar(k));
                        let mut e = splat(scalar, n);
                        e.span = span;
                        return Ok(e);
                    }
                    if arg.ty.width() == Some(n) {
                        let arg = args.into_iter().next().ok_or_else(|| invalid("empty constructor", span))?;
                        let mut e = self.convert_to(arg, ty);
                        e.span = span;
                        return Ok(e);
                    }
                }
                self.component_construct(ty, args, span)
            }
            Type::Matrix { scalar, cols, rows } => {
                if let [arg] = args.as_slice() {
                    if arg.ty.is_scalar() {
                        let arg = args.into_iter().next().ok_or_else(|| invalid("empty constructor", span))?;
                        let d = self.convert_to(arg, Type::Scalar(scalar));
                        if let Some(v) = d.as_const() {
                            let comps: Vec<ConstValue> = (0..cols)
                                .flat_map(|c| {
                                    (0..rows).map(move |r| (c, r))
                                })
                                .map(|(c, r)| if c == r { v.clone() } else { consteval::zero(scalar) })
                                .collect();
                            if let Some(value) = consteval::assemble(&ty, &comps) {
                                return Ok(Expr::constant(value, ty, span));
                            }
                        }
                        return Ok(Expr::new(ExprKind::MatrixDiagonal(Box::new(d)), ty, span));
                    }
                    if let Type::Matrix { cols: c2, rows: r2, .. } = arg.ty {
                        let arg = args.into_iter().next().ok_or_else(|| invalid("empty constructor", span))?;
                        if (c2, r2) == (cols, rows) {
                            let mut e = self.convert_to(arg, ty);
                            e.span = span;
                            return Ok(e);
                        }
                        let from = arg.ty.with_kind(scalar);
                        let arg = self.convert_to(arg, from);
                        return Ok(Expr::new(ExprKind::MatrixResize(Box::new(arg)), ty, span));
                    }
                }
                if let Some(m) = args.iter().find(|a| a.ty.is_matrix()) {
                    return Err(invalid(
                        "a matrix argument to a matrix constructor must be the only argument",
                        m.span,
                    ));
                }
                self.component_construct(ty, args, span)
            }
            Type::Array(elem, size) => {
                if let ArraySize::Fixed(n) = size {
                    if n as usize != args.len() {
                        return Err(TypeError::ArityMismatch {
                            name: type_name,
                            expected: n as usize,
                            found: args.len(),
                            span,
                        });
                    }
                }
                let elems = args
                    .into_iter()
                    .map(|a| self.coerce(a, &elem))
                    .collect::<Result<Vec<_>, _>>()?;
                let ty = Type::Array(elem, ArraySize::Fixed(elems.len() as u32));
                Ok(composite(ty, elems, span))
            }
            Type::Struct(sid) => {
                let member_types: Vec<Type> = self
                    .program
                    .struct_def(sid)
                    .members
                    .iter()
                    .map(|m| m.ty.clone())
                    .collect();
                if member_types.len() != args.len() {
                    return Err(TypeError::ArityMismatch {
                        name: type_name,
                        expected: member_types.len(),
                        found: args.len(),
                        span,
                    });
                }
                let fields = args
                    .into_iter()
                    .zip(&member_types)
                    .map(|(a, t)| self.coerce(a, t))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(composite(ty, fields, span))
            }
            _ => Err(invalid(format!("type '{}' has no constructor", type_name), span)),
        }
    }

    /// Vector or matrix built from the components of its arguments, taken in
    /// order. Every argument must contribute at least one component.
    fn component_construct(&mut self, ty: Type, args: Vec<Expr>, span: Span) -> Result<Expr, TypeError> {
        let type_name = self.type_name(&ty);
        let (Some(needed), Some(kind)) = (ty.component_count(), ty.scalar_kind()) else {
            return Err(invalid(format!("type '{}' has no constructor", type_name), span));
        };
        let mut total = 0;
        for a in &args {
            let Some(c) = a.ty.component_count() else {
                return Err(invalid(
                    format!("cannot construct '{}' from '{}'", type_name, self.type_name(&a.ty)),
                    a.span,
                ));
            };
            if total >= needed {
                return Err(invalid(
                    format!("too many arguments to constructor of '{}'", type_name),
                    a.span,
                ));
            }
            total += c;
        }
        if total < needed {
            return Err(invalid(
                format!("not enough data provided to construct '{}'", type_name),
                span,
            ));
        }

        let consts: Option<Vec<&ConstValue>> = args.iter().map(Expr::as_const).collect();
        if let Some(consts) = consts {
            let comps: Vec<ConstValue> = consts
                .iter()
                .flat_map(|v| consteval::components(v))
                .take(needed as usize)
                .map(|c| consteval::convert(&c, kind))
                .collect();
            if let Some(value) = consteval::assemble(&ty, &comps) {
                return Ok(Expr::constant(value, ty, span));
            }
        }
        Ok(Expr::new(ExprKind::Construct(args), ty, span))
    }

    // -----------------------------------------------------------------------
    // User functions
    // -----------------------------------------------------------------------

    fn user_call(
        &mut self,
        name: &str,
        candidates: &[FuncId],
        args: Vec<Expr>,
        span: Span,
    ) -> Result<Expr, TypeError> {
        let visible: Vec<FuncId> = candidates
            .iter()
            .copied()
            .filter(|f| self.fn_info[f.0 as usize].declared_at <= self.item_index)
            .collect();
        if visible.is_empty() {
            return Err(invalid(
                format!("function '{}' is called before it is declared", name),
                span,
            ));
        }
        let same_arity: Vec<FuncId> = visible
            .iter()
            .copied()
            .filter(|f| self.program.function(*f).params.len() == args.len())
            .collect();
        if same_arity.is_empty() {
            if let [only] = visible.as_slice() {
                return Err(TypeError::ArityMismatch {
                    name: name.to_string(),
                    expected: self.program.function(*only).params.len(),
                    found: args.len(),
                    span,
                });
            }
            return Err(TypeError::NoMatchingOverload {
                name: name.to_string(),
                args: self.arg_list(&args),
                span,
            });
        }

        let exact: Vec<FuncId> = same_arity
            .iter()
            .copied()
            .filter(|f| {
                let params = &self.program.function(*f).params;
                params.iter().zip(&args).all(|(p, a)| p.ty == a.ty)
            })
            .collect();
        let chosen = match exact.as_slice() {
            [one] => *one,
            _ => {
                let convertible: Vec<FuncId> = same_arity
                    .iter()
                    .copied()
                    .filter(|f| {
                        let params = &self.program.function(*f).params;
                        params.iter().zip(&args).all(|(p, a)| match p.dir {
                            ParamDir::In if !p.ty.is_opaque() => type_converts_to(&a.ty, &p.ty),
                            _ => a.ty == p.ty,
                        })
                    })
                    .collect();
                match convertible.as_slice() {
                    [one] => *one,
                    [] => {
                        return Err(TypeError::NoMatchingOverload {
                            name: name.to_string(),
                            args: self.arg_list(&args),
                            span,
                        })
                    }
                    _ => {
                        return Err(TypeError::AmbiguousCall {
                            name: name.to_string(),
                            args: self.arg_list(&args),
                            span,
                        })
                    }
                }
            }
        };

        let func = self.program.function(chosen);
        let params: Vec<(Type, ParamDir)> = func.params.iter().map(|p| (p.ty.clone(), p.dir)).collect();
        let ret = func.ret.clone();
        let mut checked = Vec::with_capacity(args.len());
        for (a, (ty, dir)) in args.into_iter().zip(params) {
            match dir {
                ParamDir::In => checked.push(self.coerce(a, &ty)?),
                ParamDir::Out | ParamDir::InOut => {
                    self.check_lvalue(&a)?;
                    checked.push(a);
                }
            }
        }
        Ok(Expr::new(ExprKind::Call(chosen, checked), ret, span))
    }

    // -----------------------------------------------------------------------
    // Built-in functions
    // -----------------------------------------------------------------------

    fn no_overload(&self, name: &str, args: &[Expr], span: Span) -> TypeError {
        TypeError::NoMatchingOverload {
            name: name.to_string(),
            args: self.arg_list(args),
            span,
        }
    }

    /// Bring scalar/vector arguments of a generic built-in to one component
    /// kind and width. Integers promote to float where the family accepts
    /// float; scalars are splatted when `splat_scalars` is set.
    fn unify_generic(
        &self,
        name: &str,
        args: Vec<Expr>,
        kinds: Kinds,
        splat_scalars: bool,
        span: Span,
    ) -> Result<(Vec<Expr>, Type), TypeError> {
        let mut kind: Option<ScalarKind> = None;
        let mut width = 1u8;
        for a in &args {
            let (Some(k), Some(w)) = (a.ty.scalar_kind(), a.ty.width()) else {
                return Err(self.no_overload(name, &args, span));
            };
            kind = match kind {
                None => Some(k),
                Some(prev) => match common_kind(prev, k) {
                    Some(c) => Some(c),
                    None => return Err(self.no_overload(name, &args, span)),
                },
            };
            width = width.max(w);
        }
        let Some(mut kind) = kind else {
            return Err(self.no_overload(name, &args, span));
        };
        if !kinds.allows(kind) {
            let promotes = matches!(kind, ScalarKind::Int | ScalarKind::Uint) && kinds.allows(ScalarKind::Float);
            if !promotes {
                return Err(self.no_overload(name, &args, span));
            }
            kind = ScalarKind::Float;
        }
        if args.iter().any(|a| {
            let w = a.ty.width().unwrap_or(1);
            w != width && !(splat_scalars && w == 1)
        }) {
            return Err(self.no_overload(name, &args, span));
        }
        let ty = Type::vector(kind, width);
        let out = args
            .into_iter()
            .map(|a| {
                let t = a.ty.with_kind(kind);
                let a = self.convert_to(a, t);
                if a.ty.is_scalar() && width > 1 {
                    splat(a, width)
                } else {
                    a
                }
            })
            .collect();
        Ok((out, ty))
    }

    fn arity(name: &str, args: &[Expr], expected: usize, span: Span) -> Result<(), TypeError> {
        if args.len() != expected {
            return Err(TypeError::ArityMismatch {
                name: name.to_string(),
                expected,
                found: args.len(),
                span,
            });
        }
        Ok(())
    }

    fn intrinsic(&mut self, op: Intrinsic, name: &str, args: Vec<Expr>, span: Span) -> Result<Expr, TypeError> {
        use Intrinsic::*;
        let build = |op: Intrinsic, args: Vec<Expr>, ty: Type| -> Result<Expr, TypeError> {
            Ok(Expr::new(ExprKind::Intrinsic(op, args), ty, span))
        };

        match op {
            Radians | Degrees | Sin | Cos | Tan | Asin | Acos | Sinh | Cosh | Tanh | Asinh
            | Acosh | Atanh | Exp | Log | Exp2 | Log2 => {
                Self::arity(name, &args, 1, span)?;
                let (args, ty) = self.unify_generic(name, args, Kinds::Float, false, span)?;
                build(op, args, ty)
            }
            Atan => {
                let two = args.len() == 2;
                if !two {
                    Self::arity(name, &args, 1, span)?;
                }
                let (args, ty) = self.unify_generic(name, args, Kinds::Float, false, span)?;
                build(if two { Atan2 } else { Atan }, args, ty)
            }
            Pow => {
                Self::arity(name, &args, 2, span)?;
                let (args, ty) = self.unify_generic(name, args, Kinds::Float, false, span)?;
                build(op, args, ty)
            }
            Sqrt | InverseSqrt | Floor | Trunc | Round | RoundEven | Ceil | Fract | Normalize => {
                Self::arity(name, &args, 1, span)?;
                let (args, ty) = self.unify_generic(name, args, Kinds::FloatLike, false, span)?;
                build(op, args, ty)
            }
            Abs | Sign => {
                Self::arity(name, &args, 1, span)?;
                let (args, ty) = self.unify_generic(name, args, Kinds::Signed, false, span)?;
                build(op, args, ty)
            }
            Mod | Step => {
                Self::arity(name, &args, 2, span)?;
                let (args, ty) = self.unify_generic(name, args, Kinds::FloatLike, true, span)?;
                build(op, args, ty)
            }
            Min | Max => {
                Self::arity(name, &args, 2, span)?;
                let (args, ty) = self.unify_generic(name, args, Kinds::Numeric, true, span)?;
                build(op, args, ty)
            }
            Clamp => {
                Self::arity(name, &args, 3, span)?;
                let (args, ty) = self.unify_generic(name, args, Kinds::Numeric, true, span)?;
                build(op, args, ty)
            }
            SmoothStep => {
                Self::arity(name, &args, 3, span)?;
                let (args, ty) = self.unify_generic(name, args, Kinds::FloatLike, true, span)?;
                build(op, args, ty)
            }
            Fma | FaceForward => {
                Self::arity(name, &args, 3, span)?;
                let (args, ty) = self.unify_generic(name, args, Kinds::FloatLike, false, span)?;
                build(op, args, ty)
            }
            Mix => {
                Self::arity(name, &args, 3, span)?;
                let mut args = args;
                if args[2].ty.scalar_kind() == Some(ScalarKind::Bool) {
                    let selector = args.pop().ok_or_else(|| self.no_overload(name, &[], span))?;
                    let (mut xy, ty) = self.unify_generic(name, args, Kinds::Any, false, span)?;
                    if selector.ty.width() != ty.width() {
                        xy.push(selector);
                        return Err(self.no_overload(name, &xy, span));
                    }
                    xy.push(selector);
                    return build(MixSelect, xy, ty);
                }
                let (args, ty) = self.unify_generic(name, args, Kinds::FloatLike, true, span)?;
                build(op, args, ty)
            }
            IsNan | IsInf => {
                Self::arity(name, &args, 1, span)?;
                let (args, ty) = self.unify_generic(name, args, Kinds::FloatLike, false, span)?;
                build(op, args, ty.with_kind(ScalarKind::Bool))
            }
            FloatBitsToInt | FloatBitsToUint => {
                Self::arity(name, &args, 1, span)?;
                let (args, ty) = self.unify_generic(name, args, Kinds::Float, false, span)?;
                let kind = if op == FloatBitsToInt { ScalarKind::Int } else { ScalarKind::Uint };
                build(op, args, ty.with_kind(kind))
            }
            IntBitsToFloat | UintBitsToFloat => {
                Self::arity(name, &args, 1, span)?;
                let kind = if op == IntBitsToFloat { ScalarKind::Int } else { ScalarKind::Uint };
                let (args, ty) = self.unify_generic(name, args, Kinds::Exact(kind), false, span)?;
                build(op, args, ty.with_kind(ScalarKind::Float))
            }
            PackUnorm2x16 | PackSnorm2x16 | PackHalf2x16 | PackUnorm4x8 | PackSnorm4x8 => {
                Self::arity(name, &args, 1, span)?;
                let n = if matches!(op, PackUnorm4x8 | PackSnorm4x8) { 4 } else { 2 };
                let arg = self.single(args, &Type::Vector(ScalarKind::Float, n), name, span)?;
                build(op, vec![arg], UINT)
            }
            UnpackUnorm2x16 | UnpackSnorm2x16 | UnpackHalf2x16 | UnpackUnorm4x8 | UnpackSnorm4x8 => {
                Self::arity(name, &args, 1, span)?;
                let n = if matches!(op, UnpackUnorm4x8 | UnpackSnorm4x8) { 4 } else { 2 };
                let arg = self.single(args, &UINT, name, span)?;
                build(op, vec![arg], Type::Vector(ScalarKind::Float, n))
            }
            Length => {
                Self::arity(name, &args, 1, span)?;
                let (args, ty) = self.unify_generic(name, args, Kinds::FloatLike, false, span)?;
                build(op, args, scalar_of(&ty))
            }
            Distance | Dot => {
                Self::arity(name, &args, 2, span)?;
                let (args, ty) = self.unify_generic(name, args, Kinds::FloatLike, false, span)?;
                build(op, args, scalar_of(&ty))
            }
            Cross => {
                Self::arity(name, &args, 2, span)?;
                let (args, ty) = self.unify_generic(name, args, Kinds::FloatLike, false, span)?;
                if ty.width() != Some(3) {
                    return Err(self.no_overload(name, &args, span));
                }
                build(op, args, ty)
            }
            Reflect => {
                Self::arity(name, &args, 2, span)?;
                let (args, ty) = self.unify_generic(name, args, Kinds::FloatLike, false, span)?;
                build(op, args, ty)
            }
            Refract => {
                Self::arity(name, &args, 3, span)?;
                let mut args = args;
                let eta = args.pop().ok_or_else(|| self.no_overload(name, &[], span))?;
                let (mut vectors, ty) = self.unify_generic(name, args, Kinds::FloatLike, false, span)?;
                vectors.push(self.coerce(eta, &scalar_of(&ty))?);
                build(op, vectors, ty)
            }
            MatrixCompMult => {
                Self::arity(name, &args, 2, span)?;
                let ty = self.matrix_pair(name, &args, span)?;
                let args = args.into_iter().map(|a| self.convert_to(a, ty.clone())).collect();
                build(op, args, ty)
            }
            OuterProduct => {
                Self::arity(name, &args, 2, span)?;
                let (Some(c), Some(r)) = (args[0].ty.width(), args[1].ty.width()) else {
                    return Err(self.no_overload(name, &args, span));
                };
                let kind = match (args[0].ty.scalar_kind(), args[1].ty.scalar_kind()) {
                    (Some(a), Some(b)) => common_kind(a, b),
                    _ => None,
                };
                let kind = match kind {
                    Some(ScalarKind::Int | ScalarKind::Uint | ScalarKind::Float) => ScalarKind::Float,
                    Some(ScalarKind::Double) => ScalarKind::Double,
                    _ => return Err(self.no_overload(name, &args, span)),
                };
                if c < 2 || r < 2 {
                    return Err(self.no_overload(name, &args, span));
                }
                let ty = Type::Matrix { scalar: kind, cols: r, rows: c };
                let args = args
                    .into_iter()
                    .map(|a| {
                        let t = a.ty.with_kind(kind);
                        self.convert_to(a, t)
                    })
                    .collect();
                build(op, args, ty)
            }
            Transpose | Determinant | Inverse => {
                Self::arity(name, &args, 1, span)?;
                let Type::Matrix { scalar, cols, rows } = args[0].ty else {
                    return Err(self.no_overload(name, &args, span));
                };
                let ty = match op {
                    Transpose => Type::Matrix { scalar, cols: rows, rows: cols },
                    _ if cols != rows => return Err(self.no_overload(name, &args, span)),
                    Determinant => Type::Scalar(scalar),
                    _ => args[0].ty.clone(),
                };
                build(op, args, ty)
            }
            LessThan | LessThanEqual | GreaterThan | GreaterThanEqual | Equal | NotEqual => {
                Self::arity(name, &args, 2, span)?;
                let kinds = if matches!(op, Equal | NotEqual) { Kinds::Any } else { Kinds::Numeric };
                if args.iter().any(|a| !a.ty.is_vector()) {
                    return Err(self.no_overload(name, &args, span));
                }
                let (args, ty) = self.unify_generic(name, args, kinds, false, span)?;
                build(op, args, ty.with_kind(ScalarKind::Bool))
            }
            Any | All | Not => {
                Self::arity(name, &args, 1, span)?;
                if !matches!(args[0].ty, Type::Vector(ScalarKind::Bool, _)) {
                    return Err(self.no_overload(name, &args, span));
                }
                let ty = if op == Not { args[0].ty.clone() } else { BOOL };
                build(op, args, ty)
            }
            BitfieldExtract => {
                Self::arity(name, &args, 3, span)?;
                let mut args = args;
                let rest: Vec<Expr> = args.split_off(1);
                let (mut value, ty) = self.unify_generic(name, args, Kinds::Integer, false, span)?;
                for a in rest {
                    value.push(self.coerce(a, &INT)?);
                }
                build(op, value, ty)
            }
            BitfieldInsert => {
                Self::arity(name, &args, 4, span)?;
                let mut args = args;
                let rest: Vec<Expr> = args.split_off(2);
                let (mut values, ty) = self.unify_generic(name, args, Kinds::Integer, false, span)?;
                for a in rest {
                    values.push(self.coerce(a, &INT)?);
                }
                build(op, values, ty)
            }
            BitfieldReverse => {
                Self::arity(name, &args, 1, span)?;
                let (args, ty) = self.unify_generic(name, args, Kinds::Integer, false, span)?;
                build(op, args, ty)
            }
            BitCount | FindLsb | FindMsb => {
                Self::arity(name, &args, 1, span)?;
                let (args, ty) = self.unify_generic(name, args, Kinds::Integer, false, span)?;
                build(op, args, ty.with_kind(ScalarKind::Int))
            }
            Barrier | MemoryBarrier | MemoryBarrierShared | MemoryBarrierBuffer
            | MemoryBarrierImage | GroupMemoryBarrier => {
                Self::arity(name, &args, 0, span)?;
                build(op, args, Type::Void)
            }
            Atomic(aop) => {
                let n = if aop == AtomicOp::CompSwap { 3 } else { 2 };
                Self::arity(name, &args, n, span)?;
                let mut args = args.into_iter();
                let Some(mem) = args.next() else {
                    return Err(self.no_overload(name, &[], span));
                };
                if mem.ty != INT && mem.ty != UINT {
                    return Err(self.no_overload(name, std::slice::from_ref(&mem), span));
                }
                self.check_lvalue(&mem)?;
                let shared_or_buffer = match mem.root().kind {
                    ExprKind::Global(g) => {
                        matches!(self.program.global(g).storage, Storage::Buffer | Storage::Shared)
                    }
                    _ => false,
                };
                if !shared_or_buffer {
                    return Err(invalid(
                        format!("'{}' requires a buffer or shared variable as its first argument", name),
                        mem.span,
                    ));
                }
                let ty = mem.ty.clone();
                let mut out = vec![mem];
                for a in args {
                    out.push(self.coerce(a, &ty)?);
                }
                build(op, out, ty)
            }
            ImageLoad => {
                Self::arity(name, &args, 2, span)?;
                let (sampled, coords, _) = self.image_arg(name, &args, span)?;
                if self.opaque_memory(&args[0]).writeonly {
                    return Err(invalid(
                        "cannot load from an image declared writeonly",
                        args[0].span,
                    ));
                }
                let args = self.with_coords(args, coords, ScalarKind::Int)?;
                build(op, args, Type::Vector(sampled, 4))
            }
            ImageStore => {
                Self::arity(name, &args, 3, span)?;
                let (sampled, coords, _) = self.image_arg(name, &args, span)?;
                if self.opaque_memory(&args[0]).readonly {
                    return Err(invalid(
                        "cannot store to an image declared readonly",
                        args[0].span,
                    ));
                }
                let mut args = self.with_coords(args, coords, ScalarKind::Int)?;
                let data = args.pop().ok_or_else(|| self.no_overload(name, &[], span))?;
                args.push(self.coerce(data, &Type::Vector(sampled, 4))?);
                build(op, args, Type::Void)
            }
            ImageSize => {
                Self::arity(name, &args, 1, span)?;
                let (_, coords, _) = self.image_arg(name, &args, span)?;
                build(op, args, Type::vector(ScalarKind::Int, coords))
            }
            ImageAtomic(aop) => {
                let n = if aop == AtomicOp::CompSwap { 4 } else { 3 };
                Self::arity(name, &args, n, span)?;
                let (sampled, coords, format) = self.image_arg(name, &args, span)?;
                let ok = matches!(
                    (sampled, format),
                    (ScalarKind::Int, Some(ImageFormat::R32i)) | (ScalarKind::Uint, Some(ImageFormat::R32ui))
                );
                if !ok {
                    return Err(invalid(
                        format!("'{}' requires an image with the r32i or r32ui format", name),
                        args[0].span,
                    ));
                }
                let mut args = self.with_coords(args, coords, ScalarKind::Int)?;
                let data: Vec<Expr> = args.split_off(2);
                for d in data {
                    args.push(self.coerce(d, &Type::Scalar(sampled))?);
                }
                build(op, args, Type::Scalar(sampled))
            }
            TexelFetch => {
                Self::arity(name, &args, 3, span)?;
                let (sampled, coords) = self.sampler_arg(name, &args, span)?;
                let mut args = self.with_coords(args, coords, ScalarKind::Int)?;
                let lod = args.pop().ok_or_else(|| self.no_overload(name, &[], span))?;
                args.push(self.coerce(lod, &INT)?);
                build(op, args, Type::Vector(sampled, 4))
            }
            TextureLod => {
                Self::arity(name, &args, 3, span)?;
                let (sampled, coords) = self.sampler_arg(name, &args, span)?;
                let mut args = self.with_coords(args, coords, ScalarKind::Float)?;
                let lod = args.pop().ok_or_else(|| self.no_overload(name, &[], span))?;
                args.push(self.coerce(lod, &Type::Scalar(ScalarKind::Float))?);
                build(op, args, Type::Vector(sampled, 4))
            }
            TextureSize => {
                Self::arity(name, &args, 2, span)?;
                let (_, coords) = self.sampler_arg(name, &args, span)?;
                let mut args = args;
                let lod = args.pop().ok_or_else(|| self.no_overload(name, &[], span))?;
                args.push(self.coerce(lod, &INT)?);
                build(op, args, Type::vector(ScalarKind::Int, coords))
            }
            Atan2 | MixSelect => Err(self.no_overload(name, &args, span)),
        }
    }

    fn single(&self, args: Vec<Expr>, ty: &Type, name: &str, span: Span) -> Result<Expr, TypeError> {
        let mut args = args;
        match args.pop() {
            Some(a) => self.coerce(a, ty),
            None => Err(self.no_overload(name, &[], span)),
        }
    }

    fn matrix_pair(&self, name: &str, args: &[Expr], span: Span) -> Result<Type, TypeError> {
        match (&args[0].ty, &args[1].ty) {
            (
                Type::Matrix { scalar: a, cols: c1, rows: r1 },
                Type::Matrix { scalar: b, cols: c2, rows: r2 },
            ) if (c1, r1) == (c2, r2) => match common_kind(*a, *b) {
                Some(k) => Ok(args[0].ty.with_kind(k)),
                None => Err(self.no_overload(name, args, span)),
            },
            _ => Err(self.no_overload(name, args, span)),
        }
    }

    /// Sampled kind, coordinate count and format of an image first argument.
    fn image_arg(
        &self,
        name: &str,
        args: &[Expr],
        span: Span,
    ) -> Result<(ScalarKind, u8, Option<ImageFormat>), TypeError> {
        match args.first().map(|a| &a.ty) {
            Some(Type::Image { dim, sampled, format }) => Ok((*sampled, dim_coords(*dim), *format)),
            _ => Err(self.no_overload(name, args, span)),
        }
    }

    fn sampler_arg(&self, name: &str, args: &[Expr], span: Span) -> Result<(ScalarKind, u8), TypeError> {
        match args.first().map(|a| &a.ty) {
            Some(Type::Sampler { dim, sampled }) => Ok((*sampled, dim_coords(*dim))),
            _ => Err(self.no_overload(name, args, span)),
        }
    }

    /// Coerce the second argument to a coordinate of `n` components.
    fn with_coords(&self, args: Vec<Expr>, n: u8, kind: ScalarKind) -> Result<Vec<Expr>, TypeError> {
        let mut out = Vec::with_capacity(args.len());
        for (i, a) in args.into_iter().enumerate() {
            if i == 1 {
                out.push(self.coerce(a, &Type::vector(kind, n))?);
            } else {
                out.push(a);
            }
        }
        Ok(out)
    }

    /// Memory qualifiers of the variable an opaque expression names.
    fn opaque_memory(&self, e: &Expr) -> MemoryFlags {
        match e.root().kind {
            ExprKind::Global(g) => self.program.global(g).memory,
            _ => MemoryFlags::default(),
        }
    }
}

fn scalar_of(ty: &Type) -> Type {
    match ty.scalar_kind() {
        Some(k) => Type::Scalar(k),
        None => ty.clone(),
    }
}

/// Array or struct construction, folded when every part is constant.
fn composite(ty: Type, parts: Vec<Expr>, span: Span) -> Expr {
    let consts: Option<Vec<ConstValue>> = parts.iter().map(|p| p.as_const().cloned()).collect();
    match consts {
        Some(values) => Expr::constant(ConstValue::Composite(values), ty, span),
        None => Expr::new(ExprKind::Construct(parts), ty, span),
    }
}
