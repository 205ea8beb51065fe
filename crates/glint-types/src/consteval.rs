//! Constant folding over `ConstValue`.
//!
//! Operands reaching these functions already have matching shapes: the
//! checker converts both sides to one component kind and splats scalars
//! before folding. Integer arithmetic wraps like the target does.

use crate::tir::ConstValue;
use crate::types::{ScalarKind, Type};
use glint_ast::ast::{BinOp, UnOp};

/// Integer value of an int or uint scalar.
pub fn as_i64(v: &ConstValue) -> Option<i64> {
    match v {
        ConstValue::Int(i) => Some(*i as i64),
        ConstValue::Uint(u) => Some(*u as i64),
        _ => None,
    }
}

pub fn as_bool(v: &ConstValue) -> Option<bool> {
    match v {
        ConstValue::Bool(b) => Some(*b),
        _ => None,
    }
}

/// Scalar components in order; matrices are flattened column by column.
pub fn components(v: &ConstValue) -> Vec<ConstValue> {
    let mut out = Vec::new();
    flatten(v, &mut out);
    out
}

fn flatten(v: &ConstValue, out: &mut Vec<ConstValue>) {
    match v {
        ConstValue::Composite(parts) => parts.iter().for_each(|p| flatten(p, out)),
        scalar => out.push(scalar.clone()),
    }
}

/// Builds a scalar, vector or matrix value of `ty` from scalar components.
/// Returns `None` when `ty` is not one of those shapes.
pub fn assemble(ty: &Type, comps: &[ConstValue]) -> Option<ConstValue> {
    match ty {
        Type::Scalar(_) => comps.first().cloned(),
        Type::Vector(_, n) => Some(ConstValue::Composite(comps.get(..*n as usize)?.to_vec())),
        Type::Matrix { cols, rows, .. } => {
            let (c, r) = (*cols as usize, *rows as usize);
            let flat = comps.get(..c * r)?;
            Some(ConstValue::Composite(
                flat.chunks(r)
                    .map(|col| ConstValue::Composite(col.to_vec()))
                    .collect(),
            ))
        }
        _ => None,
    }
}

pub fn zero(kind: ScalarKind) -> ConstValue {
    match kind {
        ScalarKind::Bool => ConstValue::Bool(false),
        ScalarKind::Int => ConstValue::Int(0),
        ScalarKind::Uint => ConstValue::Uint(0),
        ScalarKind::Float => ConstValue::Float(0.0),
        ScalarKind::Double => ConstValue::Double(0.0),
    }
}

pub fn one(kind: ScalarKind) -> ConstValue {
    convert_scalar(&ConstValue::Int(1), kind)
}

/// Component-wise conversion to `kind`.
pub fn convert(v: &ConstValue, kind: ScalarKind) -> ConstValue {
    match v {
        ConstValue::Composite(parts) => {
            ConstValue::Composite(parts.iter().map(|p| convert(p, kind)).collect())
        }
        scalar => convert_scalar(scalar, kind),
    }
}

fn convert_scalar(v: &ConstValue, kind: ScalarKind) -> ConstValue {
    let as_f64 = match v {
        ConstValue::Bool(b) => *b as i32 as f64,
        ConstValue::Int(i) => *i as f64,
        ConstValue::Uint(u) => *u as f64,
        ConstValue::Float(f) => *f as f64,
        ConstValue::Double(d) => *d,
        ConstValue::Composite(_) => 0.0,
    };
    match (v, kind) {
        (_, ScalarKind::Bool) => ConstValue::Bool(as_f64 != 0.0),
        (ConstValue::Uint(u), ScalarKind::Int) => ConstValue::Int(*u as i32),
        (ConstValue::Int(i), ScalarKind::Uint) => ConstValue::Uint(*i as u32),
        (ConstValue::Float(_) | ConstValue::Double(_), ScalarKind::Uint) => {
            // float to uint goes through a signed value so negative inputs wrap
            ConstValue::Uint(as_f64 as i64 as u32)
        }
        (_, ScalarKind::Int) => ConstValue::Int(as_f64 as i32),
        (_, ScalarKind::Uint) => ConstValue::Uint(as_f64 as u32),
        (_, ScalarKind::Float) => ConstValue::Float(as_f64 as f32),
        (_, ScalarKind::Double) => ConstValue::Double(as_f64),
    }
}

/// Folds a unary operator. Increment and decrement are never constant.
pub fn fold_unary(op: UnOp, v: &ConstValue) -> Option<ConstValue> {
    match v {
        ConstValue::Composite(parts) => Some(ConstValue::Composite(
            parts
                .iter()
                .map(|p| fold_unary(op, p))
                .collect::<Option<Vec<_>>>()?,
        )),
        scalar => match (op, scalar) {
            (UnOp::Plus, s) => Some(s.clone()),
            (UnOp::Neg, ConstValue::Int(i)) => Some(ConstValue::Int(i.wrapping_neg())),
            (UnOp::Neg, ConstValue::Uint(u)) => Some(ConstValue::Uint(u.wrapping_neg())),
            (UnOp::Neg, ConstValue::Float(f)) => Some(ConstValue::Float(-f)),
            (UnOp::Neg, ConstValue::Double(d)) => Some(ConstValue::Double(-d)),
            (UnOp::Not, ConstValue::Bool(b)) => Some(ConstValue::Bool(!b)),
            (UnOp::BitNot, ConstValue::Int(i)) => Some(ConstValue::Int(!i)),
            (UnOp::BitNot, ConstValue::Uint(u)) => Some(ConstValue::Uint(!u)),
            _ => None,
        },
    }
}

/// Folds a binary operator over operands of identical shape (shifts may mix
/// int and uint). `Ok(None)` means the operation is not folded; `Err` is a
/// constant expression that is invalid, such as an integer division by zero.
pub fn fold_binary(
    op: BinOp,
    lhs: &ConstValue,
    rhs: &ConstValue,
) -> Result<Option<ConstValue>, String> {
    match op {
        BinOp::Eq => return Ok(Some(ConstValue::Bool(lhs == rhs))),
        BinOp::Ne => return Ok(Some(ConstValue::Bool(lhs != rhs))),
        _ => {}
    }
    match (lhs, rhs) {
        (ConstValue::Composite(a), ConstValue::Composite(b)) if a.len() == b.len() => {
            let mut out = Vec::with_capacity(a.len());
            for (x, y) in a.iter().zip(b) {
                match fold_binary(op, x, y)? {
                    Some(v) => out.push(v),
                    None => return Ok(None),
                }
            }
            Ok(Some(ConstValue::Composite(out)))
        }
        (ConstValue::Composite(_), _) | (_, ConstValue::Composite(_)) => Ok(None),
        (a, b) => fold_scalar(op, a, b),
    }
}

fn fold_scalar(op: BinOp, a: &ConstValue, b: &ConstValue) -> Result<Option<ConstValue>, String> {
    use ConstValue as C;
    let v = match op {
        BinOp::Shl | BinOp::Shr => {
            let Some(amount) = as_i64(b) else {
                return Ok(None);
            };
            let amount = amount as u32;
            match (a, op) {
                (C::Int(x), BinOp::Shl) => C::Int(x.wrapping_shl(amount)),
                (C::Int(x), _) => C::Int(x.wrapping_shr(amount)),
                (C::Uint(x), BinOp::Shl) => C::Uint(x.wrapping_shl(amount)),
                (C::Uint(x), _) => C::Uint(x.wrapping_shr(amount)),
                _ => return Ok(None),
            }
        }
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ord = match (a, b) {
                (C::Int(x), C::Int(y)) => x.partial_cmp(y),
                (C::Uint(x), C::Uint(y)) => x.partial_cmp(y),
                (C::Float(x), C::Float(y)) => x.partial_cmp(y),
                (C::Double(x), C::Double(y)) => x.partial_cmp(y),
                _ => return Ok(None),
            };
            let result = match ord {
                None => false,
                Some(o) => match op {
                    BinOp::Lt => o.is_lt(),
                    BinOp::Le => o.is_le(),
                    BinOp::Gt => o.is_gt(),
                    _ => o.is_ge(),
                },
            };
            C::Bool(result)
        }
        _ => match (a, b) {
            (C::Bool(x), C::Bool(y)) => match op {
                BinOp::And => C::Bool(*x && *y),
                BinOp::Or => C::Bool(*x || *y),
                BinOp::Xor => C::Bool(x != y),
                _ => return Ok(None),
            },
            (C::Int(x), C::Int(y)) => match op {
                BinOp::Add => C::Int(x.wrapping_add(*y)),
                BinOp::Sub => C::Int(x.wrapping_sub(*y)),
                BinOp::Mul => C::Int(x.wrapping_mul(*y)),
                BinOp::Div | BinOp::Mod if *y == 0 => {
                    return Err("division by zero in constant expression".to_string())
                }
                BinOp::Div => C::Int(x.wrapping_div(*y)),
                BinOp::Mod => C::Int(x.wrapping_rem(*y)),
                BinOp::BitAnd => C::Int(x & y),
                BinOp::BitOr => C::Int(x | y),
                BinOp::BitXor => C::Int(x ^ y),
                _ => return Ok(None),
            },
            (C::Uint(x), C::Uint(y)) => match op {
                BinOp::Add => C::Uint(x.wrapping_add(*y)),
                BinOp::Sub => C::Uint(x.wrapping_sub(*y)),
                BinOp::Mul => C::Uint(x.wrapping_mul(*y)),
                BinOp::Div | BinOp::Mod if *y == 0 => {
                    return Err("division by zero in constant expression".to_string())
                }
                BinOp::Div => C::Uint(x / y),
                BinOp::Mod => C::Uint(x % y),
                BinOp::BitAnd => C::Uint(x & y),
                BinOp::BitOr => C::Uint(x | y),
                BinOp::BitXor => C::Uint(x ^ y),
                _ => return Ok(None),
            },
            (C::Float(x), C::Float(y)) => match op {
                BinOp::Add => C::Float(x + y),
                BinOp::Sub => C::Float(x - y),
                BinOp::Mul => C::Float(x * y),
                BinOp::Div => C::Float(x / y),
                _ => return Ok(None),
            },
            (C::Double(x), C::Double(y)) => match op {
                BinOp::Add => C::Double(x + y),
                BinOp::Sub => C::Double(x - y),
                BinOp::Mul => C::Double(x * y),
                BinOp::Div => C::Double(x / y),
                _ => return Ok(None),
            },
            _ => return Ok(None),
        },
    };
    Ok(Some(v))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ivec(v: &[i32]) -> ConstValue {
        ConstValue::Composite(v.iter().map(|x| ConstValue::Int(*x)).collect())
    }

    #[test]
    fn integer_arithmetic_wraps() {
        let r = fold_binary(BinOp::Add, &ConstValue::Int(i32::MAX), &ConstValue::Int(1)).unwrap();
        assert_eq!(r, Some(ConstValue::Int(i32::MIN)));
        let r = fold_binary(BinOp::Sub, &ConstValue::Uint(0), &ConstValue::Uint(1)).unwrap();
        assert_eq!(r, Some(ConstValue::Uint(u32::MAX)));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert!(fold_binary(BinOp::Div, &ConstValue::Int(4), &ConstValue::Int(0)).is_err());
        assert!(fold_binary(BinOp::Mod, &ConstValue::Uint(4), &ConstValue::Uint(0)).is_err());
        let r = fold_binary(BinOp::Div, &ConstValue::Float(1.0), &ConstValue::Float(0.0)).unwrap();
        assert_eq!(r, Some(ConstValue::Float(f32::INFINITY)));
    }

    #[test]
    fn vectors_fold_component_wise() {
        let r = fold_binary(BinOp::Mul, &ivec(&[1, 2, 3]), &ivec(&[2, 2, 2])).unwrap();
        assert_eq!(r, Some(ivec(&[2, 4, 6])));
        let eq = fold_binary(BinOp::Eq, &ivec(&[1, 2]), &ivec(&[1, 2])).unwrap();
        assert_eq!(eq, Some(ConstValue::Bool(true)));
    }

    #[test]
    fn shifts_mix_signedness() {
        let r = fold_binary(BinOp::Shl, &ConstValue::Int(1), &ConstValue::Uint(4)).unwrap();
        assert_eq!(r, Some(ConstValue::Int(16)));
        let r = fold_binary(BinOp::Shr, &ConstValue::Int(-8), &ConstValue::Int(1)).unwrap();
        assert_eq!(r, Some(ConstValue::Int(-4)));
    }

    #[test]
    fn conversions() {
        assert_eq!(convert(&ConstValue::Float(-1.5), ScalarKind::Int), ConstValue::Int(-1));
        assert_eq!(convert(&ConstValue::Int(-1), ScalarKind::Uint), ConstValue::Uint(u32::MAX));
        assert_eq!(convert(&ConstValue::Int(3), ScalarKind::Bool), ConstValue::Bool(true));
        assert_eq!(convert(&ConstValue::Bool(true), ScalarKind::Float), ConstValue::Float(1.0));
    }

    #[test]
    fn matrices_assemble_by_column() {
        let ty = Type::Matrix {
            scalar: ScalarKind::Float,
            cols: 2,
            rows: 3,
        };
        let comps: Vec<_> = (0..6).map(|i| ConstValue::Float(i as f32)).collect();
        let m = assemble(&ty, &comps).unwrap();
        let ConstValue::Composite(cols) = &m else {
            panic!("expected composite");
        };
        assert_eq!(cols.len(), 2);
        assert_eq!(components(&cols[1])[0], ConstValue::Float(3.0));
        assert!(assemble(&ty, &comps[..5]).is_none());
    }
}
