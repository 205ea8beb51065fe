//! std140 / std430 memory layout of block members.

use crate::tir::{BlockLayout, StructDef};
use crate::types::{ArraySize, ScalarKind, Type};

/// Offsets and size of a struct laid out under one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructLayout {
    pub offsets: Vec<u32>,
    pub size: u32,
    pub align: u32,
    /// Explicit offsets that could not be honoured, as `(member, message)`.
    pub problems: Vec<(usize, String)>,
}

fn round_up(v: u32, align: u32) -> u32 {
    if align == 0 {
        v
    } else {
        v.div_ceil(align) * align
    }
}

fn scalar_size(kind: ScalarKind) -> u32 {
    if kind == ScalarKind::Double {
        8
    } else {
        4
    }
}

/// Alignment of a scalar or vector.
fn vector_align(kind: ScalarKind, n: u8) -> u32 {
    let s = scalar_size(kind);
    match n {
        1 => s,
        2 => 2 * s,
        _ => 4 * s,
    }
}

/// Stride between columns (or rows, for row-major) of a matrix.
pub fn matrix_stride(ty: &Type, row_major: bool, rule: BlockLayout) -> u32 {
    let Type::Matrix { scalar, cols, rows } = ty else {
        return 0;
    };
    let vec_len = if row_major { *cols } else { *rows };
    let align = vector_align(*scalar, vec_len);
    match rule {
        BlockLayout::Std140 => round_up(align, 16),
        BlockLayout::Std430 => align,
    }
}

/// Stride between consecutive elements of an array of `elem`.
pub fn array_stride(elem: &Type, row_major: bool, rule: BlockLayout, structs: &[StructDef]) -> u32 {
    let (size, align) = size_align(elem, row_major, rule, structs);
    let stride = round_up(size, align);
    match rule {
        BlockLayout::Std140 => round_up(stride, 16),
        BlockLayout::Std430 => stride,
    }
}

/// Size and base alignment of `ty`. Runtime arrays have size 0.
pub fn size_align(ty: &Type, row_major: bool, rule: BlockLayout, structs: &[StructDef]) -> (u32, u32) {
    match ty {
        Type::Scalar(k) => (scalar_size(*k), scalar_size(*k)),
        Type::Vector(k, n) => (scalar_size(*k) * *n as u32, vector_align(*k, *n)),
        Type::Matrix { cols, rows, .. } => {
            let stride = matrix_stride(ty, row_major, rule);
            let count = if row_major { *rows } else { *cols };
            (stride * count as u32, stride)
        }
        Type::Array(elem, size) => {
            let stride = array_stride(elem, row_major, rule, structs);
            let (_, elem_align) = size_align(elem, row_major, rule, structs);
            let align = match rule {
                BlockLayout::Std140 => round_up(elem_align, 16),
                BlockLayout::Std430 => elem_align,
            };
            let n = match size {
                ArraySize::Fixed(n) => *n,
                ArraySize::Runtime => 0,
            };
            (stride.saturating_mul(n), align)
        }
        Type::Struct(id) => match structs.get(id.0 as usize) {
            Some(def) => {
                let l = struct_layout(def, rule, structs);
                (l.size, l.align)
            }
            None => (0, 1),
        },
        // opaque types never appear in blocks
        _ => (0, 1),
    }
}

/// Lays out every member of `def`, honouring explicit offsets.
pub fn struct_layout(def: &StructDef, rule: BlockLayout, structs: &[StructDef]) -> StructLayout {
    let mut offsets = Vec::with_capacity(def.members.len());
    let mut problems = Vec::new();
    let mut cursor = 0u32;
    let mut max_align = 1u32;

    for (i, m) in def.members.iter().enumerate() {
        let (size, align) = size_align(&m.ty, m.row_major, rule, structs);
        max_align = max_align.max(align);
        let natural = round_up(cursor, align);
        let offset = match m.offset {
            Some(explicit) if explicit % align != 0 => {
                problems.push((
                    i,
                    format!(
                        "offset {} of member '{}' is not aligned to {} bytes",
                        explicit, m.name, align
                    ),
                ));
                natural
            }
            Some(explicit) if explicit < cursor => {
                problems.push((
                    i,
                    format!(
                        "offset {} of member '{}' overlaps the previous member (next free offset is {})",
                        explicit, m.name, cursor
                    ),
                ));
                natural
            }
            Some(explicit) => explicit,
            None => natural,
        };
        offsets.push(offset);
        cursor = offset.saturating_add(size);
    }

    let align = match rule {
        BlockLayout::Std140 => round_up(max_align, 16),
        BlockLayout::Std430 => max_align,
    };
    StructLayout {
        offsets,
        size: round_up(cursor, align),
        align,
        problems,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tir::{MemoryFlags, StructMember};
    use crate::types::{FLOAT, UINT};
    use glint_ast::span::Span;

    fn member(name: &str, ty: Type) -> StructMember {
        StructMember {
            name: name.to_string(),
            ty,
            offset: None,
            row_major: false,
            memory: MemoryFlags::default(),
            span: Span::default(),
        }
    }

    fn block(members: Vec<StructMember>) -> StructDef {
        StructDef {
            name: "B".to_string(),
            members,
            block: None,
            span: Span::default(),
        }
    }

    #[test]
    fn vec3_followed_by_float_packs() {
        let def = block(vec![
            member("a", Type::Vector(ScalarKind::Float, 3)),
            member("b", FLOAT),
        ]);
        let l = struct_layout(&def, BlockLayout::Std430, &[]);
        assert_eq!(l.offsets, vec![0, 12]);
        assert_eq!(l.size, 16);
    }

    #[test]
    fn std140_rounds_array_strides() {
        let arr = Type::Array(Box::new(FLOAT), ArraySize::Fixed(4));
        let def = block(vec![member("a", arr.clone()), member("b", UINT)]);
        let std140 = struct_layout(&def, BlockLayout::Std140, &[]);
        assert_eq!(std140.offsets, vec![0, 64]);
        let std430 = struct_layout(&def, BlockLayout::Std430, &[]);
        assert_eq!(std430.offsets, vec![0, 16]);
        assert_eq!(array_stride(&FLOAT, false, BlockLayout::Std140, &[]), 16);
    }

    #[test]
    fn matrix_strides() {
        let m = Type::Matrix {
            scalar: ScalarKind::Float,
            cols: 3,
            rows: 3,
        };
        assert_eq!(matrix_stride(&m, false, BlockLayout::Std430), 16);
        assert_eq!(size_align(&m, false, BlockLayout::Std430, &[]), (48, 16));
        let m2 = Type::Matrix {
            scalar: ScalarKind::Float,
            cols: 2,
            rows: 2,
        };
        assert_eq!(matrix_stride(&m2, false, BlockLayout::Std430), 8);
        assert_eq!(matrix_stride(&m2, false, BlockLayout::Std140), 16);
    }

    #[test]
    fn explicit_offsets() {
        let mut b = member("b", FLOAT);
        b.offset = Some(32);
        let def = block(vec![member("a", FLOAT), b]);
        let l = struct_layout(&def, BlockLayout::Std430, &[]);
        assert_eq!(l.offsets, vec![0, 32]);
        assert!(l.problems.is_empty());

        let mut bad = member("b", Type::Vector(ScalarKind::Float, 4));
        bad.offset = Some(4);
        let l = struct_layout(&block(vec![member("a", FLOAT), bad]), BlockLayout::Std430, &[]);
        assert_eq!(l.problems.len(), 1);
        assert!(l.problems[0].1.contains("not aligned"));
    }
}
