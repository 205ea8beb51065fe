//! Resolved shader types.

pub use glint_ast::ast::{ImageDim, ScalarKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StructId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ArraySize {
    Fixed(u32),
    /// Unsized trailing member of a buffer block.
    Runtime,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Type {
    Void,
    Scalar(ScalarKind),
    Vector(ScalarKind, u8),
    /// Column-major `cols` x `rows`; `scalar` is `Float` or `Double`.
    Matrix {
        scalar: ScalarKind,
        cols: u8,
        rows: u8,
    },
    Array(Box<Type>, ArraySize),
    Struct(StructId),
    Image {
        dim: ImageDim,
        sampled: ScalarKind,
        format: Option<ImageFormat>,
    },
    /// Combined image and sampler.
    Sampler {
        dim: ImageDim,
        sampled: ScalarKind,
    },
    AtomicUint,
}

pub const BOOL: Type = Type::Scalar(ScalarKind::Bool);
pub const INT: Type = Type::Scalar(ScalarKind::Int);
pub const UINT: Type = Type::Scalar(ScalarKind::Uint);
pub const FLOAT: Type = Type::Scalar(ScalarKind::Float);

impl Type {
    /// Scalar for `n == 1`, vector otherwise.
    pub fn vector(kind: ScalarKind, n: u8) -> Type {
        if n == 1 {
            Type::Scalar(kind)
        } else {
            Type::Vector(kind, n)
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Type::Scalar(_))
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, Type::Vector(..))
    }

    pub fn is_matrix(&self) -> bool {
        matches!(self, Type::Matrix { .. })
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array(..))
    }

    pub fn is_bool(&self) -> bool {
        *self == BOOL
    }

    /// Component kind of scalars, vectors and matrices.
    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match self {
            Type::Scalar(k) | Type::Vector(k, _) => Some(*k),
            Type::Matrix { scalar, .. } => Some(*scalar),
            _ => None,
        }
    }

    /// Number of scalar components of a scalar/vector (matrices count all).
    pub fn component_count(&self) -> Option<u32> {
        match self {
            Type::Scalar(_) => Some(1),
            Type::Vector(_, n) => Some(*n as u32),
            Type::Matrix { cols, rows, .. } => Some(*cols as u32 * *rows as u32),
            _ => None,
        }
    }

    /// Vector width, treating scalars as width 1.
    pub fn width(&self) -> Option<u8> {
        match self {
            Type::Scalar(_) => Some(1),
            Type::Vector(_, n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.scalar_kind(), Some(k) if k != ScalarKind::Bool)
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Type::Scalar(ScalarKind::Int | ScalarKind::Uint)
                | Type::Vector(ScalarKind::Int | ScalarKind::Uint, _)
        )
    }

    pub fn is_float_like(&self) -> bool {
        matches!(
            self.scalar_kind(),
            Some(ScalarKind::Float | ScalarKind::Double)
        )
    }

    /// Images, samplers and atomic counters, or arrays of them.
    pub fn is_opaque(&self) -> bool {
        match self {
            Type::Image { .. } | Type::Sampler { .. } | Type::AtomicUint => true,
            Type::Array(elem, _) => elem.is_opaque(),
            _ => false,
        }
    }

    /// Innermost non-array element.
    pub fn element_root(&self) -> &Type {
        match self {
            Type::Array(elem, _) => elem.element_root(),
            other => other,
        }
    }

    /// Number of elements when arrays are flattened (1 for non-arrays).
    pub fn flat_count(&self) -> u32 {
        match self {
            Type::Array(elem, ArraySize::Fixed(n)) => n.saturating_mul(elem.flat_count()),
            Type::Array(elem, ArraySize::Runtime) => elem.flat_count(),
            _ => 1,
        }
    }

    pub fn has_runtime_array(&self) -> bool {
        matches!(self, Type::Array(_, ArraySize::Runtime))
    }

    /// The same shape with a different component kind.
    pub fn with_kind(&self, kind: ScalarKind) -> Type {
        match self {
            Type::Scalar(_) => Type::Scalar(kind),
            Type::Vector(_, n) => Type::Vector(kind, *n),
            Type::Matrix { cols, rows, .. } => Type::Matrix {
                scalar: kind,
                cols: *cols,
                rows: *rows,
            },
            other => other.clone(),
        }
    }

    /// Whether the type mentions `double` anywhere (structs are not followed).
    pub fn uses_double(&self) -> bool {
        match self {
            Type::Array(elem, _) => elem.uses_double(),
            other => other.scalar_kind() == Some(ScalarKind::Double),
        }
    }

    /// GLSL spelling; struct names are looked up through `struct_name`.
    pub fn display_with(&self, struct_name: &dyn Fn(StructId) -> String) -> String {
        match self {
            Type::Void => "void".to_string(),
            Type::Scalar(k) => scalar_name(*k).to_string(),
            Type::Vector(k, n) => format!("{}vec{}", vector_prefix(*k), n),
            Type::Matrix { scalar, cols, rows } => {
                let d = if *scalar == ScalarKind::Double { "d" } else { "" };
                if cols == rows {
                    format!("{}mat{}", d, cols)
                } else {
                    format!("{}mat{}x{}", d, cols, rows)
                }
            }
            Type::Array(elem, ArraySize::Fixed(n)) => {
                format!("{}[{}]", elem.display_with(struct_name), n)
            }
            Type::Array(elem, ArraySize::Runtime) => format!("{}[]", elem.display_with(struct_name)),
            Type::Struct(id) => struct_name(*id),
            Type::Image { dim, sampled, .. } => {
                format!("{}image{}", sampled_prefix(*sampled), dim_name(*dim))
            }
            Type::Sampler { dim, sampled } => {
                format!("{}sampler{}", sampled_prefix(*sampled), dim_name(*dim))
            }
            Type::AtomicUint => "atomic_uint".to_string(),
        }
    }
}

pub fn scalar_name(k: ScalarKind) -> &'static str {
    match k {
        ScalarKind::Bool => "bool",
        ScalarKind::Int => "int",
        ScalarKind::Uint => "uint",
        ScalarKind::Float => "float",
        ScalarKind::Double => "double",
    }
}

fn vector_prefix(k: ScalarKind) -> &'static str {
    match k {
        ScalarKind::Bool => "b",
        ScalarKind::Int => "i",
        ScalarKind::Uint => "u",
        ScalarKind::Float => "",
        ScalarKind::Double => "d",
    }
}

fn sampled_prefix(k: ScalarKind) -> &'static str {
    match k {
        ScalarKind::Int => "i",
        ScalarKind::Uint => "u",
        _ => "",
    }
}

pub fn dim_name(d: ImageDim) -> &'static str {
    match d {
        ImageDim::Dim1D => "1D",
        ImageDim::Dim2D => "2D",
        ImageDim::Dim3D => "3D",
    }
}

/// Number of coordinate components addressing a texel.
pub fn dim_coords(d: ImageDim) -> u8 {
    match d {
        ImageDim::Dim1D => 1,
        ImageDim::Dim2D => 2,
        ImageDim::Dim3D => 3,
    }
}

/// Implicit conversions allowed by GLSL 4.6: int -> uint, int/uint -> float,
/// int/uint/float -> double.
pub fn can_implicitly_convert(from: ScalarKind, to: ScalarKind) -> bool {
    use ScalarKind::*;
    from == to
        || matches!(
            (from, to),
            (Int, Uint) | (Int | Uint, Float) | (Int | Uint | Float, Double)
        )
}

/// Whether a value of type `from` converts implicitly to `to` (same shape).
pub fn type_converts_to(from: &Type, to: &Type) -> bool {
    if from == to {
        return true;
    }
    match (from, to) {
        (Type::Scalar(a), Type::Scalar(b)) => can_implicitly_convert(*a, *b),
        (Type::Vector(a, n), Type::Vector(b, m)) => n == m && can_implicitly_convert(*a, *b),
        (
            Type::Matrix {
                scalar: a,
                cols: c1,
                rows: r1,
            },
            Type::Matrix {
                scalar: b,
                cols: c2,
                rows: r2,
            },
        ) => c1 == c2 && r1 == r2 && can_implicitly_convert(*a, *b),
        _ => false,
    }
}

/// Rank used to pick the common kind of two operands.
fn kind_rank(k: ScalarKind) -> u8 {
    match k {
        ScalarKind::Bool => 0,
        ScalarKind::Int => 1,
        ScalarKind::Uint => 2,
        ScalarKind::Float => 3,
        ScalarKind::Double => 4,
    }
}

/// Smallest kind both operands convert to, if any.
pub fn common_kind(a: ScalarKind, b: ScalarKind) -> Option<ScalarKind> {
    let wide = if kind_rank(a) >= kind_rank(b) { a } else { b };
    (can_implicitly_convert(a, wide) && can_implicitly_convert(b, wide)).then_some(wide)
}

/// Storage image formats (`layout(rgba8)` and friends).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ImageFormat {
    Rgba32f,
    Rgba16f,
    Rg32f,
    Rg16f,
    R11fG11fB10f,
    R32f,
    R16f,
    Rgba16,
    Rgb10A2,
    Rgba8,
    Rg16,
    Rg8,
    R16,
    R8,
    Rgba16Snorm,
    Rgba8Snorm,
    Rg16Snorm,
    Rg8Snorm,
    R16Snorm,
    R8Snorm,
    Rgba32i,
    Rgba16i,
    Rgba8i,
    Rg32i,
    Rg16i,
    Rg8i,
    R32i,
    R16i,
    R8i,
    Rgba32ui,
    Rgba16ui,
    Rgb10a2ui,
    Rgba8ui,
    Rg32ui,
    Rg16ui,
    Rg8ui,
    R32ui,
    R16ui,
    R8ui,
}

impl ImageFormat {
    pub fn from_layout(name: &str) -> Option<ImageFormat> {
        use ImageFormat::*;
        Some(match name {
            "rgba32f" => Rgba32f,
            "rgba16f" => Rgba16f,
            "rg32f" => Rg32f,
            "rg16f" => Rg16f,
            "r11f_g11f_b10f" => R11fG11fB10f,
            "r32f" => R32f,
            "r16f" => R16f,
            "rgba16" => Rgba16,
            "rgb10_a2" => Rgb10A2,
            "rgba8" => Rgba8,
            "rg16" => Rg16,
            "rg8" => Rg8,
            "r16" => R16,
            "r8" => R8,
            "rgba16_snorm" => Rgba16Snorm,
            "rgba8_snorm" => Rgba8Snorm,
            "rg16_snorm" => Rg16Snorm,
            "rg8_snorm" => Rg8Snorm,
            "r16_snorm" => R16Snorm,
            "r8_snorm" => R8Snorm,
            "rgba32i" => Rgba32i,
            "rgba16i" => Rgba16i,
            "rgba8i" => Rgba8i,
            "rg32i" => Rg32i,
            "rg16i" => Rg16i,
            "rg8i" => Rg8i,
            "r32i" => R32i,
            "r16i" => R16i,
            "r8i" => R8i,
            "rgba32ui" => Rgba32ui,
            "rgba16ui" => Rgba16ui,
            "rgb10_a2ui" => Rgb10a2ui,
            "rgba8ui" => Rgba8ui,
            "rg32ui" => Rg32ui,
            "rg16ui" => Rg16ui,
            "rg8ui" => Rg8ui,
            "r32ui" => R32ui,
            "r16ui" => R16ui,
            "r8ui" => R8ui,
            _ => return None,
        })
    }

    /// Component kind an image with this format must be declared with.
    pub fn sampled_kind(self) -> ScalarKind {
        use ImageFormat::*;
        match self {
            Rgba32i | Rgba16i | Rgba8i | Rg32i | Rg16i | Rg8i | R32i | R16i | R8i => {
                ScalarKind::Int
            }
            Rgba32ui | Rgba16ui | Rgb10a2ui | Rgba8ui | Rg32ui | Rg16ui | Rg8ui | R32ui | R16ui
            | R8ui => ScalarKind::Uint,
            _ => ScalarKind::Float,
        }
    }

    /// Formats outside the core Shader capability set.
    pub fn is_extended(self) -> bool {
        use ImageFormat::*;
        !matches!(
            self,
            Rgba32f
                | Rgba16f
                | R32f
                | Rgba8
                | Rgba8Snorm
                | Rgba32i
                | Rgba16i
                | Rgba8i
                | R32i
                | Rgba32ui
                | Rgba16ui
                | Rgba8ui
                | R32ui
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_lattice() {
        use ScalarKind::*;
        assert!(can_implicitly_convert(Int, Uint));
        assert!(can_implicitly_convert(Uint, Float));
        assert!(can_implicitly_convert(Float, Double));
        assert!(!can_implicitly_convert(Uint, Int));
        assert!(!can_implicitly_convert(Float, Int));
        assert!(!can_implicitly_convert(Bool, Int));
        assert_eq!(common_kind(Int, Float), Some(Float));
        assert_eq!(common_kind(Uint, Int), Some(Uint));
        assert_eq!(common_kind(Bool, Int), None);
    }

    #[test]
    fn shapes_must_match_for_conversion() {
        assert!(type_converts_to(
            &Type::Vector(ScalarKind::Int, 3),
            &Type::Vector(ScalarKind::Float, 3)
        ));
        assert!(!type_converts_to(
            &Type::Vector(ScalarKind::Int, 3),
            &Type::Vector(ScalarKind::Float, 4)
        ));
    }

    #[test]
    fn display_names() {
        let none = |_| String::new();
        let m = Type::Matrix {
            scalar: ScalarKind::Double,
            cols: 3,
            rows: 2,
        };
        assert_eq!(m.display_with(&none), "dmat3x2");
        let a = Type::Array(Box::new(Type::Vector(ScalarKind::Uint, 4)), ArraySize::Runtime);
        assert_eq!(a.display_with(&none), "uvec4[]");
    }

    #[test]
    fn extended_formats() {
        assert!(!ImageFormat::Rgba8.is_extended());
        assert!(ImageFormat::Rg16f.is_extended());
        assert_eq!(ImageFormat::R32ui.sampled_kind(), ScalarKind::Uint);
    }
}
