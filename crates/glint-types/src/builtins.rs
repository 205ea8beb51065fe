//! Built-in variables, constants and functions of the compute stage.

use crate::profile::CapabilityProfile;
use crate::tir::ConstValue;
use crate::types::{ScalarKind, Type, INT, UINT};

/// Compute-stage input variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BuiltinVar {
    GlobalInvocationId,
    LocalInvocationId,
    WorkGroupId,
    NumWorkGroups,
    LocalInvocationIndex,
}

impl BuiltinVar {
    pub fn from_name(name: &str) -> Option<BuiltinVar> {
        Some(match name {
            "gl_GlobalInvocationID" => BuiltinVar::GlobalInvocationId,
            "gl_LocalInvocationID" => BuiltinVar::LocalInvocationId,
            "gl_WorkGroupID" => BuiltinVar::WorkGroupId,
            "gl_NumWorkGroups" => BuiltinVar::NumWorkGroups,
            "gl_LocalInvocationIndex" => BuiltinVar::LocalInvocationIndex,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            BuiltinVar::GlobalInvocationId => "gl_GlobalInvocationID",
            BuiltinVar::LocalInvocationId => "gl_LocalInvocationID",
            BuiltinVar::WorkGroupId => "gl_WorkGroupID",
            BuiltinVar::NumWorkGroups => "gl_NumWorkGroups",
            BuiltinVar::LocalInvocationIndex => "gl_LocalInvocationIndex",
        }
    }

    pub fn ty(self) -> Type {
        match self {
            BuiltinVar::LocalInvocationIndex => UINT,
            _ => Type::Vector(ScalarKind::Uint, 3),
        }
    }
}

fn ivec3(v: [i32; 3]) -> (ConstValue, Type) {
    (
        ConstValue::Composite(v.iter().map(|x| ConstValue::Int(*x)).collect()),
        Type::Vector(ScalarKind::Int, 3),
    )
}

/// Profile-derived `gl_Max*` constants.
pub fn builtin_constant(name: &str, profile: &CapabilityProfile) -> Option<(ConstValue, Type)> {
    let int = |v: i32| Some((ConstValue::Int(v), INT));
    match name {
        "gl_MaxComputeWorkGroupSize" => Some(ivec3(profile.max_work_group_size())),
        "gl_MaxComputeWorkGroupCount" => Some(ivec3(profile.max_work_group_count())),
        "gl_MaxComputeUniformComponents" => int(profile.max_compute_uniform_components),
        "gl_MaxComputeTextureImageUnits" => int(profile.max_compute_texture_image_units),
        "gl_MaxComputeImageUniforms" => int(profile.max_compute_image_uniforms),
        "gl_MaxComputeAtomicCounters" => int(profile.max_compute_atomic_counters),
        "gl_MaxComputeAtomicCounterBuffers" => int(profile.max_compute_atomic_counter_buffers),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomicOp {
    Add,
    Min,
    Max,
    And,
    Or,
    Xor,
    Exchange,
    CompSwap,
}

/// Built-in functions. Overloads sharing a name resolve to one variant; the
/// code generator picks the signed/unsigned/float instruction from the
/// operand types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intrinsic {
    // angle and trigonometry
    Radians,
    Degrees,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,
    Sinh,
    Cosh,
    Tanh,
    Asinh,
    Acosh,
    Atanh,
    // exponential
    Pow,
    Exp,
    Log,
    Exp2,
    Log2,
    Sqrt,
    InverseSqrt,
    // common
    Abs,
    Sign,
    Floor,
    Trunc,
    Round,
    RoundEven,
    Ceil,
    Fract,
    Mod,
    Min,
    Max,
    Clamp,
    Mix,
    /// `mix` with a boolean selector.
    MixSelect,
    Step,
    SmoothStep,
    Fma,
    IsNan,
    IsInf,
    FloatBitsToInt,
    FloatBitsToUint,
    IntBitsToFloat,
    UintBitsToFloat,
    // packing
    PackUnorm2x16,
    PackSnorm2x16,
    PackUnorm4x8,
    PackSnorm4x8,
    PackHalf2x16,
    UnpackUnorm2x16,
    UnpackSnorm2x16,
    UnpackUnorm4x8,
    UnpackSnorm4x8,
    UnpackHalf2x16,
    // geometric
    Length,
    Distance,
    Dot,
    Cross,
    Normalize,
    FaceForward,
    Reflect,
    Refract,
    // matrix
    MatrixCompMult,
    OuterProduct,
    Transpose,
    Determinant,
    Inverse,
    // vector relational
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    Equal,
    NotEqual,
    Any,
    All,
    Not,
    // integer
    BitfieldExtract,
    BitfieldInsert,
    BitfieldReverse,
    BitCount,
    FindLsb,
    FindMsb,
    // synchronization
    Barrier,
    MemoryBarrier,
    MemoryBarrierShared,
    MemoryBarrierBuffer,
    MemoryBarrierImage,
    GroupMemoryBarrier,
    // memory
    Atomic(AtomicOp),
    ImageAtomic(AtomicOp),
    ImageLoad,
    ImageStore,
    ImageSize,
    TexelFetch,
    TextureLod,
    TextureSize,
}

impl Intrinsic {
    pub fn from_name(name: &str) -> Option<Intrinsic> {
        use Intrinsic::*;
        Some(match name {
            "radians" => Radians,
            "degrees" => Degrees,
            "sin" => Sin,
            "cos" => Cos,
            "tan" => Tan,
            "asin" => Asin,
            "acos" => Acos,
            "atan" => Atan,
            "sinh" => Sinh,
            "cosh" => Cosh,
            "tanh" => Tanh,
            "asinh" => Asinh,
            "acosh" => Acosh,
            "atanh" => Atanh,
            "pow" => Pow,
            "exp" => Exp,
            "log" => Log,
            "exp2" => Exp2,
            "log2" => Log2,
            "sqrt" => Sqrt,
            "inversesqrt" => InverseSqrt,
            "abs" => Abs,
            "sign" => Sign,
            "floor" => Floor,
            "trunc" => Trunc,
            "round" => Round,
            "roundEven" => RoundEven,
            "ceil" => Ceil,
            "fract" => Fract,
            "mod" => Mod,
            "min" => Min,
            "max" => Max,
            "clamp" => Clamp,
            "mix" => Mix,
            "step" => Step,
            "smoothstep" => SmoothStep,
            "fma" => Fma,
            "isnan" => IsNan,
            "isinf" => IsInf,
            "floatBitsToInt" => FloatBitsToInt,
            "floatBitsToUint" => FloatBitsToUint,
            "intBitsToFloat" => IntBitsToFloat,
            "uintBitsToFloat" => UintBitsToFloat,
            "packUnorm2x16" => PackUnorm2x16,
            "packSnorm2x16" => PackSnorm2x16,
            "packUnorm4x8" => PackUnorm4x8,
            "packSnorm4x8" => PackSnorm4x8,
            "packHalf2x16" => PackHalf2x16,
            "unpackUnorm2x16" => UnpackUnorm2x16,
            "unpackSnorm2x16" => UnpackSnorm2x16,
            "unpackUnorm4x8" => UnpackUnorm4x8,
            "unpackSnorm4x8" => UnpackSnorm4x8,
            "unpackHalf2x16" => UnpackHalf2x16,
            "length" => Length,
            "distance" => Distance,
            "dot" => Dot,
            "cross" => Cross,
            "normalize" => Normalize,
            "faceforward" => FaceForward,
            "reflect" => Reflect,
            "refract" => Refract,
            "matrixCompMult" => MatrixCompMult,
            "outerProduct" => OuterProduct,
            "transpose" => Transpose,
            "determinant" => Determinant,
            "inverse" => Inverse,
            "lessThan" => LessThan,
            "lessThanEqual" => LessThanEqual,
            "greaterThan" => GreaterThan,
            "greaterThanEqual" => GreaterThanEqual,
            "equal" => Equal,
            "notEqual" => NotEqual,
            "any" => Any,
            "all" => All,
            "not" => Not,
            "bitfieldExtract" => BitfieldExtract,
            "bitfieldInsert" => BitfieldInsert,
            "bitfieldReverse" => BitfieldReverse,
            "bitCount" => BitCount,
            "findLSB" => FindLsb,
            "findMSB" => FindMsb,
            "barrier" => Barrier,
            "memoryBarrier" => MemoryBarrier,
            "memoryBarrierShared" => MemoryBarrierShared,
            "memoryBarrierBuffer" => MemoryBarrierBuffer,
            "memoryBarrierImage" => MemoryBarrierImage,
            "groupMemoryBarrier" => GroupMemoryBarrier,
            "atomicAdd" => Atomic(AtomicOp::Add),
            "atomicMin" => Atomic(AtomicOp::Min),
            "atomicMax" => Atomic(AtomicOp::Max),
            "atomicAnd" => Atomic(AtomicOp::And),
            "atomicOr" => Atomic(AtomicOp::Or),
            "atomicXor" => Atomic(AtomicOp::Xor),
            "atomicExchange" => Atomic(AtomicOp::Exchange),
            "atomicCompSwap" => Atomic(AtomicOp::CompSwap),
            "imageAtomicAdd" => ImageAtomic(AtomicOp::Add),
            "imageAtomicMin" => ImageAtomic(AtomicOp::Min),
            "imageAtomicMax" => ImageAtomic(AtomicOp::Max),
            "imageAtomicAnd" => ImageAtomic(AtomicOp::And),
            "imageAtomicOr" => ImageAtomic(AtomicOp::Or),
            "imageAtomicXor" => ImageAtomic(AtomicOp::Xor),
            "imageAtomicExchange" => ImageAtomic(AtomicOp::Exchange),
            "imageAtomicCompSwap" => ImageAtomic(AtomicOp::CompSwap),
            "imageLoad" => ImageLoad,
            "imageStore" => ImageStore,
            "imageSize" => ImageSize,
            "texelFetch" => TexelFetch,
            "textureLod" => TextureLod,
            "textureSize" => TextureSize,
            _ => return None,
        })
    }

    /// Whether lowering uses the image-query instructions.
    pub fn needs_image_query(self) -> bool {
        matches!(self, Intrinsic::ImageSize | Intrinsic::TextureSize)
    }

    /// Whether lowering goes through the `GLSL.std.450` instruction set.
    pub fn is_glsl_std_450(self) -> bool {
        use Intrinsic::*;
        !matches!(
            self,
            Mod | MixSelect
                | IsNan
                | IsInf
                | FloatBitsToInt
                | FloatBitsToUint
                | IntBitsToFloat
                | UintBitsToFloat
                | Dot
                | MatrixCompMult
                | OuterProduct
                | Transpose
                | LessThan
                | LessThanEqual
                | GreaterThan
                | GreaterThanEqual
                | Equal
                | NotEqual
                | Any
                | All
                | Not
                | BitfieldExtract
                | BitfieldInsert
                | BitfieldReverse
                | BitCount
                | Barrier
                | MemoryBarrier
                | MemoryBarrierShared
                | MemoryBarrierBuffer
                | MemoryBarrierImage
                | GroupMemoryBarrier
                | Atomic(_)
                | ImageAtomic(_)
                | ImageLoad
                | ImageStore
                | ImageSize
                | TexelFetch
                | TextureLod
                | TextureSize
        )
    }
}

/// Names reserved for built-in functions that compute shaders cannot use.
pub fn unavailable_in_compute(name: &str) -> Option<&'static str> {
    match name {
        "texture" | "textureProj" | "textureOffset" | "textureGrad" => {
            Some("implicit-LOD and gradient texture lookups are not available in compute shaders")
        }
        "dFdx" | "dFdy" | "fwidth" => Some("derivatives are only available in fragment shaders"),
        "EmitVertex" | "EndPrimitive" => Some("geometry shader functions are not available in compute shaders"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_inputs() {
        let v = BuiltinVar::from_name("gl_GlobalInvocationID").unwrap();
        assert_eq!(v.ty(), Type::Vector(ScalarKind::Uint, 3));
        assert_eq!(BuiltinVar::LocalInvocationIndex.ty(), UINT);
        assert!(BuiltinVar::from_name("gl_FragCoord").is_none());
    }

    #[test]
    fn max_constants_follow_profile() {
        let profile = CapabilityProfile::builder()
            .max_compute_image_uniforms(4)
            .build();
        let (v, ty) = builtin_constant("gl_MaxComputeImageUniforms", &profile).unwrap();
        assert_eq!(v, ConstValue::Int(4));
        assert_eq!(ty, INT);
        let (v, _) = builtin_constant("gl_MaxComputeWorkGroupSize", &profile).unwrap();
        assert_eq!(
            v,
            ConstValue::Composite(vec![
                ConstValue::Int(1024),
                ConstValue::Int(1024),
                ConstValue::Int(64)
            ])
        );
    }

    #[test]
    fn instruction_set_classification() {
        assert!(Intrinsic::Sin.is_glsl_std_450());
        assert!(!Intrinsic::Dot.is_glsl_std_450());
        assert!(Intrinsic::ImageSize.needs_image_query());
        assert_eq!(
            Intrinsic::from_name("atomicCompSwap"),
            Some(Intrinsic::Atomic(AtomicOp::CompSwap))
        );
    }
}
