use rspirv::spirv::{self, Capability, GLOp, MemorySemantics, Op, Scope, StorageClass, Word};

use glint_ast::ast::BinOp;
use glint_types::builtins::{AtomicOp, Intrinsic};
use glint_types::tir::Expr;
use glint_types::types::{ScalarKind, Type};

use super::expr::compare_op;
use super::{error, Lowerer, Result};
use crate::builder::TypeKey;

/// Memory semantics shared by every barrier that orders all memory.
fn all_memory() -> MemorySemantics {
    MemorySemantics::UNIFORM_MEMORY | MemorySemantics::WORKGROUP_MEMORY | MemorySemantics::IMAGE_MEMORY
}

impl<'p> Lowerer<'p> {
    fn ext(&mut self, t: Word, op: GLOp, args: &[Word]) -> Word {
        let set = self.b.glsl_std_450();
        let mut ops = vec![set, op as u32];
        ops.extend_from_slice(args);
        self.op(Op::ExtInst, t, &ops)
    }

    fn barrier(&mut self, execution: Option<Scope>, memory: Scope, semantics: MemorySemantics) {
        let memory = self.uint_const(memory as u32);
        let semantics = self.uint_const((MemorySemantics::ACQUIRE_RELEASE | semantics).bits());
        match execution {
            Some(scope) => {
                let scope = self.uint_const(scope as u32);
                self.w.emit(Op::ControlBarrier, &[scope, memory, semantics]);
            }
            None => self.w.emit(Op::MemoryBarrier, &[memory, semantics]),
        }
    }

    pub(super) fn intrinsic(&mut self, op: Intrinsic, args: &[Expr], e: &Expr) -> Result<Word> {
        use Intrinsic::*;
        match op {
            Barrier => {
                self.barrier(Some(Scope::Workgroup), Scope::Workgroup, MemorySemantics::WORKGROUP_MEMORY);
                return Ok(0);
            }
            MemoryBarrier => {
                self.barrier(None, Scope::Device, all_memory());
                return Ok(0);
            }
            MemoryBarrierShared => {
                self.barrier(None, Scope::Device, MemorySemantics::WORKGROUP_MEMORY);
                return Ok(0);
            }
            MemoryBarrierBuffer => {
                self.barrier(None, Scope::Device, MemorySemantics::UNIFORM_MEMORY);
                return Ok(0);
            }
            MemoryBarrierImage => {
                self.barrier(None, Scope::Device, MemorySemantics::IMAGE_MEMORY);
                return Ok(0);
            }
            GroupMemoryBarrier => {
                self.barrier(None, Scope::Workgroup, all_memory());
                return Ok(0);
            }
            Atomic(aop) => return self.atomic(aop, args, e, false),
            ImageAtomic(aop) => return self.atomic(aop, args, e, true),
            _ => {}
        }

        let mut v = Vec::with_capacity(args.len());
        for a in args {
            v.push(self.value(a)?);
        }
        let arg = |i: usize| v.get(i).copied().unwrap_or(0);
        let t = self.ty(&e.ty);
        let kind = args
            .first()
            .and_then(|a| a.ty.scalar_kind())
            .unwrap_or(ScalarKind::Float);
        let float = matches!(kind, ScalarKind::Float | ScalarKind::Double);
        let signed = kind == ScalarKind::Int;
        let pick = |f: GLOp, s: GLOp, u: GLOp| {
            if float {
                f
            } else if signed {
                s
            } else {
                u
            }
        };

        let glsl = match op {
            Radians => Some(GLOp::Radians),
            Degrees => Some(GLOp::Degrees),
            Sin => Some(GLOp::Sin),
            Cos => Some(GLOp::Cos),
            Tan => Some(GLOp::Tan),
            Asin => Some(GLOp::Asin),
            Acos => Some(GLOp::Acos),
            Atan => Some(GLOp::Atan),
            Atan2 => Some(GLOp::Atan2),
            Sinh => Some(GLOp::Sinh),
            Cosh => Some(GLOp::Cosh),
            Tanh => Some(GLOp::Tanh),
            Asinh => Some(GLOp::Asinh),
            Acosh => Some(GLOp::Acosh),
            Atanh => Some(GLOp::Atanh),
            Pow => Some(GLOp::Pow),
            Exp => Some(GLOp::Exp),
            Log => Some(GLOp::Log),
            Exp2 => Some(GLOp::Exp2),
            Log2 => Some(GLOp::Log2),
            Sqrt => Some(GLOp::Sqrt),
            InverseSqrt => Some(GLOp::InverseSqrt),
            Abs => Some(if float { GLOp::FAbs } else { GLOp::SAbs }),
            Sign => Some(if float { GLOp::FSign } else { GLOp::SSign }),
            Floor => Some(GLOp::Floor),
            Trunc => Some(GLOp::Trunc),
            Round => Some(GLOp::Round),
            RoundEven => Some(GLOp::RoundEven),
            Ceil => Some(GLOp::Ceil),
            Fract => Some(GLOp::Fract),
            Min => Some(pick(GLOp::FMin, GLOp::SMin, GLOp::UMin)),
            Max => Some(pick(GLOp::FMax, GLOp::SMax, GLOp::UMax)),
            Clamp => Some(pick(GLOp::FClamp, GLOp::SClamp, GLOp::UClamp)),
            Mix => Some(GLOp::FMix),
            Step => Some(GLOp::Step),
            SmoothStep => Some(GLOp::SmoothStep),
            Fma => Some(GLOp::Fma),
            PackUnorm2x16 => Some(GLOp::PackUnorm2x16),
            PackSnorm2x16 => Some(GLOp::PackSnorm2x16),
            PackUnorm4x8 => Some(GLOp::PackUnorm4x8),
            PackSnorm4x8 => Some(GLOp::PackSnorm4x8),
            PackHalf2x16 => Some(GLOp::PackHalf2x16),
            UnpackUnorm2x16 => Some(GLOp::UnpackUnorm2x16),
            UnpackSnorm2x16 => Some(GLOp::UnpackSnorm2x16),
            UnpackUnorm4x8 => Some(GLOp::UnpackUnorm4x8),
            UnpackSnorm4x8 => Some(GLOp::UnpackSnorm4x8),
            UnpackHalf2x16 => Some(GLOp::UnpackHalf2x16),
            Length => Some(GLOp::Length),
            Distance => Some(GLOp::Distance),
            Cross => Some(GLOp::Cross),
            Normalize => Some(GLOp::Normalize),
            FaceForward => Some(GLOp::FaceForward),
            Reflect => Some(GLOp::Reflect),
            Refract => Some(GLOp::Refract),
            Determinant => Some(GLOp::Determinant),
            Inverse => Some(GLOp::MatrixInverse),
            FindLsb => Some(GLOp::FindILsb),
            FindMsb => Some(if signed { GLOp::FindSMsb } else { GLOp::FindUMsb }),
            _ => None,
        };
        if let Some(glop) = glsl {
            return Ok(self.ext(t, glop, &v));
        }

        let result = match op {
            Mod => self.op(Op::FMod, t, &[arg(0), arg(1)]),
            // mix(x, y, a) selects y where a is true
            MixSelect => self.op(Op::Select, t, &[arg(2), arg(1), arg(0)]),
            IsNan => self.op(Op::IsNan, t, &[arg(0)]),
            IsInf => self.op(Op::IsInf, t, &[arg(0)]),
            FloatBitsToInt | FloatBitsToUint | IntBitsToFloat | UintBitsToFloat => {
                self.op(Op::Bitcast, t, &[arg(0)])
            }
            Dot if args.first().is_some_and(|a| a.ty.is_scalar()) => {
                self.op(Op::FMul, t, &[arg(0), arg(1)])
            }
            Dot => self.op(Op::Dot, t, &[arg(0), arg(1)]),
            MatrixCompMult => {
                let Type::Matrix { scalar, cols, rows } = e.ty else {
                    return Err(error("matrixCompMult requires matrices", e.span));
                };
                let ct = self.ty(&Type::Vector(scalar, rows));
                let mut columns = Vec::with_capacity(cols as usize);
                for c in 0..cols as u32 {
                    let x = self.extract(ct, arg(0), &[c]);
                    let y = self.extract(ct, arg(1), &[c]);
                    columns.push(self.op(Op::FMul, ct, &[x, y]));
                }
                self.construct(t, &columns)
            }
            OuterProduct => self.op(Op::OuterProduct, t, &[arg(0), arg(1)]),
            Transpose => self.op(Op::Transpose, t, &[arg(0)]),
            LessThan | LessThanEqual | GreaterThan | GreaterThanEqual | Equal | NotEqual => {
                let bop = match op {
                    LessThan => BinOp::Lt,
                    LessThanEqual => BinOp::Le,
                    GreaterThan => BinOp::Gt,
                    GreaterThanEqual => BinOp::Ge,
                    Equal => BinOp::Eq,
                    _ => BinOp::Ne,
                };
                let opcode = compare_op(bop, kind).unwrap_or(Op::IEqual);
                self.op(opcode, t, &[arg(0), arg(1)])
            }
            Any => self.op(Op::Any, t, &[arg(0)]),
            All => self.op(Op::All, t, &[arg(0)]),
            Not => self.op(Op::LogicalNot, t, &[arg(0)]),
            BitfieldExtract => {
                let opcode = if signed {
                    Op::BitFieldSExtract
                } else {
                    Op::BitFieldUExtract
                };
                self.op(opcode, t, &[arg(0), arg(1), arg(2)])
            }
            BitfieldInsert => self.op(Op::BitFieldInsert, t, &[arg(0), arg(1), arg(2), arg(3)]),
            BitfieldReverse => self.op(Op::BitReverse, t, &[arg(0)]),
            BitCount => self.op(Op::BitCount, t, &[arg(0)]),
            ImageLoad => {
                if matches!(args.first().map(|a| &a.ty), Some(Type::Image { format: None, .. })) {
                    self.b.capability(Capability::StorageImageReadWithoutFormat);
                }
                self.op(Op::ImageRead, t, &[arg(0), arg(1)])
            }
            ImageStore => {
                self.w.emit(Op::ImageWrite, &[arg(0), arg(1), arg(2)]);
                0
            }
            ImageSize => self.op(Op::ImageQuerySize, t, &[arg(0)]),
            TexelFetch => {
                let image = self.image_of(&args[0], arg(0));
                let lod = spirv::ImageOperands::LOD.bits();
                self.op(Op::ImageFetch, t, &[image, arg(1), lod, arg(2)])
            }
            TextureLod => {
                let lod = spirv::ImageOperands::LOD.bits();
                self.op(Op::ImageSampleExplicitLod, t, &[arg(0), arg(1), lod, arg(2)])
            }
            TextureSize => {
                let image = self.image_of(&args[0], arg(0));
                self.op(Op::ImageQuerySizeLod, t, &[image, arg(1)])
            }
            _ => {
                return Err(error(
                    format!("built-in function {:?} has no SPIR-V lowering", op),
                    e.span,
                ))
            }
        };
        Ok(result)
    }

    /// The image half of a combined image sampler value.
    fn image_of(&mut self, sampler: &Expr, value: Word) -> Word {
        let image_ty = self.sampled_image_type(&sampler.ty);
        self.op(Op::Image, image_ty, &[value])
    }

    /// Buffer, shared and image atomics. Image atomics go through a texel
    /// pointer; the rest operate on the variable's own pointer.
    fn atomic(&mut self, aop: AtomicOp, args: &[Expr], e: &Expr, image: bool) -> Result<Word> {
        let target = args
            .first()
            .ok_or_else(|| error("atomic function without arguments", e.span))?;
        let place = self
            .place(target)?
            .ok_or_else(|| error("atomic functions require a variable as their first argument", target.span))?;
        let t = self.ty(&e.ty);
        let (pointer, rest) = if image {
            let coords = match args.get(1) {
                Some(c) => self.value(c)?,
                None => return Err(error("image atomic without coordinates", e.span)),
            };
            let ptr_ty = self.b.type_id(TypeKey::Pointer(StorageClass::Image, t));
            let sample = self.uint_const(0);
            let texel = self.op(Op::ImageTexelPointer, ptr_ty, &[place.ptr, coords, sample]);
            (texel, &args[2.min(args.len())..])
        } else {
            (place.ptr, &args[1.min(args.len())..])
        };
        let mut values = Vec::with_capacity(rest.len());
        for a in rest {
            values.push(self.value(a)?);
        }
        let value = |i: usize| values.get(i).copied().unwrap_or(0);

        let scope = self.uint_const(Scope::Device as u32);
        let relaxed = self.uint_const(0);
        let signed = e.ty.scalar_kind() == Some(ScalarKind::Int);
        if aop == AtomicOp::CompSwap {
            // operands: compare, then data
            return Ok(self.op(
                Op::AtomicCompareExchange,
                t,
                &[pointer, scope, relaxed, relaxed, value(1), value(0)],
            ));
        }
        let opcode = match aop {
            AtomicOp::Add => Op::AtomicIAdd,
            AtomicOp::Min if signed => Op::AtomicSMin,
            AtomicOp::Min => Op::AtomicUMin,
            AtomicOp::Max if signed => Op::AtomicSMax,
            AtomicOp::Max => Op::AtomicUMax,
            AtomicOp::And => Op::AtomicAnd,
            AtomicOp::Or => Op::AtomicOr,
            AtomicOp::Xor => Op::AtomicXor,
            _ => Op::AtomicExchange,
        };
        Ok(self.op(opcode, t, &[pointer, scope, relaxed, value(0)]))
    }
}
