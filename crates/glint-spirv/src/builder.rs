//! Word-level SPIR-V module assembly.
//!
//! Instructions are appended to per-section buffers and concatenated in the
//! order the SPIR-V logical layout requires when the module is finished.
//! Non-aggregate types and all constants are deduplicated; ids are handed
//! out sequentially so the same input always yields the same words.

use std::collections::{BTreeSet, HashMap};

use rspirv::spirv::{self, Capability, Decoration, Op, StorageClass, Word};

/// Tool id 0 (unregistered) with generator version 1.
pub const GENERATOR: u32 = 0x0000_0001;

/// Append one instruction to `out`.
pub(crate) fn encode(out: &mut Vec<u32>, op: Op, operands: &[u32]) {
    out.push(((operands.len() as u32 + 1) << 16) | op as u32);
    out.extend_from_slice(operands);
}

/// Nul-terminated UTF-8 packed little-endian into words.
pub(crate) fn string_words(s: &str) -> Vec<u32> {
    let mut bytes = s.as_bytes().to_vec();
    bytes.push(0);
    while bytes.len() % 4 != 0 {
        bytes.push(0);
    }
    bytes
        .chunks(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Types that are declared at most once.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum TypeKey {
    Void,
    Bool,
    Int { signed: bool },
    Float { width: u32 },
    Vector(Word, u32),
    Matrix(Word, u32),
    Array { elem: Word, len: Word, stride: Option<u32> },
    RuntimeArray { elem: Word, stride: u32 },
    Pointer(StorageClass, Word),
    Function(Word, Vec<Word>),
    Image {
        sampled: Word,
        dim: spirv::Dim,
        /// 1 for sampled images, 2 for storage images.
        usage: u32,
        format: spirv::ImageFormat,
    },
    SampledImage(Word),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ConstKey {
    op: Op,
    ty: Word,
    operands: Vec<u32>,
}

#[derive(Debug, Default)]
pub(crate) struct ModuleBuilder {
    next_id: Word,
    capabilities: BTreeSet<u32>,
    glsl_std_450: Option<Word>,
    entry_points: Vec<u32>,
    execution_modes: Vec<u32>,
    debug: Vec<u32>,
    annotations: Vec<u32>,
    globals: Vec<u32>,
    functions: Vec<u32>,
    types: HashMap<TypeKey, Word>,
    constants: HashMap<ConstKey, Word>,
}

impl ModuleBuilder {
    pub fn new() -> Self {
        let mut b = ModuleBuilder {
            next_id: 1,
            ..ModuleBuilder::default()
        };
        b.capability(Capability::Shader);
        b
    }

    pub fn id(&mut self) -> Word {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn capability(&mut self, cap: Capability) {
        self.capabilities.insert(cap as u32);
    }

    /// Id of the `GLSL.std.450` import, created on first use.
    pub fn glsl_std_450(&mut self) -> Word {
        if let Some(id) = self.glsl_std_450 {
            return id;
        }
        let id = self.id();
        self.glsl_std_450 = Some(id);
        id
    }

    pub fn type_id(&mut self, key: TypeKey) -> Word {
        if let Some(&id) = self.types.get(&key) {
            return id;
        }
        let id = self.id();
        let mut ops = vec![id];
        let op = match &key {
            TypeKey::Void => Op::TypeVoid,
            TypeKey::Bool => Op::TypeBool,
            TypeKey::Int { signed } => {
                ops.extend([32, *signed as u32]);
                Op::TypeInt
            }
            TypeKey::Float { width } => {
                ops.push(*width);
                Op::TypeFloat
            }
            TypeKey::Vector(elem, n) | TypeKey::Matrix(elem, n) => {
                ops.extend([*elem, *n]);
                if matches!(key, TypeKey::Vector(..)) {
                    Op::TypeVector
                } else {
                    Op::TypeMatrix
                }
            }
            TypeKey::Array { elem, len, stride } => {
                ops.extend([*elem, *len]);
                if let Some(s) = stride {
                    self.decorate(id, Decoration::ArrayStride, &[*s]);
                }
                Op::TypeArray
            }
            TypeKey::RuntimeArray { elem, stride } => {
                ops.push(*elem);
                self.decorate(id, Decoration::ArrayStride, &[*stride]);
                Op::TypeRuntimeArray
            }
            TypeKey::Pointer(class, pointee) => {
                ops.extend([*class as u32, *pointee]);
                Op::TypePointer
            }
            TypeKey::Function(ret, params) => {
                ops.push(*ret);
                ops.extend_from_slice(params);
                Op::TypeFunction
            }
            TypeKey::Image {
                sampled,
                dim,
                usage,
                format,
            } => {
                // depth 0, arrayed 0, multisampled 0
                ops.extend([*sampled, *dim as u32, 0, 0, 0, *usage, *format as u32]);
                Op::TypeImage
            }
            TypeKey::SampledImage(image) => {
                ops.push(*image);
                Op::TypeSampledImage
            }
        };
        encode(&mut self.globals, op, &ops);
        self.types.insert(key, id);
        id
    }

    /// Structs are never merged: members may carry different decorations.
    pub fn type_struct(&mut self, members: &[Word]) -> Word {
        let id = self.id();
        let mut ops = vec![id];
        ops.extend_from_slice(members);
        encode(&mut self.globals, Op::TypeStruct, &ops);
        id
    }

    fn constant_op(&mut self, op: Op, ty: Word, operands: Vec<u32>) -> Word {
        let key = ConstKey { op, ty, operands };
        if let Some(&id) = self.constants.get(&key) {
            return id;
        }
        let id = self.id();
        let mut ops = vec![ty, id];
        ops.extend_from_slice(&key.operands);
        encode(&mut self.globals, op, &ops);
        self.constants.insert(key, id);
        id
    }

    pub fn constant_bits(&mut self, ty: Word, bits: &[u32]) -> Word {
        self.constant_op(Op::Constant, ty, bits.to_vec())
    }

    pub fn constant_bool(&mut self, ty: Word, value: bool) -> Word {
        let op = if value { Op::ConstantTrue } else { Op::ConstantFalse };
        self.constant_op(op, ty, Vec::new())
    }

    pub fn constant_composite(&mut self, ty: Word, parts: &[Word]) -> Word {
        self.constant_op(Op::ConstantComposite, ty, parts.to_vec())
    }

    pub fn constant_null(&mut self, ty: Word) -> Word {
        self.constant_op(Op::ConstantNull, ty, Vec::new())
    }

    pub fn global_variable(&mut self, ptr_ty: Word, class: StorageClass, init: Option<Word>) -> Word {
        let id = self.id();
        let mut ops = vec![ptr_ty, id, class as u32];
        ops.extend(init);
        encode(&mut self.globals, Op::Variable, &ops);
        id
    }

    pub fn name(&mut self, target: Word, name: &str) {
        let mut ops = vec![target];
        ops.extend(string_words(name));
        encode(&mut self.debug, Op::Name, &ops);
    }

    pub fn member_name(&mut self, ty: Word, member: u32, name: &str) {
        let mut ops = vec![ty, member];
        ops.extend(string_words(name));
        encode(&mut self.debug, Op::MemberName, &ops);
    }

    pub fn decorate(&mut self, target: Word, decoration: Decoration, extra: &[u32]) {
        let mut ops = vec![target, decoration as u32];
        ops.extend_from_slice(extra);
        encode(&mut self.annotations, Op::Decorate, &ops);
    }

    pub fn member_decorate(&mut self, ty: Word, member: u32, decoration: Decoration, extra: &[u32]) {
        let mut ops = vec![ty, member, decoration as u32];
        ops.extend_from_slice(extra);
        encode(&mut self.annotations, Op::MemberDecorate, &ops);
    }

    pub fn entry_point(&mut self, function: Word, name: &str, interface: &[Word]) {
        let mut ops = vec![spirv::ExecutionModel::GLCompute as u32, function];
        ops.extend(string_words(name));
        ops.extend_from_slice(interface);
        encode(&mut self.entry_points, Op::EntryPoint, &ops);
    }

    pub fn local_size(&mut self, function: Word, size: [u32; 3]) {
        let mut ops = vec![function, spirv::ExecutionMode::LocalSize as u32];
        ops.extend(size);
        encode(&mut self.execution_modes, Op::ExecutionMode, &ops);
    }

    pub fn add_function(&mut self, words: Vec<u32>) {
        self.functions.extend(words);
    }

    /// Header plus every section in logical-layout order.
    pub fn finish(self) -> Vec<u32> {
        let mut out = vec![
            spirv::MAGIC_NUMBER,
            0x0001_0000,
            GENERATOR,
            self.next_id,
            0,
        ];
        for cap in &self.capabilities {
            encode(&mut out, Op::Capability, &[*cap]);
        }
        if let Some(id) = self.glsl_std_450 {
            let mut ops = vec![id];
            ops.extend(string_words("GLSL.std.450"));
            encode(&mut out, Op::ExtInstImport, &ops);
        }
        encode(
            &mut out,
            Op::MemoryModel,
            &[
                spirv::AddressingModel::Logical as u32,
                spirv::MemoryModel::GLSL450 as u32,
            ],
        );
        out.extend(self.entry_points);
        out.extend(self.execution_modes);
        out.extend(self.debug);
        out.extend(self.annotations);
        out.extend(self.globals);
        out.extend(self.functions);
        out
    }
}

/// One function under construction. Local variables are collected apart
/// from the code so they all land at the top of the entry block.
#[derive(Debug, Default)]
pub(crate) struct FunctionWriter {
    header: Vec<u32>,
    vars: Vec<u32>,
    code: Vec<u32>,
    /// Label of the block currently being filled.
    pub current: Word,
    /// The current block already ends in a branch or return.
    pub terminated: bool,
}

impl FunctionWriter {
    pub fn begin(ret: Word, id: Word, fn_ty: Word) -> Self {
        let mut w = FunctionWriter::default();
        encode(
            &mut w.header,
            Op::Function,
            &[ret, id, spirv::FunctionControl::NONE.bits(), fn_ty],
        );
        w
    }

    pub fn parameter(&mut self, ty: Word, id: Word) {
        encode(&mut self.header, Op::FunctionParameter, &[ty, id]);
    }

    pub fn variable(&mut self, ptr_ty: Word, id: Word) {
        encode(
            &mut self.vars,
            Op::Variable,
            &[ptr_ty, id, StorageClass::Function as u32],
        );
    }

    /// Start a block. The entry block's label goes before the variables.
    pub fn label(&mut self, id: Word) {
        if self.current == 0 {
            encode(&mut self.header, Op::Label, &[id]);
        } else {
            encode(&mut self.code, Op::Label, &[id]);
        }
        self.current = id;
        self.terminated = false;
    }

    pub fn emit(&mut self, op: Op, operands: &[u32]) {
        encode(&mut self.code, op, operands);
    }

    /// Emit a block terminator.
    pub fn terminate(&mut self, op: Op, operands: &[u32]) {
        encode(&mut self.code, op, operands);
        self.terminated = true;
    }

    pub fn finish(mut self) -> Vec<u32> {
        encode(&mut self.code, Op::FunctionEnd, &[]);
        let mut out = self.header;
        out.extend(self.vars);
        out.extend(self.code);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_are_nul_terminated_and_padded() {
        assert_eq!(string_words("main"), vec![0x6e69_616d, 0]);
        assert_eq!(string_words("abc"), vec![0x0063_6261]);
    }

    #[test]
    fn types_and_constants_are_deduplicated() {
        let mut b = ModuleBuilder::new();
        let i = b.type_id(TypeKey::Int { signed: true });
        assert_eq!(b.type_id(TypeKey::Int { signed: true }), i);
        let u = b.type_id(TypeKey::Int { signed: false });
        assert_ne!(i, u);
        let one = b.constant_bits(i, &[1]);
        assert_eq!(b.constant_bits(i, &[1]), one);
        assert_ne!(b.constant_bits(u, &[1]), one);
        // structs are never merged
        assert_ne!(b.type_struct(&[i]), b.type_struct(&[i]));
    }

    #[test]
    fn header_and_section_order() {
        let mut b = ModuleBuilder::new();
        let void = b.type_id(TypeKey::Void);
        let glsl = b.glsl_std_450();
        let words = b.finish();
        assert_eq!(&words[..5], &[spirv::MAGIC_NUMBER, 0x0001_0000, GENERATOR, glsl + 1, 0]);
        // OpCapability Shader comes first
        assert_eq!(words[5], (2 << 16) | Op::Capability as u32);
        assert_eq!(words[6], Capability::Shader as u32);
        assert_eq!(words[7] & 0xffff, Op::ExtInstImport as u32);
        assert!(words.contains(&void));
    }
}
