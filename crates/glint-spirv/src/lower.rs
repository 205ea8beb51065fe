//! Lowering of a checked and bound [`Program`] to SPIR-V.
//!
//! Values are always held in their plain (undecorated) representation.
//! Block memory uses separately declared, explicitly laid-out types, so
//! aggregates are rebuilt member by member when they cross that boundary.

mod expr;
mod intrinsic;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rspirv::spirv::{self, Capability, Decoration, Op, StorageClass, Word};

use glint_ast::diag::{Diagnostic, Stage};
use glint_ast::span::Span;
use glint_types::builtins::BuiltinVar;
use glint_types::layout;
use glint_types::tir::{
    BlockLayout, ConstValue, ExprKind, FuncId, LoopKind, MemoryFlags, Program, ResourceKind,
    Stmt, Storage, SwitchCase,
};
use glint_types::types::{ArraySize, ImageDim, ImageFormat, ScalarKind, StructId, Type};

use crate::builder::{FunctionWriter, ModuleBuilder, TypeKey};

pub(crate) type Result<T> = std::result::Result<T, Diagnostic>;

pub(crate) fn error(message: impl Into<String>, span: Span) -> Diagnostic {
    Diagnostic::error(Stage::CodeGen, message).at(span)
}

/// Layout rule and matrix order of the block memory a value lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    rule: BlockLayout,
    row_major: bool,
}

/// A pointer to a value and what kind of memory it points into.
#[derive(Debug, Clone, Copy)]
struct Place {
    ptr: Word,
    class: StorageClass,
    layout: Option<Layout>,
}

impl Default for Place {
    fn default() -> Self {
        Place {
            ptr: 0,
            class: StorageClass::Function,
            layout: None,
        }
    }
}

pub(crate) struct Lowerer<'p> {
    program: &'p Program,
    b: ModuleBuilder,
    structs: HashMap<(StructId, Option<BlockLayout>), Word>,
    globals: Vec<Place>,
    functions: HashMap<FuncId, Word>,
    builtins: BTreeMap<BuiltinVar, Word>,

    // State of the function being lowered.
    w: FunctionWriter,
    locals: Vec<Place>,
    breaks: Vec<Word>,
    continues: Vec<Word>,
}

/// Lower `program` into a complete module.
pub(crate) fn lower(program: &Program) -> Result<Vec<u32>> {
    let entry = program
        .entry
        .ok_or_else(|| Diagnostic::error(Stage::CodeGen, "no entry point to generate code for"))?;
    let mut l = Lowerer {
        program,
        b: ModuleBuilder::new(),
        structs: HashMap::new(),
        globals: Vec::with_capacity(program.globals.len()),
        functions: HashMap::new(),
        builtins: BTreeMap::new(),
        w: FunctionWriter::default(),
        locals: Vec::new(),
        breaks: Vec::new(),
        continues: Vec::new(),
    };
    l.capabilities();
    l.declare_globals();

    let order = reachable(program, entry);
    log::debug!("lowering {} of {} functions", order.len(), program.functions.len());
    for &id in &order {
        let fid = l.b.id();
        l.b.name(fid, &program.function(id).name);
        l.functions.insert(id, fid);
    }
    for &id in &order {
        l.function(id)?;
    }

    let main = l.functions.get(&entry).copied().unwrap_or(0);
    let interface: Vec<Word> = l.builtins.values().copied().collect();
    l.b.entry_point(main, "main", &interface);
    l.b.local_size(main, program.local_size.unwrap_or([1, 1, 1]));
    Ok(l.b.finish())
}

/// Functions reachable from `entry` or from the global initializers it
/// runs: the entry first, then declaration order.
fn reachable(program: &Program, entry: FuncId) -> Vec<FuncId> {
    let mut seen = BTreeSet::new();
    let mut stack = vec![entry];
    let calls = |e: &glint_types::tir::Expr, stack: &mut Vec<FuncId>| {
        e.walk(&mut |e| {
            if let ExprKind::Call(callee, _) = &e.kind {
                stack.push(*callee);
            }
        })
    };
    for (_, e) in &program.global_inits {
        calls(e, &mut stack);
    }
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        for s in &program.function(id).body {
            s.walk_exprs(&mut |e| calls(e, &mut stack));
        }
    }
    let mut order = vec![entry];
    order.extend(seen.into_iter().filter(|id| *id != entry));
    order
}

fn dim(d: ImageDim) -> spirv::Dim {
    match d {
        ImageDim::Dim1D => spirv::Dim::Dim1D,
        ImageDim::Dim2D => spirv::Dim::Dim2D,
        ImageDim::Dim3D => spirv::Dim::Dim3D,
    }
}

fn image_format(f: ImageFormat) -> spirv::ImageFormat {
    use spirv::ImageFormat as S;
    match f {
        ImageFormat::Rgba32f => S::Rgba32f,
        ImageFormat::Rgba16f => S::Rgba16f,
        ImageFormat::Rg32f => S::Rg32f,
        ImageFormat::Rg16f => S::Rg16f,
        ImageFormat::R11fG11fB10f => S::R11fG11fB10f,
        ImageFormat::R32f => S::R32f,
        ImageFormat::R16f => S::R16f,
        ImageFormat::Rgba16 => S::Rgba16,
        ImageFormat::Rgb10A2 => S::Rgb10A2,
        ImageFormat::Rgba8 => S::Rgba8,
        ImageFormat::Rg16 => S::Rg16,
        ImageFormat::Rg8 => S::Rg8,
        ImageFormat::R16 => S::R16,
        ImageFormat::R8 => S::R8,
        ImageFormat::Rgba16Snorm => S::Rgba16Snorm,
        ImageFormat::Rgba8Snorm => S::Rgba8Snorm,
        ImageFormat::Rg16Snorm => S::Rg16Snorm,
        ImageFormat::Rg8Snorm => S::Rg8Snorm,
        ImageFormat::R16Snorm => S::R16Snorm,
        ImageFormat::R8Snorm => S::R8Snorm,
        ImageFormat::Rgba32i => S::Rgba32i,
        ImageFormat::Rgba16i => S::Rgba16i,
        ImageFormat::Rgba8i => S::Rgba8i,
        ImageFormat::Rg32i => S::Rg32i,
        ImageFormat::Rg16i => S::Rg16i,
        ImageFormat::Rg8i => S::Rg8i,
        ImageFormat::R32i => S::R32i,
        ImageFormat::R16i => S::R16i,
        ImageFormat::R8i => S::R8i,
        ImageFormat::Rgba32ui => S::Rgba32ui,
        ImageFormat::Rgba16ui => S::Rgba16ui,
        ImageFormat::Rgb10a2ui => S::Rgb10a2ui,
        ImageFormat::Rgba8ui => S::Rgba8ui,
        ImageFormat::Rg32ui => S::Rg32ui,
        ImageFormat::Rg16ui => S::Rg16ui,
        ImageFormat::Rg8ui => S::Rg8ui,
        ImageFormat::R32ui => S::R32ui,
        ImageFormat::R16ui => S::R16ui,
        ImageFormat::R8ui => S::R8ui,
    }
}

fn builtin_decoration(b: BuiltinVar) -> spirv::BuiltIn {
    match b {
        BuiltinVar::GlobalInvocationId => spirv::BuiltIn::GlobalInvocationId,
        BuiltinVar::LocalInvocationId => spirv::BuiltIn::LocalInvocationId,
        BuiltinVar::WorkGroupId => spirv::BuiltIn::WorkgroupId,
        BuiltinVar::NumWorkGroups => spirv::BuiltIn::NumWorkgroups,
        BuiltinVar::LocalInvocationIndex => spirv::BuiltIn::LocalInvocationIndex,
    }
}

impl<'p> Lowerer<'p> {
    fn capabilities(&mut self) {
        let f = self.program.features;
        let wanted = [
            (f.float64, Capability::Float64),
            (f.image_query, Capability::ImageQuery),
            (f.sampled_1d, Capability::Sampled1D),
            (f.image_1d, Capability::Image1D),
            (f.extended_image_formats, Capability::StorageImageExtendedFormats),
            (f.write_without_format, Capability::StorageImageWriteWithoutFormat),
        ];
        for (on, cap) in wanted {
            if on {
                self.b.capability(cap);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Types
    // -----------------------------------------------------------------------

    fn scalar(&mut self, k: ScalarKind) -> Word {
        let key = match k {
            ScalarKind::Bool => TypeKey::Bool,
            ScalarKind::Int => TypeKey::Int { signed: true },
            ScalarKind::Uint => TypeKey::Int { signed: false },
            ScalarKind::Float => TypeKey::Float { width: 32 },
            ScalarKind::Double => TypeKey::Float { width: 64 },
        };
        self.b.type_id(key)
    }

    fn ty(&mut self, ty: &Type) -> Word {
        self.ty_in(ty, None)
    }

    /// Type id of `ty`, laid out for block memory when `layout` is set.
    fn ty_in(&mut self, ty: &Type, layout: Option<Layout>) -> Word {
        match ty {
            Type::Void => self.b.type_id(TypeKey::Void),
            Type::Scalar(k) => self.scalar(*k),
            Type::Vector(k, n) => {
                let s = self.scalar(*k);
                self.b.type_id(TypeKey::Vector(s, *n as u32))
            }
            Type::Matrix { scalar, cols, rows } => {
                let col = self.ty(&Type::Vector(*scalar, *rows));
                self.b.type_id(TypeKey::Matrix(col, *cols as u32))
            }
            Type::Array(elem, size) => {
                let e = self.ty_in(elem, layout);
                let program = self.program;
                let structs = &program.structs;
                let stride = layout.map(|l| layout::array_stride(elem, l.row_major, l.rule, structs));
                match size {
                    ArraySize::Fixed(n) => {
                        let len = self.uint_const(*n);
                        self.b.type_id(TypeKey::Array { elem: e, len, stride })
                    }
                    ArraySize::Runtime => {
                        let stride = stride.unwrap_or_else(|| {
                            layout::array_stride(elem, false, BlockLayout::Std430, structs)
                        });
                        self.b.type_id(TypeKey::RuntimeArray { elem: e, stride })
                    }
                }
            }
            Type::Struct(id) => self.struct_ty(*id, layout.map(|l| l.rule)),
            Type::Image { dim: d, sampled, format } => {
                let s = self.scalar(*sampled);
                self.b.type_id(TypeKey::Image {
                    sampled: s,
                    dim: dim(*d),
                    usage: 2,
                    format: format.map_or(spirv::ImageFormat::Unknown, image_format),
                })
            }
            Type::Sampler { .. } => {
                let image = self.sampled_image_type(ty);
                self.b.type_id(TypeKey::SampledImage(image))
            }
            // rejected by the checker
            Type::AtomicUint => self.scalar(ScalarKind::Uint),
        }
    }

    /// Image type underlying a combined image sampler.
    fn sampled_image_type(&mut self, ty: &Type) -> Word {
        let (d, sampled) = match ty {
            Type::Sampler { dim, sampled } => (*dim, *sampled),
            _ => (ImageDim::Dim2D, ScalarKind::Float),
        };
        let s = self.scalar(sampled);
        self.b.type_id(TypeKey::Image {
            sampled: s,
            dim: dim(d),
            usage: 1,
            format: spirv::ImageFormat::Unknown,
        })
    }

    fn struct_ty(&mut self, id: StructId, rule: Option<BlockLayout>) -> Word {
        if let Some(&w) = self.structs.get(&(id, rule)) {
            return w;
        }
        let program = self.program;
        let def = program.struct_def(id);
        let members: Vec<Word> = def
            .members
            .iter()
            .map(|m| {
                let layout = rule.map(|rule| Layout {
                    rule,
                    row_major: m.row_major,
                });
                self.ty_in(&m.ty, layout)
            })
            .collect();
        let w = self.b.type_struct(&members);
        self.structs.insert((id, rule), w);

        self.b.name(w, &def.name);
        for (i, m) in def.members.iter().enumerate() {
            self.b.member_name(w, i as u32, &m.name);
        }
        if let Some(rule) = rule {
            let l = layout::struct_layout(def, rule, &program.structs);
            for (i, m) in def.members.iter().enumerate() {
                let i = i as u32;
                let offset = l.offsets.get(i as usize).copied().unwrap_or(0);
                self.b.member_decorate(w, i, Decoration::Offset, &[offset]);
                let root = m.ty.element_root();
                if root.is_matrix() {
                    let order = if m.row_major {
                        Decoration::RowMajor
                    } else {
                        Decoration::ColMajor
                    };
                    self.b.member_decorate(w, i, order, &[]);
                    let stride = layout::matrix_stride(root, m.row_major, rule);
                    self.b.member_decorate(w, i, Decoration::MatrixStride, &[stride]);
                }
            }
        }
        w
    }

    // -----------------------------------------------------------------------
    // Constants
    // -----------------------------------------------------------------------

    fn uint_const(&mut self, v: u32) -> Word {
        let t = self.scalar(ScalarKind::Uint);
        self.b.constant_bits(t, &[v])
    }

    fn int_const(&mut self, v: i32) -> Word {
        let t = self.scalar(ScalarKind::Int);
        self.b.constant_bits(t, &[v as u32])
    }

    /// `value` replicated to a scalar or vector of `width` components.
    fn splat_const(&mut self, kind: ScalarKind, width: u8, value: ConstValue) -> Word {
        let ty = Type::vector(kind, width);
        let value = if width > 1 {
            ConstValue::Composite(vec![value; width as usize])
        } else {
            value
        };
        self.constant(&value, &ty)
    }

    fn constant(&mut self, v: &ConstValue, ty: &Type) -> Word {
        let t = self.ty(ty);
        match v {
            ConstValue::Bool(b) => self.b.constant_bool(t, *b),
            ConstValue::Int(i) => self.b.constant_bits(t, &[*i as u32]),
            ConstValue::Uint(u) => self.b.constant_bits(t, &[*u]),
            ConstValue::Float(f) => self.b.constant_bits(t, &[f.to_bits()]),
            ConstValue::Double(d) => {
                let bits = d.to_bits();
                self.b.constant_bits(t, &[bits as u32, (bits >> 32) as u32])
            }
            ConstValue::Composite(parts) => {
                let elems: Vec<Type> = match ty {
                    Type::Vector(k, n) => vec![Type::Scalar(*k); *n as usize],
                    Type::Matrix { scalar, cols, rows } => {
                        vec![Type::Vector(*scalar, *rows); *cols as usize]
                    }
                    Type::Array(elem, _) => vec![(**elem).clone(); parts.len()],
                    Type::Struct(id) => self
                        .program
                        .struct_def(*id)
                        .members
                        .iter()
                        .map(|m| m.ty.clone())
                        .collect(),
                    _ => Vec::new(),
                };
                if elems.len() != parts.len() {
                    return self.b.constant_null(t);
                }
                let ids: Vec<Word> = parts
                    .iter()
                    .zip(&elems)
                    .map(|(p, e)| self.constant(p, e))
                    .collect();
                self.b.constant_composite(t, &ids)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Module-scope variables
    // -----------------------------------------------------------------------

    fn declare_globals(&mut self) {
        let program = self.program;
        for g in &program.globals {
            let (class, layout) = match (g.storage, g.resource) {
                (_, Some(ResourceKind::Image | ResourceKind::Sampler)) => (StorageClass::UniformConstant, None),
                (Storage::Uniform | Storage::Buffer, _) => {
                    let rule = match g.ty.element_root() {
                        Type::Struct(id) => program.struct_def(*id).block,
                        _ => None,
                    };
                    let layout = Layout {
                        rule: rule.unwrap_or(BlockLayout::Std140),
                        row_major: false,
                    };
                    (StorageClass::Uniform, Some(layout))
                }
                (Storage::Shared, _) => (StorageClass::Workgroup, None),
                (Storage::Private, _) => (StorageClass::Private, None),
            };
            let ty = self.ty_in(&g.ty, layout);
            let ptr = self.b.type_id(TypeKey::Pointer(class, ty));
            let init = match &g.init {
                Some(v) if class == StorageClass::Private => Some(self.constant(v, &g.ty)),
                _ => None,
            };
            let var = self.b.global_variable(ptr, class, init);
            self.b.name(var, &g.name);

            if let Some(kind) = g.resource {
                self.b.decorate(var, Decoration::DescriptorSet, &[g.set.unwrap_or(0)]);
                self.b.decorate(var, Decoration::Binding, &[g.binding.unwrap_or(0)]);
                match (kind, g.ty.element_root(), layout) {
                    (ResourceKind::UniformBlock | ResourceKind::StorageBlock, Type::Struct(id), Some(l)) => {
                        let block = self.struct_ty(*id, Some(l.rule));
                        let decoration = if g.storage == Storage::Buffer {
                            Decoration::BufferBlock
                        } else {
                            Decoration::Block
                        };
                        self.b.decorate(block, decoration, &[]);
                        let def = program.struct_def(*id);
                        for (i, m) in def.members.iter().enumerate() {
                            self.memory_decorations(block, Some(i as u32), g.memory.merge(m.memory));
                        }
                    }
                    _ => self.memory_decorations(var, None, g.memory),
                }
            }
            log::trace!("global '{}' -> %{} ({:?})", g.name, var, class);
            self.globals.push(Place { ptr: var, class, layout });
        }
    }

    fn memory_decorations(&mut self, target: Word, member: Option<u32>, flags: MemoryFlags) {
        let list = [
            (flags.coherent, Decoration::Coherent),
            (flags.volatile, Decoration::Volatile),
            (flags.restrict, Decoration::Restrict),
            (flags.readonly, Decoration::NonWritable),
            (flags.writeonly, Decoration::NonReadable),
        ];
        for (on, d) in list {
            if !on {
                continue;
            }
            match member {
                Some(i) => self.b.member_decorate(target, i, d, &[]),
                None => self.b.decorate(target, d, &[]),
            }
        }
    }

    fn builtin(&mut self, b: BuiltinVar) -> Word {
        if let Some(&v) = self.builtins.get(&b) {
            return v;
        }
        let ty = self.ty(&b.ty());
        let ptr = self.b.type_id(TypeKey::Pointer(StorageClass::Input, ty));
        let var = self.b.global_variable(ptr, StorageClass::Input, None);
        self.b.name(var, b.name());
        self.b.decorate(var, Decoration::BuiltIn, &[builtin_decoration(b) as u32]);
        self.builtins.insert(b, var);
        var
    }

    // -----------------------------------------------------------------------
    // Functions
    // -----------------------------------------------------------------------

    /// Parameters are passed by pointer: opaque ones point at the resource.
    fn param_class(ty: &Type) -> StorageClass {
        if ty.is_opaque() {
            StorageClass::UniformConstant
        } else {
            StorageClass::Function
        }
    }

    fn function(&mut self, id: FuncId) -> Result<()> {
        let program = self.program;
        let f = program.function(id);
        let fid = self
            .functions
            .get(&id)
            .copied()
            .ok_or_else(|| error(format!("function '{}' was not declared", f.name), f.span))?;

        let ret = self.ty(&f.ret);
        let mut param_types = Vec::with_capacity(f.params.len());
        for p in &f.params {
            let t = self.ty(&p.ty);
            param_types.push(self.b.type_id(TypeKey::Pointer(Self::param_class(&p.ty), t)));
        }
        let fn_ty = self.b.type_id(TypeKey::Function(ret, param_types.clone()));

        self.w = FunctionWriter::begin(ret, fid, fn_ty);
        self.locals = vec![Place::default(); f.locals.len()];
        self.breaks.clear();
        self.continues.clear();

        let mut is_param = vec![false; f.locals.len()];
        for (p, &ptr_ty) in f.params.iter().zip(&param_types) {
            let pid = self.b.id();
            self.w.parameter(ptr_ty, pid);
            self.b.name(pid, &p.name);
            if let Some(slot) = self.locals.get_mut(p.local.0 as usize) {
                *slot = Place {
                    ptr: pid,
                    class: Self::param_class(&p.ty),
                    layout: None,
                };
                is_param[p.local.0 as usize] = true;
            }
        }
        let entry = self.b.id();
        self.w.label(entry);

        for (i, local) in f.locals.iter().enumerate() {
            if is_param[i] {
                continue;
            }
            let t = self.ty(&local.ty);
            let var = self.temp(t);
            self.b.name(var, &local.name);
            self.locals[i] = Place {
                ptr: var,
                class: StorageClass::Function,
                layout: None,
            };
        }

        if program.entry == Some(id) {
            for (g, e) in &program.global_inits {
                let v = self.value(e)?;
                let place = self.globals[g.0 as usize];
                self.store(place, &e.ty, v);
            }
        }

        self.block(&f.body)?;
        if !self.w.terminated {
            if f.ret == Type::Void {
                self.w.terminate(Op::Return, &[]);
            } else {
                let null = self.b.constant_null(ret);
                self.w.terminate(Op::ReturnValue, &[null]);
            }
        }
        let w = std::mem::take(&mut self.w);
        self.b.add_function(w.finish());
        Ok(())
    }

    /// Function-local variable of type `t`.
    fn temp(&mut self, t: Word) -> Word {
        let ptr = self.b.type_id(TypeKey::Pointer(StorageClass::Function, t));
        let id = self.b.id();
        self.w.variable(ptr, id);
        id
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    /// Statements after a branch or return are unreachable and skipped.
    fn block(&mut self, stmts: &[Stmt]) -> Result<()> {
        for s in stmts {
            if self.w.terminated {
                break;
            }
            self.stmt(s)?;
        }
        Ok(())
    }

    fn branch(&mut self, target: Word) {
        self.w.terminate(Op::Branch, &[target]);
    }

    fn stmt(&mut self, s: &Stmt) -> Result<()> {
        match s {
            Stmt::Expr(e) => {
                self.value(e)?;
            }
            Stmt::Init(local, e) => {
                let v = self.value(e)?;
                let place = self
                    .locals
                    .get(local.0 as usize)
                    .copied()
                    .ok_or_else(|| error("initializer for an unknown local variable", e.span))?;
                self.store(place, &e.ty, v);
            }
            Stmt::Block(stmts) => self.block(stmts)?,
            Stmt::If { cond, then_, else_ } => {
                let c = self.value(cond)?;
                let merge = self.b.id();
                let then_l = self.b.id();
                let else_l = if else_.is_empty() { merge } else { self.b.id() };
                self.w.emit(Op::SelectionMerge, &[merge, spirv::SelectionControl::NONE.bits()]);
                self.w.terminate(Op::BranchConditional, &[c, then_l, else_l]);

                self.w.label(then_l);
                self.block(then_)?;
                if !self.w.terminated {
                    self.branch(merge);
                }
                if !else_.is_empty() {
                    self.w.label(else_l);
                    self.block(else_)?;
                    if !self.w.terminated {
                        self.branch(merge);
                    }
                }
                self.w.label(merge);
            }
            Stmt::Loop {
                kind,
                cond,
                step,
                body,
            } => self.lower_loop(*kind, cond.as_ref(), step.as_ref(), body)?,
            Stmt::Switch { selector, cases } => self.switch(selector, cases)?,
            Stmt::Break => {
                let target = *self
                    .breaks
                    .last()
                    .ok_or_else(|| Diagnostic::error(Stage::CodeGen, "'break' outside of a loop or switch"))?;
                self.branch(target);
            }
            Stmt::Continue => {
                let target = *self
                    .continues
                    .last()
                    .ok_or_else(|| Diagnostic::error(Stage::CodeGen, "'continue' outside of a loop"))?;
                self.branch(target);
            }
            Stmt::Return(None) => self.w.terminate(Op::Return, &[]),
            Stmt::Return(Some(e)) => {
                let v = self.value(e)?;
                self.w.terminate(Op::ReturnValue, &[v]);
            }
        }
        Ok(())
    }

    fn lower_loop(
        &mut self,
        kind: LoopKind,
        cond: Option<&glint_types::tir::Expr>,
        step: Option<&glint_types::tir::Expr>,
        body: &[Stmt],
    ) -> Result<()> {
        let header = self.b.id();
        let body_l = self.b.id();
        let cont = self.b.id();
        let merge = self.b.id();

        self.branch(header);
        self.w.label(header);
        self.w.emit(
            Op::LoopMerge,
            &[merge, cont, spirv::LoopControl::NONE.bits()],
        );
        if kind == LoopKind::Pre {
            let check = self.b.id();
            self.branch(check);
            self.w.label(check);
            let c = match cond {
                Some(c) => self.value(c)?,
                None => self.constant(&ConstValue::Bool(true), &Type::Scalar(ScalarKind::Bool)),
            };
            self.w.terminate(Op::BranchConditional, &[c, body_l, merge]);
        } else {
            self.branch(body_l);
        }

        self.w.label(body_l);
        self.breaks.push(merge);
        self.continues.push(cont);
        let lowered = self.block(body);
        self.breaks.pop();
        self.continues.pop();
        lowered?;
        if !self.w.terminated {
            self.branch(cont);
        }

        self.w.label(cont);
        if let Some(s) = step {
            self.value(s)?;
        }
        match (kind, cond) {
            (LoopKind::Post, Some(c)) => {
                let c = self.value(c)?;
                self.w.terminate(Op::BranchConditional, &[c, header, merge]);
            }
            _ => self.branch(header),
        }
        self.w.label(merge);
        Ok(())
    }

    /// Case bodies are laid out in source order; a body that does not end
    /// in a branch falls through to the next one.
    fn switch(&mut self, selector: &glint_types::tir::Expr, cases: &[SwitchCase]) -> Result<()> {
        let sel = self.value(selector)?;
        let merge = self.b.id();
        let labels: Vec<Word> = cases.iter().map(|_| self.b.id()).collect();
        let default = cases
            .iter()
            .position(|c| c.is_default)
            .map_or(merge, |i| labels[i]);

        let mut ops = vec![sel, default];
        for (case, &label) in cases.iter().zip(&labels) {
            for v in &case.values {
                ops.push(*v as i32 as u32);
                ops.push(label);
            }
        }
        self.w.emit(Op::SelectionMerge, &[merge, spirv::SelectionControl::NONE.bits()]);
        self.w.terminate(Op::Switch, &ops);

        self.breaks.push(merge);
        for (i, case) in cases.iter().enumerate() {
            self.w.label(labels[i]);
            if let Err(e) = self.block(&case.body) {
                self.breaks.pop();
                return Err(e);
            }
            if !self.w.terminated {
                let next = labels.get(i + 1).copied().unwrap_or(merge);
                self.branch(next);
            }
        }
        self.breaks.pop();
        self.w.label(merge);
        Ok(())
    }
}
