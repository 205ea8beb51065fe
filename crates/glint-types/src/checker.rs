// crates/glint-types/src/checker.rs
// Semantic analysis for compute shaders - resolves names and types, enforces
// the Vulkan rules and the profile's resource limits, and lowers the syntax
// tree to the typed IR.

mod call;
mod expr;
mod stmt;

use crate::builtins::{unavailable_in_compute, Intrinsic};
use crate::consteval;
use crate::layout;
use crate::profile::CapabilityProfile;
use crate::tir::{
    BlockLayout, ConstValue, Expr, FuncId, Function, GlobalId, GlobalVar, Local, LocalId,
    MemoryFlags, Param, ParamDir, Program, ResourceKind, Storage, StructDef, StructMember,
};
use crate::types::{ArraySize, ImageFormat, ScalarKind, StructId, Type};
use glint_ast::ast::{self, MemoryQualifier, StorageQualifier};
use glint_ast::diag::{Diagnostic, Stage, StageResult, Staged};
use glint_ast::span::Span;
use std::collections::{HashMap, HashSet};

/// Semantic errors found while checking a translation unit
#[derive(Debug, Clone, PartialEq)]
pub enum TypeError {
    /// Type mismatch - expected one type but found another
    Mismatch {
        expected: String,
        found: String,
        span: Span,
    },
    /// Reference to an undeclared variable
    UnknownIdentifier { name: String, span: Span },
    /// Reference to an undeclared type name
    UnknownType { name: String, span: Span },
    /// A name declared twice in the same scope
    Redefinition {
        name: String,
        span: Span,
        previous: Span,
    },
    /// Two `case` labels (or two `default`s) with the same value
    DuplicateLabel {
        label: String,
        span: Span,
        previous: Span,
    },
    /// Write to something that is not a writable l-value
    NotAssignable { target: String, span: Span },
    /// Wrong number of arguments
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
        span: Span,
    },
    NoMatchingOverload {
        name: String,
        args: String,
        span: Span,
    },
    AmbiguousCall {
        name: String,
        args: String,
        span: Span,
    },
    /// A declaration exceeds a limit of the capability profile
    LimitExceeded {
        what: String,
        limit: &'static str,
        max: i64,
        found: i64,
        span: Span,
    },
    /// Missing or repeated compute entry point
    EntryPoint {
        message: String,
        sites: Vec<Span>,
    },
    /// Valid GLSL that the Vulkan compute target cannot express
    Unsupported { message: String, span: Span },
    /// Any other rule violation
    Invalid { message: String, span: Span },
}

impl std::fmt::Display for TypeError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            TypeError::Mismatch {
                expected, found, ..
            } => write!(f, "type mismatch: expected '{}', found '{}'", expected, found),
            TypeError::UnknownIdentifier { name, .. } => {
                write!(f, "undeclared identifier '{}'", name)
            }
            TypeError::UnknownType { name, .. } => write!(f, "unknown type '{}'", name),
            TypeError::Redefinition { name, .. } => write!(f, "redefinition of '{}'", name),
            TypeError::DuplicateLabel { label, .. } => {
                write!(f, "duplicate {} in switch statement", label)
            }
            TypeError::NotAssignable { target, .. } => write!(f, "cannot assign to {}", target),
            TypeError::ArityMismatch {
                name,
                expected,
                found,
                ..
            } => write!(
                f,
                "'{}' expects {} argument{}, found {}",
                name,
                expected,
                if *expected == 1 { "" } else { "s" },
                found
            ),
            TypeError::NoMatchingOverload { name, args, .. } => {
                write!(f, "no matching overload for '{}({})'", name, args)
            }
            TypeError::AmbiguousCall { name, args, .. } => {
                write!(f, "ambiguous call to '{}({})'", name, args)
            }
            TypeError::LimitExceeded {
                what,
                limit,
                max,
                found,
                ..
            } => write!(f, "{} ({}) exceeds {} ({})", what, found, limit, max),
            TypeError::EntryPoint { message, .. }
            | TypeError::Unsupported { message, .. }
            | TypeError::Invalid { message, .. } => f.write_str(message),
        }
    }
}

impl std::error::Error for TypeError {}

impl TypeError {
    pub fn span(&self) -> Option<Span> {
        match self {
            TypeError::Mismatch { span, .. }
            | TypeError::UnknownIdentifier { span, .. }
            | TypeError::UnknownType { span, .. }
            | TypeError::Redefinition { span, .. }
            | TypeError::DuplicateLabel { span, .. }
            | TypeError::NotAssignable { span, .. }
            | TypeError::ArityMismatch { span, .. }
            | TypeError::NoMatchingOverload { span, .. }
            | TypeError::AmbiguousCall { span, .. }
            | TypeError::LimitExceeded { span, .. }
            | TypeError::Unsupported { span, .. }
            | TypeError::Invalid { span, .. } => Some(*span),
            TypeError::EntryPoint { sites, .. } => sites.first().copied(),
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut d = Diagnostic::error(Stage::Semantic, self.to_string());
        if let Some(span) = self.span() {
            d = d.at(span);
        }
        match self {
            TypeError::Redefinition { name, previous, .. } => {
                d.with_note(*previous, format!("'{}' was first declared here", name))
            }
            TypeError::DuplicateLabel { previous, .. } => {
                d.with_note(*previous, "first used here")
            }
            TypeError::EntryPoint { sites, .. } if sites.len() > 1 => sites
                .iter()
                .fold(d, |d, s| d.with_note(*s, "'main' is defined here")),
            _ => d,
        }
    }
}

pub(crate) fn invalid(message: impl Into<String>, span: Span) -> TypeError {
    TypeError::Invalid {
        message: message.into(),
        span,
    }
}

pub(crate) fn unsupported(message: impl Into<String>, span: Span) -> TypeError {
    TypeError::Unsupported {
        message: message.into(),
        span,
    }
}

// ---------------------------------------------------------------------------
// Checker state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Symbol {
    Global(GlobalId),
    /// Member of an anonymous interface block.
    BlockMember(GlobalId, u32),
    Local(LocalId),
    Const(ConstValue, Type),
}

#[derive(Debug, Clone)]
struct ScopeEntry {
    symbol: Symbol,
    span: Span,
}

#[derive(Debug)]
struct FnInfo {
    /// Index of the first declaring item; calls from earlier items do not
    /// see the function.
    declared_at: usize,
    definition: Option<Span>,
}

/// Per-function state while a body is checked.
#[derive(Debug)]
struct FnState {
    ret: Type,
    locals: Vec<Local>,
    read_only: HashSet<LocalId>,
    loops: u32,
    switches: u32,
    /// Indices of enclosing loops in inductive form.
    inductive: Vec<LocalId>,
}

#[derive(Debug, Default)]
struct ResourceCounts {
    images: i64,
    samplers: i64,
    atomic_counters: i64,
    atomic_bindings: HashSet<u32>,
}

/// Semantic analyzer for one translation unit.
pub struct TypeChecker<'p> {
    profile: &'p CapabilityProfile,
    /// `#version ... es`
    es: bool,
    program: Program,
    errors: Vec<TypeError>,
    warnings: Vec<Diagnostic>,
    scopes: Vec<HashMap<String, ScopeEntry>>,
    structs: HashMap<String, (StructId, Span)>,
    blocks: HashMap<String, Span>,
    functions: HashMap<String, Vec<FuncId>>,
    fn_info: Vec<FnInfo>,
    main_defs: Vec<(FuncId, Span)>,
    local_size: [Option<(u32, Span)>; 3],
    default_buffer_layout: BlockLayout,
    counts: ResourceCounts,
    func: Option<FnState>,
    item_index: usize,
}

const AXES: [&str; 3] = ["x", "y", "z"];

impl<'p> TypeChecker<'p> {
    pub fn new(profile: &'p CapabilityProfile) -> Self {
        TypeChecker {
            profile,
            es: false,
            program: Program::default(),
            errors: Vec::new(),
            warnings: Vec::new(),
            scopes: vec![HashMap::new()],
            structs: HashMap::new(),
            blocks: HashMap::new(),
            functions: HashMap::new(),
            fn_info: Vec::new(),
            main_defs: Vec::new(),
            local_size: [None; 3],
            default_buffer_layout: BlockLayout::Std430,
            counts: ResourceCounts::default(),
            func: None,
            item_index: 0,
        }
    }

    /// Check a parsed translation unit and lower it to the typed IR.
    ///
    /// Declarations are checked first; function bodies are only checked when
    /// every declaration was valid, since later errors would mostly be
    /// follow-ups of the broken declarations.
    pub fn check(mut self, unit: &ast::TranslationUnit) -> StageResult<Program> {
        self.es = unit.version.profile == ast::VersionProfile::Es;
        log::debug!("semantic analysis of {} declarations", unit.items.len());

        let mut bodies = Vec::new();
        for (index, item) in unit.items.iter().enumerate() {
            self.item_index = index;
            if let Err(e) = self.declare_item(item, &mut bodies) {
                self.errors.push(e);
            }
        }
        self.check_entry_point();

        if self.errors.is_empty() {
            for (fid, def, index) in bodies {
                self.item_index = index;
                self.check_body(fid, def);
            }
        }

        if !self.errors.is_empty() {
            log::debug!("semantic analysis found {} errors", self.errors.len());
            let mut diags: Vec<Diagnostic> = self.warnings;
            diags.extend(self.errors.iter().map(TypeError::to_diagnostic));
            diags.sort_by_key(|d| d.span.map_or(u32::MAX, |s| s.start));
            return Err(diags);
        }

        if self.local_size.iter().any(Option::is_some) {
            self.program.local_size = Some(self.current_local_size());
        }
        self.program.collect_features();
        Ok(Staged::new(self.program, self.warnings))
    }

    fn warn(&mut self, message: impl Into<String>, span: Span) {
        let d = Diagnostic::warning(Stage::Semantic, message).at(span);
        log::warn!("{}", d.message);
        self.warnings.push(d);
    }

    fn type_name(&self, ty: &Type) -> String {
        self.program.type_name(ty)
    }

    fn current_local_size(&self) -> [u32; 3] {
        let mut size = [1; 3];
        for (slot, declared) in size.iter_mut().zip(self.local_size) {
            if let Some((v, _)) = declared {
                *slot = v;
            }
        }
        size
    }

    // -----------------------------------------------------------------------
    // Scopes
    // -----------------------------------------------------------------------

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.scopes
            .iter()
            .rev()
            .find_map(|s| s.get(name))
            .map(|e| &e.symbol)
    }

    /// Reserved-name rules shared by every declaration.
    fn check_name(&mut self, id: &ast::Ident) -> Result<(), TypeError> {
        if id.text.starts_with("gl_") {
            return Err(invalid(
                format!("'{}': identifiers starting with 'gl_' are reserved", id.text),
                id.span,
            ));
        }
        if id.text.contains("__") {
            self.warn(
                format!("'{}': identifiers containing '__' are reserved", id.text),
                id.span,
            );
        }
        Ok(())
    }

    fn declare(&mut self, id: &ast::Ident, symbol: Symbol) -> Result<(), TypeError> {
        let global = self.scopes.len() == 1;
        let Some(scope) = self.scopes.last_mut() else {
            return Err(invalid("no open scope", id.span));
        };
        if let Some(prev) = scope.get(&id.text) {
            return Err(TypeError::Redefinition {
                name: id.text.clone(),
                span: id.span,
                previous: prev.span,
            });
        }
        scope.insert(
            id.text.clone(),
            ScopeEntry {
                symbol,
                span: id.span,
            },
        );
        if global {
            if let Some(f) = self.functions.get(&id.text).and_then(|f| f.first()) {
                return Err(TypeError::Redefinition {
                    name: id.text.clone(),
                    span: id.span,
                    previous: self.program.function(*f).span,
                });
            }
        }
        Ok(())
    }

    fn add_local(&mut self, name: &str, ty: Type, span: Span) -> Result<LocalId, TypeError> {
        let Some(f) = self.func.as_mut() else {
            return Err(invalid("local variable outside of a function", span));
        };
        let id = LocalId(f.locals.len() as u32);
        f.locals.push(Local {
            name: name.to_string(),
            ty,
            span,
        });
        Ok(id)
    }

    // -----------------------------------------------------------------------
    // Types
    // -----------------------------------------------------------------------

    /// Resolve a type specifier, including its own array dimensions.
    fn resolve_base(&mut self, spec: &ast::TypeSpec) -> Result<Type, TypeError> {
        let base = match &spec.name {
            ast::TypeName::Builtin(bt) => self.builtin_type(*bt, spec.span)?,
            ast::TypeName::Named(id) => match self.structs.get(&id.text) {
                Some((sid, _)) => Type::Struct(*sid),
                None => {
                    return Err(TypeError::UnknownType {
                        name: id.text.clone(),
                        span: id.span,
                    })
                }
            },
            ast::TypeName::Struct(decl) => Type::Struct(self.define_struct(decl)?),
        };
        self.apply_dims(base, spec.array.as_ref())
    }

    fn builtin_type(&self, bt: ast::BuiltinType, span: Span) -> Result<Type, TypeError> {
        use ast::BuiltinType as B;
        let ty = match bt {
            B::Void => Type::Void,
            B::Scalar(k) => Type::Scalar(k),
            B::Vector(k, n) => Type::Vector(k, n),
            B::Matrix { double, cols, rows } => Type::Matrix {
                scalar: if double {
                    ScalarKind::Double
                } else {
                    ScalarKind::Float
                },
                cols,
                rows,
            },
            B::Image(dim, sampled) => Type::Image {
                dim,
                sampled,
                format: None,
            },
            B::Sampler(dim, sampled) => Type::Sampler { dim, sampled },
            B::AtomicUint => Type::AtomicUint,
        };
        if self.es && ty.uses_double() {
            return Err(unsupported(
                "double-precision types are not available in OpenGL ES shaders",
                span,
            ));
        }
        Ok(ty)
    }

    /// Wrap `ty` in array dimensions; the first dimension is the outermost
    /// and is the only one that may be unsized.
    fn apply_dims(&mut self, ty: Type, dims: Option<&ast::ArraySpec>) -> Result<Type, TypeError> {
        let Some(spec) = dims else {
            return Ok(ty);
        };
        if ty.has_runtime_array() {
            return Err(invalid(
                "only the outermost array dimension may be unsized",
                spec.span,
            ));
        }
        let mut ty = ty;
        for (i, dim) in spec.dims.iter().enumerate().rev() {
            let size = match dim {
                None if i == 0 => ArraySize::Runtime,
                None => {
                    return Err(invalid(
                        "only the outermost array dimension may be unsized",
                        spec.span,
                    ))
                }
                Some(e) => {
                    let (n, span) = self.const_int(e)?;
                    if n <= 0 {
                        return Err(invalid("array size must be greater than zero", span));
                    }
                    ArraySize::Fixed(n as u32)
                }
            };
            ty = Type::Array(Box::new(ty), size);
        }
        Ok(ty)
    }

    /// Evaluate an integral constant expression.
    fn const_int(&mut self, e: &ast::Expr) -> Result<(i64, Span), TypeError> {
        let span = e.span();
        let checked = self.expr(e)?;
        match checked.as_const().and_then(consteval::as_i64) {
            Some(v) if checked.ty.is_integer() => Ok((v, span)),
            _ => Err(invalid("expected a constant integer expression", span)),
        }
    }

    fn define_struct(&mut self, decl: &ast::StructDecl) -> Result<StructId, TypeError> {
        if let Some(name) = &decl.name {
            self.check_name(name)?;
            if let Some((_, prev)) = self.structs.get(&name.text) {
                return Err(TypeError::Redefinition {
                    name: name.text.clone(),
                    span: name.span,
                    previous: *prev,
                });
            }
        }
        let mut members = Vec::new();
        let mut seen: HashMap<String, Span> = HashMap::new();
        for m in &decl.members {
            if m.qualifier.storage.is_some() || !m.qualifier.layout.is_empty() {
                return Err(invalid(
                    "qualifiers are not allowed on structure members",
                    m.qualifier.span,
                ));
            }
            let base = self.resolve_base(&m.ty)?;
            for d in &m.declarators {
                let ty = self.apply_dims(base.clone(), d.array.as_ref())?;
                self.check_member(&d.name, &ty, &mut seen)?;
                if ty.has_runtime_array() {
                    return Err(invalid(
                        "structure members cannot be unsized arrays",
                        d.name.span,
                    ));
                }
                members.push(StructMember {
                    name: d.name.text.clone(),
                    ty,
                    offset: None,
                    row_major: false,
                    memory: MemoryFlags::default(),
                    span: d.name.span,
                });
            }
        }
        let id = StructId(self.program.structs.len() as u32);
        let (name, span) = match &decl.name {
            Some(n) => (n.text.clone(), n.span),
            None => ("anonymous struct".to_string(), decl.span),
        };
        log::trace!("struct {} with {} members", name, members.len());
        self.program.structs.push(StructDef {
            name: name.clone(),
            members,
            block: None,
            span,
        });
        if decl.name.is_some() {
            self.structs.insert(name, (id, span));
        }
        Ok(id)
    }

    fn check_member(
        &self,
        name: &ast::Ident,
        ty: &Type,
        seen: &mut HashMap<String, Span>,
    ) -> Result<(), TypeError> {
        if let Some(prev) = seen.insert(name.text.clone(), name.span) {
            return Err(TypeError::Redefinition {
                name: name.text.clone(),
                span: name.span,
                previous: prev,
            });
        }
        if *ty == Type::Void {
            return Err(invalid(
                format!("member '{}' cannot have type 'void'", name.text),
                name.span,
            ));
        }
        if ty.is_opaque() {
            return Err(unsupported(
                format!(
                    "member '{}': opaque type '{}' cannot be a member of a structure or block",
                    name.text,
                    self.type_name(ty)
                ),
                name.span,
            ));
        }
        Ok(())
    }

    /// Non-negative integer value of a `layout(name = value)` entry.
    fn layout_uint(&mut self, id: &ast::LayoutQualifierId) -> Result<u32, TypeError> {
        let Some(value) = &id.value else {
            return Err(invalid(
                format!("layout qualifier '{}' requires a value", id.name.text),
                id.span,
            ));
        };
        let (v, span) = self.const_int(value)?;
        u32::try_from(v).map_err(|_| {
            invalid(
                format!("layout qualifier '{}' must not be negative", id.name.text),
                span,
            )
        })
    }

    fn layout_flag(id: &ast::LayoutQualifierId) -> Result<(), TypeError> {
        match id.value {
            Some(_) => Err(invalid(
                format!("layout qualifier '{}' does not take a value", id.name.text),
                id.span,
            )),
            None => Ok(()),
        }
    }

    // -----------------------------------------------------------------------
    // Declarations
    // -----------------------------------------------------------------------

    fn declare_item<'u>(
        &mut self,
        item: &'u ast::ExternalDecl,
        bodies: &mut Vec<(FuncId, &'u ast::FunctionDef, usize)>,
    ) -> Result<(), TypeError> {
        match item {
            ast::ExternalDecl::Qualifier(q) => self.qualifier_decl(q),
            ast::ExternalDecl::Block(b) => self.block_decl(b),
            ast::ExternalDecl::Variable(v) => self.global_decl(v),
            ast::ExternalDecl::Prototype(p) => self.declare_function(p, false).map(|_| ()),
            ast::ExternalDecl::Function(def) => {
                let fid = self.declare_function(&def.proto, true)?;
                bodies.push((fid, def, self.item_index));
                Ok(())
            }
            ast::ExternalDecl::Precision(p) => {
                let ty = self.resolve_base(&p.ty)?;
                let ok = matches!(ty, Type::Scalar(ScalarKind::Int | ScalarKind::Float))
                    || matches!(ty, Type::Image { .. } | Type::Sampler { .. });
                if !ok {
                    return Err(invalid(
                        format!(
                            "default precision can only be set for int, float and opaque types, not '{}'",
                            self.type_name(&ty)
                        ),
                        p.ty.span,
                    ));
                }
                Ok(())
            }
        }
    }

    /// `layout(local_size_x = 64) in;` and default block layouts.
    fn qualifier_decl(&mut self, decl: &ast::QualifierDecl) -> Result<(), TypeError> {
        let q = &decl.qualifier;
        match q.storage() {
            Some(StorageQualifier::In) => {
                for id in &q.layout {
                    let axis = match id.name.text.as_str() {
                        "local_size_x" => 0,
                        "local_size_y" => 1,
                        "local_size_z" => 2,
                        "local_size_x_id" | "local_size_y_id" | "local_size_z_id" => {
                            return Err(unsupported(
                                format!(
                                    "'{}': specialization constants are not supported",
                                    id.name.text
                                ),
                                id.span,
                            ))
                        }
                        other => {
                            return Err(invalid(
                                format!("layout qualifier '{}' is not valid on an input declaration", other),
                                id.span,
                            ))
                        }
                    };
                    let value = self.layout_uint(id)?;
                    self.set_local_size(axis, value, id)?;
                }
                Ok(())
            }
            Some(StorageQualifier::Buffer | StorageQualifier::Uniform) => {
                let is_buffer = q.storage() == Some(StorageQualifier::Buffer);
                for id in &q.layout {
                    Self::layout_flag(id)?;
                    match id.name.text.as_str() {
                        "std430" if is_buffer => self.default_buffer_layout = BlockLayout::Std430,
                        "std140" if is_buffer => self.default_buffer_layout = BlockLayout::Std140,
                        "std140" | "row_major" | "column_major" => {}
                        "std430" => {
                            return Err(unsupported(
                                "std430 layout is not supported for uniform blocks",
                                id.span,
                            ))
                        }
                        "packed" | "shared" => {
                            return Err(unsupported(
                                format!(
                                    "'{}' layout is not supported when targeting Vulkan; use std140 or std430",
                                    id.name.text
                                ),
                                id.span,
                            ))
                        }
                        other => {
                            return Err(invalid(
                                format!("layout qualifier '{}' is not valid here", other),
                                id.span,
                            ))
                        }
                    }
                }
                Ok(())
            }
            _ => Err(invalid(
                "qualifier-only declarations are only valid for 'in', 'uniform' and 'buffer'",
                decl.span,
            )),
        }
    }

    fn set_local_size(
        &mut self,
        axis: usize,
        value: u32,
        id: &ast::LayoutQualifierId,
    ) -> Result<(), TypeError> {
        const LIMITS: [&str; 3] = [
            "MaxComputeWorkGroupSizeX",
            "MaxComputeWorkGroupSizeY",
            "MaxComputeWorkGroupSizeZ",
        ];
        let max = self.profile.max_work_group_size()[axis] as i64;
        if value == 0 {
            return Err(invalid(
                format!("local_size_{} must be at least 1", AXES[axis]),
                id.span,
            ));
        }
        if value as i64 > max {
            return Err(TypeError::LimitExceeded {
                what: format!("local_size_{}", AXES[axis]),
                limit: LIMITS[axis],
                max,
                found: value as i64,
                span: id.span,
            });
        }
        if let Some((prev, _)) = self.local_size[axis] {
            if prev != value {
                return Err(invalid(
                    format!(
                        "local_size_{} redeclared as {} (previously {})",
                        AXES[axis], value, prev
                    ),
                    id.span,
                ));
            }
        }
        log::trace!("local_size_{} = {}", AXES[axis], value);
        self.local_size[axis] = Some((value, id.span));
        Ok(())
    }

    fn memory_flags(q: &ast::TypeQualifier) -> MemoryFlags {
        MemoryFlags {
            coherent: q.has_memory(MemoryQualifier::Coherent),
            volatile: q.has_memory(MemoryQualifier::Volatile),
            restrict: q.has_memory(MemoryQualifier::Restrict),
            readonly: q.has_memory(MemoryQualifier::ReadOnly),
            writeonly: q.has_memory(MemoryQualifier::WriteOnly),
        }
    }

    fn block_decl(&mut self, b: &ast::BlockDecl) -> Result<(), TypeError> {
        let q = &b.qualifier;
        let storage = match q.storage() {
            Some(StorageQualifier::Uniform) => Storage::Uniform,
            Some(StorageQualifier::Buffer) => Storage::Buffer,
            _ => {
                return Err(unsupported(
                    "only uniform and buffer interface blocks are available in compute shaders",
                    b.name.span,
                ))
            }
        };
        self.check_name(&b.name)?;
        if let Some(prev) = self.blocks.get(&b.name.text) {
            return Err(TypeError::Redefinition {
                name: b.name.text.clone(),
                span: b.name.span,
                previous: *prev,
            });
        }

        let mut rule = match storage {
            Storage::Buffer => self.default_buffer_layout,
            _ => BlockLayout::Std140,
        };
        let (mut set, mut binding, mut row_major) = (None, None, false);
        for id in &q.layout {
            match id.name.text.as_str() {
                "set" => set = Some(self.layout_uint(id)?),
                "binding" => binding = Some(self.layout_uint(id)?),
                "std140" => rule = BlockLayout::Std140,
                "std430" if storage == Storage::Buffer => rule = BlockLayout::Std430,
                "std430" => {
                    return Err(unsupported(
                        "std430 layout is not supported for uniform blocks",
                        id.span,
                    ))
                }
                "row_major" => row_major = true,
                "column_major" => row_major = false,
                "packed" | "shared" => {
                    return Err(unsupported(
                        format!(
                            "'{}' layout is not supported when targeting Vulkan; use std140 or std430",
                            id.name.text
                        ),
                        id.span,
                    ))
                }
                "push_constant" => {
                    return Err(unsupported("push constant blocks are not supported", id.span))
                }
                other => {
                    return Err(invalid(
                        format!("layout qualifier '{}' is not valid on a block", other),
                        id.span,
                    ))
                }
            }
        }
        let memory = Self::memory_flags(q);
        if storage == Storage::Uniform && !q.memory.is_empty() {
            return Err(invalid(
                "memory qualifiers are only allowed on buffer blocks and images",
                q.memory[0].1,
            ));
        }

        let mut members = Vec::new();
        let mut seen = HashMap::new();
        let last_member = b.members.len().saturating_sub(1);
        for (mi, m) in b.members.iter().enumerate() {
            let mq = &m.qualifier;
            if let Some((s, span)) = mq.storage {
                let same = matches!(
                    (s, storage),
                    (StorageQualifier::Uniform, Storage::Uniform)
                        | (StorageQualifier::Buffer, Storage::Buffer)
                );
                if !same {
                    return Err(invalid("member storage must match the block's storage", span));
                }
            }
            if storage == Storage::Uniform && !mq.memory.is_empty() {
                return Err(invalid(
                    "memory qualifiers are only allowed on buffer blocks and images",
                    mq.memory[0].1,
                ));
            }
            let (mut offset, mut member_row_major) = (None, row_major);
            for id in &mq.layout {
                match id.name.text.as_str() {
                    "offset" => offset = Some(self.layout_uint(id)?),
                    "row_major" => member_row_major = true,
                    "column_major" => member_row_major = false,
                    "align" => {
                        return Err(unsupported(
                            "the 'align' layout qualifier is not supported",
                            id.span,
                        ))
                    }
                    other => {
                        return Err(invalid(
                            format!("layout qualifier '{}' is not valid on a block member", other),
                            id.span,
                        ))
                    }
                }
            }
            if offset.is_some() && m.declarators.len() > 1 {
                return Err(invalid(
                    "an 'offset' qualifier applies to a single member",
                    mq.span,
                ));
            }
            let base = self.resolve_base(&m.ty)?;
            let last_decl = m.declarators.len().saturating_sub(1);
            for (di, d) in m.declarators.iter().enumerate() {
                let ty = self.apply_dims(base.clone(), d.array.as_ref())?;
                self.check_member(&d.name, &ty, &mut seen)?;
                if d.init.is_some() {
                    return Err(invalid("block members cannot have initializers", d.span));
                }
                if ty.has_runtime_array() {
                    let is_last = mi == last_member && di == last_decl;
                    if storage != Storage::Buffer || !is_last {
                        return Err(invalid(
                            format!(
                                "'{}': only the last member of a buffer block may be an unsized array",
                                d.name.text
                            ),
                            d.name.span,
                        ));
                    }
                }
                members.push(StructMember {
                    name: d.name.text.clone(),
                    ty,
                    offset,
                    row_major: member_row_major,
                    memory: Self::memory_flags(mq),
                    span: d.name.span,
                });
            }
        }

        let sid = StructId(self.program.structs.len() as u32);
        let def = StructDef {
            name: b.name.text.clone(),
            members,
            block: Some(rule),
            span: b.name.span,
        };
        let laid_out = layout::struct_layout(&def, rule, &self.program.structs);
        for (i, msg) in laid_out.problems {
            self.errors.push(invalid(msg, def.members[i].span));
        }
        let member_names: Vec<(String, Span)> = def
            .members
            .iter()
            .map(|m| (m.name.clone(), m.span))
            .collect();
        self.program.structs.push(def);

        let (name, ty, span) = match &b.instance {
            Some(d) => {
                self.check_name(&d.name)?;
                if d.init.is_some() {
                    return Err(invalid("interface blocks cannot be initialized", d.span));
                }
                let ty = self.apply_dims(Type::Struct(sid), d.array.as_ref())?;
                if ty.has_runtime_array() {
                    return Err(unsupported(
                        "unsized arrays of interface blocks are not supported",
                        d.name.span,
                    ));
                }
                (d.name.text.clone(), ty, d.name.span)
            }
            None => (b.name.text.clone(), Type::Struct(sid), b.name.span),
        };
        let gid = GlobalId(self.program.globals.len() as u32);
        log::trace!("block {} ({:?}) as global {}", b.name.text, rule, name);
        self.program.globals.push(GlobalVar {
            name,
            ty,
            storage,
            resource: Some(match storage {
                Storage::Buffer => ResourceKind::StorageBlock,
                _ => ResourceKind::UniformBlock,
            }),
            set,
            binding,
            location: None,
            memory,
            init: None,
            read_only: false,
            span,
        });
        self.blocks.insert(b.name.text.clone(), b.name.span);

        match &b.instance {
            Some(d) => self.declare(&d.name, Symbol::Global(gid)),
            None => {
                for (i, (name, span)) in member_names.into_iter().enumerate() {
                    let id = ast::Ident { text: name, span };
                    self.declare(&id, Symbol::BlockMember(gid, i as u32))?;
                }
                Ok(())
            }
        }
    }

    fn global_decl(&mut self, v: &ast::VarDecl) -> Result<(), TypeError> {
        let base = self.resolve_base(&v.ty)?;
        if v.declarators.is_empty() {
            if !matches!(v.ty.name, ast::TypeName::Struct(_)) {
                self.warn("declaration does not declare anything", v.span);
            }
            return Ok(());
        }
        if let Some((aux, span)) = v
            .qualifier
            .auxiliary
            .iter()
            .find(|(a, _)| *a != ast::AuxQualifier::Precise)
        {
            return Err(unsupported(
                format!("'{:?}' qualifier is not valid in compute shaders", aux).to_lowercase(),
                *span,
            ));
        }
        for d in &v.declarators {
            if let Err(e) = self.global_declarator(&v.qualifier, &base, d) {
                self.errors.push(e);
            }
        }
        Ok(())
    }

    fn global_declarator(
        &mut self,
        q: &ast::TypeQualifier,
        base: &Type,
        d: &ast::Declarator,
    ) -> Result<(), TypeError> {
        self.check_name(&d.name)?;
        let ty = self.apply_dims(base.clone(), d.array.as_ref())?;
        if ty == Type::Void || ty.element_root() == &Type::Void {
            return Err(invalid(
                format!("'{}' cannot have type 'void'", d.name.text),
                d.name.span,
            ));
        }
        let storage = q.storage();
        if ty.is_opaque() && storage != Some(StorageQualifier::Uniform) {
            return Err(unsupported(
                format!(
                    "'{}': opaque type '{}' is only allowed as a uniform or function parameter",
                    d.name.text,
                    self.type_name(&ty)
                ),
                d.name.span,
            ));
        }
        if storage != Some(StorageQualifier::Uniform) {
            if let Some(id) = q.layout.first() {
                return Err(invalid(
                    format!("layout qualifier '{}' is not valid here", id.name.text),
                    id.span,
                ));
            }
            if let Some((_, span)) = q.memory.first() {
                return Err(invalid(
                    "memory qualifiers are only allowed on buffer blocks and images",
                    *span,
                ));
            }
        }

        match storage {
            None | Some(StorageQualifier::Const) => {
                self.private_global(storage.is_some(), ty, d)
            }
            Some(StorageQualifier::Uniform) => self.uniform_global(q, ty, d),
            Some(StorageQualifier::Shared) => {
                if d.init.is_some() {
                    return Err(invalid("shared variables cannot be initialized", d.span));
                }
                if ty.has_runtime_array() {
                    return Err(invalid(
                        format!("shared array '{}' must have a size", d.name.text),
                        d.name.span,
                    ));
                }
                let gid = self.push_global(&d.name, ty, Storage::Shared);
                self.declare(&d.name, Symbol::Global(gid))
            }
            Some(StorageQualifier::Buffer) => Err(invalid(
                "'buffer' variables must be declared inside an interface block",
                d.name.span,
            )),
            Some(StorageQualifier::In) => Err(unsupported(
                "compute shaders have no 'in' variables; use the gl_* built-in inputs",
                d.name.span,
            )),
            Some(StorageQualifier::Out | StorageQualifier::InOut) => Err(unsupported(
                "compute shaders have no 'out' variables; write results to a buffer or image",
                d.name.span,
            )),
        }
    }

    fn push_global(&mut self, name: &ast::Ident, ty: Type, storage: Storage) -> GlobalId {
        let gid = GlobalId(self.program.globals.len() as u32);
        self.program.globals.push(GlobalVar {
            name: name.text.clone(),
            ty,
            storage,
            resource: None,
            set: None,
            binding: None,
            location: None,
            memory: MemoryFlags::default(),
            init: None,
            read_only: false,
            span: name.span,
        });
        gid
    }

    /// Plain and `const` module-scope variables.
    fn private_global(
        &mut self,
        is_const: bool,
        ty: Type,
        d: &ast::Declarator,
    ) -> Result<(), TypeError> {
        let init = match &d.init {
            Some(e) => Some(self.expr(e)?),
            None => None,
        };
        let ty = self.size_from_init(ty, init.as_ref(), &d.name)?;
        let init = init.map(|e| self.coerce(e, &ty)).transpose()?;

        if is_const {
            let Some(init) = init else {
                return Err(invalid(
                    format!("'const' variable '{}' must be initialized", d.name.text),
                    d.name.span,
                ));
            };
            if let Some(v) = init.as_const() {
                return self.declare(&d.name, Symbol::Const(v.clone(), ty));
            }
            let gid = self.push_global(&d.name, ty, Storage::Private);
            self.program.globals[gid.0 as usize].read_only = true;
            self.program.global_inits.push((gid, init));
            return self.declare(&d.name, Symbol::Global(gid));
        }

        let gid = self.push_global(&d.name, ty, Storage::Private);
        if let Some(e) = init {
            match e.as_const() {
                Some(v) => self.program.globals[gid.0 as usize].init = Some(v.clone()),
                None => self.program.global_inits.push((gid, e)),
            }
        }
        self.declare(&d.name, Symbol::Global(gid))
    }

    /// Unsized arrays take their size from the initializer.
    fn size_from_init(
        &self,
        ty: Type,
        init: Option<&Expr>,
        name: &ast::Ident,
    ) -> Result<Type, TypeError> {
        let Type::Array(elem, ArraySize::Runtime) = &ty else {
            return Ok(ty);
        };
        match init.map(|e| &e.ty) {
            Some(Type::Array(init_elem, ArraySize::Fixed(n))) if init_elem == elem => {
                Ok(Type::Array(elem.clone(), ArraySize::Fixed(*n)))
            }
            Some(other) => Err(TypeError::Mismatch {
                expected: self.type_name(&ty),
                found: self.type_name(other),
                span: name.span,
            }),
            None => Err(invalid(
                format!("unsized array '{}' must be sized by its initializer", name.text),
                name.span,
            )),
        }
    }

    fn uniform_global(
        &mut self,
        q: &ast::TypeQualifier,
        mut ty: Type,
        d: &ast::Declarator,
    ) -> Result<(), TypeError> {
        if !ty.is_opaque() {
            return Err(unsupported(
                format!(
                    "non-opaque uniform '{}' must be declared inside a uniform block when targeting Vulkan",
                    d.name.text
                ),
                d.name.span,
            ));
        }
        if d.init.is_some() {
            return Err(invalid("uniforms cannot be initialized", d.span));
        }
        if ty.has_runtime_array() {
            return Err(unsupported(
                "unsized arrays of opaque uniforms are not supported",
                d.name.span,
            ));
        }

        let (mut set, mut binding, mut location, mut offset) = (None, None, None, None);
        let mut format = None;
        for id in &q.layout {
            match id.name.text.as_str() {
                "set" => set = Some(self.layout_uint(id)?),
                "binding" => binding = Some(self.layout_uint(id)?),
                "location" => location = Some(self.layout_uint(id)?),
                "offset" => offset = Some((self.layout_uint(id)?, id.span)),
                name => match ImageFormat::from_layout(name) {
                    Some(f) => {
                        Self::layout_flag(id)?;
                        format = Some((f, id));
                    }
                    None => {
                        return Err(invalid(
                            format!("unknown layout qualifier '{}'", name),
                            id.span,
                        ))
                    }
                },
            }
        }
        let memory = Self::memory_flags(q);

        let resource = match ty.element_root().clone() {
            Type::AtomicUint => return self.atomic_counter(&ty, binding, offset, d),
            Type::Image { sampled, .. } => {
                match format {
                    Some((f, id)) if f.sampled_kind() != sampled => {
                        return Err(invalid(
                            format!(
                                "format '{}' does not match the component type of '{}'",
                                id.name.text,
                                self.type_name(&ty)
                            ),
                            id.span,
                        ))
                    }
                    Some((f, _)) => ty = with_image_format(&ty, f),
                    None if !memory.writeonly => {
                        return Err(invalid(
                            format!(
                                "image '{}' must have a format layout qualifier unless it is declared writeonly",
                                d.name.text
                            ),
                            d.name.span,
                        ))
                    }
                    None => {}
                }
                self.count_images(ty.flat_count() as i64, d.name.span)?;
                ResourceKind::Image
            }
            _ => {
                if let Some((_, id)) = format {
                    return Err(invalid("format qualifiers are only valid on images", id.span));
                }
                if let Some((_, span)) = q.memory.first() {
                    return Err(invalid(
                        "memory qualifiers are only allowed on buffer blocks and images",
                        *span,
                    ));
                }
                self.count_samplers(ty.flat_count() as i64, d.name.span)?;
                ResourceKind::Sampler
            }
        };
        if let Some((_, span)) = offset {
            return Err(invalid("'offset' is only valid on atomic counters and block members", span));
        }

        let gid = self.push_global(&d.name, ty, Storage::Uniform);
        let g = &mut self.program.globals[gid.0 as usize];
        g.resource = Some(resource);
        g.set = set;
        g.binding = binding;
        g.location = location;
        g.memory = memory;
        self.declare(&d.name, Symbol::Global(gid))
    }

    fn count_images(&mut self, n: i64, span: Span) -> Result<(), TypeError> {
        self.counts.images += n;
        let total = self.counts.images;
        check_count(total, n, self.profile.max_compute_image_uniforms, "MaxComputeImageUniforms", "image uniforms", span)?;
        check_count(total, n, self.profile.max_combined_image_uniforms, "MaxCombinedImageUniforms", "image uniforms", span)
    }

    fn count_samplers(&mut self, n: i64, span: Span) -> Result<(), TypeError> {
        self.counts.samplers += n;
        let total = self.counts.samplers;
        check_count(total, n, self.profile.max_compute_texture_image_units, "MaxComputeTextureImageUnits", "sampler uniforms", span)?;
        check_count(total, n, self.profile.max_combined_texture_image_units, "MaxCombinedTextureImageUnits", "sampler uniforms", span)
    }

    /// Atomic counters are validated against the profile, then rejected:
    /// Vulkan has no atomic counter storage.
    fn atomic_counter(
        &mut self,
        ty: &Type,
        binding: Option<u32>,
        offset: Option<(u32, Span)>,
        d: &ast::Declarator,
    ) -> Result<(), TypeError> {
        let span = d.name.span;
        let n = ty.flat_count() as i64;
        self.counts.atomic_counters += n;
        let p = self.profile;
        let limit_errors = [
            check_count(
                self.counts.atomic_counters,
                n,
                p.max_compute_atomic_counters,
                "MaxComputeAtomicCounters",
                "atomic counters",
                span,
            ),
            match binding {
                Some(b) if b as i64 >= p.max_atomic_counter_bindings as i64 => {
                    Err(TypeError::LimitExceeded {
                        what: "atomic counter binding".to_string(),
                        limit: "MaxAtomicCounterBindings",
                        max: p.max_atomic_counter_bindings as i64 - 1,
                        found: b as i64,
                        span,
                    })
                }
                _ => Ok(()),
            },
            match offset {
                Some((o, ospan)) if o as i64 >= p.max_atomic_counter_buffer_size as i64 => {
                    Err(TypeError::LimitExceeded {
                        what: "atomic counter offset".to_string(),
                        limit: "MaxAtomicCounterBufferSize",
                        max: p.max_atomic_counter_buffer_size as i64 - 1,
                        found: o as i64,
                        span: ospan,
                    })
                }
                _ => Ok(()),
            },
        ];
        if self.counts.atomic_bindings.insert(binding.unwrap_or(0)) {
            let buffers = self.counts.atomic_bindings.len() as i64;
            if buffers > p.max_compute_atomic_counter_buffers as i64 {
                self.errors.push(TypeError::LimitExceeded {
                    what: "atomic counter buffers".to_string(),
                    limit: "MaxComputeAtomicCounterBuffers",
                    max: p.max_compute_atomic_counter_buffers as i64,
                    found: buffers,
                    span,
                });
            }
        }
        self.errors.extend(limit_errors.into_iter().filter_map(Result::err));
        Err(unsupported(
            format!(
                "atomic counter '{}': atomic counters are not supported when targeting Vulkan; use atomic operations on a buffer",
                d.name.text
            ),
            span,
        ))
    }

    fn declare_function(
        &mut self,
        proto: &ast::FunctionProto,
        is_definition: bool,
    ) -> Result<FuncId, TypeError> {
        let name = &proto.name;
        self.check_name(name)?;
        if Intrinsic::from_name(&name.text).is_some() || unavailable_in_compute(&name.text).is_some() {
            return Err(invalid(
                format!("cannot redefine built-in function '{}'", name.text),
                name.span,
            ));
        }
        if let Some(prev) = self.scopes[0].get(&name.text) {
            return Err(TypeError::Redefinition {
                name: name.text.clone(),
                span: name.span,
                previous: prev.span,
            });
        }
        if let Some((_, prev)) = self.structs.get(&name.text) {
            return Err(TypeError::Redefinition {
                name: name.text.clone(),
                span: name.span,
                previous: *prev,
            });
        }

        let ret = self.resolve_base(&proto.ret)?;
        if ret.is_opaque() || ret.has_runtime_array() {
            return Err(invalid(
                format!("functions cannot return '{}'", self.type_name(&ret)),
                proto.ret.span,
            ));
        }
        let mut params = Vec::new();
        for (i, p) in proto.params.iter().enumerate() {
            params.push(self.param(p, i)?);
        }

        let existing = self
            .functions
            .get(&name.text)
            .into_iter()
            .flatten()
            .copied()
            .find(|f| {
                let f = self.program.function(*f);
                f.params.len() == params.len()
                    && f.params.iter().zip(&params).all(|(a, b)| a.ty == b.ty)
            });

        let fid = match existing {
            Some(fid) => {
                let f = self.program.function(fid);
                if f.ret != ret {
                    return Err(invalid(
                        format!("function '{}' redeclared with a different return type", name.text),
                        name.span,
                    ));
                }
                if f.params.iter().zip(&params).any(|(a, b)| a.dir != b.dir) {
                    return Err(invalid(
                        format!(
                            "parameter qualifiers of '{}' differ from its previous declaration",
                            name.text
                        ),
                        name.span,
                    ));
                }
                if is_definition {
                    if let Some(previous) = self.fn_info[fid.0 as usize].definition {
                        return Err(TypeError::Redefinition {
                            name: name.text.clone(),
                            span: name.span,
                            previous,
                        });
                    }
                    let f = &mut self.program.functions[fid.0 as usize];
                    f.params = params;
                    f.span = name.span;
                }
                fid
            }
            None => {
                let fid = FuncId(self.program.functions.len() as u32);
                self.program.functions.push(Function {
                    name: name.text.clone(),
                    params,
                    ret,
                    locals: Vec::new(),
                    body: Vec::new(),
                    defined: false,
                    span: name.span,
                });
                self.fn_info.push(FnInfo {
                    declared_at: self.item_index,
                    definition: None,
                });
                self.functions.entry(name.text.clone()).or_default().push(fid);
                fid
            }
        };

        if is_definition {
            self.fn_info[fid.0 as usize].definition = Some(name.span);
            if name.text == "main" {
                self.main_defs.push((fid, name.span));
            }
        }
        log::trace!("function {} ({:?})", name.text, fid);
        Ok(fid)
    }

    fn param(&mut self, p: &ast::ParamDecl, index: usize) -> Result<Param, TypeError> {
        let base = self.resolve_base(&p.ty)?;
        let mut ty = self.apply_dims(base, p.array.as_ref())?;
        if ty == Type::Void {
            return Err(invalid("parameters cannot have type 'void'", p.span));
        }
        if ty.has_runtime_array() {
            return Err(invalid("parameters cannot be unsized arrays", p.span));
        }
        let dir = match p.qualifier.storage() {
            None | Some(StorageQualifier::In | StorageQualifier::Const) => ParamDir::In,
            Some(StorageQualifier::Out) => ParamDir::Out,
            Some(StorageQualifier::InOut) => ParamDir::InOut,
            Some(_) => {
                return Err(invalid(
                    "parameters can only be qualified with 'in', 'out', 'inout' or 'const'",
                    p.qualifier.span,
                ))
            }
        };
        if ty.is_opaque() && dir != ParamDir::In {
            return Err(invalid("opaque parameters must be 'in' parameters", p.span));
        }
        for id in &p.qualifier.layout {
            match (ImageFormat::from_layout(&id.name.text), ty.element_root()) {
                (Some(f), Type::Image { sampled, .. }) if f.sampled_kind() == *sampled => {
                    ty = with_image_format(&ty, f);
                }
                _ => {
                    return Err(invalid(
                        format!("layout qualifier '{}' is not valid on a parameter", id.name.text),
                        id.span,
                    ))
                }
            }
        }
        let name = p
            .name
            .as_ref()
            .map_or_else(|| format!("param{}", index), |n| n.text.clone());
        Ok(Param {
            name,
            ty,
            dir,
            local: LocalId(index as u32),
        })
    }

    fn check_entry_point(&mut self) {
        match self.main_defs.as_slice() {
            [] => self.errors.push(TypeError::EntryPoint {
                message: "missing entry point: no 'main' function is defined".to_string(),
                sites: Vec::new(),
            }),
            [(fid, _)] => self.program.entry = Some(*fid),
            defs => self.errors.push(TypeError::EntryPoint {
                message: format!(
                    "'main' is defined {} times; a compute shader has exactly one entry point",
                    defs.len()
                ),
                sites: defs.iter().map(|(_, s)| *s).collect(),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Bodies
    // -----------------------------------------------------------------------

    fn check_body(&mut self, fid: FuncId, def: &ast::FunctionDef) {
        let func = self.program.function(fid);
        let params = func.params.clone();
        self.func = Some(FnState {
            ret: func.ret.clone(),
            locals: Vec::new(),
            read_only: HashSet::new(),
            loops: 0,
            switches: 0,
            inductive: Vec::new(),
        });
        self.push_scope();
        for (p, decl) in params.iter().zip(&def.proto.params) {
            let declared = match &decl.name {
                Some(n) => self.check_name(n).and_then(|_| {
                    let lid = self.add_local(&p.name, p.ty.clone(), n.span)?;
                    self.declare(n, Symbol::Local(lid))
                }),
                None => self.add_local(&p.name, p.ty.clone(), decl.span).map(|_| ()),
            };
            if let Err(e) = declared {
                self.errors.push(e);
            }
        }
        // parameters and the outermost block share one scope
        let body = self.stmts(&def.body.stmts);
        self.pop_scope();

        let state = self.func.take();
        let f = &mut self.program.functions[fid.0 as usize];
        f.locals = state.map(|s| s.locals).unwrap_or_default();
        f.body = body;
        f.defined = true;
        log::trace!("checked body of {}", f.name);
    }
}

fn check_count(
    total: i64,
    added: i64,
    max: i32,
    limit: &'static str,
    what: &str,
    span: Span,
) -> Result<(), TypeError> {
    // report only at the declaration that crosses the limit
    if total > max as i64 && total - added <= max as i64 {
        return Err(TypeError::LimitExceeded {
            what: format!("number of {}", what),
            limit,
            max: max as i64,
            found: total,
            span,
        });
    }
    Ok(())
}

fn with_image_format(ty: &Type, format: ImageFormat) -> Type {
    match ty {
        Type::Array(elem, n) => Type::Array(Box::new(with_image_format(elem, format)), *n),
        Type::Image { dim, sampled, .. } => Type::Image {
            dim: *dim,
            sampled: *sampled,
            format: Some(format),
        },
        other => other.clone(),
    }
}
