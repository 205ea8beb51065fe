//! Typed intermediate representation produced by the checker.
//!
//! Every expression carries its resolved type, implicit conversions are
//! explicit `Convert` nodes and constant sub-expressions are folded. The
//! binding mapper fills in descriptor slots; the code generator consumes the
//! result without further type checking.

use crate::builtins::{BuiltinVar, Intrinsic};
use crate::types::{ImageDim, StructId, Type};
use glint_ast::ast::{BinOp, UnOp};
use glint_ast::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlobalId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalId(pub u32);

#[derive(Debug, Default)]
pub struct Program {
    pub structs: Vec<StructDef>,
    pub globals: Vec<GlobalVar>,
    pub functions: Vec<Function>,
    /// Selected compute entry point.
    pub entry: Option<FuncId>,
    /// `local_size_{x,y,z}`; `None` until declared or defaulted.
    pub local_size: Option<[u32; 3]>,
    /// Global initializers that are not constant; run at the start of `main`.
    pub global_inits: Vec<(GlobalId, Expr)>,
    pub features: Features,
}

impl Program {
    pub fn struct_def(&self, id: StructId) -> &StructDef {
        &self.structs[id.0 as usize]
    }

    pub fn global(&self, id: GlobalId) -> &GlobalVar {
        &self.globals[id.0 as usize]
    }

    pub fn function(&self, id: FuncId) -> &Function {
        &self.functions[id.0 as usize]
    }

    pub fn type_name(&self, ty: &Type) -> String {
        ty.display_with(&|id| self.struct_def(id).name.clone())
    }
}

/// Language features the program uses; drives capability selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Features {
    pub float64: bool,
    pub image_query: bool,
    pub sampled_1d: bool,
    pub image_1d: bool,
    pub extended_image_formats: bool,
    pub write_without_format: bool,
    /// `gl_WorkGroupSize` is referenced.
    pub workgroup_size: bool,
    pub glsl_std_450: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockLayout {
    Std140,
    Std430,
}

#[derive(Debug, Clone)]
pub struct StructDef {
    pub name: String,
    pub members: Vec<StructMember>,
    /// Set for interface-block structs.
    pub block: Option<BlockLayout>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct StructMember {
    pub name: String,
    pub ty: Type,
    /// Explicit `layout(offset = N)`.
    pub offset: Option<u32>,
    pub row_major: bool,
    pub memory: MemoryFlags,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    /// Uniform blocks and opaque uniforms.
    Uniform,
    /// Shader storage blocks.
    Buffer,
    Shared,
    /// Plain module-scope variables.
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    UniformBlock,
    StorageBlock,
    Image,
    Sampler,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryFlags {
    pub coherent: bool,
    pub volatile: bool,
    pub restrict: bool,
    pub readonly: bool,
    pub writeonly: bool,
}

impl MemoryFlags {
    pub fn merge(self, other: MemoryFlags) -> MemoryFlags {
        MemoryFlags {
            coherent: self.coherent || other.coherent,
            volatile: self.volatile || other.volatile,
            restrict: self.restrict || other.restrict,
            readonly: self.readonly || other.readonly,
            writeonly: self.writeonly || other.writeonly,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GlobalVar {
    /// Instance name; anonymous blocks use the block name.
    pub name: String,
    pub ty: Type,
    pub storage: Storage,
    pub resource: Option<ResourceKind>,
    pub set: Option<u32>,
    pub binding: Option<u32>,
    pub location: Option<u32>,
    pub memory: MemoryFlags,
    /// Constant initializer.
    pub init: Option<ConstValue>,
    /// Declared `const` but initialized at run time.
    pub read_only: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamDir {
    In,
    Out,
    InOut,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: Type,
    pub dir: ParamDir,
    pub local: LocalId,
}

#[derive(Debug, Clone)]
pub struct Local {
    pub name: String,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
    pub ret: Type,
    pub locals: Vec<Local>,
    pub body: Vec<Stmt>,
    /// False for prototypes that never received a body.
    pub defined: bool,
    pub span: Span,
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Stmt {
    Expr(Expr),
    /// Local initialization; the variable itself lives in `Function::locals`.
    Init(LocalId, Expr),
    Block(Vec<Stmt>),
    If {
        cond: Expr,
        then_: Vec<Stmt>,
        else_: Vec<Stmt>,
    },
    Loop {
        kind: LoopKind,
        cond: Option<Expr>,
        step: Option<Expr>,
        body: Vec<Stmt>,
    },
    Switch {
        selector: Expr,
        cases: Vec<SwitchCase>,
    },
    Break,
    Continue,
    Return(Option<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    /// `for` and `while`: condition tested before the body.
    Pre,
    /// `do ... while`: condition tested after the body.
    Post,
}

/// One run of labels followed by its statements; falls through to the next
/// case unless it ends in `break`.
#[derive(Debug, Clone)]
pub struct SwitchCase {
    pub values: Vec<i64>,
    pub is_default: bool,
    pub body: Vec<Stmt>,
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Bool(bool),
    Int(i32),
    Uint(u32),
    Float(f32),
    Double(f64),
    Composite(Vec<ConstValue>),
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Const(ConstValue),
    Local(LocalId),
    Global(GlobalId),
    Builtin(BuiltinVar),
    /// Struct or block member access by index.
    Member(Box<Expr>, u32),
    Swizzle(Box<Expr>, Vec<u8>),
    Index(Box<Expr>, Box<Expr>),
    Unary(UnOp, Box<Expr>),
    /// Arithmetic, bitwise, comparison and `^^`. Operand shapes are already
    /// normalized: scalars broadcast against vectors are splatted, except in
    /// matrix arithmetic.
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// Short-circuit `&&` (`true`) / `||` (`false`).
    Logical(bool, Box<Expr>, Box<Expr>),
    /// Component-wise conversion to `ty`.
    Convert(Box<Expr>),
    /// Composite construction of `ty` from scalars/vectors (vectors), column
    /// vectors (matrices), elements (arrays) or members (structs).
    Construct(Vec<Expr>),
    /// Scalar replicated to every component of a vector `ty`.
    Splat(Box<Expr>),
    /// Scalar on the diagonal of a matrix `ty`, zero elsewhere.
    MatrixDiagonal(Box<Expr>),
    /// Matrix of another size; missing elements come from the identity.
    MatrixResize(Box<Expr>),
    Call(FuncId, Vec<Expr>),
    Intrinsic(Intrinsic, Vec<Expr>),
    Assign {
        target: Box<Expr>,
        op: Option<BinOp>,
        value: Box<Expr>,
    },
    IncDec {
        target: Box<Expr>,
        increment: bool,
        prefix: bool,
    },
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    /// Length of a runtime array; the operand is the array member access.
    ArrayLength(Box<Expr>),
    Comma(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn new(kind: ExprKind, ty: Type, span: Span) -> Expr {
        Expr { kind, ty, span }
    }

    pub fn constant(value: ConstValue, ty: Type, span: Span) -> Expr {
        Expr::new(ExprKind::Const(value), ty, span)
    }

    pub fn as_const(&self) -> Option<&ConstValue> {
        match &self.kind {
            ExprKind::Const(v) => Some(v),
            _ => None,
        }
    }

    /// Variable the expression designates, looking through member, index
    /// and swizzle accesses.
    pub fn root(&self) -> &Expr {
        match &self.kind {
            ExprKind::Member(base, _) | ExprKind::Swizzle(base, _) | ExprKind::Index(base, _) => {
                base.root()
            }
            _ => self,
        }
    }

    /// Visit this expression and every sub-expression, parents first.
    pub fn walk(&self, f: &mut dyn FnMut(&Expr)) {
        f(self);
        match &self.kind {
            ExprKind::Const(_)
            | ExprKind::Local(_)
            | ExprKind::Global(_)
            | ExprKind::Builtin(_) => {}
            ExprKind::Member(e, _)
            | ExprKind::Swizzle(e, _)
            | ExprKind::Unary(_, e)
            | ExprKind::Convert(e)
            | ExprKind::Splat(e)
            | ExprKind::MatrixDiagonal(e)
            | ExprKind::MatrixResize(e)
            | ExprKind::ArrayLength(e) => e.walk(f),
            ExprKind::IncDec { target, .. } => target.walk(f),
            ExprKind::Index(a, b)
            | ExprKind::Binary(_, a, b)
            | ExprKind::Logical(_, a, b)
            | ExprKind::Comma(a, b) => {
                a.walk(f);
                b.walk(f);
            }
            ExprKind::Assign { target, value, .. } => {
                target.walk(f);
                value.walk(f);
            }
            ExprKind::Ternary(c, a, b) => {
                c.walk(f);
                a.walk(f);
                b.walk(f);
            }
            ExprKind::Construct(args) | ExprKind::Call(_, args) | ExprKind::Intrinsic(_, args) => {
                for a in args {
                    a.walk(f);
                }
            }
        }
    }
}

impl Stmt {
    /// Visit every expression in this statement tree.
    pub fn walk_exprs(&self, f: &mut dyn FnMut(&Expr)) {
        match self {
            Stmt::Expr(e) | Stmt::Init(_, e) => e.walk(f),
            Stmt::Block(stmts) => stmts.iter().for_each(|s| s.walk_exprs(f)),
            Stmt::If { cond, then_, else_ } => {
                cond.walk(f);
                then_.iter().for_each(|s| s.walk_exprs(f));
                else_.iter().for_each(|s| s.walk_exprs(f));
            }
            Stmt::Loop {
                cond, step, body, ..
            } => {
                if let Some(c) = cond {
                    c.walk(f);
                }
                if let Some(s) = step {
                    s.walk(f);
                }
                body.iter().for_each(|s| s.walk_exprs(f));
            }
            Stmt::Switch { selector, cases } => {
                selector.walk(f);
                for case in cases {
                    case.body.iter().for_each(|s| s.walk_exprs(f));
                }
            }
            Stmt::Return(Some(e)) => e.walk(f),
            Stmt::Break | Stmt::Continue | Stmt::Return(None) => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Feature collection
// ---------------------------------------------------------------------------

impl Program {
    /// Recompute `features` from every type and operation in the program.
    pub fn collect_features(&mut self) {
        let mut features = Features {
            workgroup_size: self.features.workgroup_size,
            ..Features::default()
        };
        let note_type = |ty: &Type, f: &mut Features| {
            if ty.uses_double() {
                f.float64 = true;
            }
            match ty.element_root() {
                Type::Image { dim, format, .. } => {
                    if *dim == ImageDim::Dim1D {
                        f.image_1d = true;
                    }
                    match format {
                        Some(fmt) if fmt.is_extended() => f.extended_image_formats = true,
                        None => f.write_without_format = true,
                        _ => {}
                    }
                }
                Type::Sampler { dim, .. } if *dim == ImageDim::Dim1D => f.sampled_1d = true,
                _ => {}
            }
        };

        for s in &self.structs {
            for m in &s.members {
                note_type(&m.ty, &mut features);
            }
        }
        for g in &self.globals {
            note_type(&g.ty, &mut features);
        }
        let mut visit = |e: &Expr| {
            note_type(&e.ty, &mut features);
            if let ExprKind::Intrinsic(op, _) = &e.kind {
                if op.needs_image_query() {
                    features.image_query = true;
                }
                if op.is_glsl_std_450() {
                    features.glsl_std_450 = true;
                }
            }
        };
        for (_, e) in &self.global_inits {
            e.walk(&mut visit);
        }
        for func in &self.functions {
            for s in &func.body {
                s.walk_exprs(&mut visit);
            }
        }
        for func in &self.functions {
            for l in &func.locals {
                note_type(&l.ty, &mut features);
            }
            note_type(&func.ret, &mut features);
        }
        self.features = features;
    }
}
