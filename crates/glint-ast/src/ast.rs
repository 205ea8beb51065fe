//! Syntax tree for the GLSL compute subset.
//!
//! Every node keeps the byte span it was parsed from. Macro-expanded tokens
//! carry the span of the macro use, so spans always point into the text the
//! user wrote.

use super::span::Span;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct TranslationUnit {
    pub version: VersionDirective,
    pub extensions: Vec<ExtensionDirective>,
    pub items: Vec<ExternalDecl>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct VersionDirective {
    pub number: u32,
    pub profile: VersionProfile,
    /// `None` when the source had no `#version` line.
    pub span: Option<Span>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VersionProfile {
    Core,
    Compatibility,
    Es,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtensionDirective {
    pub name: String,
    pub behavior: ExtensionBehavior,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExtensionBehavior {
    Require,
    Enable,
    Warn,
    Disable,
}

#[derive(Debug, Serialize)]
pub enum ExternalDecl {
    /// Qualifier-only declaration, e.g. `layout(local_size_x = 64) in;`
    Qualifier(QualifierDecl),
    Block(BlockDecl),
    Variable(VarDecl),
    Prototype(FunctionProto),
    Function(FunctionDef),
    Precision(PrecisionDecl),
}

#[derive(Debug, Serialize)]
pub struct QualifierDecl {
    pub qualifier: TypeQualifier,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct Ident {
    pub text: String,
    pub span: Span,
}

// ---------------------------------------------------------------------------
// Qualifiers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct TypeQualifier {
    /// All `layout(...)` ids, in source order, merged across groups.
    pub layout: Vec<LayoutQualifierId>,
    pub storage: Option<(StorageQualifier, Span)>,
    pub memory: Vec<(MemoryQualifier, Span)>,
    pub precision: Option<Precision>,
    pub auxiliary: Vec<(AuxQualifier, Span)>,
    pub span: Span,
}

impl TypeQualifier {
    pub fn is_empty(&self) -> bool {
        self.layout.is_empty()
            && self.storage.is_none()
            && self.memory.is_empty()
            && self.precision.is_none()
            && self.auxiliary.is_empty()
    }

    pub fn storage(&self) -> Option<StorageQualifier> {
        self.storage.map(|(s, _)| s)
    }

    pub fn has_memory(&self, q: MemoryQualifier) -> bool {
        self.memory.iter().any(|(m, _)| *m == q)
    }

    pub fn layout_id(&self, name: &str) -> Option<&LayoutQualifierId> {
        self.layout.iter().rev().find(|id| id.name.text == name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LayoutQualifierId {
    pub name: Ident,
    pub value: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StorageQualifier {
    Const,
    In,
    Out,
    InOut,
    Uniform,
    Buffer,
    Shared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MemoryQualifier {
    Coherent,
    Volatile,
    Restrict,
    ReadOnly,
    WriteOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Precision {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuxQualifier {
    Flat,
    Smooth,
    NoPerspective,
    Invariant,
    Precise,
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ScalarKind {
    Bool,
    Int,
    Uint,
    Float,
    Double,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ImageDim {
    Dim1D,
    Dim2D,
    Dim3D,
}

/// Type keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BuiltinType {
    Void,
    Scalar(ScalarKind),
    Vector(ScalarKind, u8),
    /// `matCxR`; `double` selects the `dmat` family.
    Matrix {
        double: bool,
        cols: u8,
        rows: u8,
    },
    /// `image2D`, `iimage3D`, ... with the sampled component kind.
    Image(ImageDim, ScalarKind),
    /// `sampler2D`, `usampler1D`, ...
    Sampler(ImageDim, ScalarKind),
    AtomicUint,
}

#[derive(Debug, Clone, Serialize)]
pub struct TypeSpec {
    pub name: TypeName,
    pub array: Option<ArraySpec>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub enum TypeName {
    Builtin(BuiltinType),
    Named(Ident),
    Struct(Box<StructDecl>),
}

#[derive(Debug, Clone, Serialize)]
pub struct StructDecl {
    pub name: Option<Ident>,
    pub members: Vec<MemberDecl>,
    pub span: Span,
}

/// `[]`, `[4]`, `[N][2]` -- `None` is an unsized dimension.
#[derive(Debug, Clone, Serialize)]
pub struct ArraySpec {
    pub dims: Vec<Option<Expr>>,
    pub span: Span,
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Declarator {
    pub name: Ident,
    pub array: Option<ArraySpec>,
    pub init: Option<Expr>,
    pub span: Span,
}

/// `qualifier type a, b[2] = ...;` -- declarators may be empty for a bare
/// struct definition.
#[derive(Debug, Clone, Serialize)]
pub struct VarDecl {
    pub qualifier: TypeQualifier,
    pub ty: TypeSpec,
    pub declarators: Vec<Declarator>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberDecl {
    pub qualifier: TypeQualifier,
    pub ty: TypeSpec,
    pub declarators: Vec<Declarator>,
    pub span: Span,
}

/// Interface block: `layout(...) buffer Name { ... } instance[N];`
#[derive(Debug, Serialize)]
pub struct BlockDecl {
    pub qualifier: TypeQualifier,
    pub name: Ident,
    pub members: Vec<MemberDecl>,
    pub instance: Option<Declarator>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionProto {
    pub ret: TypeSpec,
    pub name: Ident,
    pub params: Vec<ParamDecl>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParamDecl {
    pub qualifier: TypeQualifier,
    pub ty: TypeSpec,
    pub name: Option<Ident>,
    pub array: Option<ArraySpec>,
    pub span: Span,
}

#[derive(Debug, Serialize)]
pub struct FunctionDef {
    pub proto: FunctionProto,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Serialize)]
pub struct PrecisionDecl {
    pub precision: Precision,
    pub ty: TypeSpec,
    pub span: Span,
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub enum Stmt {
    Decl(VarDecl),
    Expr {
        expr: Expr,
        span: Span,
    },
    Block(Block),
    If {
        cond: Expr,
        then_: Box<Stmt>,
        else_: Option<Box<Stmt>>,
        span: Span,
    },
    /// The body holds `Case`/`Default` label statements inline.
    Switch {
        selector: Expr,
        body: Block,
        span: Span,
    },
    Case {
        value: Expr,
        span: Span,
    },
    Default {
        span: Span,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Option<Expr>,
        body: Box<Stmt>,
        span: Span,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
        span: Span,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
        span: Span,
    },
    Break {
        span: Span,
    },
    Continue {
        span: Span,
    },
    Return {
        value: Option<Expr>,
        span: Span,
    },
    Discard {
        span: Span,
    },
    Empty {
        span: Span,
    },
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Decl(d) => d.span,
            Stmt::Block(b) => b.span,
            Stmt::Expr { span, .. }
            | Stmt::If { span, .. }
            | Stmt::Switch { span, .. }
            | Stmt::Case { span, .. }
            | Stmt::Default { span }
            | Stmt::For { span, .. }
            | Stmt::While { span, .. }
            | Stmt::DoWhile { span, .. }
            | Stmt::Break { span }
            | Stmt::Continue { span }
            | Stmt::Return { span, .. }
            | Stmt::Discard { span }
            | Stmt::Empty { span } => *span,
        }
    }
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub enum Expr {
    Lit(Lit, Span),
    Var(Ident),
    Unary {
        op: UnOp,
        expr: Box<Expr>,
        span: Span,
    },
    Binary {
        lhs: Box<Expr>,
        op: BinOp,
        rhs: Box<Expr>,
        span: Span,
    },
    /// `lhs = rhs` when `op` is `None`, otherwise the compound form `lhs op= rhs`.
    Assign {
        op: Option<BinOp>,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: Span,
    },
    Ternary {
        cond: Box<Expr>,
        then_: Box<Expr>,
        else_: Box<Expr>,
        span: Span,
    },
    Call {
        callee: Callee,
        args: Vec<Expr>,
        span: Span,
    },
    Field {
        base: Box<Expr>,
        field: Ident,
        span: Span,
    },
    /// Method-call syntax; GLSL only has `.length()`.
    Method {
        base: Box<Expr>,
        name: Ident,
        args: Vec<Expr>,
        span: Span,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
    Comma {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: Span,
    },
    Paren {
        inner: Box<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Lit(_, sp) => *sp,
            Expr::Var(id) => id.span,
            Expr::Unary { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Assign { span, .. }
            | Expr::Ternary { span, .. }
            | Expr::Call { span, .. }
            | Expr::Field { span, .. }
            | Expr::Method { span, .. }
            | Expr::Index { span, .. }
            | Expr::Comma { span, .. }
            | Expr::Paren { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub enum Callee {
    /// Function or struct constructor, resolved by the checker.
    Name(Ident),
    /// Constructor of a builtin or array type, e.g. `vec3(...)`, `float[2](...)`.
    Type(TypeSpec),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Lit {
    Int(i32),
    Uint(u32),
    Float(f32),
    Double(f64),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnOp {
    Neg,
    Plus,
    Not,
    BitNot,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BinOp {
    // logical
    Or,
    Xor,
    And,
    // bitwise
    BitOr,
    BitXor,
    BitAnd,
    // equality
    Eq,
    Ne,
    // relational
    Lt,
    Le,
    Gt,
    Ge,
    // shift
    Shl,
    Shr,
    // arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Or => "||",
            BinOp::Xor => "^^",
            BinOp::And => "&&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::BitAnd => "&",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
        }
    }
}

impl UnOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnOp::Neg => "-",
            UnOp::Plus => "+",
            UnOp::Not => "!",
            UnOp::BitNot => "~",
            UnOp::PreInc | UnOp::PostInc => "++",
            UnOp::PreDec | UnOp::PostDec => "--",
        }
    }
}
