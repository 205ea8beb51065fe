use glint_ast::ast::BuiltinType;
use glint_ast::span::Span;

#[derive(Debug, Clone, PartialEq)]
pub enum TokKind {
    Eof,
    // punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Dot,
    Comma,
    Colon,
    Semicolon,
    Question,
    // preprocessor only
    Hash,
    HashHash,
    // assignment
    Eq,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    ShlEq,
    ShrEq,
    AmpEq,
    CaretEq,
    PipeEq,
    // arithmetic
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    PlusPlus,
    MinusMinus,
    // bitwise
    Amp,
    Pipe,
    Caret,
    Tilde,
    Shl,
    Shr,
    // equality / relational
    EqEq,
    BangEq,
    Lt,
    Le,
    Gt,
    Ge,
    // logical
    AndAnd,
    OrOr,
    CaretCaret,
    Bang,
    // idents / keywords
    Ident(String),
    Type(BuiltinType),
    KwStruct,
    KwConst,
    KwIn,
    KwOut,
    KwInOut,
    KwUniform,
    KwBuffer,
    KwShared,
    KwLayout,
    KwCoherent,
    KwVolatile,
    KwRestrict,
    KwReadOnly,
    KwWriteOnly,
    KwHighp,
    KwMediump,
    KwLowp,
    KwPrecision,
    KwFlat,
    KwSmooth,
    KwNoPerspective,
    KwInvariant,
    KwPrecise,
    KwIf,
    KwElse,
    KwFor,
    KwWhile,
    KwDo,
    KwSwitch,
    KwCase,
    KwDefault,
    KwBreak,
    KwContinue,
    KwReturn,
    KwDiscard,
    KwTrue,
    KwFalse,
    /// Reserved for future use by the language; always an error.
    Reserved(String),
    // literals
    IntLit(i32),
    UintLit(u32),
    FloatLit(f32),
    DoubleLit(f64),
}

impl TokKind {
    /// Short rendering used in "expected X, found Y" messages.
    pub fn describe(&self) -> String {
        match self {
            TokKind::Eof => "end of input".to_string(),
            TokKind::Ident(s) => format!("identifier '{}'", s),
            TokKind::Reserved(s) => format!("reserved word '{}'", s),
            TokKind::Type(t) => format!("type '{}'", crate::lexer::type_keyword_name(t)),
            TokKind::IntLit(v) => format!("integer literal '{}'", v),
            TokKind::UintLit(v) => format!("integer literal '{}u'", v),
            TokKind::FloatLit(v) => format!("floating-point literal '{}'", v),
            TokKind::DoubleLit(v) => format!("floating-point literal '{}lf'", v),
            other => format!("'{}'", other.spelling()),
        }
    }

    pub fn spelling(&self) -> &'static str {
        match self {
            TokKind::LParen => "(",
            TokKind::RParen => ")",
            TokKind::LBracket => "[",
            TokKind::RBracket => "]",
            TokKind::LBrace => "{",
            TokKind::RBrace => "}",
            TokKind::Dot => ".",
            TokKind::Comma => ",",
            TokKind::Colon => ":",
            TokKind::Semicolon => ";",
            TokKind::Question => "?",
            TokKind::Hash => "#",
            TokKind::HashHash => "##",
            TokKind::Eq => "=",
            TokKind::PlusEq => "+=",
            TokKind::MinusEq => "-=",
            TokKind::StarEq => "*=",
            TokKind::SlashEq => "/=",
            TokKind::PercentEq => "%=",
            TokKind::ShlEq => "<<=",
            TokKind::ShrEq => ">>=",
            TokKind::AmpEq => "&=",
            TokKind::CaretEq => "^=",
            TokKind::PipeEq => "|=",
            TokKind::Plus => "+",
            TokKind::Minus => "-",
            TokKind::Star => "*",
            TokKind::Slash => "/",
            TokKind::Percent => "%",
            TokKind::PlusPlus => "++",
            TokKind::MinusMinus => "--",
            TokKind::Amp => "&",
            TokKind::Pipe => "|",
            TokKind::Caret => "^",
            TokKind::Tilde => "~",
            TokKind::Shl => "<<",
            TokKind::Shr => ">>",
            TokKind::EqEq => "==",
            TokKind::BangEq => "!=",
            TokKind::Lt => "<",
            TokKind::Le => "<=",
            TokKind::Gt => ">",
            TokKind::Ge => ">=",
            TokKind::AndAnd => "&&",
            TokKind::OrOr => "||",
            TokKind::CaretCaret => "^^",
            TokKind::Bang => "!",
            TokKind::KwStruct => "struct",
            TokKind::KwConst => "const",
            TokKind::KwIn => "in",
            TokKind::KwOut => "out",
            TokKind::KwInOut => "inout",
            TokKind::KwUniform => "uniform",
            TokKind::KwBuffer => "buffer",
            TokKind::KwShared => "shared",
            TokKind::KwLayout => "layout",
            TokKind::KwCoherent => "coherent",
            TokKind::KwVolatile => "volatile",
            TokKind::KwRestrict => "restrict",
            TokKind::KwReadOnly => "readonly",
            TokKind::KwWriteOnly => "writeonly",
            TokKind::KwHighp => "highp",
            TokKind::KwMediump => "mediump",
            TokKind::KwLowp => "lowp",
            TokKind::KwPrecision => "precision",
            TokKind::KwFlat => "flat",
            TokKind::KwSmooth => "smooth",
            TokKind::KwNoPerspective => "noperspective",
            TokKind::KwInvariant => "invariant",
            TokKind::KwPrecise => "precise",
            TokKind::KwIf => "if",
            TokKind::KwElse => "else",
            TokKind::KwFor => "for",
            TokKind::KwWhile => "while",
            TokKind::KwDo => "do",
            TokKind::KwSwitch => "switch",
            TokKind::KwCase => "case",
            TokKind::KwDefault => "default",
            TokKind::KwBreak => "break",
            TokKind::KwContinue => "continue",
            TokKind::KwReturn => "return",
            TokKind::KwDiscard => "discard",
            TokKind::KwTrue => "true",
            TokKind::KwFalse => "false",
            TokKind::Eof
            | TokKind::Ident(_)
            | TokKind::Type(_)
            | TokKind::Reserved(_)
            | TokKind::IntLit(_)
            | TokKind::UintLit(_)
            | TokKind::FloatLit(_)
            | TokKind::DoubleLit(_) => "",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Tok {
    pub kind: TokKind,
    pub span: Span,
    /// First token on its line (after whitespace); directives key off this.
    pub line_start: bool,
}
