use crate::token::{Tok, TokKind};
use glint_ast::ast::{BuiltinType, ImageDim, ScalarKind};
use glint_ast::diag::{Diagnostic, Stage};
use glint_ast::span::Span;

/// Words the language reserves without giving them a meaning.
const RESERVED: &[&str] = &[
    "attribute", "varying", "common", "partition", "active", "asm", "class", "union", "enum",
    "typedef", "template", "this", "resource", "goto", "inline", "noinline", "public", "static",
    "extern", "external", "interface", "long", "short", "half", "fixed", "unsigned", "superp",
    "input", "output", "hvec2", "hvec3", "hvec4", "fvec2", "fvec3", "fvec4", "filter",
    "sizeof", "cast", "namespace", "using", "subroutine", "centroid", "sample", "patch",
];

/// Opaque types of the language that this compiler does not lower.
const UNSUPPORTED_TYPES: &[&str] = &[
    "samplerCube", "sampler1DArray", "sampler2DArray", "samplerCubeArray", "sampler2DRect",
    "samplerBuffer", "sampler2DMS", "sampler2DMSArray", "sampler1DShadow", "sampler2DShadow",
    "samplerCubeShadow", "sampler2DArrayShadow", "imageCube", "image1DArray", "image2DArray",
    "imageCubeArray", "image2DRect", "imageBuffer", "image2DMS", "image2DMSArray", "texture2D",
    "texture3D", "sampler", "samplerShadow", "subpassInput",
];

pub fn is_unsupported_type(word: &str) -> bool {
    UNSUPPORTED_TYPES.contains(&word)
}

pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    base: u32,
    line_start: bool,
}

impl<'a> Lexer<'a> {
    /// Lex `src`, reporting spans shifted by `base` bytes.
    pub fn new(src: &'a str, base: u32) -> Self {
        Self {
            src: src.as_bytes(),
            pos: 0,
            base,
            line_start: true,
        }
    }

    fn bump(&mut self) -> Option<u8> {
        if self.pos >= self.src.len() {
            None
        } else {
            let b = self.src[self.pos];
            self.pos += 1;
            Some(b)
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }
    fn peek2(&self) -> Option<u8> {
        self.src.get(self.pos + 1).copied()
    }

    fn span(&self, start: usize) -> Span {
        Span {
            start: self.base + start as u32,
            end: self.base + self.pos as u32,
        }
    }

    fn error(&self, start: usize, msg: impl Into<String>) -> Diagnostic {
        Diagnostic::error(Stage::Syntax, msg).at(self.span(start))
    }

    fn skip_ws(&mut self) {
        while let Some(b) = self.peek() {
            if b == b'\n' {
                self.line_start = true;
            } else if !(b as char).is_ascii_whitespace() {
                break;
            }
            self.bump();
        }
    }

    /// Lex the whole input.
    pub fn tokenize(mut self) -> Result<Vec<Tok>, Diagnostic> {
        let mut toks = Vec::new();
        loop {
            let tok = self.next_tok()?;
            if tok.kind == TokKind::Eof {
                return Ok(toks);
            }
            toks.push(tok);
        }
    }

    pub fn next_tok(&mut self) -> Result<Tok, Diagnostic> {
        self.skip_ws();
        let line_start = std::mem::replace(&mut self.line_start, false);
        let start = self.pos;
        let Some(b) = self.bump() else {
            return Ok(Tok {
                kind: TokKind::Eof,
                span: self.span(start),
                line_start,
            });
        };
        let c = b as char;
        let tok = |kind, lx: &Self| Tok {
            kind,
            span: lx.span(start),
            line_start,
        };

        if c.is_ascii_digit() || (c == '.' && matches!(self.peek(), Some(d) if d.is_ascii_digit()))
        {
            let kind = self.lex_number(start)?;
            return Ok(tok(kind, self));
        }

        if c.is_ascii_alphabetic() || c == '_' {
            while matches!(self.peek(), Some(p) if p.is_ascii_alphanumeric() || p == b'_') {
                self.bump();
            }
            let word = std::str::from_utf8(&self.src[start..self.pos]).unwrap_or_default();
            return Ok(tok(keyword(word), self));
        }

        // 3-char operators
        let three = match (c, self.peek(), self.peek2()) {
            ('<', Some(b'<'), Some(b'=')) => Some(TokKind::ShlEq),
            ('>', Some(b'>'), Some(b'=')) => Some(TokKind::ShrEq),
            _ => None,
        };
        if let Some(kind) = three {
            self.bump();
            self.bump();
            return Ok(tok(kind, self));
        }

        // 2-char operators
        let two = match (c, self.peek().map(|b| b as char)) {
            ('<', Some('<')) => Some(TokKind::Shl),
            ('>', Some('>')) => Some(TokKind::Shr),
            ('<', Some('=')) => Some(TokKind::Le),
            ('>', Some('=')) => Some(TokKind::Ge),
            ('=', Some('=')) => Some(TokKind::EqEq),
            ('!', Some('=')) => Some(TokKind::BangEq),
            ('&', Some('&')) => Some(TokKind::AndAnd),
            ('|', Some('|')) => Some(TokKind::OrOr),
            ('^', Some('^')) => Some(TokKind::CaretCaret),
            ('+', Some('+')) => Some(TokKind::PlusPlus),
            ('-', Some('-')) => Some(TokKind::MinusMinus),
            ('+', Some('=')) => Some(TokKind::PlusEq),
            ('-', Some('=')) => Some(TokKind::MinusEq),
            ('*', Some('=')) => Some(TokKind::StarEq),
            ('/', Some('=')) => Some(TokKind::SlashEq),
            ('%', Some('=')) => Some(TokKind::PercentEq),
            ('&', Some('=')) => Some(TokKind::AmpEq),
            ('^', Some('=')) => Some(TokKind::CaretEq),
            ('|', Some('=')) => Some(TokKind::PipeEq),
            ('#', Some('#')) => Some(TokKind::HashHash),
            _ => None,
        };
        if let Some(kind) = two {
            self.bump();
            return Ok(tok(kind, self));
        }

        let single = match c {
            '(' => TokKind::LParen,
            ')' => TokKind::RParen,
            '[' => TokKind::LBracket,
            ']' => TokKind::RBracket,
            '{' => TokKind::LBrace,
            '}' => TokKind::RBrace,
            '.' => TokKind::Dot,
            ',' => TokKind::Comma,
            ':' => TokKind::Colon,
            ';' => TokKind::Semicolon,
            '?' => TokKind::Question,
            '#' => TokKind::Hash,
            '=' => TokKind::Eq,
            '+' => TokKind::Plus,
            '-' => TokKind::Minus,
            '*' => TokKind::Star,
            '/' => TokKind::Slash,
            '%' => TokKind::Percent,
            '&' => TokKind::Amp,
            '|' => TokKind::Pipe,
            '^' => TokKind::Caret,
            '~' => TokKind::Tilde,
            '<' => TokKind::Lt,
            '>' => TokKind::Gt,
            '!' => TokKind::Bang,
            _ => {
                // swallow the rest of a multi-byte character for the span
                while matches!(self.peek(), Some(p) if (p & 0xC0) == 0x80) {
                    self.bump();
                }
                let text = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
                return Err(self.error(start, format!("unexpected character '{}'", text)));
            }
        };
        Ok(tok(single, self))
    }

    fn lex_number(&mut self, start: usize) -> Result<TokKind, Diagnostic> {
        let first = self.src[start];

        // hexadecimal
        if first == b'0' && matches!(self.peek(), Some(b'x' | b'X')) {
            self.bump();
            let digits_start = self.pos;
            while matches!(self.peek(), Some(d) if d.is_ascii_hexdigit()) {
                self.bump();
            }
            if self.pos == digits_start {
                return Err(self.error(start, "bad hexadecimal literal"));
            }
            let text = std::str::from_utf8(&self.src[digits_start..self.pos]).unwrap_or_default();
            let value = u64::from_str_radix(text, 16).unwrap_or(u64::MAX);
            return self.finish_int(start, value, false);
        }

        let mut is_float = first == b'.';
        while matches!(self.peek(), Some(d) if d.is_ascii_digit()) {
            self.bump();
        }
        if !is_float && self.peek() == Some(b'.') {
            is_float = true;
            self.bump();
        }
        if is_float {
            while matches!(self.peek(), Some(d) if d.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            is_float = true;
            self.bump();
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.bump();
            }
            let exp_start = self.pos;
            while matches!(self.peek(), Some(d) if d.is_ascii_digit()) {
                self.bump();
            }
            if self.pos == exp_start {
                return Err(self.error(start, "bad exponent in floating-point literal"));
            }
        }

        let text = std::str::from_utf8(&self.src[start..self.pos])
            .unwrap_or_default()
            .to_string();

        if is_float {
            let double = match (self.peek(), self.peek2()) {
                (Some(b'l'), Some(b'f')) | (Some(b'L'), Some(b'F')) => {
                    self.bump();
                    self.bump();
                    true
                }
                (Some(b'f' | b'F'), _) => {
                    self.bump();
                    false
                }
                _ => false,
            };
            self.reject_suffix(start)?;
            let value: f64 = text
                .parse()
                .map_err(|_| self.error(start, "bad floating-point literal"))?;
            return Ok(if double {
                TokKind::DoubleLit(value)
            } else {
                TokKind::FloatLit(value as f32)
            });
        }

        let decimal = !(text.len() > 1 && text.starts_with('0'));
        let value = if !decimal {
            if text.bytes().any(|d| d == b'8' || d == b'9') {
                return Err(self.error(start, "invalid digit in octal literal"));
            }
            u64::from_str_radix(&text[1..], 8).unwrap_or(u64::MAX)
        } else {
            text.parse::<u64>().unwrap_or(u64::MAX)
        };
        self.finish_int(start, value, decimal)
    }

    fn finish_int(&mut self, start: usize, value: u64, decimal: bool) -> Result<TokKind, Diagnostic> {
        let unsigned = matches!(self.peek(), Some(b'u' | b'U'));
        if unsigned {
            self.bump();
        }
        self.reject_suffix(start)?;
        if value > u32::MAX as u64 {
            return Err(self.error(start, "integer literal too big"));
        }
        // 2^31 itself is allowed so that `-2147483648` can be written
        if decimal && !unsigned && value > 1 << 31 {
            return Err(self.error(
                start,
                format!("integer literal {} does not fit in 'int'; use a 'u' suffix", value),
            ));
        }
        Ok(if unsigned {
            TokKind::UintLit(value as u32)
        } else {
            // hex and octal literals in [2^31, 2^32) keep their bit pattern
            TokKind::IntLit(value as u32 as i32)
        })
    }

    fn reject_suffix(&mut self, start: usize) -> Result<(), Diagnostic> {
        if matches!(self.peek(), Some(p) if p.is_ascii_alphanumeric() || p == b'_' || p == b'.') {
            while matches!(self.peek(), Some(p) if p.is_ascii_alphanumeric() || p == b'_' || p == b'.')
            {
                self.bump();
            }
            return Err(self.error(start, "invalid suffix on numeric literal"));
        }
        Ok(())
    }
}

fn keyword(word: &str) -> TokKind {
    if let Some(ty) = type_keyword(word) {
        return TokKind::Type(ty);
    }
    match word {
        "struct" => TokKind::KwStruct,
        "const" => TokKind::KwConst,
        "in" => TokKind::KwIn,
        "out" => TokKind::KwOut,
        "inout" => TokKind::KwInOut,
        "uniform" => TokKind::KwUniform,
        "buffer" => TokKind::KwBuffer,
        "shared" => TokKind::KwShared,
        "layout" => TokKind::KwLayout,
        "coherent" => TokKind::KwCoherent,
        "volatile" => TokKind::KwVolatile,
        "restrict" => TokKind::KwRestrict,
        "readonly" => TokKind::KwReadOnly,
        "writeonly" => TokKind::KwWriteOnly,
        "highp" => TokKind::KwHighp,
        "mediump" => TokKind::KwMediump,
        "lowp" => TokKind::KwLowp,
        "precision" => TokKind::KwPrecision,
        "flat" => TokKind::KwFlat,
        "smooth" => TokKind::KwSmooth,
        "noperspective" => TokKind::KwNoPerspective,
        "invariant" => TokKind::KwInvariant,
        "precise" => TokKind::KwPrecise,
        "if" => TokKind::KwIf,
        "else" => TokKind::KwElse,
        "for" => TokKind::KwFor,
        "while" => TokKind::KwWhile,
        "do" => TokKind::KwDo,
        "switch" => TokKind::KwSwitch,
        "case" => TokKind::KwCase,
        "default" => TokKind::KwDefault,
        "break" => TokKind::KwBreak,
        "continue" => TokKind::KwContinue,
        "return" => TokKind::KwReturn,
        "discard" => TokKind::KwDiscard,
        "true" => TokKind::KwTrue,
        "false" => TokKind::KwFalse,
        w if RESERVED.contains(&w) || is_unsupported_type(w) => TokKind::Reserved(w.to_string()),
        w => TokKind::Ident(w.to_string()),
    }
}

fn type_keyword(word: &str) -> Option<BuiltinType> {
    let scalar = |w: &str| match w {
        "bool" => Some(ScalarKind::Bool),
        "int" => Some(ScalarKind::Int),
        "uint" => Some(ScalarKind::Uint),
        "float" => Some(ScalarKind::Float),
        "double" => Some(ScalarKind::Double),
        _ => None,
    };
    if word == "void" {
        return Some(BuiltinType::Void);
    }
    if word == "atomic_uint" {
        return Some(BuiltinType::AtomicUint);
    }
    if let Some(k) = scalar(word) {
        return Some(BuiltinType::Scalar(k));
    }

    let size = |d: u8| matches!(d, b'2'..=b'4').then(|| d - b'0');
    let bytes = word.as_bytes();

    // vecN and prefixed forms
    for (prefix, kind) in [
        ("vec", ScalarKind::Float),
        ("ivec", ScalarKind::Int),
        ("uvec", ScalarKind::Uint),
        ("bvec", ScalarKind::Bool),
        ("dvec", ScalarKind::Double),
    ] {
        if word.len() == prefix.len() + 1 && word.starts_with(prefix) {
            return size(bytes[prefix.len()]).map(|n| BuiltinType::Vector(kind, n));
        }
    }

    // matN, matCxR, dmatN, dmatCxR
    for (prefix, double) in [("mat", false), ("dmat", true)] {
        if let Some(rest) = word.strip_prefix(prefix) {
            let r = rest.as_bytes();
            return match r {
                [n] => size(*n).map(|n| BuiltinType::Matrix {
                    double,
                    cols: n,
                    rows: n,
                }),
                [c, b'x', r] => match (size(*c), size(*r)) {
                    (Some(cols), Some(rows)) => Some(BuiltinType::Matrix { double, cols, rows }),
                    _ => None,
                },
                _ => None,
            };
        }
    }

    // opaque types
    let dim = |w: &str| match w {
        "1D" => Some(ImageDim::Dim1D),
        "2D" => Some(ImageDim::Dim2D),
        "3D" => Some(ImageDim::Dim3D),
        _ => None,
    };
    for (prefix, kind) in [
        ("", ScalarKind::Float),
        ("i", ScalarKind::Int),
        ("u", ScalarKind::Uint),
    ] {
        if let Some(rest) = word.strip_prefix(prefix) {
            if let Some(d) = rest.strip_prefix("image").and_then(dim) {
                return Some(BuiltinType::Image(d, kind));
            }
            if let Some(d) = rest.strip_prefix("sampler").and_then(dim) {
                return Some(BuiltinType::Sampler(d, kind));
            }
        }
    }
    None
}

/// Keyword spelling of a builtin type.
pub fn type_keyword_name(ty: &BuiltinType) -> String {
    let prefix = |k: &ScalarKind| match k {
        ScalarKind::Float => "",
        ScalarKind::Int => "i",
        ScalarKind::Uint => "u",
        ScalarKind::Bool => "b",
        ScalarKind::Double => "d",
    };
    let dim = |d: &ImageDim| match d {
        ImageDim::Dim1D => "1D",
        ImageDim::Dim2D => "2D",
        ImageDim::Dim3D => "3D",
    };
    match ty {
        BuiltinType::Void => "void".to_string(),
        BuiltinType::AtomicUint => "atomic_uint".to_string(),
        BuiltinType::Scalar(k) => match k {
            ScalarKind::Bool => "bool",
            ScalarKind::Int => "int",
            ScalarKind::Uint => "uint",
            ScalarKind::Float => "float",
            ScalarKind::Double => "double",
        }
        .to_string(),
        BuiltinType::Vector(k, n) => format!("{}vec{}", prefix(k), n),
        BuiltinType::Matrix { double, cols, rows } => {
            let d = if *double { "d" } else { "" };
            if cols == rows {
                format!("{}mat{}", d, cols)
            } else {
                format!("{}mat{}x{}", d, cols, rows)
            }
        }
        BuiltinType::Image(d, k) => format!("{}image{}", prefix(k), dim(d)),
        BuiltinType::Sampler(d, k) => format!("{}sampler{}", prefix(k), dim(d)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokKind> {
        Lexer::new(src, 0)
            .tokenize()
            .expect("lex failed")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn numeric_literal_forms() {
        assert_eq!(
            kinds("12 0x1F 017 3u 0xFFFFFFFF"),
            vec![
                TokKind::IntLit(12),
                TokKind::IntLit(31),
                TokKind::IntLit(15),
                TokKind::UintLit(3),
                TokKind::IntLit(-1),
            ]
        );
        assert_eq!(
            kinds("1.5 .5 2e3 1.0f 2.5lf"),
            vec![
                TokKind::FloatLit(1.5),
                TokKind::FloatLit(0.5),
                TokKind::FloatLit(2000.0),
                TokKind::FloatLit(1.0),
                TokKind::DoubleLit(2.5),
            ]
        );
    }

    #[test]
    fn oversized_integer_is_rejected() {
        let err = Lexer::new("4294967296", 0).tokenize().unwrap_err();
        assert!(err.message.contains("too big"));
    }

    #[test]
    fn decimal_int_above_int_max_is_rejected() {
        let err = Lexer::new("4294967295", 0).tokenize().unwrap_err();
        assert_eq!(
            err.message,
            "integer literal 4294967295 does not fit in 'int'; use a 'u' suffix"
        );
        assert_eq!(
            kinds("4294967295u 2147483647 2147483648"),
            vec![
                TokKind::UintLit(u32::MAX),
                TokKind::IntLit(i32::MAX),
                TokKind::IntLit(i32::MIN),
            ]
        );
    }

    #[test]
    fn maximal_munch_operators() {
        assert_eq!(
            kinds("a <<= b >> c ^^ d++"),
            vec![
                TokKind::Ident("a".into()),
                TokKind::ShlEq,
                TokKind::Ident("b".into()),
                TokKind::Shr,
                TokKind::Ident("c".into()),
                TokKind::CaretCaret,
                TokKind::Ident("d".into()),
                TokKind::PlusPlus,
            ]
        );
    }

    #[test]
    fn type_keywords() {
        assert_eq!(
            kinds("mat3x2 uvec4 iimage2D sampler3D"),
            vec![
                TokKind::Type(BuiltinType::Matrix {
                    double: false,
                    cols: 3,
                    rows: 2
                }),
                TokKind::Type(BuiltinType::Vector(ScalarKind::Uint, 4)),
                TokKind::Type(BuiltinType::Image(ImageDim::Dim2D, ScalarKind::Int)),
                TokKind::Type(BuiltinType::Sampler(ImageDim::Dim3D, ScalarKind::Float)),
            ]
        );
        assert_eq!(kinds("vec5"), vec![TokKind::Ident("vec5".into())]);
    }

    #[test]
    fn spans_are_offset_by_base() {
        let toks = Lexer::new("  foo", 10).tokenize().unwrap();
        assert_eq!(toks[0].span, Span { start: 12, end: 15 });
    }

    #[test]
    fn line_start_flag_follows_newlines() {
        let toks = Lexer::new("a b\n c", 0).tokenize().unwrap();
        let flags: Vec<bool> = toks.iter().map(|t| t.line_start).collect();
        assert_eq!(flags, vec![true, false, true]);
    }
}
