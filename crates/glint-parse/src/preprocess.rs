//! Directive processing and macro expansion.
//!
//! Works line by line over the comment-stripped text so that every token
//! keeps its byte offset into the original source. Code lines are lexed as
//! they become active; macro expansion runs over the buffered tokens each
//! time the macro table is about to change and once more at the end.

use crate::lexer::Lexer;
use crate::token::{Tok, TokKind};
use glint_ast::ast::{ExtensionBehavior, ExtensionDirective, VersionDirective, VersionProfile};
use glint_ast::diag::{Diagnostic, Stage};
use glint_ast::span::{LineIndex, Span};
use std::collections::HashMap;

pub const DEFAULT_VERSION: u32 = 460;

/// Value of the predefined `VULKAN` macro.
const VULKAN_VERSION: i32 = 100;

/// Nesting guard for macro expansion.
const MAX_EXPANSION_DEPTH: usize = 64;

pub const KNOWN_EXTENSIONS: &[&str] = &[
    "GL_ARB_compute_shader",
    "GL_ARB_shader_storage_buffer_object",
    "GL_ARB_gpu_shader_fp64",
    "GL_ARB_shader_image_load_store",
    "GL_ARB_shader_image_size",
    "GL_ARB_shader_atomic_counters",
    "GL_KHR_vulkan_glsl",
    "GL_GOOGLE_cpp_style_line_directive",
];

pub struct Preprocessed {
    pub tokens: Vec<Tok>,
    pub version: VersionDirective,
    pub extensions: Vec<ExtensionDirective>,
    pub warnings: Vec<Diagnostic>,
}

fn err(msg: impl Into<String>, span: Span) -> Diagnostic {
    Diagnostic::error(Stage::Syntax, msg).at(span)
}

// ---------------------------------------------------------------------------
// Comments and line continuations
// ---------------------------------------------------------------------------

/// Blank out comments and `\`-newline continuations, keeping byte offsets.
/// Newlines inside block comments survive so line numbers stay put.
pub fn strip_comments(src: &str) -> Result<String, Diagnostic> {
    let bytes = src.as_bytes();
    let mut out = bytes.to_vec();
    let mut i = 0;
    while i < bytes.len() {
        match (bytes[i], bytes.get(i + 1).copied()) {
            (b'/', Some(b'/')) => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    out[i] = b' ';
                    i += 1;
                }
            }
            (b'/', Some(b'*')) => {
                let start = i;
                out[i] = b' ';
                out[i + 1] = b' ';
                i += 2;
                loop {
                    if i >= bytes.len() {
                        return Err(err(
                            "unterminated block comment",
                            Span::new(start as u32, (start + 2) as u32),
                        ));
                    }
                    if bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/') {
                        out[i] = b' ';
                        out[i + 1] = b' ';
                        i += 2;
                        break;
                    }
                    if bytes[i] != b'\n' {
                        out[i] = b' ';
                    }
                    i += 1;
                }
            }
            (b'\\', Some(b'\n')) => {
                out[i] = b' ';
                out[i + 1] = b' ';
                i += 2;
            }
            (b'\\', Some(b'\r')) if bytes.get(i + 2) == Some(&b'\n') => {
                out[i..i + 3].fill(b' ');
                i += 3;
            }
            _ => i += 1,
        }
    }
    String::from_utf8(out).map_err(|_| Diagnostic::error(Stage::Syntax, "source is not valid UTF-8"))
}

// ---------------------------------------------------------------------------
// Macros
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Macro {
    params: Option<Vec<String>>,
    body: Vec<Tok>,
}

impl Macro {
    fn object(kind: TokKind) -> Self {
        Macro {
            params: None,
            body: vec![Tok {
                kind,
                span: Span::default(),
                line_start: false,
            }],
        }
    }

    fn same_definition(&self, other: &Macro) -> bool {
        self.params == other.params
            && self.body.len() == other.body.len()
            && self.body.iter().zip(&other.body).all(|(a, b)| a.kind == b.kind)
    }
}

fn is_predefined(name: &str) -> bool {
    matches!(name, "__LINE__" | "__FILE__" | "__VERSION__" | "VULKAN")
}

/// Conditional-inclusion frame.
struct Cond {
    parent_active: bool,
    taking: bool,
    taken: bool,
    seen_else: bool,
    span: Span,
}

struct Preprocessor {
    lines: LineIndex,
    macros: HashMap<String, Macro>,
    conds: Vec<Cond>,
    pending: Vec<Tok>,
    out: Vec<Tok>,
    version: Option<VersionDirective>,
    extensions: Vec<ExtensionDirective>,
    warnings: Vec<Diagnostic>,
    seen_content: bool,
}

pub fn preprocess(src: &str) -> Result<Preprocessed, Diagnostic> {
    let text = strip_comments(src)?;
    let mut pp = Preprocessor::new(src);

    let mut offset = 0usize;
    for line in text.split('\n') {
        pp.line(line, offset as u32)?;
        offset += line.len() + 1;
    }
    if let Some(open) = pp.conds.last() {
        return Err(err("missing #endif", open.span));
    }
    pp.flush()?;

    let version = pp.version.unwrap_or(VersionDirective {
        number: DEFAULT_VERSION,
        profile: VersionProfile::Core,
        span: None,
    });
    log::trace!(
        "preprocessed {} tokens, version {}",
        pp.out.len(),
        version.number
    );
    Ok(Preprocessed {
        tokens: pp.out,
        version,
        extensions: pp.extensions,
        warnings: pp.warnings,
    })
}

impl Preprocessor {
    fn new(src: &str) -> Self {
        let mut macros = HashMap::new();
        macros.insert(
            "__VERSION__".to_string(),
            Macro::object(TokKind::IntLit(DEFAULT_VERSION as i32)),
        );
        macros.insert("VULKAN".to_string(), Macro::object(TokKind::IntLit(VULKAN_VERSION)));
        macros.insert("GL_core_profile".to_string(), Macro::object(TokKind::IntLit(1)));
        for ext in KNOWN_EXTENSIONS {
            macros.insert(ext.to_string(), Macro::object(TokKind::IntLit(1)));
        }
        Preprocessor {
            lines: LineIndex::new(src),
            macros,
            conds: Vec::new(),
            pending: Vec::new(),
            out: Vec::new(),
            version: None,
            extensions: Vec::new(),
            warnings: Vec::new(),
            seen_content: false,
        }
    }

    fn active(&self) -> bool {
        self.conds.iter().all(|c| c.taking)
    }

    fn line(&mut self, line: &str, offset: u32) -> Result<(), Diagnostic> {
        let trimmed = line.trim_start();
        if !trimmed.starts_with('#') {
            if self.active() {
                let toks = Lexer::new(line, offset).tokenize()?;
                if !toks.is_empty() {
                    self.seen_content = true;
                }
                self.pending.extend(toks);
            }
            return Ok(());
        }

        let hash = line.len() - trimmed.len();
        let after = &line[hash + 1..];
        let name_start = hash + 1 + (after.len() - after.trim_start().len());
        let name_len = line[name_start..]
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
            .count();
        let name_end = name_start + name_len;
        let name = &line[name_start..name_end];
        let name_span = Span::new(offset + hash as u32, offset + name_end as u32);
        let rest = &line[name_end..];
        let rest_offset = offset + name_end as u32;

        match name {
            "ifdef" | "ifndef" | "if" => {
                let parent = self.active();
                let cond = if parent {
                    self.condition(name, rest, rest_offset, name_span)?
                } else {
                    false
                };
                self.conds.push(Cond {
                    parent_active: parent,
                    taking: parent && cond,
                    taken: cond,
                    seen_else: false,
                    span: name_span,
                });
                self.seen_content = true;
                return Ok(());
            }
            "elif" => {
                let (parent, taken) = match self.conds.last() {
                    None => return Err(err("#elif without #if", name_span)),
                    Some(c) if c.seen_else => return Err(err("#elif after #else", name_span)),
                    Some(c) => (c.parent_active, c.taken),
                };
                let cond = if parent && !taken {
                    self.condition("if", rest, rest_offset, name_span)?
                } else {
                    false
                };
                if let Some(c) = self.conds.last_mut() {
                    c.taking = parent && !taken && cond;
                    c.taken |= cond;
                }
                return Ok(());
            }
            "else" => {
                let Some(c) = self.conds.last_mut() else {
                    return Err(err("#else without #if", name_span));
                };
                if c.seen_else {
                    return Err(err("#else after #else", name_span));
                }
                c.seen_else = true;
                c.taking = c.parent_active && !c.taken;
                c.taken = true;
                return Ok(());
            }
            "endif" => {
                if self.conds.pop().is_none() {
                    return Err(err("#endif without #if", name_span));
                }
                return Ok(());
            }
            _ => {}
        }

        if !self.active() {
            return Ok(());
        }

        match name {
            "" => {}
            "version" => self.version_directive(rest, rest_offset, name_span)?,
            "extension" => {
                self.seen_content = true;
                self.extension_directive(rest, rest_offset, name_span)?
            }
            "define" => {
                self.seen_content = true;
                self.define(rest, rest_offset, name_span)?
            }
            "undef" => {
                self.seen_content = true;
                let toks = Lexer::new(rest, rest_offset).tokenize()?;
                let Some(Tok {
                    kind: TokKind::Ident(macro_name),
                    span,
                    ..
                }) = toks.first()
                else {
                    return Err(err("#undef requires a macro name", name_span));
                };
                if is_predefined(macro_name) {
                    return Err(err(
                        format!("predefined macro '{}' cannot be undefined", macro_name),
                        *span,
                    ));
                }
                self.flush()?;
                self.macros.remove(macro_name);
            }
            "error" => {
                let message = rest.trim();
                let end = offset + line.trim_end().len() as u32;
                return Err(err(
                    format!("#error {}", message),
                    Span::new(name_span.start, end.max(name_span.end)),
                ));
            }
            "pragma" | "line" => {
                self.seen_content = true;
            }
            other => {
                return Err(err(
                    format!("invalid directive '#{}'", other),
                    name_span,
                ))
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // #version / #extension
    // -----------------------------------------------------------------------

    fn version_directive(&mut self, rest: &str, base: u32, at: Span) -> Result<(), Diagnostic> {
        if self.version.is_some() {
            return Err(err("#version directive appears more than once", at));
        }
        if self.seen_content {
            return Err(err("#version must occur first in shader", at));
        }
        let toks = Lexer::new(rest, base).tokenize()?;
        let mut it = toks.iter();
        let number = match it.next() {
            Some(Tok {
                kind: TokKind::IntLit(n),
                ..
            }) if *n > 0 => *n as u32,
            _ => return Err(err("#version requires a version number", at)),
        };
        let profile = match it.next().map(|t| &t.kind) {
            None => VersionProfile::Core,
            Some(TokKind::Ident(p)) if p == "core" => VersionProfile::Core,
            Some(TokKind::Ident(p)) if p == "compatibility" => VersionProfile::Compatibility,
            Some(TokKind::Ident(p)) if p == "es" => VersionProfile::Es,
            Some(_) => {
                return Err(err(
                    "bad profile name; use es, core, or compatibility",
                    at,
                ))
            }
        };
        if it.next().is_some() {
            return Err(err("unexpected tokens following #version", at));
        }
        let span = toks.last().map_or(at, |t| at.to(t.span));

        match profile {
            VersionProfile::Es => match number {
                310 | 320 => {}
                100 | 300 => {
                    return Err(err(
                        "compute shaders require #version 310 es or later",
                        span,
                    ))
                }
                _ => return Err(err(format!("version number {} not supported", number), span)),
            },
            VersionProfile::Core | VersionProfile::Compatibility => match number {
                430 | 440 | 450 | 460 => {}
                110 | 120 | 130 | 140 | 150 | 330 | 400 | 410 | 420 => {
                    return Err(err(
                        "compute shaders require #version 430 or later",
                        span,
                    ))
                }
                _ => return Err(err(format!("version number {} not supported", number), span)),
            },
        }
        if profile == VersionProfile::Compatibility {
            return Err(err(
                "compatibility profile not supported when generating SPIR-V for Vulkan",
                span,
            ));
        }

        self.macros.insert(
            "__VERSION__".to_string(),
            Macro::object(TokKind::IntLit(number as i32)),
        );
        if profile == VersionProfile::Es {
            self.macros.remove("GL_core_profile");
            self.macros
                .insert("GL_es_profile".to_string(), Macro::object(TokKind::IntLit(1)));
        }
        self.version = Some(VersionDirective {
            number,
            profile,
            span: Some(span),
        });
        Ok(())
    }

    fn extension_directive(&mut self, rest: &str, base: u32, at: Span) -> Result<(), Diagnostic> {
        let toks = Lexer::new(rest, base).tokenize()?;
        let kinds: Vec<&TokKind> = toks.iter().map(|t| &t.kind).collect();
        let (name, behavior) = match kinds.as_slice() {
            [TokKind::Ident(name), TokKind::Colon, TokKind::Ident(behavior)] => (name, behavior),
            _ => {
                return Err(err(
                    "#extension must be of the form '#extension name : behavior'",
                    at,
                ))
            }
        };
        let span = toks.last().map_or(at, |t| at.to(t.span));
        let behavior = match behavior.as_str() {
            "require" => ExtensionBehavior::Require,
            "enable" => ExtensionBehavior::Enable,
            "warn" => ExtensionBehavior::Warn,
            "disable" => ExtensionBehavior::Disable,
            other => {
                return Err(err(
                    format!("bad extension behavior '{}'", other),
                    span,
                ))
            }
        };

        if name == "all" {
            if matches!(
                behavior,
                ExtensionBehavior::Require | ExtensionBehavior::Enable
            ) {
                return Err(err(
                    "extension 'all' cannot have 'require' or 'enable' behavior",
                    span,
                ));
            }
        } else if !KNOWN_EXTENSIONS.contains(&name.as_str()) {
            match behavior {
                ExtensionBehavior::Require => {
                    return Err(err(format!("extension '{}' is not supported", name), span))
                }
                ExtensionBehavior::Enable | ExtensionBehavior::Warn => {
                    log::warn!("unsupported extension '{}'", name);
                    self.warnings.push(
                        Diagnostic::warning(
                            Stage::Syntax,
                            format!("extension '{}' is not supported", name),
                        )
                        .at(span),
                    );
                }
                ExtensionBehavior::Disable => {}
            }
        }
        self.extensions.push(ExtensionDirective {
            name: name.clone(),
            behavior,
            span,
        });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // #define
    // -----------------------------------------------------------------------

    fn define(&mut self, rest: &str, base: u32, at: Span) -> Result<(), Diagnostic> {
        let toks = Lexer::new(rest, base).tokenize()?;
        let mut it = toks.into_iter().peekable();
        let (name, name_span) = match it.next() {
            Some(Tok {
                kind: TokKind::Ident(name),
                span,
                ..
            }) => (name, span),
            Some(t) => {
                return Err(err(
                    format!("macro name must be an identifier, found {}", t.kind.describe()),
                    t.span,
                ))
            }
            None => return Err(err("#define requires a macro name", at)),
        };
        if is_predefined(&name) || name.starts_with("GL_") {
            return Err(err(
                format!("macro name '{}' is reserved", name),
                name_span,
            ));
        }

        // function-like only when `(` follows the name with no space
        let params = match it.peek() {
            Some(t) if t.kind == TokKind::LParen && t.span.start == name_span.end => {
                it.next();
                let mut params = Vec::new();
                loop {
                    match it.next() {
                        Some(Tok {
                            kind: TokKind::RParen,
                            ..
                        }) if params.is_empty() => break,
                        Some(Tok {
                            kind: TokKind::Ident(p),
                            span,
                            ..
                        }) => {
                            if params.contains(&p) {
                                return Err(err(
                                    format!("duplicate macro parameter '{}'", p),
                                    span,
                                ));
                            }
                            params.push(p);
                            match it.next().map(|t| t.kind) {
                                Some(TokKind::Comma) => continue,
                                Some(TokKind::RParen) => break,
                                _ => return Err(err("bad macro parameter list", name_span)),
                            }
                        }
                        _ => return Err(err("bad macro parameter list", name_span)),
                    }
                }
                Some(params)
            }
            _ => None,
        };

        let body: Vec<Tok> = it.collect();
        if let Some(t) = body
            .iter()
            .find(|t| matches!(t.kind, TokKind::Hash | TokKind::HashHash))
        {
            return Err(err(
                "stringizing and token pasting are not supported",
                t.span,
            ));
        }
        let def = Macro { params, body };
        if let Some(old) = self.macros.get(&name) {
            if !old.same_definition(&def) {
                return Err(err(format!("macro '{}' redefined", name), name_span));
            }
            return Ok(());
        }
        self.flush()?;
        log::trace!("#define {}", name);
        self.macros.insert(name, def);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // #if / #ifdef / #ifndef
    // -----------------------------------------------------------------------

    fn condition(&self, kind: &str, rest: &str, base: u32, at: Span) -> Result<bool, Diagnostic> {
        let toks = Lexer::new(rest, base).tokenize()?;
        if kind == "ifdef" || kind == "ifndef" {
            let name = match toks.as_slice() {
                [Tok {
                    kind: TokKind::Ident(n),
                    ..
                }] => n,
                _ => return Err(err(format!("#{} requires a single macro name", kind), at)),
            };
            let defined = self.is_defined(name);
            return Ok(if kind == "ifdef" { defined } else { !defined });
        }
        if toks.is_empty() {
            return Err(err("#if with no expression", at));
        }

        let mut resolved = Vec::with_capacity(toks.len());
        let mut i = 0;
        while i < toks.len() {
            if toks[i].kind == TokKind::Ident("defined".to_string()) {
                let (name, span, next) = match (toks.get(i + 1), toks.get(i + 2), toks.get(i + 3))
                {
                    (
                        Some(Tok {
                            kind: TokKind::LParen,
                            ..
                        }),
                        Some(Tok {
                            kind: TokKind::Ident(n),
                            ..
                        }),
                        Some(
                            close @ Tok {
                                kind: TokKind::RParen,
                                ..
                            },
                        ),
                    ) => (n, toks[i].span.to(close.span), i + 4),
                    (
                        Some(t @ Tok {
                            kind: TokKind::Ident(n),
                            ..
                        }),
                        _,
                        _,
                    ) => (n, toks[i].span.to(t.span), i + 2),
                    _ => return Err(err("'defined' requires a macro name", toks[i].span)),
                };
                resolved.push(Tok {
                    kind: TokKind::IntLit(self.is_defined(name) as i32),
                    span,
                    line_start: false,
                });
                i = next;
            } else {
                resolved.push(toks[i].clone());
                i += 1;
            }
        }

        let mut expanded = Vec::new();
        self.expand(&resolved, &mut expanded, &mut Vec::new())?;
        let mut eval = CondEval {
            toks: &expanded,
            pos: 0,
            at,
        };
        let value = eval.expr(0)?;
        if eval.pos < expanded.len() {
            return Err(err(
                "unexpected token in preprocessor expression",
                expanded[eval.pos].span,
            ));
        }
        Ok(value != 0)
    }

    fn is_defined(&self, name: &str) -> bool {
        name == "__LINE__" || self.macros.contains_key(name)
    }

    // -----------------------------------------------------------------------
    // Expansion
    // -----------------------------------------------------------------------

    /// Expand the buffered code tokens with the current macro table.
    fn flush(&mut self) -> Result<(), Diagnostic> {
        let pending = std::mem::take(&mut self.pending);
        let mut out = std::mem::take(&mut self.out);
        self.expand(&pending, &mut out, &mut Vec::new())?;
        self.out = out;
        Ok(())
    }

    fn expand(
        &self,
        input: &[Tok],
        out: &mut Vec<Tok>,
        expanding: &mut Vec<String>,
    ) -> Result<(), Diagnostic> {
        let mut i = 0;
        while i < input.len() {
            let tok = &input[i];
            let TokKind::Ident(name) = &tok.kind else {
                out.push(tok.clone());
                i += 1;
                continue;
            };
            if name == "__LINE__" {
                let line = self.lines.location(tok.span).line;
                out.push(Tok {
                    kind: TokKind::IntLit(line as i32),
                    span: tok.span,
                    line_start: tok.line_start,
                });
                i += 1;
                continue;
            }
            let Some(mac) = self.macros.get(name).filter(|_| !expanding.contains(name)) else {
                out.push(tok.clone());
                i += 1;
                continue;
            };
            if expanding.len() >= MAX_EXPANSION_DEPTH {
                return Err(err("macro expansion nested too deeply", tok.span));
            }

            let (replacement, use_span, next) = match &mac.params {
                None => (mac.body.clone(), tok.span, i + 1),
                Some(params) => {
                    if input.get(i + 1).map(|t| &t.kind) != Some(&TokKind::LParen) {
                        // a function-like macro name without arguments is a plain identifier
                        out.push(tok.clone());
                        i += 1;
                        continue;
                    }
                    let (args, close) = collect_args(input, i + 2, tok)?;
                    let use_span = tok.span.to(input[close].span);
                    let arity_ok = args.len() == params.len()
                        || (params.is_empty() && args.len() == 1 && args[0].is_empty());
                    if !arity_ok {
                        return Err(err(
                            format!(
                                "macro '{}' expects {} argument(s), found {}",
                                name,
                                params.len(),
                                args.len()
                            ),
                            use_span,
                        ));
                    }
                    let mut expanded_args = Vec::with_capacity(args.len());
                    for arg in &args {
                        let mut e = Vec::new();
                        self.expand(arg, &mut e, expanding)?;
                        expanded_args.push(e);
                    }
                    let mut body = Vec::new();
                    for t in &mac.body {
                        match &t.kind {
                            TokKind::Ident(p) if params.contains(p) => {
                                let idx = params.iter().position(|q| q == p).unwrap_or(0);
                                body.extend(expanded_args[idx].iter().cloned());
                            }
                            _ => body.push(t.clone()),
                        }
                    }
                    (body, use_span, close + 1)
                }
            };

            let relocated: Vec<Tok> = replacement
                .into_iter()
                .map(|t| Tok {
                    kind: t.kind,
                    span: use_span,
                    line_start: false,
                })
                .collect();
            expanding.push(name.clone());
            self.expand(&relocated, out, expanding)?;
            expanding.pop();
            i = next;
        }
        Ok(())
    }
}

/// Split macro arguments at top-level commas, starting just after `(`.
/// Returns the arguments and the index of the closing `)`.
fn collect_args(input: &[Tok], start: usize, name: &Tok) -> Result<(Vec<Vec<Tok>>, usize), Diagnostic> {
    let mut args = vec![Vec::new()];
    let mut depth = 0usize;
    let mut i = start;
    while i < input.len() {
        let t = &input[i];
        match t.kind {
            TokKind::LParen | TokKind::LBracket | TokKind::LBrace => depth += 1,
            TokKind::RParen if depth == 0 => return Ok((args, i)),
            TokKind::RParen | TokKind::RBracket | TokKind::RBrace => depth = depth.saturating_sub(1),
            TokKind::Comma if depth == 0 => {
                args.push(Vec::new());
                i += 1;
                continue;
            }
            _ => {}
        }
        if let Some(last) = args.last_mut() {
            last.push(t.clone());
        }
        i += 1;
    }
    Err(err(
        "unterminated argument list invoking macro",
        name.span,
    ))
}

// ---------------------------------------------------------------------------
// #if expression evaluation
// ---------------------------------------------------------------------------

struct CondEval<'t> {
    toks: &'t [Tok],
    pos: usize,
    at: Span,
}

impl<'t> CondEval<'t> {
    fn peek(&self) -> Option<&'t TokKind> {
        self.toks.get(self.pos).map(|t| &t.kind)
    }

    fn span(&self) -> Span {
        self.toks.get(self.pos).map_or(self.at, |t| t.span)
    }

    fn expr(&mut self, min_bp: u8) -> Result<i64, Diagnostic> {
        let mut lhs = self.unary()?;
        loop {
            let bp = match self.peek() {
                Some(TokKind::OrOr) => 1,
                Some(TokKind::AndAnd) => 2,
                Some(TokKind::Pipe) => 3,
                Some(TokKind::Caret) => 4,
                Some(TokKind::Amp) => 5,
                Some(TokKind::EqEq | TokKind::BangEq) => 6,
                Some(TokKind::Lt | TokKind::Gt | TokKind::Le | TokKind::Ge) => 7,
                Some(TokKind::Shl | TokKind::Shr) => 8,
                Some(TokKind::Plus | TokKind::Minus) => 9,
                Some(TokKind::Star | TokKind::Slash | TokKind::Percent) => 10,
                _ => break,
            };
            if bp <= min_bp {
                break;
            }
            let op_span = self.span();
            let op = self.toks[self.pos].kind.clone();
            self.pos += 1;
            let rhs = self.expr(bp)?;
            lhs = match op {
                TokKind::OrOr => ((lhs != 0) || (rhs != 0)) as i64,
                TokKind::AndAnd => ((lhs != 0) && (rhs != 0)) as i64,
                TokKind::Pipe => lhs | rhs,
                TokKind::Caret => lhs ^ rhs,
                TokKind::Amp => lhs & rhs,
                TokKind::EqEq => (lhs == rhs) as i64,
                TokKind::BangEq => (lhs != rhs) as i64,
                TokKind::Lt => (lhs < rhs) as i64,
                TokKind::Gt => (lhs > rhs) as i64,
                TokKind::Le => (lhs <= rhs) as i64,
                TokKind::Ge => (lhs >= rhs) as i64,
                TokKind::Shl => lhs.wrapping_shl(rhs as u32),
                TokKind::Shr => lhs.wrapping_shr(rhs as u32),
                TokKind::Plus => lhs.wrapping_add(rhs),
                TokKind::Minus => lhs.wrapping_sub(rhs),
                TokKind::Star => lhs.wrapping_mul(rhs),
                TokKind::Slash | TokKind::Percent => {
                    if rhs == 0 {
                        return Err(err("division by zero in preprocessor expression", op_span));
                    }
                    if op == TokKind::Slash {
                        lhs.wrapping_div(rhs)
                    } else {
                        lhs.wrapping_rem(rhs)
                    }
                }
                _ => lhs,
            };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<i64, Diagnostic> {
        let span = self.span();
        let Some(kind) = self.peek() else {
            return Err(err("incomplete preprocessor expression", self.at));
        };
        self.pos += 1;
        match kind {
            TokKind::IntLit(v) => Ok(*v as i64),
            TokKind::UintLit(v) => Ok(*v as i64),
            // identifiers that survive expansion are undefined macros
            TokKind::Ident(_) => Ok(0),
            TokKind::Minus => Ok(self.unary()?.wrapping_neg()),
            TokKind::Plus => self.unary(),
            TokKind::Bang => Ok((self.unary()? == 0) as i64),
            TokKind::Tilde => Ok(!self.unary()?),
            TokKind::LParen => {
                let v = self.expr(0)?;
                match self.peek() {
                    Some(TokKind::RParen) => {
                        self.pos += 1;
                        Ok(v)
                    }
                    _ => Err(err("missing ')' in preprocessor expression", self.span())),
                }
            }
            other => Err(err(
                format!("unexpected {} in preprocessor expression", other.describe()),
                span,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_keep_offsets_and_newlines() {
        let src = "a // tail\nb /* x\ny */ c";
        let out = strip_comments(src).expect("strip");
        assert_eq!(out.len(), src.len());
        assert_eq!(out.matches('\n').count(), 2);
        assert_eq!(out.find('c'), src.rfind('c'));
    }

    #[test]
    fn condition_arithmetic() {
        let pp = Preprocessor::new("");
        let at = Span::default();
        assert!(pp.condition("if", "(1 + 2) * 3 == 9", 0, at).unwrap());
        assert!(!pp.condition("if", "UNDEFINED_NAME", 0, at).unwrap());
        assert!(pp.condition("if", "-1 < 0 && ~0 == -1", 0, at).unwrap());
        assert!(pp.condition("if", "1 / 0", 0, at).is_err());
    }
}
