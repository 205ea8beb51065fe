use crate::lexer::{is_unsupported_type, type_keyword_name};
use crate::preprocess::preprocess;
use crate::token::{Tok, TokKind};
use glint_ast::ast::{
    ArraySpec, AuxQualifier, BinOp, Block, BlockDecl, BuiltinType, Callee, Declarator, Expr,
    ExtensionDirective, ExternalDecl, FunctionDef, FunctionProto, Ident, LayoutQualifierId, Lit,
    MemberDecl, MemoryQualifier, ParamDecl, Precision, PrecisionDecl, QualifierDecl, Stmt,
    StorageQualifier, StructDecl, TranslationUnit, TypeName, TypeQualifier, TypeSpec, UnOp,
    VarDecl, VersionDirective,
};
use glint_ast::diag::{Diagnostic, Stage, StageResult, Staged};
use glint_ast::span::Span;
use glint_ast::limits::Limits;
use std::collections::HashSet;

/// Statement and expression nesting limit.
pub const MAX_NESTING: usize = 256;

type PResult<T> = Result<T, Diagnostic>;

/// Preprocess and parse one compute shader.
///
/// Parsing stops at the first syntax error; the error is the only entry of
/// the returned list.
pub fn parse_str(src: &str, limits: &Limits) -> StageResult<TranslationUnit> {
    let pre = preprocess(src).map_err(|d| vec![d])?;
    let mut p = Parser::new(pre.tokens, src.len() as u32, limits);
    let unit = p
        .parse_unit(pre.version, pre.extensions)
        .map_err(|d| vec![d])?;
    log::debug!("parsed {} external declarations", unit.items.len());
    Ok(Staged::new(unit, pre.warnings))
}

struct Parser<'l> {
    toks: Vec<Tok>,
    pos: usize,
    eof: Tok,
    prev_end: u32,
    depth: usize,
    struct_names: HashSet<String>,
    limits: &'l Limits,
}

fn syntax(msg: impl Into<String>, span: Span) -> Diagnostic {
    Diagnostic::error(Stage::Syntax, msg).at(span)
}

impl<'l> Parser<'l> {
    fn new(toks: Vec<Tok>, src_len: u32, limits: &'l Limits) -> Self {
        Self {
            toks,
            pos: 0,
            eof: Tok {
                kind: TokKind::Eof,
                span: Span::new(src_len, src_len),
                line_start: false,
            },
            prev_end: 0,
            depth: 0,
            struct_names: HashSet::new(),
            limits,
        }
    }

    fn cur(&self) -> &Tok {
        self.toks.get(self.pos).unwrap_or(&self.eof)
    }

    fn nth(&self, n: usize) -> &TokKind {
        &self.toks.get(self.pos + n).unwrap_or(&self.eof).kind
    }

    fn bump(&mut self) -> Tok {
        let t = self.cur().clone();
        if self.pos < self.toks.len() {
            self.pos += 1;
            self.prev_end = t.span.end;
        }
        t
    }

    fn at(&self, k: &TokKind) -> bool {
        std::mem::discriminant(&self.cur().kind) == std::mem::discriminant(k)
    }

    fn eat(&mut self, k: &TokKind) -> bool {
        if self.at(k) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, k: TokKind) -> PResult<Tok> {
        if self.at(&k) {
            Ok(self.bump())
        } else {
            Err(self.unexpected(&format!("'{}'", k.spelling())))
        }
    }

    fn unexpected(&self, expected: &str) -> Diagnostic {
        let cur = self.cur();
        match &cur.kind {
            TokKind::Reserved(w) => self.reserved(w, cur.span),
            other => syntax(
                format!("expected {}, found {}", expected, other.describe()),
                cur.span,
            ),
        }
    }

    fn reserved(&self, word: &str, span: Span) -> Diagnostic {
        if is_unsupported_type(word) {
            syntax(format!("type '{}' is not supported", word), span)
        } else {
            syntax(format!("'{}' is a reserved word", word), span)
        }
    }

    fn span_from(&self, start: u32) -> Span {
        Span::new(start, self.prev_end.max(start))
    }

    fn enter(&mut self) -> PResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(syntax(
                format!("nesting deeper than {} levels", MAX_NESTING),
                self.cur().span,
            ));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Left-folded chains build a tree as deep as they are long, so every
    /// fold counts against the nesting limit until the chain ends.
    fn fold(&mut self, folds: &mut usize) -> PResult<()> {
        self.enter()?;
        *folds += 1;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Translation unit
    // ---------------------------------------------------------------------

    fn parse_unit(
        &mut self,
        version: VersionDirective,
        extensions: Vec<ExtensionDirective>,
    ) -> PResult<TranslationUnit> {
        if self.toks.is_empty() {
            return Err(syntax("shader source is empty", self.eof.span));
        }
        let start = self.cur().span.start;
        let mut items = Vec::new();
        while !self.at(&TokKind::Eof) {
            if self.eat(&TokKind::Semicolon) {
                continue;
            }
            items.push(self.parse_external()?);
        }
        Ok(TranslationUnit {
            version,
            extensions,
            items,
            span: self.span_from(start),
        })
    }

    fn parse_external(&mut self) -> PResult<ExternalDecl> {
        let start = self.cur().span.start;
        if self.at(&TokKind::KwPrecision) {
            return Ok(ExternalDecl::Precision(self.parse_precision_decl()?));
        }

        let qualifier = self.parse_qualifiers()?;
        if !qualifier.is_empty() && self.at(&TokKind::Semicolon) {
            self.bump();
            return Ok(ExternalDecl::Qualifier(QualifierDecl {
                qualifier,
                span: self.span_from(start),
            }));
        }

        let is_interface = matches!(
            qualifier.storage(),
            Some(
                StorageQualifier::Uniform
                    | StorageQualifier::Buffer
                    | StorageQualifier::In
                    | StorageQualifier::Out
                    | StorageQualifier::Shared
            )
        );
        if is_interface
            && matches!(self.cur().kind, TokKind::Ident(_))
            && matches!(self.nth(1), TokKind::LBrace)
        {
            return Ok(ExternalDecl::Block(self.parse_block_decl(qualifier, start)?));
        }

        let ty = self.parse_type_spec()?;
        if matches!(self.cur().kind, TokKind::Ident(_)) && matches!(self.nth(1), TokKind::LParen) {
            let bad_storage = qualifier
                .storage()
                .is_some_and(|s| s != StorageQualifier::Const);
            if bad_storage || !qualifier.layout.is_empty() {
                return Err(syntax(
                    "return types can only be qualified with 'const' or a precision",
                    qualifier.span,
                ));
            }
            let proto = self.parse_proto(ty, start)?;
            if self.eat(&TokKind::Semicolon) {
                return Ok(ExternalDecl::Prototype(proto));
            }
            if !self.at(&TokKind::LBrace) {
                return Err(self.unexpected("';' or '{'"));
            }
            let body = self.parse_block()?;
            return Ok(ExternalDecl::Function(FunctionDef {
                proto,
                body,
                span: self.span_from(start),
            }));
        }

        let decl = self.parse_var_rest(qualifier, ty, start)?;
        Ok(ExternalDecl::Variable(decl))
    }

    fn parse_precision_decl(&mut self) -> PResult<PrecisionDecl> {
        let start = self.cur().span.start;
        self.expect(TokKind::KwPrecision)?;
        let precision = match self.cur().kind {
            TokKind::KwHighp => Precision::High,
            TokKind::KwMediump => Precision::Medium,
            TokKind::KwLowp => Precision::Low,
            _ => return Err(self.unexpected("precision qualifier")),
        };
        self.bump();
        let ty = self.parse_type_spec()?;
        self.expect(TokKind::Semicolon)?;
        Ok(PrecisionDecl {
            precision,
            ty,
            span: self.span_from(start),
        })
    }

    // ---------------------------------------------------------------------
    // Qualifiers
    // ---------------------------------------------------------------------

    fn at_qualifier(&self) -> bool {
        matches!(
            self.cur().kind,
            TokKind::KwLayout
                | TokKind::KwConst
                | TokKind::KwIn
                | TokKind::KwOut
                | TokKind::KwInOut
                | TokKind::KwUniform
                | TokKind::KwBuffer
                | TokKind::KwShared
                | TokKind::KwCoherent
                | TokKind::KwVolatile
                | TokKind::KwRestrict
                | TokKind::KwReadOnly
                | TokKind::KwWriteOnly
                | TokKind::KwHighp
                | TokKind::KwMediump
                | TokKind::KwLowp
                | TokKind::KwFlat
                | TokKind::KwSmooth
                | TokKind::KwNoPerspective
                | TokKind::KwInvariant
                | TokKind::KwPrecise
        )
    }

    fn parse_qualifiers(&mut self) -> PResult<TypeQualifier> {
        let start = self.cur().span.start;
        let mut q = TypeQualifier::default();
        while self.at_qualifier() {
            let tok = self.bump();
            let span = tok.span;
            let storage = match tok.kind {
                TokKind::KwLayout => {
                    self.parse_layout(&mut q)?;
                    None
                }
                TokKind::KwConst => Some(StorageQualifier::Const),
                TokKind::KwIn => Some(StorageQualifier::In),
                TokKind::KwOut => Some(StorageQualifier::Out),
                TokKind::KwInOut => Some(StorageQualifier::InOut),
                TokKind::KwUniform => Some(StorageQualifier::Uniform),
                TokKind::KwBuffer => Some(StorageQualifier::Buffer),
                TokKind::KwShared => Some(StorageQualifier::Shared),
                TokKind::KwCoherent => {
                    q.memory.push((MemoryQualifier::Coherent, span));
                    None
                }
                TokKind::KwVolatile => {
                    q.memory.push((MemoryQualifier::Volatile, span));
                    None
                }
                TokKind::KwRestrict => {
                    q.memory.push((MemoryQualifier::Restrict, span));
                    None
                }
                TokKind::KwReadOnly => {
                    q.memory.push((MemoryQualifier::ReadOnly, span));
                    None
                }
                TokKind::KwWriteOnly => {
                    q.memory.push((MemoryQualifier::WriteOnly, span));
                    None
                }
                TokKind::KwHighp | TokKind::KwMediump | TokKind::KwLowp => {
                    if q.precision.is_some() {
                        return Err(syntax("only one precision qualifier allowed", span));
                    }
                    q.precision = Some(match tok.kind {
                        TokKind::KwHighp => Precision::High,
                        TokKind::KwMediump => Precision::Medium,
                        _ => Precision::Low,
                    });
                    None
                }
                TokKind::KwFlat => {
                    q.auxiliary.push((AuxQualifier::Flat, span));
                    None
                }
                TokKind::KwSmooth => {
                    q.auxiliary.push((AuxQualifier::Smooth, span));
                    None
                }
                TokKind::KwNoPerspective => {
                    q.auxiliary.push((AuxQualifier::NoPerspective, span));
                    None
                }
                TokKind::KwInvariant => {
                    q.auxiliary.push((AuxQualifier::Invariant, span));
                    None
                }
                _ => {
                    q.auxiliary.push((AuxQualifier::Precise, span));
                    None
                }
            };
            if let Some(s) = storage {
                q.storage = match (q.storage, s) {
                    (None, s) => Some((s, span)),
                    // `const in` on parameters
                    (Some((StorageQualifier::Const, _)), StorageQualifier::In)
                    | (Some((StorageQualifier::In, _)), StorageQualifier::Const) => {
                        Some((StorageQualifier::In, span))
                    }
                    (Some(_), _) => {
                        return Err(syntax("too many storage qualifiers", span));
                    }
                };
            }
        }
        q.span = self.span_from(start);
        Ok(q)
    }

    fn parse_layout(&mut self, q: &mut TypeQualifier) -> PResult<()> {
        self.expect(TokKind::LParen)?;
        loop {
            let start = self.cur().span.start;
            let name = match &self.cur().kind {
                TokKind::Ident(s) => s.clone(),
                // `layout(shared)` names a block layout
                TokKind::KwShared => "shared".to_string(),
                _ => return Err(self.unexpected("layout qualifier name")),
            };
            let name_tok = self.bump();
            let value = if self.eat(&TokKind::Eq) {
                Some(self.parse_conditional()?)
            } else {
                None
            };
            q.layout.push(LayoutQualifierId {
                name: Ident {
                    text: name,
                    span: name_tok.span,
                },
                value,
                span: self.span_from(start),
            });
            if self.eat(&TokKind::Comma) {
                continue;
            }
            self.expect(TokKind::RParen)?;
            return Ok(());
        }
    }

    // ---------------------------------------------------------------------
    // Types
    // ---------------------------------------------------------------------

    fn parse_type_spec(&mut self) -> PResult<TypeSpec> {
        let start = self.cur().span.start;
        let name = match self.cur().kind.clone() {
            TokKind::KwStruct => TypeName::Struct(Box::new(self.parse_struct()?)),
            TokKind::Type(bt) => {
                self.bump();
                TypeName::Builtin(bt)
            }
            TokKind::Ident(s) => {
                let tok = self.bump();
                TypeName::Named(Ident {
                    text: s,
                    span: tok.span,
                })
            }
            TokKind::Reserved(w) => return Err(self.reserved(&w, self.cur().span)),
            _ => return Err(self.unexpected("type")),
        };
        let array = self.parse_array_spec()?;
        Ok(TypeSpec {
            name,
            array,
            span: self.span_from(start),
        })
    }

    fn parse_array_spec(&mut self) -> PResult<Option<ArraySpec>> {
        if !self.at(&TokKind::LBracket) {
            return Ok(None);
        }
        let start = self.cur().span.start;
        let mut dims = Vec::new();
        while self.eat(&TokKind::LBracket) {
            if self.eat(&TokKind::RBracket) {
                dims.push(None);
                continue;
            }
            let size = self.parse_conditional()?;
            self.expect(TokKind::RBracket)?;
            dims.push(Some(size));
        }
        Ok(Some(ArraySpec {
            dims,
            span: self.span_from(start),
        }))
    }

    fn parse_struct(&mut self) -> PResult<StructDecl> {
        let start = self.cur().span.start;
        self.expect(TokKind::KwStruct)?;
        let name = match &self.cur().kind {
            TokKind::Ident(_) => Some(self.parse_ident()?),
            _ => None,
        };
        if let Some(n) = &name {
            self.struct_names.insert(n.text.clone());
        }
        self.expect(TokKind::LBrace)?;
        let members = self.parse_members()?;
        Ok(StructDecl {
            name,
            members,
            span: self.span_from(start),
        })
    }

    /// Member declarations up to and including the closing `}`.
    fn parse_members(&mut self) -> PResult<Vec<MemberDecl>> {
        let mut members = Vec::new();
        while !self.eat(&TokKind::RBrace) {
            if self.at(&TokKind::Eof) {
                return Err(self.unexpected("'}'"));
            }
            let start = self.cur().span.start;
            let qualifier = self.parse_qualifiers()?;
            let ty = self.parse_type_spec()?;
            let mut declarators = Vec::new();
            loop {
                let d_start = self.cur().span.start;
                let name = self.parse_ident()?;
                let array = self.parse_array_spec()?;
                if self.at(&TokKind::Eq) {
                    return Err(syntax(
                        "member declarations cannot have initializers",
                        self.cur().span,
                    ));
                }
                declarators.push(Declarator {
                    name,
                    array,
                    init: None,
                    span: self.span_from(d_start),
                });
                if !self.eat(&TokKind::Comma) {
                    break;
                }
            }
            self.expect(TokKind::Semicolon)?;
            members.push(MemberDecl {
                qualifier,
                ty,
                declarators,
                span: self.span_from(start),
            });
        }
        if members.is_empty() {
            return Err(syntax(
                "blocks and structures must have at least one member",
                Span::new(self.prev_end.saturating_sub(1), self.prev_end),
            ));
        }
        Ok(members)
    }

    fn parse_block_decl(&mut self, qualifier: TypeQualifier, start: u32) -> PResult<BlockDecl> {
        let name = self.parse_ident()?;
        self.expect(TokKind::LBrace)?;
        let members = self.parse_members()?;
        let instance = if matches!(self.cur().kind, TokKind::Ident(_)) {
            let d_start = self.cur().span.start;
            let name = self.parse_ident()?;
            let array = self.parse_array_spec()?;
            Some(Declarator {
                name,
                array,
                init: None,
                span: self.span_from(d_start),
            })
        } else {
            None
        };
        self.expect(TokKind::Semicolon)?;
        Ok(BlockDecl {
            qualifier,
            name,
            members,
            instance,
            span: self.span_from(start),
        })
    }

    fn parse_ident(&mut self) -> PResult<Ident> {
        match &self.cur().kind {
            TokKind::Ident(s) => {
                let text = s.clone();
                let tok = self.bump();
                Ok(Ident {
                    text,
                    span: tok.span,
                })
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    // ---------------------------------------------------------------------
    // Declarations
    // ---------------------------------------------------------------------

    /// Declarator list after the type, through the terminating `;`.
    fn parse_var_rest(
        &mut self,
        qualifier: TypeQualifier,
        ty: TypeSpec,
        start: u32,
    ) -> PResult<VarDecl> {
        let mut declarators = Vec::new();
        if !self.at(&TokKind::Semicolon) {
            loop {
                let d_start = self.cur().span.start;
                let name = self.parse_ident()?;
                let array = self.parse_array_spec()?;
                let init = if self.eat(&TokKind::Eq) {
                    if self.at(&TokKind::LBrace) {
                        return Err(syntax(
                            "initializer lists are not supported; use a constructor",
                            self.cur().span,
                        ));
                    }
                    Some(self.parse_assign()?)
                } else {
                    None
                };
                declarators.push(Declarator {
                    name,
                    array,
                    init,
                    span: self.span_from(d_start),
                });
                if !self.eat(&TokKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokKind::Semicolon)?;
        Ok(VarDecl {
            qualifier,
            ty,
            declarators,
            span: self.span_from(start),
        })
    }

    fn parse_proto(&mut self, ret: TypeSpec, start: u32) -> PResult<FunctionProto> {
        let name = self.parse_ident()?;
        self.expect(TokKind::LParen)?;
        let mut params = Vec::new();
        let void_only = matches!(self.cur().kind, TokKind::Type(BuiltinType::Void))
            && matches!(self.nth(1), TokKind::RParen);
        if void_only {
            self.bump();
        } else if !self.at(&TokKind::RParen) {
            loop {
                params.push(self.parse_param()?);
                if !self.eat(&TokKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokKind::RParen)?;
        Ok(FunctionProto {
            ret,
            name,
            params,
            span: self.span_from(start),
        })
    }

    fn parse_param(&mut self) -> PResult<ParamDecl> {
        let start = self.cur().span.start;
        let qualifier = self.parse_qualifiers()?;
        let ty = self.parse_type_spec()?;
        let (name, array) = if matches!(self.cur().kind, TokKind::Ident(_)) {
            let name = self.parse_ident()?;
            (Some(name), self.parse_array_spec()?)
        } else {
            (None, None)
        };
        Ok(ParamDecl {
            qualifier,
            ty,
            name,
            array,
            span: self.span_from(start),
        })
    }

    // ---------------------------------------------------------------------
    // Statements
    // ---------------------------------------------------------------------

    fn parse_block(&mut self) -> PResult<Block> {
        let start = self.cur().span.start;
        self.expect(TokKind::LBrace)?;
        self.enter()?;
        let mut stmts = Vec::new();
        while !self.eat(&TokKind::RBrace) {
            if self.at(&TokKind::Eof) {
                return Err(self.unexpected("'}'"));
            }
            stmts.push(self.parse_stmt()?);
        }
        self.leave();
        Ok(Block {
            stmts,
            span: self.span_from(start),
        })
    }

    /// Whether the statement at the cursor is a declaration.
    fn at_declaration(&self) -> bool {
        if self.at_qualifier() || self.at(&TokKind::KwStruct) {
            return true;
        }
        let is_type = match &self.cur().kind {
            TokKind::Type(_) => true,
            TokKind::Ident(s) => self.struct_names.contains(s),
            _ => false,
        };
        if !is_type {
            return false;
        }
        // `T(...)` and `T[..](...)` are constructor calls
        let mut i = 1;
        let mut depth = 0usize;
        loop {
            match self.nth(i) {
                TokKind::LBracket => depth += 1,
                TokKind::RBracket if depth > 0 => depth -= 1,
                TokKind::Eof => return false,
                _ if depth > 0 => {}
                TokKind::LParen => return false,
                TokKind::Ident(_) | TokKind::Reserved(_) => return true,
                _ => return false,
            }
            i += 1;
        }
    }

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        self.enter()?;
        let stmt = self.parse_stmt_inner();
        self.leave();
        stmt
    }

    fn parse_stmt_inner(&mut self) -> PResult<Stmt> {
        let start = self.cur().span.start;
        match self.cur().kind.clone() {
            TokKind::LBrace => Ok(Stmt::Block(self.parse_block()?)),
            TokKind::Semicolon => {
                self.bump();
                Ok(Stmt::Empty {
                    span: self.span_from(start),
                })
            }
            TokKind::KwIf => self.parse_if(),
            TokKind::KwSwitch => {
                self.bump();
                self.expect(TokKind::LParen)?;
                let selector = self.parse_expr()?;
                self.expect(TokKind::RParen)?;
                let body = self.parse_block()?;
                Ok(Stmt::Switch {
                    selector,
                    body,
                    span: self.span_from(start),
                })
            }
            TokKind::KwCase => {
                self.bump();
                let value = self.parse_expr()?;
                self.expect(TokKind::Colon)?;
                Ok(Stmt::Case {
                    value,
                    span: self.span_from(start),
                })
            }
            TokKind::KwDefault => {
                self.bump();
                self.expect(TokKind::Colon)?;
                Ok(Stmt::Default {
                    span: self.span_from(start),
                })
            }
            TokKind::KwFor => self.parse_for(),
            TokKind::KwWhile => {
                let kw = self.bump();
                if !self.limits.while_loops {
                    return Err(syntax(
                        "'while' loops are not supported by the target profile",
                        kw.span,
                    ));
                }
                self.expect(TokKind::LParen)?;
                let cond = self.parse_expr()?;
                self.expect(TokKind::RParen)?;
                let body = Box::new(self.parse_stmt()?);
                Ok(Stmt::While {
                    cond,
                    body,
                    span: self.span_from(start),
                })
            }
            TokKind::KwDo => {
                let kw = self.bump();
                if !self.limits.do_while_loops {
                    return Err(syntax(
                        "'do-while' loops are not supported by the target profile",
                        kw.span,
                    ));
                }
                let body = Box::new(self.parse_stmt()?);
                self.expect(TokKind::KwWhile)?;
                self.expect(TokKind::LParen)?;
                let cond = self.parse_expr()?;
                self.expect(TokKind::RParen)?;
                self.expect(TokKind::Semicolon)?;
                Ok(Stmt::DoWhile {
                    body,
                    cond,
                    span: self.span_from(start),
                })
            }
            TokKind::KwBreak => {
                self.bump();
                self.expect(TokKind::Semicolon)?;
                Ok(Stmt::Break {
                    span: self.span_from(start),
                })
            }
            TokKind::KwContinue => {
                self.bump();
                self.expect(TokKind::Semicolon)?;
                Ok(Stmt::Continue {
                    span: self.span_from(start),
                })
            }
            TokKind::KwDiscard => {
                self.bump();
                self.expect(TokKind::Semicolon)?;
                Ok(Stmt::Discard {
                    span: self.span_from(start),
                })
            }
            TokKind::KwReturn => {
                self.bump();
                let value = if self.at(&TokKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(TokKind::Semicolon)?;
                Ok(Stmt::Return {
                    value,
                    span: self.span_from(start),
                })
            }
            TokKind::KwPrecision => {
                // default precision has no effect on SPIR-V for Vulkan
                self.parse_precision_decl()?;
                Ok(Stmt::Empty {
                    span: self.span_from(start),
                })
            }
            _ if self.at_declaration() => Ok(Stmt::Decl(self.parse_local_decl()?)),
            _ => {
                let expr = self.parse_expr()?;
                self.expect(TokKind::Semicolon)?;
                Ok(Stmt::Expr {
                    expr,
                    span: self.span_from(start),
                })
            }
        }
    }

    fn parse_local_decl(&mut self) -> PResult<VarDecl> {
        let start = self.cur().span.start;
        let qualifier = self.parse_qualifiers()?;
        let ty = self.parse_type_spec()?;
        self.parse_var_rest(qualifier, ty, start)
    }

    fn parse_if(&mut self) -> PResult<Stmt> {
        let start = self.cur().span.start;
        self.expect(TokKind::KwIf)?;
        self.expect(TokKind::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(TokKind::RParen)?;
        let then_ = Box::new(self.parse_stmt()?);
        let else_ = if self.eat(&TokKind::KwElse) {
            Some(Box::new(self.parse_stmt()?))
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then_,
            else_,
            span: self.span_from(start),
        })
    }

    fn parse_for(&mut self) -> PResult<Stmt> {
        let start = self.cur().span.start;
        self.expect(TokKind::KwFor)?;
        self.expect(TokKind::LParen)?;
        let init = if self.at(&TokKind::Semicolon) {
            self.bump();
            None
        } else if self.at_declaration() {
            Some(Box::new(Stmt::Decl(self.parse_local_decl()?)))
        } else {
            let s = self.cur().span.start;
            let expr = self.parse_expr()?;
            self.expect(TokKind::Semicolon)?;
            Some(Box::new(Stmt::Expr {
                expr,
                span: self.span_from(s),
            }))
        };
        let cond = if self.at(&TokKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(TokKind::Semicolon)?;
        let step = if self.at(&TokKind::RParen) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(TokKind::RParen)?;
        let body = Box::new(self.parse_stmt()?);
        Ok(Stmt::For {
            init,
            cond,
            step,
            body,
            span: self.span_from(start),
        })
    }

    // ---------------------------------------------------------------------
    // Expressions
    // ---------------------------------------------------------------------

    /// Full expression including the comma operator.
    fn parse_expr(&mut self) -> PResult<Expr> {
        let start = self.cur().span.start;
        let mut lhs = self.parse_assign()?;
        let mut folds = 0;
        while self.eat(&TokKind::Comma) {
            self.fold(&mut folds)?;
            let rhs = self.parse_assign()?;
            lhs = Expr::Comma {
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span: self.span_from(start),
            };
        }
        self.depth -= folds;
        Ok(lhs)
    }

    fn parse_assign(&mut self) -> PResult<Expr> {
        let start = self.cur().span.start;
        self.enter()?;
        let lhs = self.parse_conditional()?;
        let op = match self.cur().kind {
            TokKind::Eq => Some(None),
            TokKind::PlusEq => Some(Some(BinOp::Add)),
            TokKind::MinusEq => Some(Some(BinOp::Sub)),
            TokKind::StarEq => Some(Some(BinOp::Mul)),
            TokKind::SlashEq => Some(Some(BinOp::Div)),
            TokKind::PercentEq => Some(Some(BinOp::Mod)),
            TokKind::ShlEq => Some(Some(BinOp::Shl)),
            TokKind::ShrEq => Some(Some(BinOp::Shr)),
            TokKind::AmpEq => Some(Some(BinOp::BitAnd)),
            TokKind::CaretEq => Some(Some(BinOp::BitXor)),
            TokKind::PipeEq => Some(Some(BinOp::BitOr)),
            _ => None,
        };
        let result = match op {
            Some(op) => {
                self.bump();
                let rhs = self.parse_assign()?;
                Expr::Assign {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                    span: self.span_from(start),
                }
            }
            None => lhs,
        };
        self.leave();
        Ok(result)
    }

    fn parse_conditional(&mut self) -> PResult<Expr> {
        let start = self.cur().span.start;
        let cond = self.parse_expr_bp(0)?;
        if !self.eat(&TokKind::Question) {
            return Ok(cond);
        }
        let then_ = self.parse_expr()?;
        self.expect(TokKind::Colon)?;
        let else_ = self.parse_assign()?;
        Ok(Expr::Ternary {
            cond: Box::new(cond),
            then_: Box::new(then_),
            else_: Box::new(else_),
            span: self.span_from(start),
        })
    }

    // Pratt parser for binary operators; (lbp, rbp) pairs with rbp = lbp + 1
    // give left associativity. Prefix operators bind at 100.
    fn parse_expr_bp(&mut self, min_bp: u8) -> PResult<Expr> {
        let start = self.cur().span.start;
        let mut lhs = self.parse_unary()?;
        let mut folds = 0;
        loop {
            let (op, lbp, rbp) = match self.cur().kind {
                TokKind::OrOr => (BinOp::Or, 1, 2),
                TokKind::CaretCaret => (BinOp::Xor, 3, 4),
                TokKind::AndAnd => (BinOp::And, 5, 6),
                TokKind::Pipe => (BinOp::BitOr, 7, 8),
                TokKind::Caret => (BinOp::BitXor, 9, 10),
                TokKind::Amp => (BinOp::BitAnd, 11, 12),
                TokKind::EqEq => (BinOp::Eq, 13, 14),
                TokKind::BangEq => (BinOp::Ne, 13, 14),
                TokKind::Lt => (BinOp::Lt, 15, 16),
                TokKind::Le => (BinOp::Le, 15, 16),
                TokKind::Gt => (BinOp::Gt, 15, 16),
                TokKind::Ge => (BinOp::Ge, 15, 16),
                TokKind::Shl => (BinOp::Shl, 17, 18),
                TokKind::Shr => (BinOp::Shr, 17, 18),
                TokKind::Plus => (BinOp::Add, 19, 20),
                TokKind::Minus => (BinOp::Sub, 19, 20),
                TokKind::Star => (BinOp::Mul, 21, 22),
                TokKind::Slash => (BinOp::Div, 21, 22),
                TokKind::Percent => (BinOp::Mod, 21, 22),
                _ => break,
            };
            if lbp < min_bp {
                break;
            }
            self.bump();
            self.fold(&mut folds)?;
            let rhs = self.parse_expr_bp(rbp)?;
            lhs = Expr::Binary {
                lhs: Box::new(lhs),
                op,
                rhs: Box::new(rhs),
                span: self.span_from(start),
            };
        }
        self.depth -= folds;
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let start = self.cur().span.start;
        let op = match self.cur().kind {
            TokKind::Minus => Some(UnOp::Neg),
            TokKind::Plus => Some(UnOp::Plus),
            TokKind::Bang => Some(UnOp::Not),
            TokKind::Tilde => Some(UnOp::BitNot),
            TokKind::PlusPlus => Some(UnOp::PreInc),
            TokKind::MinusMinus => Some(UnOp::PreDec),
            _ => None,
        };
        let Some(op) = op else {
            return self.parse_postfix();
        };
        self.bump();
        self.enter()?;
        let inner = self.parse_unary()?;
        self.leave();
        Ok(Expr::Unary {
            op,
            expr: Box::new(inner),
            span: self.span_from(start),
        })
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let start = self.cur().span.start;
        let mut expr = self.parse_primary()?;
        let mut folds = 0;
        loop {
            if matches!(
                self.cur().kind,
                TokKind::LBracket | TokKind::Dot | TokKind::PlusPlus | TokKind::MinusMinus
            ) {
                self.fold(&mut folds)?;
            }
            match self.cur().kind {
                TokKind::LBracket => {
                    self.bump();
                    let index = self.parse_expr()?;
                    self.expect(TokKind::RBracket)?;
                    expr = Expr::Index {
                        base: Box::new(expr),
                        index: Box::new(index),
                        span: self.span_from(start),
                    };
                }
                TokKind::Dot => {
                    self.bump();
                    let name = self.parse_ident()?;
                    if self.at(&TokKind::LParen) {
                        let args = self.parse_call_args()?;
                        expr = Expr::Method {
                            base: Box::new(expr),
                            name,
                            args,
                            span: self.span_from(start),
                        };
                    } else {
                        expr = Expr::Field {
                            base: Box::new(expr),
                            field: name,
                            span: self.span_from(start),
                        };
                    }
                }
                TokKind::PlusPlus | TokKind::MinusMinus => {
                    let op = if self.at(&TokKind::PlusPlus) {
                        UnOp::PostInc
                    } else {
                        UnOp::PostDec
                    };
                    self.bump();
                    expr = Expr::Unary {
                        op,
                        expr: Box::new(expr),
                        span: self.span_from(start),
                    };
                }
                _ => {
                    self.depth -= folds;
                    return Ok(expr);
                }
            }
        }
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let start = self.cur().span.start;
        let span = self.cur().span;
        let lit = match self.cur().kind.clone() {
            TokKind::IntLit(v) => Some(Lit::Int(v)),
            TokKind::UintLit(v) => Some(Lit::Uint(v)),
            TokKind::FloatLit(v) => Some(Lit::Float(v)),
            TokKind::DoubleLit(v) => Some(Lit::Double(v)),
            TokKind::KwTrue => Some(Lit::Bool(true)),
            TokKind::KwFalse => Some(Lit::Bool(false)),
            _ => None,
        };
        if let Some(lit) = lit {
            self.bump();
            return Ok(Expr::Lit(lit, span));
        }

        match self.cur().kind.clone() {
            TokKind::Ident(name) => {
                let struct_array = self.struct_names.contains(&name)
                    && matches!(self.nth(1), TokKind::LBracket);
                if struct_array {
                    let ty = self.parse_type_spec()?;
                    return self.finish_constructor(ty, start);
                }
                let id = self.parse_ident()?;
                if self.at(&TokKind::LParen) {
                    let args = self.parse_call_args()?;
                    return Ok(Expr::Call {
                        callee: Callee::Name(id),
                        args,
                        span: self.span_from(start),
                    });
                }
                Ok(Expr::Var(id))
            }
            TokKind::Type(bt) => {
                let ty = self.parse_type_spec()?;
                if !self.at(&TokKind::LParen) {
                    return Err(syntax(
                        format!(
                            "type '{}' used as an expression; expected a constructor call",
                            type_keyword_name(&bt)
                        ),
                        ty.span,
                    ));
                }
                self.finish_constructor(ty, start)
            }
            TokKind::LParen => {
                self.bump();
                let inner = self.parse_expr()?;
                self.expect(TokKind::RParen)?;
                Ok(Expr::Paren {
                    inner: Box::new(inner),
                    span: self.span_from(start),
                })
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    fn finish_constructor(&mut self, ty: TypeSpec, start: u32) -> PResult<Expr> {
        let args = self.parse_call_args()?;
        Ok(Expr::Call {
            callee: Callee::Type(ty),
            args,
            span: self.span_from(start),
        })
    }

    fn parse_call_args(&mut self) -> PResult<Vec<Expr>> {
        self.expect(TokKind::LParen)?;
        let mut args = Vec::new();
        let void_only = matches!(self.cur().kind, TokKind::Type(BuiltinType::Void))
            && matches!(self.nth(1), TokKind::RParen);
        if void_only {
            self.bump();
        } else if !self.at(&TokKind::RParen) {
            loop {
                args.push(self.parse_assign()?);
                if !self.eat(&TokKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokKind::RParen)?;
        Ok(args)
    }
}
