use gosift_ast::*;
use gosift_lexer::{lex, Span, Token};
use smol_str::SmolStr;

#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.span.start, self.span.end, self.message)
    }
}

/// Parse a source file. Always returns a `File`; syntax problems are
/// collected into the error list.
pub fn parse(source: &str) -> (File, Vec<ParseError>) {
    let (tokens, lex_errors) = lex(source);
    let mut parser = Parser::new(tokens);
    let mut errors: Vec<ParseError> = lex_errors
        .into_iter()
        .map(|span| ParseError {
            message: "unexpected character".into(),
            span,
        })
        .collect();
    parser.parse_file();
    errors.append(&mut parser.errors);
    (parser.file, errors)
}

struct Parser {
    tokens: Vec<(Token, Span)>,
    pos: usize,
    file: File,
    errors: Vec<ParseError>,
    /// Composite literals starting with a bare type name are forbidden in
    /// control-clause headers (the dangling-brace rule).
    no_composite: bool,
}

impl Parser {
    fn new(tokens: Vec<(Token, Span)>) -> Self {
        Self {
            tokens,
            pos: 0,
            file: File::new(Ident::new("", Span::new(0, 0))),
            errors: Vec::new(),
            no_composite: false,
        }
    }

    // ── Token helpers ─────────────────────────────────────────────

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek2(&self) -> Option<&Token> {
        self.tokens.get(self.pos + 1).map(|(t, _)| t)
    }

    fn peek_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|(_, s)| *s)
            .unwrap_or_else(|| {
                self.tokens
                    .last()
                    .map(|(_, s)| Span::new(s.end, s.end))
                    .unwrap_or(Span::new(0, 0))
            })
    }

    fn advance(&mut self) -> (Token, Span) {
        let tok = self.tokens[self.pos].clone();
        self.pos += 1;
        tok
    }

    fn check(&self, expected: &Token) -> bool {
        self.peek() == Some(expected)
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Option<Span> {
        if self.check(expected) {
            let (_, span) = self.advance();
            Some(span)
        } else {
            let span = self.peek_span();
            self.error(
                format!("expected {:?}, found {:?}", expected, self.peek()),
                span,
            );
            None
        }
    }

    fn expect_ident(&mut self) -> Option<Ident> {
        if let Some(Token::Ident(_)) = self.peek() {
            let (tok, span) = self.advance();
            if let Token::Ident(name) = tok {
                return Some(Ident::new(name, span));
            }
        }
        let span = self.peek_span();
        self.error(format!("expected identifier, found {:?}", self.peek()), span);
        None
    }

    fn error(&mut self, message: String, span: Span) {
        self.errors.push(ParseError { message, span });
    }

    fn skip_semis(&mut self) {
        while self.eat(&Token::Semi) {}
    }

    /// Skip tokens until the next statement boundary.
    fn recover_to_boundary(&mut self) {
        let mut depth = 0usize;
        while !self.at_end() {
            match self.peek() {
                Some(Token::LParen | Token::LBracket | Token::LBrace) => {
                    depth += 1;
                    self.advance();
                }
                Some(Token::RParen | Token::RBracket) => {
                    depth = depth.saturating_sub(1);
                    self.advance();
                }
                Some(Token::RBrace) => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                    self.advance();
                }
                Some(Token::Semi) if depth == 0 => {
                    self.advance();
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ── Allocators ────────────────────────────────────────────────

    fn alloc_expr(&mut self, kind: ExprKind, span: Span) -> ExprId {
        self.file.exprs.alloc(Expr { kind, span })
    }

    fn alloc_type(&mut self, kind: TypeExprKind, span: Span) -> TypeExprId {
        self.file.type_exprs.alloc(TypeExpr { kind, span })
    }

    fn alloc_stmt(&mut self, kind: StmtKind, span: Span) -> StmtId {
        self.file.stmts.alloc(Stmt { kind, span })
    }

    fn error_expr(&mut self) -> ExprId {
        let span = self.peek_span();
        self.alloc_expr(ExprKind::Ident("_".into()), span)
    }

    fn error_type(&mut self) -> TypeExprId {
        let span = self.peek_span();
        self.alloc_type(TypeExprKind::Ident("_".into()), span)
    }

    // ── File parsing ──────────────────────────────────────────────

    fn parse_file(&mut self) {
        self.skip_semis();
        if self.eat(&Token::KwPackage) {
            if let Some(name) = self.expect_ident() {
                self.file.package = name;
            }
            self.eat(&Token::Semi);
        } else {
            let span = self.peek_span();
            self.error("expected package clause".into(), span);
        }

        loop {
            self.skip_semis();
            match self.peek() {
                None => break,
                Some(Token::KwImport) => self.parse_import(),
                Some(Token::KwFunc) => {
                    if let Some(decl) = self.parse_func_decl() {
                        self.file.decls.push(Decl::Func(decl));
                    }
                }
                Some(Token::KwVar | Token::KwConst | Token::KwType) => {
                    if let Some(decl) = self.parse_gen_decl() {
                        self.file.decls.push(Decl::Gen(decl));
                    }
                }
                Some(other) => {
                    let span = self.peek_span();
                    self.error(format!("expected declaration, found {:?}", other), span);
                    self.recover_to_boundary();
                }
            }
        }
    }

    fn parse_import(&mut self) {
        let start = self.peek_span();
        self.advance(); // import
        if self.eat(&Token::LParen) {
            loop {
                self.skip_semis();
                if self.eat(&Token::RParen) || self.at_end() {
                    break;
                }
                self.parse_import_spec(start);
            }
        } else {
            self.parse_import_spec(start);
        }
        self.eat(&Token::Semi);
    }

    fn parse_import_spec(&mut self, start: Span) {
        let alias = if let Some(Token::Ident(_)) = self.peek() {
            self.expect_ident()
        } else {
            None
        };
        match self.peek().cloned() {
            Some(Token::Str(path)) | Some(Token::RawStr(path)) => {
                let (_, span) = self.advance();
                self.file.imports.push(ImportSpec {
                    alias,
                    path: SmolStr::new(path),
                    span: start.merge(span),
                });
            }
            other => {
                let span = self.peek_span();
                self.error(format!("expected import path, found {:?}", other), span);
                self.recover_to_boundary();
            }
        }
    }

    // ── Declarations ──────────────────────────────────────────────

    fn parse_gen_decl(&mut self) -> Option<GenDecl> {
        let (tok, start) = self.advance();
        let keyword = match tok {
            Token::KwVar => DeclKeyword::Var,
            Token::KwConst => DeclKeyword::Const,
            Token::KwType => DeclKeyword::Type,
            _ => unreachable!("caller checked the keyword"),
        };
        let mut specs = Vec::new();
        let mut end = start;
        if self.eat(&Token::LParen) {
            loop {
                self.skip_semis();
                if self.at_end() {
                    break;
                }
                let close = self.peek_span();
                if self.eat(&Token::RParen) {
                    end = close;
                    break;
                }
                match self.parse_spec(keyword) {
                    Some(spec) => specs.push(spec),
                    None => self.recover_to_boundary(),
                }
            }
        } else {
            match self.parse_spec(keyword) {
                Some(spec) => {
                    end = match &spec {
                        Spec::Value(v) => v.span,
                        Spec::Type(t) => t.span,
                    };
                    specs.push(spec);
                }
                None => self.recover_to_boundary(),
            }
        }
        Some(GenDecl {
            keyword,
            specs,
            span: start.merge(end),
        })
    }

    fn parse_spec(&mut self, keyword: DeclKeyword) -> Option<Spec> {
        if keyword == DeclKeyword::Type {
            let name = self.expect_ident()?;
            self.eat(&Token::Eq); // alias form accepted, treated alike
            let type_expr = self.parse_type();
            let span = name.span.merge(self.file.type_exprs[type_expr].span);
            return Some(Spec::Type(TypeSpec {
                name,
                type_expr,
                span,
            }));
        }

        let mut names = vec![self.expect_ident()?];
        while self.eat(&Token::Comma) {
            names.push(self.expect_ident()?);
        }
        let mut span = names[0].span;

        let type_ann = if !matches!(
            self.peek(),
            Some(Token::Eq | Token::Semi | Token::RParen) | None
        ) {
            let ty = self.parse_type();
            span = span.merge(self.file.type_exprs[ty].span);
            Some(ty)
        } else {
            None
        };

        let mut values = Vec::new();
        if self.eat(&Token::Eq) {
            values.push(self.parse_expr());
            while self.eat(&Token::Comma) {
                values.push(self.parse_expr());
            }
            if let Some(last) = values.last() {
                span = span.merge(self.file.exprs[*last].span);
            }
        }

        Some(Spec::Value(ValueSpec {
            names,
            type_ann,
            values,
            span,
        }))
    }

    fn parse_func_decl(&mut self) -> Option<FuncDecl> {
        let (_, start) = self.advance(); // func
        let recv = if self.check(&Token::LParen) {
            self.advance();
            let fields = self.parse_field_list(&Token::RParen);
            self.expect(&Token::RParen);
            fields
        } else {
            Vec::new()
        };
        let name = self.expect_ident()?;
        let sig = self.parse_signature(start);
        let body = if self.check(&Token::LBrace) {
            Some(self.parse_block())
        } else {
            None
        };
        let span = start.merge(self.peek_span());
        Some(FuncDecl {
            name,
            recv,
            sig,
            body,
            span,
        })
    }

    /// Parse `(params) [results]` into a `TypeExpr::Func` node.
    fn parse_signature(&mut self, start: Span) -> TypeExprId {
        self.expect(&Token::LParen);
        let params = self.parse_field_list(&Token::RParen);
        let end = self.expect(&Token::RParen).unwrap_or(start);

        let results = if self.eat(&Token::LParen) {
            let fields = self.parse_field_list(&Token::RParen);
            self.expect(&Token::RParen);
            fields
        } else if self.starts_type() && !self.check(&Token::LBrace) {
            let ty = self.parse_type();
            let span = self.file.type_exprs[ty].span;
            vec![Field {
                names: Vec::new(),
                type_expr: ty,
                span,
            }]
        } else {
            Vec::new()
        };

        self.alloc_type(TypeExprKind::Func { params, results }, start.merge(end))
    }

    fn starts_type(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::Ident(_)
                    | Token::Star
                    | Token::LBracket
                    | Token::KwMap
                    | Token::KwChan
                    | Token::KwFunc
                    | Token::KwInterface
                    | Token::KwStruct
                    | Token::Arrow
                    | Token::LParen
                    | Token::DotDotDot
            )
        )
    }

    fn token_starts_type(tok: Option<&Token>) -> bool {
        matches!(
            tok,
            Some(
                Token::Ident(_)
                    | Token::Star
                    | Token::LBracket
                    | Token::KwMap
                    | Token::KwChan
                    | Token::KwFunc
                    | Token::KwInterface
                    | Token::KwStruct
                    | Token::Arrow
                    | Token::LParen
                    | Token::DotDotDot
            )
        )
    }

    /// Parse a parameter/result/receiver list up to (not including)
    /// `terminator`. Resolves the named-vs-anonymous ambiguity the usual
    /// way: plain identifiers are names if any element of the list is
    /// named, types otherwise.
    fn parse_field_list(&mut self, terminator: &Token) -> Vec<Field> {
        enum Element {
            Plain(Ident),
            Named(Ident, TypeExprId),
            Typ(TypeExprId),
        }

        let mut elements = Vec::new();
        if !self.check(terminator) {
            loop {
                let element = match self.peek() {
                    Some(Token::Ident(_)) => {
                        let next = self.peek2();
                        if matches!(next, Some(t) if t == &Token::Comma || t == terminator)
                            || next.is_none()
                        {
                            let ident = self.expect_ident().unwrap();
                            Element::Plain(ident)
                        } else if matches!(next, Some(Token::Dot)) {
                            Element::Typ(self.parse_type())
                        } else if Self::token_starts_type(next) {
                            let name = self.expect_ident().unwrap();
                            let ty = self.parse_type();
                            Element::Named(name, ty)
                        } else {
                            let ident = self.expect_ident().unwrap();
                            Element::Plain(ident)
                        }
                    }
                    _ => Element::Typ(self.parse_type()),
                };
                elements.push(element);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }

        let any_named = elements.iter().any(|e| matches!(e, Element::Named(..)));
        let mut fields = Vec::new();
        if any_named {
            let mut pending: Vec<Ident> = Vec::new();
            for element in elements {
                match element {
                    Element::Plain(ident) => pending.push(ident),
                    Element::Named(name, ty) => {
                        let mut names = std::mem::take(&mut pending);
                        let span = names
                            .first()
                            .map(|n| n.span)
                            .unwrap_or(name.span)
                            .merge(self.file.type_exprs[ty].span);
                        names.push(name);
                        fields.push(Field {
                            names,
                            type_expr: ty,
                            span,
                        });
                    }
                    Element::Typ(ty) => {
                        let span = self.file.type_exprs[ty].span;
                        self.error("mixed named and unnamed parameters".into(), span);
                    }
                }
            }
            if !pending.is_empty() {
                let span = pending[0].span;
                self.error("parameter names without a type".into(), span);
            }
        } else {
            for element in elements {
                match element {
                    Element::Plain(ident) => {
                        let span = ident.span;
                        let ty = self.alloc_type(TypeExprKind::Ident(ident.name), span);
                        fields.push(Field {
                            names: Vec::new(),
                            type_expr: ty,
                            span,
                        });
                    }
                    Element::Typ(ty) => {
                        let span = self.file.type_exprs[ty].span;
                        fields.push(Field {
                            names: Vec::new(),
                            type_expr: ty,
                            span,
                        });
                    }
                    Element::Named(..) => unreachable!("no element is named"),
                }
            }
        }
        fields
    }

    // ── Types ─────────────────────────────────────────────────────

    fn parse_type(&mut self) -> TypeExprId {
        let start = self.peek_span();
        match self.peek().cloned() {
            Some(Token::Ident(name)) => {
                self.advance();
                if self.check(&Token::Dot) {
                    self.advance();
                    if let Some(sel) = self.expect_ident() {
                        let span = start.merge(sel.span);
                        return self.alloc_type(
                            TypeExprKind::Qualified {
                                package: name,
                                name: sel.name,
                            },
                            span,
                        );
                    }
                    return self.error_type();
                }
                self.alloc_type(TypeExprKind::Ident(name), start)
            }
            Some(Token::Star) => {
                self.advance();
                let inner = self.parse_type();
                let span = start.merge(self.file.type_exprs[inner].span);
                self.alloc_type(TypeExprKind::Pointer(inner), span)
            }
            Some(Token::LBracket) => {
                self.advance();
                if self.eat(&Token::RBracket) {
                    let elem = self.parse_type();
                    let span = start.merge(self.file.type_exprs[elem].span);
                    self.alloc_type(TypeExprKind::Slice(elem), span)
                } else {
                    let len = self.parse_expr();
                    self.expect(&Token::RBracket);
                    let elem = self.parse_type();
                    let span = start.merge(self.file.type_exprs[elem].span);
                    self.alloc_type(TypeExprKind::Array { len, elem }, span)
                }
            }
            Some(Token::KwMap) => {
                self.advance();
                self.expect(&Token::LBracket);
                let key = self.parse_type();
                self.expect(&Token::RBracket);
                let value = self.parse_type();
                let span = start.merge(self.file.type_exprs[value].span);
                self.alloc_type(TypeExprKind::Map { key, value }, span)
            }
            Some(Token::KwChan) => {
                self.advance();
                let dir = if self.eat(&Token::Arrow) {
                    ChanDir::Send
                } else {
                    ChanDir::Both
                };
                let elem = self.parse_type();
                let span = start.merge(self.file.type_exprs[elem].span);
                self.alloc_type(TypeExprKind::Chan { dir, elem }, span)
            }
            Some(Token::Arrow) => {
                self.advance();
                self.expect(&Token::KwChan);
                let elem = self.parse_type();
                let span = start.merge(self.file.type_exprs[elem].span);
                self.alloc_type(
                    TypeExprKind::Chan {
                        dir: ChanDir::Recv,
                        elem,
                    },
                    span,
                )
            }
            Some(Token::DotDotDot) => {
                self.advance();
                let elem = self.parse_type();
                let span = start.merge(self.file.type_exprs[elem].span);
                self.alloc_type(TypeExprKind::Ellipsis(elem), span)
            }
            Some(Token::KwFunc) => {
                self.advance();
                self.parse_signature(start)
            }
            Some(Token::KwInterface) => {
                self.advance();
                self.parse_interface_type(start)
            }
            Some(Token::KwStruct) => {
                self.advance();
                self.parse_struct_type(start)
            }
            Some(Token::LParen) => {
                self.advance();
                let inner = self.parse_type();
                let end = self.expect(&Token::RParen).unwrap_or(start);
                self.alloc_type(TypeExprKind::Paren(inner), start.merge(end))
            }
            other => {
                self.error(format!("expected type, found {:?}", other), start);
                self.error_type()
            }
        }
    }

    fn parse_interface_type(&mut self, start: Span) -> TypeExprId {
        self.expect(&Token::LBrace);
        let mut methods = Vec::new();
        loop {
            self.skip_semis();
            if self.at_end() || self.check(&Token::RBrace) {
                break;
            }
            let Some(name) = self.expect_ident() else {
                self.recover_to_boundary();
                continue;
            };
            if !self.check(&Token::LParen) {
                self.error("embedded interfaces are not supported".into(), name.span);
                self.recover_to_boundary();
                continue;
            }
            let sig = self.parse_signature(name.span);
            let span = name.span.merge(self.file.type_exprs[sig].span);
            methods.push(MethodElem { name, sig, span });
        }
        let end = self.expect(&Token::RBrace).unwrap_or(start);
        self.alloc_type(TypeExprKind::Interface { methods }, start.merge(end))
    }

    fn parse_struct_type(&mut self, start: Span) -> TypeExprId {
        self.expect(&Token::LBrace);
        let mut fields = Vec::new();
        loop {
            self.skip_semis();
            if self.at_end() || self.check(&Token::RBrace) {
                break;
            }
            let field_start = self.peek_span();
            match self.peek() {
                Some(Token::Ident(_)) => {
                    let embedded = matches!(
                        self.peek2(),
                        Some(Token::Semi | Token::RBrace | Token::Str(_) | Token::RawStr(_))
                            | None
                    ) || matches!(self.peek2(), Some(Token::Dot));
                    if embedded {
                        let ty = self.parse_type();
                        let span = self.file.type_exprs[ty].span;
                        fields.push(Field {
                            names: Vec::new(),
                            type_expr: ty,
                            span,
                        });
                    } else {
                        let mut names = Vec::new();
                        loop {
                            match self.expect_ident() {
                                Some(name) => names.push(name),
                                None => break,
                            }
                            if !self.eat(&Token::Comma) {
                                break;
                            }
                        }
                        let ty = self.parse_type();
                        let span = field_start.merge(self.file.type_exprs[ty].span);
                        fields.push(Field {
                            names,
                            type_expr: ty,
                            span,
                        });
                    }
                }
                Some(Token::Star) => {
                    let ty = self.parse_type();
                    let span = self.file.type_exprs[ty].span;
                    fields.push(Field {
                        names: Vec::new(),
                        type_expr: ty,
                        span,
                    });
                }
                other => {
                    let span = self.peek_span();
                    self.error(format!("expected struct field, found {:?}", other), span);
                    self.recover_to_boundary();
                    continue;
                }
            }
            // optional field tag
            if matches!(self.peek(), Some(Token::Str(_) | Token::RawStr(_))) {
                self.advance();
            }
        }
        let end = self.expect(&Token::RBrace).unwrap_or(start);
        self.alloc_type(TypeExprKind::Struct { fields }, start.merge(end))
    }

    // ── Statements ────────────────────────────────────────────────

    fn parse_block(&mut self) -> Vec<StmtId> {
        self.expect(&Token::LBrace);
        let stmts = self.parse_stmt_list(&[Token::RBrace]);
        self.expect(&Token::RBrace);
        stmts
    }

    fn parse_stmt_list(&mut self, stop: &[Token]) -> Vec<StmtId> {
        let mut stmts = Vec::new();
        loop {
            self.skip_semis();
            if self.at_end() || stop.iter().any(|t| self.check(t)) {
                break;
            }
            let before = self.pos;
            if let Some(stmt) = self.parse_stmt() {
                stmts.push(stmt);
            }
            if self.pos == before {
                // no progress: drop the offending token
                self.advance();
            }
        }
        stmts
    }

    fn parse_stmt(&mut self) -> Option<StmtId> {
        let start = self.peek_span();
        match self.peek() {
            Some(Token::KwVar | Token::KwConst | Token::KwType) => {
                let decl = self.parse_gen_decl()?;
                let span = decl.span;
                Some(self.alloc_stmt(StmtKind::Decl(decl), span))
            }
            Some(Token::LBrace) => {
                let body = self.parse_block();
                Some(self.alloc_stmt(StmtKind::Block(body), start))
            }
            Some(Token::KwIf) => self.parse_if_stmt(),
            Some(Token::KwFor) => self.parse_for_stmt(),
            Some(Token::KwSwitch) => self.parse_switch_stmt(),
            Some(Token::KwSelect) => self.parse_select_stmt(),
            Some(Token::KwGo) => {
                self.advance();
                let call = self.parse_expr();
                let span = start.merge(self.file.exprs[call].span);
                Some(self.alloc_stmt(StmtKind::Go(call), span))
            }
            Some(Token::KwDefer) => {
                self.advance();
                let call = self.parse_expr();
                let span = start.merge(self.file.exprs[call].span);
                Some(self.alloc_stmt(StmtKind::Defer(call), span))
            }
            Some(Token::KwReturn) => {
                self.advance();
                let mut results = Vec::new();
                if !matches!(
                    self.peek(),
                    Some(Token::Semi | Token::RBrace | Token::KwCase | Token::KwDefault) | None
                ) {
                    results.push(self.parse_expr());
                    while self.eat(&Token::Comma) {
                        results.push(self.parse_expr());
                    }
                }
                Some(self.alloc_stmt(StmtKind::Return { results }, start))
            }
            Some(Token::KwBreak | Token::KwContinue | Token::KwGoto | Token::KwFallthrough) => {
                let (tok, span) = self.advance();
                let kind = match tok {
                    Token::KwBreak => BranchKind::Break,
                    Token::KwContinue => BranchKind::Continue,
                    Token::KwGoto => BranchKind::Goto,
                    _ => BranchKind::Fallthrough,
                };
                let label = if let Some(Token::Ident(_)) = self.peek() {
                    self.expect_ident()
                } else {
                    None
                };
                Some(self.alloc_stmt(StmtKind::Branch { kind, label }, span))
            }
            Some(Token::Semi) => {
                self.advance();
                Some(self.alloc_stmt(StmtKind::Empty, start))
            }
            Some(Token::Ident(_)) if self.peek2() == Some(&Token::Colon) => {
                let label = self.expect_ident()?;
                self.advance(); // colon
                let stmt = self.parse_stmt()?;
                let span = label.span;
                Some(self.alloc_stmt(StmtKind::Labeled { label, stmt }, span))
            }
            Some(_) => self.parse_simple_stmt(),
            None => None,
        }
    }

    fn assign_tok(&self) -> Option<AssignTok> {
        match self.peek() {
            Some(Token::ColonEq) => Some(AssignTok::Define),
            Some(Token::Eq) => Some(AssignTok::Assign),
            Some(Token::PlusEq) => Some(AssignTok::OpAssign(BinaryOp::Add)),
            Some(Token::MinusEq) => Some(AssignTok::OpAssign(BinaryOp::Sub)),
            Some(Token::StarEq) => Some(AssignTok::OpAssign(BinaryOp::Mul)),
            Some(Token::SlashEq) => Some(AssignTok::OpAssign(BinaryOp::Div)),
            Some(Token::PercentEq) => Some(AssignTok::OpAssign(BinaryOp::Rem)),
            Some(Token::AmpEq) => Some(AssignTok::OpAssign(BinaryOp::And)),
            Some(Token::PipeEq) => Some(AssignTok::OpAssign(BinaryOp::Or)),
            Some(Token::CaretEq) => Some(AssignTok::OpAssign(BinaryOp::Xor)),
            Some(Token::ShlEq) => Some(AssignTok::OpAssign(BinaryOp::Shl)),
            Some(Token::ShrEq) => Some(AssignTok::OpAssign(BinaryOp::Shr)),
            Some(Token::AmpCaretEq) => Some(AssignTok::OpAssign(BinaryOp::AndNot)),
            _ => None,
        }
    }

    fn parse_simple_stmt(&mut self) -> Option<StmtId> {
        let start = self.peek_span();
        let first = self.parse_expr();
        let mut lhs = vec![first];
        while self.eat(&Token::Comma) {
            lhs.push(self.parse_expr());
        }

        if let Some(tok) = self.assign_tok() {
            self.advance();
            let mut rhs = vec![self.parse_expr()];
            while self.eat(&Token::Comma) {
                rhs.push(self.parse_expr());
            }
            let span = start.merge(self.file.exprs[*rhs.last().unwrap()].span);
            return Some(self.alloc_stmt(StmtKind::Assign { lhs, rhs, tok }, span));
        }

        if lhs.len() != 1 {
            self.error("expected assignment after expression list".into(), start);
            return Some(self.alloc_stmt(StmtKind::Expr(first), start));
        }

        match self.peek() {
            Some(Token::Arrow) => {
                self.advance();
                let value = self.parse_expr();
                let span = start.merge(self.file.exprs[value].span);
                Some(self.alloc_stmt(
                    StmtKind::Send {
                        chan: first,
                        value,
                    },
                    span,
                ))
            }
            Some(Token::Inc) => {
                self.advance();
                Some(self.alloc_stmt(StmtKind::IncDec { x: first, inc: true }, start))
            }
            Some(Token::Dec) => {
                self.advance();
                Some(self.alloc_stmt(
                    StmtKind::IncDec {
                        x: first,
                        inc: false,
                    },
                    start,
                ))
            }
            _ => Some(self.alloc_stmt(StmtKind::Expr(first), start)),
        }
    }

    /// The expression of a header statement (`if x; cond {`).
    fn cond_expr(&mut self, stmt: StmtId) -> ExprId {
        match &self.file.stmts[stmt].kind {
            StmtKind::Expr(e) => *e,
            _ => {
                let span = self.file.stmts[stmt].span;
                self.error("expected condition expression".into(), span);
                self.error_expr()
            }
        }
    }

    fn parse_if_stmt(&mut self) -> Option<StmtId> {
        let start = self.peek_span();
        self.advance(); // if
        let saved = self.no_composite;
        self.no_composite = true;
        let head = self.parse_simple_stmt()?;
        let (init, cond) = if self.eat(&Token::Semi) {
            let cond_stmt = self.parse_simple_stmt()?;
            let cond = self.cond_expr(cond_stmt);
            (Some(head), cond)
        } else {
            (None, self.cond_expr(head))
        };
        self.no_composite = saved;

        let body = self.parse_block();
        let else_stmt = if self.eat(&Token::KwElse) {
            if self.check(&Token::KwIf) {
                self.parse_if_stmt()
            } else {
                let block_start = self.peek_span();
                let block = self.parse_block();
                Some(self.alloc_stmt(StmtKind::Block(block), block_start))
            }
        } else {
            None
        };

        Some(self.alloc_stmt(
            StmtKind::If {
                init,
                cond,
                body,
                else_stmt,
            },
            start,
        ))
    }

    fn parse_for_stmt(&mut self) -> Option<StmtId> {
        let start = self.peek_span();
        self.advance(); // for
        let saved = self.no_composite;
        self.no_composite = true;

        // `for {`
        if self.check(&Token::LBrace) {
            self.no_composite = saved;
            let body = self.parse_block();
            return Some(self.alloc_stmt(
                StmtKind::For {
                    init: None,
                    cond: None,
                    post: None,
                    body,
                },
                start,
            ));
        }

        // `for range x {`
        if self.eat(&Token::KwRange) {
            let x = self.parse_expr();
            self.no_composite = saved;
            let body = self.parse_block();
            return Some(self.alloc_stmt(
                StmtKind::Range {
                    key: None,
                    value: None,
                    tok: AssignTok::Assign,
                    x,
                    body,
                },
                start,
            ));
        }

        let first = self.parse_expr();
        let mut lhs = vec![first];
        while self.eat(&Token::Comma) {
            lhs.push(self.parse_expr());
        }

        if let Some(tok) = self.assign_tok() {
            self.advance();
            if self.eat(&Token::KwRange) {
                let x = self.parse_expr();
                self.no_composite = saved;
                let body = self.parse_block();
                if lhs.len() > 2 {
                    self.error("too many positions on the left of range".into(), start);
                }
                let key = lhs.first().copied();
                let value = lhs.get(1).copied();
                return Some(self.alloc_stmt(
                    StmtKind::Range {
                        key,
                        value,
                        tok,
                        x,
                        body,
                    },
                    start,
                ));
            }
            // ordinary init assignment: `for i := 0; cond; post {`
            let mut rhs = vec![self.parse_expr()];
            while self.eat(&Token::Comma) {
                rhs.push(self.parse_expr());
            }
            let init_span = start.merge(self.file.exprs[*rhs.last().unwrap()].span);
            let init = self.alloc_stmt(StmtKind::Assign { lhs, rhs, tok }, init_span);
            self.expect(&Token::Semi);
            let cond = if self.check(&Token::Semi) {
                None
            } else {
                Some(self.parse_expr())
            };
            self.expect(&Token::Semi);
            let post = if self.check(&Token::LBrace) {
                None
            } else {
                self.parse_simple_stmt()
            };
            self.no_composite = saved;
            let body = self.parse_block();
            return Some(self.alloc_stmt(
                StmtKind::For {
                    init: Some(init),
                    cond,
                    post,
                    body,
                },
                start,
            ));
        }

        if self.eat(&Token::Semi) {
            // `for init; cond; post {` with expression-statement init
            let init = self.alloc_stmt(StmtKind::Expr(first), start);
            let cond = if self.check(&Token::Semi) {
                None
            } else {
                Some(self.parse_expr())
            };
            self.expect(&Token::Semi);
            let post = if self.check(&Token::LBrace) {
                None
            } else {
                self.parse_simple_stmt()
            };
            self.no_composite = saved;
            let body = self.parse_block();
            return Some(self.alloc_stmt(
                StmtKind::For {
                    init: Some(init),
                    cond,
                    post,
                    body,
                },
                start,
            ));
        }

        // `for cond {`
        self.no_composite = saved;
        let body = self.parse_block();
        Some(self.alloc_stmt(
            StmtKind::For {
                init: None,
                cond: Some(first),
                post: None,
                body,
            },
            start,
        ))
    }

    /// Whether a header statement is a type-switch guard: `x.(type)` or
    /// `v := x.(type)`.
    fn is_type_switch_guard(&self, stmt: StmtId) -> bool {
        let assert_is_guard = |expr: ExprId| {
            let stripped = self.file.strip_parens(expr);
            matches!(
                &self.file.exprs[stripped].kind,
                ExprKind::TypeAssert {
                    type_expr: None,
                    ..
                }
            )
        };
        match &self.file.stmts[stmt].kind {
            StmtKind::Expr(e) => assert_is_guard(*e),
            StmtKind::Assign { rhs, .. } => rhs.len() == 1 && assert_is_guard(rhs[0]),
            _ => false,
        }
    }

    fn parse_switch_stmt(&mut self) -> Option<StmtId> {
        let start = self.peek_span();
        self.advance(); // switch
        let saved = self.no_composite;
        self.no_composite = true;

        let mut init = None;
        let mut header = None;
        if !self.check(&Token::LBrace) {
            let head = self.parse_simple_stmt()?;
            if self.eat(&Token::Semi) {
                init = Some(head);
                if !self.check(&Token::LBrace) {
                    header = self.parse_simple_stmt();
                }
            } else {
                header = Some(head);
            }
        }
        self.no_composite = saved;

        if let Some(guard) = header.filter(|s| self.is_type_switch_guard(*s)) {
            let cases = self.parse_type_cases();
            return Some(self.alloc_stmt(StmtKind::TypeSwitch { init, guard, cases }, start));
        }

        let tag = header.map(|s| self.cond_expr(s));
        let cases = self.parse_value_cases();
        Some(self.alloc_stmt(StmtKind::Switch { init, tag, cases }, start))
    }

    fn parse_value_cases(&mut self) -> Vec<CaseClause> {
        self.expect(&Token::LBrace);
        let mut cases = Vec::new();
        loop {
            self.skip_semis();
            if self.at_end() || self.check(&Token::RBrace) {
                break;
            }
            let span = self.peek_span();
            let exprs = if self.eat(&Token::KwCase) {
                let mut exprs = vec![self.parse_expr()];
                while self.eat(&Token::Comma) {
                    exprs.push(self.parse_expr());
                }
                exprs
            } else if self.eat(&Token::KwDefault) {
                Vec::new()
            } else {
                let span = self.peek_span();
                self.error("expected case or default clause".into(), span);
                self.recover_to_boundary();
                continue;
            };
            self.expect(&Token::Colon);
            let body = self.parse_stmt_list(&[Token::KwCase, Token::KwDefault, Token::RBrace]);
            cases.push(CaseClause { exprs, body, span });
        }
        self.expect(&Token::RBrace);
        cases
    }

    fn parse_type_cases(&mut self) -> Vec<TypeCaseClause> {
        self.expect(&Token::LBrace);
        let mut cases = Vec::new();
        loop {
            self.skip_semis();
            if self.at_end() || self.check(&Token::RBrace) {
                break;
            }
            let span = self.peek_span();
            let types = if self.eat(&Token::KwCase) {
                let mut types = vec![self.parse_type()];
                while self.eat(&Token::Comma) {
                    types.push(self.parse_type());
                }
                types
            } else if self.eat(&Token::KwDefault) {
                Vec::new()
            } else {
                let span = self.peek_span();
                self.error("expected case or default clause".into(), span);
                self.recover_to_boundary();
                continue;
            };
            self.expect(&Token::Colon);
            let body = self.parse_stmt_list(&[Token::KwCase, Token::KwDefault, Token::RBrace]);
            cases.push(TypeCaseClause { types, body, span });
        }
        self.expect(&Token::RBrace);
        cases
    }

    fn parse_select_stmt(&mut self) -> Option<StmtId> {
        let start = self.peek_span();
        self.advance(); // select
        self.expect(&Token::LBrace);
        let mut clauses = Vec::new();
        loop {
            self.skip_semis();
            if self.at_end() || self.check(&Token::RBrace) {
                break;
            }
            let span = self.peek_span();
            let comm = if self.eat(&Token::KwCase) {
                self.parse_simple_stmt()
            } else if self.eat(&Token::KwDefault) {
                None
            } else {
                let span = self.peek_span();
                self.error("expected case or default clause".into(), span);
                self.recover_to_boundary();
                continue;
            };
            self.expect(&Token::Colon);
            let body = self.parse_stmt_list(&[Token::KwCase, Token::KwDefault, Token::RBrace]);
            clauses.push(CommClause { comm, body, span });
        }
        self.expect(&Token::RBrace);
        Some(self.alloc_stmt(StmtKind::Select { clauses }, start))
    }

    // ── Expressions ───────────────────────────────────────────────

    fn parse_expr(&mut self) -> ExprId {
        self.parse_binary(1)
    }

    fn binary_op(&self) -> Option<BinaryOp> {
        let op = match self.peek()? {
            Token::OrOr => BinaryOp::LogOr,
            Token::AndAnd => BinaryOp::LogAnd,
            Token::EqEq => BinaryOp::Eql,
            Token::NotEq => BinaryOp::Neq,
            Token::Lt => BinaryOp::Lss,
            Token::LtEq => BinaryOp::Leq,
            Token::Gt => BinaryOp::Gtr,
            Token::GtEq => BinaryOp::Geq,
            Token::Plus => BinaryOp::Add,
            Token::Minus => BinaryOp::Sub,
            Token::Pipe => BinaryOp::Or,
            Token::Caret => BinaryOp::Xor,
            Token::Star => BinaryOp::Mul,
            Token::Slash => BinaryOp::Div,
            Token::Percent => BinaryOp::Rem,
            Token::Shl => BinaryOp::Shl,
            Token::Shr => BinaryOp::Shr,
            Token::Amp => BinaryOp::And,
            Token::AmpCaret => BinaryOp::AndNot,
            _ => return None,
        };
        Some(op)
    }

    fn parse_binary(&mut self, min_prec: u8) -> ExprId {
        let mut lhs = self.parse_unary();
        while let Some(op) = self.binary_op() {
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }
            self.advance();
            let rhs = self.parse_binary(prec + 1);
            let span = self.file.exprs[lhs].span.merge(self.file.exprs[rhs].span);
            lhs = self.alloc_expr(ExprKind::Binary { op, x: lhs, y: rhs }, span);
        }
        lhs
    }

    fn parse_unary(&mut self) -> ExprId {
        let start = self.peek_span();
        let op = match self.peek() {
            Some(Token::Plus) => Some(UnaryOp::Plus),
            Some(Token::Minus) => Some(UnaryOp::Minus),
            Some(Token::Not) => Some(UnaryOp::Not),
            Some(Token::Caret) => Some(UnaryOp::Xor),
            Some(Token::Amp) => Some(UnaryOp::Addr),
            Some(Token::Arrow) => Some(UnaryOp::Recv),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let x = self.parse_unary();
            let span = start.merge(self.file.exprs[x].span);
            return self.alloc_expr(ExprKind::Unary { op, x }, span);
        }
        if self.check(&Token::Star) {
            self.advance();
            let x = self.parse_unary();
            let span = start.merge(self.file.exprs[x].span);
            return self.alloc_expr(ExprKind::Star(x), span);
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> ExprId {
        let mut expr = self.parse_primary();
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.advance();
                    if self.eat(&Token::LParen) {
                        let span = self.file.exprs[expr].span;
                        if self.eat(&Token::KwType) {
                            let end = self.expect(&Token::RParen).unwrap_or(span);
                            expr = self.alloc_expr(
                                ExprKind::TypeAssert {
                                    x: expr,
                                    type_expr: None,
                                },
                                span.merge(end),
                            );
                        } else {
                            let ty = self.parse_type();
                            let end = self.expect(&Token::RParen).unwrap_or(span);
                            expr = self.alloc_expr(
                                ExprKind::TypeAssert {
                                    x: expr,
                                    type_expr: Some(ty),
                                },
                                span.merge(end),
                            );
                        }
                    } else if let Some(sel) = self.expect_ident() {
                        let span = self.file.exprs[expr].span.merge(sel.span);
                        expr = self.alloc_expr(ExprKind::Selector { x: expr, sel }, span);
                    } else {
                        break;
                    }
                }
                Some(Token::LParen) => {
                    self.advance();
                    let saved = self.no_composite;
                    self.no_composite = false;
                    let mut args = Vec::new();
                    let mut ellipsis = false;
                    if !self.check(&Token::RParen) {
                        loop {
                            args.push(self.parse_arg());
                            if self.eat(&Token::DotDotDot) {
                                ellipsis = true;
                            }
                            if !self.eat(&Token::Comma) {
                                break;
                            }
                        }
                    }
                    self.no_composite = saved;
                    let end = self
                        .expect(&Token::RParen)
                        .unwrap_or(self.file.exprs[expr].span);
                    let span = self.file.exprs[expr].span.merge(end);
                    expr = self.alloc_expr(
                        ExprKind::Call {
                            fun: expr,
                            args,
                            ellipsis,
                        },
                        span,
                    );
                }
                Some(Token::LBracket) => {
                    self.advance();
                    let saved = self.no_composite;
                    self.no_composite = false;
                    let low = if self.check(&Token::Colon) {
                        None
                    } else {
                        Some(self.parse_expr())
                    };
                    if self.eat(&Token::Colon) {
                        let high = if self.check(&Token::RBracket) {
                            None
                        } else {
                            Some(self.parse_expr())
                        };
                        self.no_composite = saved;
                        let end = self
                            .expect(&Token::RBracket)
                            .unwrap_or(self.file.exprs[expr].span);
                        let span = self.file.exprs[expr].span.merge(end);
                        expr = self.alloc_expr(ExprKind::Slice { x: expr, low, high }, span);
                    } else {
                        self.no_composite = saved;
                        let end = self
                            .expect(&Token::RBracket)
                            .unwrap_or(self.file.exprs[expr].span);
                        let index = low.unwrap_or_else(|| self.error_expr());
                        let span = self.file.exprs[expr].span.merge(end);
                        expr = self.alloc_expr(ExprKind::Index { x: expr, index }, span);
                    }
                }
                Some(Token::LBrace) if !self.no_composite => {
                    let Some(type_expr) = self.expr_as_type(expr) else {
                        break;
                    };
                    expr = self.parse_composite_lit(Some(type_expr));
                }
                _ => break,
            }
        }
        expr
    }

    /// Re-read a parsed expression as a type name, for `T{...}` and
    /// `pkg.T{...}` composite literals.
    fn expr_as_type(&mut self, expr: ExprId) -> Option<TypeExprId> {
        let span = self.file.exprs[expr].span;
        match &self.file.exprs[expr].kind {
            ExprKind::Ident(name) => {
                let name = name.clone();
                Some(self.alloc_type(TypeExprKind::Ident(name), span))
            }
            ExprKind::Selector { x, sel } => {
                let sel = sel.clone();
                let x = *x;
                match &self.file.exprs[x].kind {
                    ExprKind::Ident(package) => {
                        let package = package.clone();
                        Some(self.alloc_type(
                            TypeExprKind::Qualified {
                                package,
                                name: sel.name,
                            },
                            span,
                        ))
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn parse_composite_lit(&mut self, type_expr: Option<TypeExprId>) -> ExprId {
        let start = self.peek_span();
        self.expect(&Token::LBrace);
        let saved = self.no_composite;
        self.no_composite = false;
        let mut elems = Vec::new();
        loop {
            self.skip_semis();
            if self.at_end() || self.check(&Token::RBrace) {
                break;
            }
            let elem = self.parse_composite_elem();
            elems.push(elem);
            if !self.eat(&Token::Comma) {
                self.skip_semis();
                break;
            }
        }
        self.no_composite = saved;
        let end = self.expect(&Token::RBrace).unwrap_or(start);
        self.alloc_expr(
            ExprKind::CompositeLit { type_expr, elems },
            start.merge(end),
        )
    }

    fn parse_composite_elem(&mut self) -> ExprId {
        let value_or_key = if self.check(&Token::LBrace) {
            self.parse_composite_lit(None)
        } else {
            self.parse_expr()
        };
        if self.eat(&Token::Colon) {
            let value = if self.check(&Token::LBrace) {
                self.parse_composite_lit(None)
            } else {
                self.parse_expr()
            };
            let span = self.file.exprs[value_or_key]
                .span
                .merge(self.file.exprs[value].span);
            return self.alloc_expr(
                ExprKind::KeyValue {
                    key: value_or_key,
                    value,
                },
                span,
            );
        }
        value_or_key
    }

    /// A call argument; `make`/`new`/conversion arguments may be types.
    fn parse_arg(&mut self) -> ExprId {
        match self.peek() {
            Some(
                Token::LBracket
                | Token::KwMap
                | Token::KwChan
                | Token::KwInterface
                | Token::KwStruct,
            ) => {
                let ty = self.parse_type();
                let span = self.file.type_exprs[ty].span;
                if self.check(&Token::LBrace) {
                    return self.parse_composite_lit(Some(ty));
                }
                self.alloc_expr(ExprKind::TypeLit(ty), span)
            }
            _ => self.parse_expr(),
        }
    }

    fn parse_primary(&mut self) -> ExprId {
        let start = self.peek_span();
        match self.peek().cloned() {
            Some(Token::Int(value)) => {
                self.advance();
                self.alloc_expr(ExprKind::IntLit(value), start)
            }
            Some(Token::Float(value)) => {
                self.advance();
                self.alloc_expr(ExprKind::FloatLit(value), start)
            }
            Some(Token::Str(value)) | Some(Token::RawStr(value)) => {
                self.advance();
                self.alloc_expr(ExprKind::StringLit(SmolStr::new(value)), start)
            }
            Some(Token::Rune(value)) => {
                self.advance();
                self.alloc_expr(ExprKind::RuneLit(value), start)
            }
            Some(Token::Ident(name)) => {
                self.advance();
                self.alloc_expr(ExprKind::Ident(name), start)
            }
            Some(Token::LParen) => {
                self.advance();
                let saved = self.no_composite;
                self.no_composite = false;
                let inner = self.parse_expr();
                self.no_composite = saved;
                let end = self.expect(&Token::RParen).unwrap_or(start);
                self.alloc_expr(ExprKind::Paren(inner), start.merge(end))
            }
            Some(Token::KwFunc) => {
                self.advance();
                let sig = self.parse_signature(start);
                if self.check(&Token::LBrace) {
                    let body = self.parse_block();
                    self.alloc_expr(ExprKind::FuncLit { sig, body }, start)
                } else {
                    self.alloc_expr(ExprKind::TypeLit(sig), start)
                }
            }
            Some(
                Token::LBracket
                | Token::KwMap
                | Token::KwChan
                | Token::KwInterface
                | Token::KwStruct,
            ) => {
                let ty = self.parse_type();
                let span = self.file.type_exprs[ty].span;
                if self.check(&Token::LBrace) {
                    self.parse_composite_lit(Some(ty))
                } else {
                    self.alloc_expr(ExprKind::TypeLit(ty), span)
                }
            }
            other => {
                self.error(format!("expected expression, found {:?}", other), start);
                if !self.at_end() {
                    self.advance();
                }
                self.error_expr()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> File {
        let (file, errors) = parse(source);
        assert!(errors.is_empty(), "parse errors: {:?}", errors);
        file
    }

    fn parse_fn_body(body: &str) -> File {
        parse_ok(&format!("package main\nfunc f() {{\n{}\n}}\n", body))
    }

    fn first_func(file: &File) -> &FuncDecl {
        file.decls
            .iter()
            .find_map(|d| match d {
                Decl::Func(f) => Some(f),
                _ => None,
            })
            .expect("no function declared")
    }

    #[test]
    fn package_and_imports() {
        let file = parse_ok("package main\nimport (\n\t\"fmt\"\n\tio2 \"io\"\n)\n");
        assert_eq!(file.package.name, "main");
        assert_eq!(file.imports.len(), 2);
        assert_eq!(file.imports[0].path, "fmt");
        assert_eq!(file.imports[0].local_name(), "fmt");
        assert_eq!(file.imports[1].local_name(), "io2");
    }

    #[test]
    fn var_decl_with_type_and_values() {
        let file = parse_ok("package p\nvar a, b int = 1, 2\n");
        let Decl::Gen(decl) = &file.decls[0] else {
            panic!("expected gen decl")
        };
        assert_eq!(decl.keyword, DeclKeyword::Var);
        let Spec::Value(spec) = &decl.specs[0] else {
            panic!("expected value spec")
        };
        assert_eq!(spec.names.len(), 2);
        assert!(spec.type_ann.is_some());
        assert_eq!(spec.values.len(), 2);
    }

    #[test]
    fn const_group_with_iota() {
        let file = parse_ok("package p\nconst (\n\tA = iota\n\tB\n\tC\n)\n");
        let Decl::Gen(decl) = &file.decls[0] else {
            panic!("expected gen decl")
        };
        assert_eq!(decl.specs.len(), 3);
        let Spec::Value(first) = &decl.specs[0] else {
            panic!()
        };
        assert_eq!(first.values.len(), 1);
        let Spec::Value(second) = &decl.specs[1] else {
            panic!()
        };
        assert!(second.values.is_empty());
    }

    #[test]
    fn recursive_type_decl() {
        let file = parse_ok("package p\ntype L struct {\n\tnext *L\n}\n");
        let Decl::Gen(decl) = &file.decls[0] else {
            panic!()
        };
        let Spec::Type(spec) = &decl.specs[0] else {
            panic!()
        };
        assert_eq!(spec.name.name, "L");
        let TypeExprKind::Struct { fields } = &file.type_exprs[spec.type_expr].kind else {
            panic!("expected struct type")
        };
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].names[0].name, "next");
    }

    #[test]
    fn method_with_pointer_receiver() {
        let file = parse_ok("package p\nfunc (s *Server) Close() error { return nil }\n");
        let func = first_func(&file);
        assert_eq!(func.name.name, "Close");
        assert_eq!(func.recv.len(), 1);
        assert_eq!(func.recv[0].names[0].name, "s");
        let TypeExprKind::Func { params, results } = &file.type_exprs[func.sig].kind else {
            panic!()
        };
        assert!(params.is_empty());
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn grouped_parameters() {
        let file = parse_ok("package p\nfunc add(a, b int, s string) int { return a }\n");
        let func = first_func(&file);
        let TypeExprKind::Func { params, .. } = &file.type_exprs[func.sig].kind else {
            panic!()
        };
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].names.len(), 2);
        assert_eq!(params[1].names.len(), 1);
    }

    #[test]
    fn anonymous_parameters() {
        let file = parse_ok("package p\nfunc h(int, string) {}\n");
        let func = first_func(&file);
        let TypeExprKind::Func { params, .. } = &file.type_exprs[func.sig].kind else {
            panic!()
        };
        assert_eq!(params.len(), 2);
        assert!(params.iter().all(|p| p.names.is_empty()));
    }

    #[test]
    fn variadic_parameter() {
        let file = parse_ok("package p\nfunc v(xs ...int) {}\n");
        let func = first_func(&file);
        let TypeExprKind::Func { params, .. } = &file.type_exprs[func.sig].kind else {
            panic!()
        };
        assert!(matches!(
            &file.type_exprs[params[0].type_expr].kind,
            TypeExprKind::Ellipsis(_)
        ));
    }

    #[test]
    fn short_var_decl_and_assign() {
        let file = parse_fn_body("x := 1\nx = 2\nx += 3");
        let func = first_func(&file);
        let body = func.body.as_ref().unwrap();
        assert_eq!(body.len(), 3);
        let StmtKind::Assign { tok, .. } = &file.stmts[body[0]].kind else {
            panic!()
        };
        assert_eq!(*tok, AssignTok::Define);
        let StmtKind::Assign { tok, .. } = &file.stmts[body[2]].kind else {
            panic!()
        };
        assert_eq!(*tok, AssignTok::OpAssign(BinaryOp::Add));
    }

    #[test]
    fn multi_assign_from_map_index() {
        let file = parse_fn_body("v, ok := m[\"x\"]");
        let func = first_func(&file);
        let body = func.body.as_ref().unwrap();
        let StmtKind::Assign { lhs, rhs, tok } = &file.stmts[body[0]].kind else {
            panic!()
        };
        assert_eq!(lhs.len(), 2);
        assert_eq!(rhs.len(), 1);
        assert!(tok.is_define());
        assert!(matches!(
            &file.exprs[rhs[0]].kind,
            ExprKind::Index { .. }
        ));
    }

    #[test]
    fn composite_literal_map() {
        let file = parse_fn_body("m := map[string]int{\"a\": 1}");
        let func = first_func(&file);
        let body = func.body.as_ref().unwrap();
        let StmtKind::Assign { rhs, .. } = &file.stmts[body[0]].kind else {
            panic!()
        };
        let ExprKind::CompositeLit { type_expr, elems } = &file.exprs[rhs[0]].kind else {
            panic!("expected composite literal")
        };
        assert!(type_expr.is_some());
        assert_eq!(elems.len(), 1);
        assert!(matches!(
            &file.exprs[elems[0]].kind,
            ExprKind::KeyValue { .. }
        ));
    }

    #[test]
    fn no_composite_literal_in_if_header() {
        let file = parse_fn_body("if x == y {\n\tx = y\n}");
        let func = first_func(&file);
        let body = func.body.as_ref().unwrap();
        assert!(matches!(&file.stmts[body[0]].kind, StmtKind::If { .. }));
    }

    #[test]
    fn if_with_init() {
        let file = parse_fn_body("if v, ok := m[k]; ok {\n\treturn\n}");
        let func = first_func(&file);
        let body = func.body.as_ref().unwrap();
        let StmtKind::If { init, .. } = &file.stmts[body[0]].kind else {
            panic!()
        };
        assert!(init.is_some());
    }

    #[test]
    fn for_range_with_key_value() {
        let file = parse_fn_body("for k, v := range s {\n\t_ = k\n\t_ = v\n}");
        let func = first_func(&file);
        let body = func.body.as_ref().unwrap();
        let StmtKind::Range {
            key, value, tok, ..
        } = &file.stmts[body[0]].kind
        else {
            panic!("expected range statement")
        };
        assert!(key.is_some());
        assert!(value.is_some());
        assert!(tok.is_define());
    }

    #[test]
    fn three_clause_for() {
        let file = parse_fn_body("for i := 0; i < 10; i++ {\n\tprintln(i)\n}");
        let func = first_func(&file);
        let body = func.body.as_ref().unwrap();
        let StmtKind::For {
            init, cond, post, ..
        } = &file.stmts[body[0]].kind
        else {
            panic!()
        };
        assert!(init.is_some());
        assert!(cond.is_some());
        assert!(post.is_some());
    }

    #[test]
    fn value_switch() {
        let file = parse_fn_body("switch x {\ncase 1, 2:\n\treturn\ndefault:\n\treturn\n}");
        let func = first_func(&file);
        let body = func.body.as_ref().unwrap();
        let StmtKind::Switch { tag, cases, .. } = &file.stmts[body[0]].kind else {
            panic!()
        };
        assert!(tag.is_some());
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].exprs.len(), 2);
        assert!(cases[1].exprs.is_empty());
    }

    #[test]
    fn type_switch_with_binding() {
        let file = parse_fn_body("switch v := x.(type) {\ncase int:\n\t_ = v\ncase string, bool:\n\t_ = v\n}");
        let func = first_func(&file);
        let body = func.body.as_ref().unwrap();
        let StmtKind::TypeSwitch { guard, cases, .. } = &file.stmts[body[0]].kind else {
            panic!("expected type switch")
        };
        assert!(matches!(
            &file.stmts[*guard].kind,
            StmtKind::Assign { .. }
        ));
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[1].types.len(), 2);
    }

    #[test]
    fn select_with_send_and_receive() {
        let file =
            parse_fn_body("select {\ncase ch <- v:\n\treturn\ncase v := <-ch:\n\t_ = v\ndefault:\n\treturn\n}");
        let func = first_func(&file);
        let body = func.body.as_ref().unwrap();
        let StmtKind::Select { clauses } = &file.stmts[body[0]].kind else {
            panic!()
        };
        assert_eq!(clauses.len(), 3);
        assert!(matches!(
            &file.stmts[clauses[0].comm.unwrap()].kind,
            StmtKind::Send { .. }
        ));
        assert!(matches!(
            &file.stmts[clauses[1].comm.unwrap()].kind,
            StmtKind::Assign { .. }
        ));
        assert!(clauses[2].comm.is_none());
    }

    #[test]
    fn go_defer_send_incdec() {
        let file = parse_fn_body("go run()\ndefer close(ch)\nch <- 1\ni++");
        let func = first_func(&file);
        let body = func.body.as_ref().unwrap();
        assert!(matches!(&file.stmts[body[0]].kind, StmtKind::Go(_)));
        assert!(matches!(&file.stmts[body[1]].kind, StmtKind::Defer(_)));
        assert!(matches!(&file.stmts[body[2]].kind, StmtKind::Send { .. }));
        assert!(matches!(&file.stmts[body[3]].kind, StmtKind::IncDec { .. }));
    }

    #[test]
    fn labeled_statement() {
        let file = parse_fn_body("loop:\nfor {\n\tbreak loop\n}");
        let func = first_func(&file);
        let body = func.body.as_ref().unwrap();
        let StmtKind::Labeled { label, .. } = &file.stmts[body[0]].kind else {
            panic!()
        };
        assert_eq!(label.name, "loop");
    }

    #[test]
    fn type_assertion_expr() {
        let file = parse_fn_body("x, ok := iface.(Foo)");
        let func = first_func(&file);
        let body = func.body.as_ref().unwrap();
        let StmtKind::Assign { rhs, .. } = &file.stmts[body[0]].kind else {
            panic!()
        };
        assert!(matches!(
            &file.exprs[rhs[0]].kind,
            ExprKind::TypeAssert {
                type_expr: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn operator_precedence() {
        let file = parse_fn_body("x := 1 + 2*3 == 7 && true");
        let func = first_func(&file);
        let body = func.body.as_ref().unwrap();
        let StmtKind::Assign { rhs, .. } = &file.stmts[body[0]].kind else {
            panic!()
        };
        let ExprKind::Binary { op, .. } = &file.exprs[rhs[0]].kind else {
            panic!()
        };
        assert_eq!(*op, BinaryOp::LogAnd);
    }

    #[test]
    fn channel_receive_unary() {
        let file = parse_fn_body("v := <-ch");
        let func = first_func(&file);
        let body = func.body.as_ref().unwrap();
        let StmtKind::Assign { rhs, .. } = &file.stmts[body[0]].kind else {
            panic!()
        };
        assert!(matches!(
            &file.exprs[rhs[0]].kind,
            ExprKind::Unary {
                op: UnaryOp::Recv,
                ..
            }
        ));
    }

    #[test]
    fn func_literal() {
        let file = parse_fn_body("f := func(x int) int {\n\treturn x\n}");
        let func = first_func(&file);
        let body = func.body.as_ref().unwrap();
        let StmtKind::Assign { rhs, .. } = &file.stmts[body[0]].kind else {
            panic!()
        };
        assert!(matches!(&file.exprs[rhs[0]].kind, ExprKind::FuncLit { .. }));
    }

    #[test]
    fn make_with_type_argument() {
        let file = parse_fn_body("m := make(map[string]int, 8)");
        let func = first_func(&file);
        let body = func.body.as_ref().unwrap();
        let StmtKind::Assign { rhs, .. } = &file.stmts[body[0]].kind else {
            panic!()
        };
        let ExprKind::Call { args, .. } = &file.exprs[rhs[0]].kind else {
            panic!()
        };
        assert_eq!(args.len(), 2);
        assert!(matches!(&file.exprs[args[0]].kind, ExprKind::TypeLit(_)));
    }

    #[test]
    fn chan_types() {
        let file = parse_ok("package p\nvar a chan int\nvar b <-chan int\nvar c chan<- int\n");
        let dirs: Vec<ChanDir> = file
            .decls
            .iter()
            .filter_map(|d| match d {
                Decl::Gen(g) => match &g.specs[0] {
                    Spec::Value(v) => match &file.type_exprs[v.type_ann.unwrap()].kind {
                        TypeExprKind::Chan { dir, .. } => Some(*dir),
                        _ => None,
                    },
                    _ => None,
                },
                _ => None,
            })
            .collect();
        assert_eq!(dirs, vec![ChanDir::Both, ChanDir::Recv, ChanDir::Send]);
    }

    #[test]
    fn interface_type_with_methods() {
        let file = parse_ok("package p\ntype Closer interface {\n\tClose() error\n}\n");
        let Decl::Gen(decl) = &file.decls[0] else {
            panic!()
        };
        let Spec::Type(spec) = &decl.specs[0] else {
            panic!()
        };
        let TypeExprKind::Interface { methods } = &file.type_exprs[spec.type_expr].kind else {
            panic!()
        };
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].name.name, "Close");
    }
}
