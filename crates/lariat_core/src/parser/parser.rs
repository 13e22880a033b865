//! Recursive-descent parser over a pre-lexed token buffer.
//!
//! Call [`parse`] to turn a source string into a [`Program`].  The grammar
//! covered is the script grammar reachable from a host-stringified function
//! wrapped in parentheses; the first diagnostic encountered is returned as
//! the parse result.
//!
//! Expressions are parsed with precedence climbing over an explicit
//! precedence table.  Arrow functions are decided by a bounded token
//! lookahead (find the token after the matching `)` and check for `=>`)
//! rather than by backtracking.

use bitflags::bitflags;

use crate::error::{LariatError, LariatResult};
use crate::parser::ast::*;
use crate::parser::scanner::{self, Token, TokenKind, TokenValue};

bitflags! {
    /// Parse-context flags gating context-sensitive productions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ParseFlags: u8 {
        /// Inside any function body.
        const IN_FUNCTION = 1 << 0;
        /// Inside a generator body (`yield` is an expression).
        const IN_GENERATOR = 1 << 1;
        /// Inside an async body (`await` is an expression).
        const IN_ASYNC = 1 << 2;
    }
}

/// Lowest binary precedence handed to the climber.
const PRECEDENCE_LOWEST: u8 = 1;

/// Parse `source` as a script and return its AST.
pub fn parse(source: &str) -> LariatResult<Program> {
    let tokens = scanner::tokenize(source)?;
    let mut parser = Parser::new(source, tokens);
    parser.parse_program()
}

// ─────────────────────────────────────────────────────────────────────────────
// Parser
// ─────────────────────────────────────────────────────────────────────────────

struct Parser<'src> {
    source: &'src str,
    tokens: Vec<Token>,
    pos: usize,
    flags: ParseFlags,
}

impl<'src> Parser<'src> {
    fn new(source: &'src str, tokens: Vec<Token>) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
            flags: ParseFlags::empty(),
        }
    }

    // ── Token cursor ──────────────────────────────────────────────────────

    fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn kind(&self) -> TokenKind {
        self.tokens[self.pos].kind
    }

    fn kind_at(&self, n: usize) -> TokenKind {
        self.tokens
            .get(self.pos + n)
            .map_or(TokenKind::Eof, |t| t.kind)
    }

    fn token_at(&self, n: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + n).min(last)]
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.kind() == kind {
            self.advance();
            return true;
        }
        false
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> LariatResult<Token> {
        if self.kind() == kind {
            Ok(self.advance())
        } else {
            Err(self.error_here(&format!("expected {what}")))
        }
    }

    fn error_here(&self, msg: &str) -> LariatError {
        let pos = self.current().span.start;
        LariatError::Syntax(format!("{} at {}:{}", msg, pos.line, pos.column))
    }

    /// Raw source text of a token (used for keywords in name position).
    fn token_text(&self, token: &Token) -> &'src str {
        token.span.text(self.source)
    }

    fn span_from(&self, start: SourceLocation) -> SourceLocation {
        // End of the previously consumed token.
        let end = if self.pos == 0 {
            start.end
        } else {
            self.tokens[self.pos - 1].span.end
        };
        SourceLocation {
            start: start.start,
            end,
        }
    }

    fn with_flags<T>(
        &mut self,
        flags: ParseFlags,
        f: impl FnOnce(&mut Self) -> LariatResult<T>,
    ) -> LariatResult<T> {
        let saved = self.flags;
        self.flags = flags;
        let result = f(self);
        self.flags = saved;
        result
    }

    // ── Identifier classification ─────────────────────────────────────────

    /// Returns `true` when the token at offset `n` may be used as an
    /// identifier reference or binding in the current context.
    fn is_identifier_like(&self, n: usize) -> bool {
        match self.kind_at(n) {
            TokenKind::Identifier
            | TokenKind::Async
            | TokenKind::Get
            | TokenKind::Set
            | TokenKind::Of
            | TokenKind::Static
            | TokenKind::Target
            | TokenKind::Meta
            | TokenKind::Let => true,
            TokenKind::Yield => !self.flags.contains(ParseFlags::IN_GENERATOR),
            TokenKind::Await => !self.flags.contains(ParseFlags::IN_ASYNC),
            _ => false,
        }
    }

    fn parse_identifier(&mut self, what: &str) -> LariatResult<Ident> {
        if !self.is_identifier_like(0) {
            return Err(self.error_here(&format!("expected {what}")));
        }
        let token = self.advance();
        let name = match token.kind {
            TokenKind::Identifier => token.text().to_owned(),
            _ => self.token_text(&token).to_owned(),
        };
        Ok(Ident {
            loc: token.span,
            name,
        })
    }

    // ── ASI ───────────────────────────────────────────────────────────────

    /// Consume a statement terminator, applying automatic semicolon
    /// insertion: an explicit `;`, a following `}`, end of input, or a
    /// preceding line terminator all terminate the statement.
    fn consume_semicolon(&mut self) -> LariatResult<()> {
        if self.eat(TokenKind::Semicolon) {
            return Ok(());
        }
        if self.kind() == TokenKind::RightBrace
            || self.kind() == TokenKind::Eof
            || self.current().newline_before
        {
            return Ok(());
        }
        Err(self.error_here("expected ';'"))
    }

    // ── Program / statements ──────────────────────────────────────────────

    fn parse_program(&mut self) -> LariatResult<Program> {
        let start = self.current().span;
        let mut body = Vec::new();
        while self.kind() != TokenKind::Eof {
            body.push(self.parse_statement()?);
        }
        Ok(Program {
            loc: self.span_from(start),
            body,
        })
    }

    fn parse_statement(&mut self) -> LariatResult<Stmt> {
        match self.kind() {
            TokenKind::LeftBrace => Ok(Stmt::Block(self.parse_block()?)),
            TokenKind::Var | TokenKind::Const => {
                let decl = self.parse_var_decl(true)?;
                Ok(Stmt::VarDecl(decl))
            }
            // `let` is only a declaration when a binding follows; otherwise
            // it is a plain identifier expression.
            TokenKind::Let
                if self.is_identifier_like(1)
                    || matches!(
                        self.kind_at(1),
                        TokenKind::LeftBracket | TokenKind::LeftBrace
                    ) =>
            {
                let decl = self.parse_var_decl(true)?;
                Ok(Stmt::VarDecl(decl))
            }
            TokenKind::Function => {
                self.advance();
                let func = self.parse_function_rest(false, true)?;
                Ok(Stmt::FnDecl(Box::new(func)))
            }
            TokenKind::Async
                if self.kind_at(1) == TokenKind::Function && !self.token_at(1).newline_before =>
            {
                self.advance();
                self.advance();
                let func = self.parse_function_rest(true, true)?;
                Ok(Stmt::FnDecl(Box::new(func)))
            }
            TokenKind::Class => {
                let class = self.parse_class(true)?;
                Ok(Stmt::ClassDecl(Box::new(class)))
            }
            TokenKind::If => self.parse_if_statement(),
            TokenKind::For => self.parse_for_statement(),
            TokenKind::While => self.parse_while_statement(),
            TokenKind::Do => self.parse_do_while_statement(),
            TokenKind::Switch => self.parse_switch_statement(),
            TokenKind::Try => self.parse_try_statement(),
            TokenKind::Return => self.parse_return_statement(),
            TokenKind::Throw => self.parse_throw_statement(),
            TokenKind::Break => self.parse_break_statement(),
            TokenKind::Continue => self.parse_continue_statement(),
            TokenKind::With => self.parse_with_statement(),
            TokenKind::Debugger => {
                let token = self.advance();
                self.consume_semicolon()?;
                Ok(Stmt::Debugger(DebuggerStmt { loc: token.span }))
            }
            TokenKind::Semicolon => {
                let token = self.advance();
                Ok(Stmt::Empty(EmptyStmt { loc: token.span }))
            }
            _ if self.is_identifier_like(0) && self.kind_at(1) == TokenKind::Colon => {
                let label = self.parse_identifier("label")?;
                self.advance(); // `:`
                let body = self.parse_statement()?;
                let loc = SourceLocation {
                    start: label.loc.start,
                    end: body.loc().end,
                };
                Ok(Stmt::Labeled(LabeledStmt {
                    loc,
                    label,
                    body: Box::new(body),
                }))
            }
            _ => {
                let start = self.current().span;
                let expr = self.parse_expression(false)?;
                self.consume_semicolon()?;
                Ok(Stmt::Expr(ExprStmt {
                    loc: self.span_from(start),
                    expr: Box::new(expr),
                }))
            }
        }
    }

    fn parse_block(&mut self) -> LariatResult<BlockStmt> {
        let start = self.expect(TokenKind::LeftBrace, "'{'")?.span;
        let mut body = Vec::new();
        while self.kind() != TokenKind::RightBrace {
            if self.kind() == TokenKind::Eof {
                return Err(self.error_here("unexpected end of input in block"));
            }
            body.push(self.parse_statement()?);
        }
        self.advance(); // `}`
        Ok(BlockStmt {
            loc: self.span_from(start),
            body,
        })
    }

    // ── Variable declarations ─────────────────────────────────────────────

    fn parse_var_decl(&mut self, with_semicolon: bool) -> LariatResult<VarDecl> {
        let keyword = self.advance();
        let kind = match keyword.kind {
            TokenKind::Var => VarKind::Var,
            TokenKind::Let => VarKind::Let,
            TokenKind::Const => VarKind::Const,
            _ => return Err(self.error_here("expected declaration keyword")),
        };
        let mut declarators = Vec::new();
        loop {
            let id = self.parse_binding_pattern()?;
            let init = if self.eat(TokenKind::Equal) {
                Some(Box::new(self.parse_assignment_expression(false)?))
            } else {
                None
            };
            let loc = SourceLocation {
                start: id.loc().start,
                end: init
                    .as_ref()
                    .map_or(id.loc().end, |e| e.loc().end),
            };
            declarators.push(VarDeclarator { loc, id, init });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        if with_semicolon {
            self.consume_semicolon()?;
        }
        Ok(VarDecl {
            loc: self.span_from(keyword.span),
            kind,
            declarators,
        })
    }

    // ── Binding patterns ──────────────────────────────────────────────────

    fn parse_binding_pattern(&mut self) -> LariatResult<Pat> {
        match self.kind() {
            TokenKind::LeftBracket => self.parse_array_pattern(),
            TokenKind::LeftBrace => self.parse_object_pattern(),
            _ => Ok(Pat::Ident(self.parse_identifier("binding name")?)),
        }
    }

    /// A pattern with an optional `= default` (parameters, array elements,
    /// object values).
    fn parse_binding_element(&mut self) -> LariatResult<Pat> {
        let pat = self.parse_binding_pattern()?;
        if self.eat(TokenKind::Equal) {
            let right = self.parse_assignment_expression(false)?;
            let loc = SourceLocation {
                start: pat.loc().start,
                end: right.loc().end,
            };
            return Ok(Pat::Assign(Box::new(AssignPat {
                loc,
                left: pat,
                right,
            })));
        }
        Ok(pat)
    }

    fn parse_array_pattern(&mut self) -> LariatResult<Pat> {
        let start = self.advance().span; // `[`
        let mut elements = Vec::new();
        while self.kind() != TokenKind::RightBracket {
            if self.eat(TokenKind::Comma) {
                elements.push(None);
                continue;
            }
            if self.kind() == TokenKind::DotDotDot {
                let rest_start = self.advance().span;
                let argument = self.parse_binding_pattern()?;
                let loc = SourceLocation {
                    start: rest_start.start,
                    end: argument.loc().end,
                };
                elements.push(Some(Pat::Rest(Box::new(RestPat { loc, argument }))));
            } else {
                elements.push(Some(self.parse_binding_element()?));
            }
            if self.kind() != TokenKind::RightBracket {
                self.expect(TokenKind::Comma, "',' in array pattern")?;
            }
        }
        self.advance(); // `]`
        Ok(Pat::Array(ArrayPat {
            loc: self.span_from(start),
            elements,
        }))
    }

    fn parse_object_pattern(&mut self) -> LariatResult<Pat> {
        let start = self.advance().span; // `{`
        let mut props = Vec::new();
        while self.kind() != TokenKind::RightBrace {
            if self.kind() == TokenKind::DotDotDot {
                let rest_start = self.advance().span;
                let argument = self.parse_binding_pattern()?;
                let loc = SourceLocation {
                    start: rest_start.start,
                    end: argument.loc().end,
                };
                props.push(ObjectPatProp::Rest(Box::new(RestPat { loc, argument })));
            } else {
                let key_start = self.current().span;
                let key = self.parse_property_key()?;
                if self.eat(TokenKind::Colon) {
                    let value = self.parse_binding_element()?;
                    props.push(ObjectPatProp::KeyValue(KeyValuePatProp {
                        loc: SourceLocation {
                            start: key_start.start,
                            end: value.loc().end,
                        },
                        key,
                        value: Box::new(value),
                    }));
                } else {
                    // Shorthand: the key must be a plain identifier.
                    let PropKey::Ident(ident) = key else {
                        return Err(self.error_here("expected ':' in object pattern"));
                    };
                    let default = if self.eat(TokenKind::Equal) {
                        Some(Box::new(self.parse_assignment_expression(false)?))
                    } else {
                        None
                    };
                    let end = default
                        .as_ref()
                        .map_or(ident.loc.end, |d| d.loc().end);
                    props.push(ObjectPatProp::Shorthand(ShorthandPatProp {
                        loc: SourceLocation {
                            start: key_start.start,
                            end,
                        },
                        key: ident,
                        default,
                    }));
                }
            }
            if self.kind() != TokenKind::RightBrace {
                self.expect(TokenKind::Comma, "',' in object pattern")?;
            }
        }
        self.advance(); // `}`
        Ok(Pat::Object(ObjectPat {
            loc: self.span_from(start),
            props,
        }))
    }

    // ── Property keys ─────────────────────────────────────────────────────

    fn parse_property_key(&mut self) -> LariatResult<PropKey> {
        match self.kind() {
            TokenKind::StringLiteral => {
                let token = self.advance();
                Ok(PropKey::Str(StringLit {
                    loc: token.span,
                    value: token.text().to_owned(),
                }))
            }
            TokenKind::NumericLiteral => {
                let token = self.advance();
                let value = match token.value {
                    TokenValue::Number(n) => n,
                    _ => 0.0,
                };
                Ok(PropKey::Num(NumLit {
                    loc: token.span,
                    value,
                }))
            }
            TokenKind::LeftBracket => {
                self.advance();
                let expr = self.parse_assignment_expression(false)?;
                self.expect(TokenKind::RightBracket, "']' after computed key")?;
                Ok(PropKey::Computed(Box::new(expr)))
            }
            TokenKind::PrivateIdentifier => {
                let token = self.advance();
                Ok(PropKey::Private(PrivateIdent {
                    loc: token.span,
                    name: token.text().to_owned(),
                }))
            }
            TokenKind::Identifier => {
                let token = self.advance();
                Ok(PropKey::Ident(Ident {
                    loc: token.span,
                    name: token.text().to_owned(),
                }))
            }
            // Any reserved word is a legal member name.
            kind if kind.is_keyword() => {
                let token = self.advance();
                Ok(PropKey::Ident(Ident {
                    loc: token.span,
                    name: self.token_text(&token).to_owned(),
                }))
            }
            _ => Err(self.error_here("expected property name")),
        }
    }

    /// Returns `true` when the token at offset `n` can start a property key.
    fn is_property_key_start(&self, n: usize) -> bool {
        let kind = self.kind_at(n);
        kind == TokenKind::Identifier
            || kind == TokenKind::StringLiteral
            || kind == TokenKind::NumericLiteral
            || kind == TokenKind::LeftBracket
            || kind == TokenKind::PrivateIdentifier
            || kind.is_keyword()
    }

    // ── Functions ─────────────────────────────────────────────────────────

    /// Parse a function after the `function` keyword has been consumed.
    fn parse_function_rest(
        &mut self,
        is_async: bool,
        name_required: bool,
    ) -> LariatResult<Function> {
        let start = self.current().span;
        let is_generator = self.eat(TokenKind::Star);
        let name = if self.is_identifier_like(0) {
            Some(self.parse_identifier("function name")?)
        } else if name_required {
            return Err(self.error_here("expected function name"));
        } else {
            None
        };
        let params = self.parse_params()?;
        let body = self.parse_function_body(is_async, is_generator)?;
        Ok(Function {
            loc: self.span_from(start),
            name,
            is_async,
            is_generator,
            params,
            body,
        })
    }

    fn parse_params(&mut self) -> LariatResult<Vec<Pat>> {
        self.expect(TokenKind::LeftParen, "'(' before parameter list")?;
        let mut params = Vec::new();
        while self.kind() != TokenKind::RightParen {
            if self.kind() == TokenKind::DotDotDot {
                let rest_start = self.advance().span;
                let argument = self.parse_binding_pattern()?;
                let loc = SourceLocation {
                    start: rest_start.start,
                    end: argument.loc().end,
                };
                params.push(Pat::Rest(Box::new(RestPat { loc, argument })));
            } else {
                params.push(self.parse_binding_element()?);
            }
            if self.kind() != TokenKind::RightParen {
                self.expect(TokenKind::Comma, "',' in parameter list")?;
            }
        }
        self.advance(); // `)`
        Ok(params)
    }

    fn parse_function_body(
        &mut self,
        is_async: bool,
        is_generator: bool,
    ) -> LariatResult<BlockStmt> {
        let mut flags = ParseFlags::IN_FUNCTION;
        flags.set(ParseFlags::IN_ASYNC, is_async);
        flags.set(ParseFlags::IN_GENERATOR, is_generator);
        self.with_flags(flags, |p| p.parse_block())
    }

    // ── Classes ───────────────────────────────────────────────────────────

    fn parse_class(&mut self, name_required: bool) -> LariatResult<Class> {
        let start = self.expect(TokenKind::Class, "'class'")?.span;
        let name = if self.is_identifier_like(0) {
            Some(self.parse_identifier("class name")?)
        } else if name_required {
            return Err(self.error_here("expected class name"));
        } else {
            None
        };
        let super_class = if self.eat(TokenKind::Extends) {
            Some(Box::new(self.parse_lhs_expression()?))
        } else {
            None
        };
        self.expect(TokenKind::LeftBrace, "'{' before class body")?;
        let mut members = Vec::new();
        while self.kind() != TokenKind::RightBrace {
            if self.kind() == TokenKind::Eof {
                return Err(self.error_here("unexpected end of input in class body"));
            }
            if self.eat(TokenKind::Semicolon) {
                continue;
            }
            members.push(self.parse_class_member()?);
        }
        self.advance(); // `}`
        Ok(Class {
            loc: self.span_from(start),
            name,
            super_class,
            members,
        })
    }

    fn parse_class_member(&mut self) -> LariatResult<ClassMember> {
        let start = self.current().span;

        // `static { … }` initialization block.
        if self.kind() == TokenKind::Static && self.kind_at(1) == TokenKind::LeftBrace {
            self.advance();
            let block = self
                .with_flags(ParseFlags::IN_FUNCTION, |p| p.parse_block())?;
            return Ok(ClassMember::StaticBlock(StaticBlock {
                loc: self.span_from(start),
                body: block.body,
            }));
        }

        // `static` as a modifier (not a member named `static`).
        let is_static = self.kind() == TokenKind::Static
            && (self.is_property_key_start(1) || matches!(self.kind_at(1), TokenKind::Star));
        if is_static {
            self.advance();
        }

        // `async` as a modifier.
        let is_async = self.kind() == TokenKind::Async
            && !self.token_at(1).newline_before
            && (self.is_property_key_start(1) || matches!(self.kind_at(1), TokenKind::Star));
        if is_async {
            self.advance();
        }

        let is_generator = self.eat(TokenKind::Star);

        // `get` / `set` as accessor modifiers.
        let mut kind = MethodKind::Method;
        if !is_async && !is_generator && self.is_property_key_start(1) {
            if self.kind() == TokenKind::Get {
                self.advance();
                kind = MethodKind::Get;
            } else if self.kind() == TokenKind::Set {
                self.advance();
                kind = MethodKind::Set;
            }
        }

        let key = self.parse_property_key()?;

        if self.kind() == TokenKind::LeftParen {
            let is_ctor_name = match &key {
                PropKey::Ident(id) => id.name == "constructor",
                PropKey::Str(s) => s.value == "constructor",
                _ => false,
            };
            if kind == MethodKind::Method && !is_static && !is_async && !is_generator && is_ctor_name
            {
                kind = MethodKind::Constructor;
            }
            let params = self.parse_params()?;
            let body = self.parse_function_body(is_async, is_generator)?;
            let value = Function {
                loc: self.span_from(start),
                name: None,
                is_async,
                is_generator,
                params,
                body,
            };
            return Ok(ClassMember::Method(MethodDef {
                loc: self.span_from(start),
                is_static,
                kind,
                key,
                value,
            }));
        }

        // Field definition.
        let value = if self.eat(TokenKind::Equal) {
            // Field initializers run with the instance as `this`.
            let expr =
                self.with_flags(ParseFlags::IN_FUNCTION, |p| {
                    p.parse_assignment_expression(false)
                })?;
            Some(Box::new(expr))
        } else {
            None
        };
        self.consume_semicolon()?;
        Ok(ClassMember::Field(FieldDef {
            loc: self.span_from(start),
            is_static,
            key,
            value,
        }))
    }

    // ── Control-flow statements ───────────────────────────────────────────

    fn parse_if_statement(&mut self) -> LariatResult<Stmt> {
        let start = self.advance().span; // `if`
        self.expect(TokenKind::LeftParen, "'(' after 'if'")?;
        let test = self.parse_expression(false)?;
        self.expect(TokenKind::RightParen, "')' after condition")?;
        let consequent = self.parse_statement()?;
        let alternate = if self.eat(TokenKind::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Stmt::If(IfStmt {
            loc: self.span_from(start),
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate,
        }))
    }

    fn parse_while_statement(&mut self) -> LariatResult<Stmt> {
        let start = self.advance().span; // `while`
        self.expect(TokenKind::LeftParen, "'(' after 'while'")?;
        let test = self.parse_expression(false)?;
        self.expect(TokenKind::RightParen, "')' after condition")?;
        let body = self.parse_statement()?;
        Ok(Stmt::While(WhileStmt {
            loc: self.span_from(start),
            test: Box::new(test),
            body: Box::new(body),
        }))
    }

    fn parse_do_while_statement(&mut self) -> LariatResult<Stmt> {
        let start = self.advance().span; // `do`
        let body = self.parse_statement()?;
        self.expect(TokenKind::While, "'while' after do-body")?;
        self.expect(TokenKind::LeftParen, "'(' after 'while'")?;
        let test = self.parse_expression(false)?;
        self.expect(TokenKind::RightParen, "')' after condition")?;
        // The trailing `;` of do-while is always optional.
        self.eat(TokenKind::Semicolon);
        Ok(Stmt::DoWhile(DoWhileStmt {
            loc: self.span_from(start),
            body: Box::new(body),
            test: Box::new(test),
        }))
    }

    fn parse_for_statement(&mut self) -> LariatResult<Stmt> {
        let start = self.advance().span; // `for`
        let is_await = self.eat(TokenKind::Await);
        self.expect(TokenKind::LeftParen, "'(' after 'for'")?;

        // Empty initializer: `for (;…)`.
        if self.eat(TokenKind::Semicolon) {
            return self.parse_for_rest(start, None);
        }

        let is_decl = matches!(self.kind(), TokenKind::Var | TokenKind::Const)
            || (self.kind() == TokenKind::Let
                && (self.is_identifier_like(1)
                    || matches!(
                        self.kind_at(1),
                        TokenKind::LeftBracket | TokenKind::LeftBrace
                    )));

        if is_decl {
            let decl = self.parse_for_head_decl()?;
            match self.kind() {
                TokenKind::In => {
                    self.advance();
                    let right = self.parse_expression(false)?;
                    self.expect(TokenKind::RightParen, "')' after for-in head")?;
                    let body = self.parse_statement()?;
                    return Ok(Stmt::ForIn(ForInStmt {
                        loc: self.span_from(start),
                        left: ForHead::VarDecl(decl),
                        right: Box::new(right),
                        body: Box::new(body),
                    }));
                }
                TokenKind::Of => {
                    self.advance();
                    let right = self.parse_assignment_expression(false)?;
                    self.expect(TokenKind::RightParen, "')' after for-of head")?;
                    let body = self.parse_statement()?;
                    return Ok(Stmt::ForOf(ForOfStmt {
                        loc: self.span_from(start),
                        is_await,
                        left: ForHead::VarDecl(decl),
                        right: Box::new(right),
                        body: Box::new(body),
                    }));
                }
                _ => {
                    self.expect(TokenKind::Semicolon, "';' after for-initializer")?;
                    return self.parse_for_rest(start, Some(ForInit::VarDecl(decl)));
                }
            }
        }

        let init = self.parse_expression(true)?;
        match self.kind() {
            TokenKind::In => {
                self.advance();
                let right = self.parse_expression(false)?;
                self.expect(TokenKind::RightParen, "')' after for-in head")?;
                let body = self.parse_statement()?;
                Ok(Stmt::ForIn(ForInStmt {
                    loc: self.span_from(start),
                    left: ForHead::Target(Box::new(init)),
                    right: Box::new(right),
                    body: Box::new(body),
                }))
            }
            TokenKind::Of => {
                self.advance();
                let right = self.parse_assignment_expression(false)?;
                self.expect(TokenKind::RightParen, "')' after for-of head")?;
                let body = self.parse_statement()?;
                Ok(Stmt::ForOf(ForOfStmt {
                    loc: self.span_from(start),
                    is_await,
                    left: ForHead::Target(Box::new(init)),
                    right: Box::new(right),
                    body: Box::new(body),
                }))
            }
            _ => {
                self.expect(TokenKind::Semicolon, "';' after for-initializer")?;
                self.parse_for_rest(start, Some(ForInit::Expr(Box::new(init))))
            }
        }
    }

    /// The declarators of a `for` head, without a terminator and with `in`
    /// disallowed as an operator.
    fn parse_for_head_decl(&mut self) -> LariatResult<VarDecl> {
        let keyword = self.advance();
        let kind = match keyword.kind {
            TokenKind::Var => VarKind::Var,
            TokenKind::Let => VarKind::Let,
            TokenKind::Const => VarKind::Const,
            _ => return Err(self.error_here("expected declaration keyword")),
        };
        let mut declarators = Vec::new();
        loop {
            let id = self.parse_binding_pattern()?;
            let init = if self.eat(TokenKind::Equal) {
                Some(Box::new(self.parse_assignment_expression(true)?))
            } else {
                None
            };
            let loc = SourceLocation {
                start: id.loc().start,
                end: init.as_ref().map_or(id.loc().end, |e| e.loc().end),
            };
            declarators.push(VarDeclarator { loc, id, init });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        Ok(VarDecl {
            loc: self.span_from(keyword.span),
            kind,
            declarators,
        })
    }

    fn parse_for_rest(
        &mut self,
        start: SourceLocation,
        init: Option<ForInit>,
    ) -> LariatResult<Stmt> {
        let test = if self.kind() == TokenKind::Semicolon {
            None
        } else {
            Some(Box::new(self.parse_expression(false)?))
        };
        self.expect(TokenKind::Semicolon, "';' after for-condition")?;
        let update = if self.kind() == TokenKind::RightParen {
            None
        } else {
            Some(Box::new(self.parse_expression(false)?))
        };
        self.expect(TokenKind::RightParen, "')' after for-head")?;
        let body = self.parse_statement()?;
        Ok(Stmt::For(ForStmt {
            loc: self.span_from(start),
            init,
            test,
            update,
            body: Box::new(body),
        }))
    }

    fn parse_switch_statement(&mut self) -> LariatResult<Stmt> {
        let start = self.advance().span; // `switch`
        self.expect(TokenKind::LeftParen, "'(' after 'switch'")?;
        let discriminant = self.parse_expression(false)?;
        self.expect(TokenKind::RightParen, "')' after discriminant")?;
        self.expect(TokenKind::LeftBrace, "'{' before switch body")?;
        let mut cases = Vec::new();
        while self.kind() != TokenKind::RightBrace {
            let case_start = self.current().span;
            let test = if self.eat(TokenKind::Case) {
                let test = self.parse_expression(false)?;
                Some(test)
            } else {
                self.expect(TokenKind::Default, "'case' or 'default'")?;
                None
            };
            self.expect(TokenKind::Colon, "':' after case")?;
            let mut consequent = Vec::new();
            while !matches!(
                self.kind(),
                TokenKind::Case | TokenKind::Default | TokenKind::RightBrace
            ) {
                if self.kind() == TokenKind::Eof {
                    return Err(self.error_here("unexpected end of input in switch"));
                }
                consequent.push(self.parse_statement()?);
            }
            cases.push(SwitchCase {
                loc: self.span_from(case_start),
                test,
                consequent,
            });
        }
        self.advance(); // `}`
        Ok(Stmt::Switch(SwitchStmt {
            loc: self.span_from(start),
            discriminant: Box::new(discriminant),
            cases,
        }))
    }

    fn parse_try_statement(&mut self) -> LariatResult<Stmt> {
        let start = self.advance().span; // `try`
        let block = self.parse_block()?;
        let handler = if self.kind() == TokenKind::Catch {
            let catch_start = self.advance().span;
            let param = if self.eat(TokenKind::LeftParen) {
                let pat = self.parse_binding_pattern()?;
                self.expect(TokenKind::RightParen, "')' after catch binding")?;
                Some(pat)
            } else {
                None
            };
            let body = self.parse_block()?;
            Some(CatchClause {
                loc: self.span_from(catch_start),
                param,
                body,
            })
        } else {
            None
        };
        let finalizer = if self.eat(TokenKind::Finally) {
            Some(self.parse_block()?)
        } else {
            None
        };
        if handler.is_none() && finalizer.is_none() {
            return Err(self.error_here("expected 'catch' or 'finally' after try-block"));
        }
        Ok(Stmt::Try(TryStmt {
            loc: self.span_from(start),
            block,
            handler,
            finalizer,
        }))
    }

    fn parse_return_statement(&mut self) -> LariatResult<Stmt> {
        if !self.flags.contains(ParseFlags::IN_FUNCTION) {
            return Err(self.error_here("'return' outside of a function"));
        }
        let start = self.advance().span; // `return`
        let argument = if matches!(
            self.kind(),
            TokenKind::Semicolon | TokenKind::RightBrace | TokenKind::Eof
        ) || self.current().newline_before
        {
            None
        } else {
            Some(Box::new(self.parse_expression(false)?))
        };
        self.consume_semicolon()?;
        Ok(Stmt::Return(ReturnStmt {
            loc: self.span_from(start),
            argument,
        }))
    }

    fn parse_throw_statement(&mut self) -> LariatResult<Stmt> {
        let start = self.advance().span; // `throw`
        if self.current().newline_before {
            return Err(self.error_here("no line break is allowed after 'throw'"));
        }
        let argument = self.parse_expression(false)?;
        self.consume_semicolon()?;
        Ok(Stmt::Throw(ThrowStmt {
            loc: self.span_from(start),
            argument: Box::new(argument),
        }))
    }

    fn parse_break_statement(&mut self) -> LariatResult<Stmt> {
        let start = self.advance().span; // `break`
        let label = if self.is_identifier_like(0) && !self.current().newline_before {
            Some(self.parse_identifier("label")?)
        } else {
            None
        };
        self.consume_semicolon()?;
        Ok(Stmt::Break(BreakStmt {
            loc: self.span_from(start),
            label,
        }))
    }

    fn parse_continue_statement(&mut self) -> LariatResult<Stmt> {
        let start = self.advance().span; // `continue`
        let label = if self.is_identifier_like(0) && !self.current().newline_before {
            Some(self.parse_identifier("label")?)
        } else {
            None
        };
        self.consume_semicolon()?;
        Ok(Stmt::Continue(ContinueStmt {
            loc: self.span_from(start),
            label,
        }))
    }

    fn parse_with_statement(&mut self) -> LariatResult<Stmt> {
        let start = self.advance().span; // `with`
        self.expect(TokenKind::LeftParen, "'(' after 'with'")?;
        let object = self.parse_expression(false)?;
        self.expect(TokenKind::RightParen, "')' after with-object")?;
        let body = self.parse_statement()?;
        Ok(Stmt::With(WithStmt {
            loc: self.span_from(start),
            object: Box::new(object),
            body: Box::new(body),
        }))
    }

    // ── Expressions ───────────────────────────────────────────────────────

    /// Full (comma-level) expression.  `no_in` suppresses the `in` operator
    /// for `for`-statement heads.
    fn parse_expression(&mut self, no_in: bool) -> LariatResult<Expr> {
        let first = self.parse_assignment_expression(no_in)?;
        if self.kind() != TokenKind::Comma {
            return Ok(first);
        }
        let start = first.loc();
        let mut expressions = vec![first];
        while self.eat(TokenKind::Comma) {
            expressions.push(self.parse_assignment_expression(no_in)?);
        }
        Ok(Expr::Sequence(Box::new(SequenceExpr {
            loc: self.span_from(start),
            expressions,
        })))
    }

    fn parse_assignment_expression(&mut self, no_in: bool) -> LariatResult<Expr> {
        // Arrow functions are decided up-front by lookahead.
        if let Some(arrow) = self.try_parse_arrow_function()? {
            return Ok(arrow);
        }

        if self.kind() == TokenKind::Yield && self.flags.contains(ParseFlags::IN_GENERATOR) {
            return self.parse_yield_expression(no_in);
        }

        let left = self.parse_conditional_expression(no_in)?;

        let op = match self.kind() {
            TokenKind::Equal => AssignOp::Assign,
            TokenKind::PlusEqual => AssignOp::Add,
            TokenKind::MinusEqual => AssignOp::Sub,
            TokenKind::StarEqual => AssignOp::Mul,
            TokenKind::SlashEqual => AssignOp::Div,
            TokenKind::PercentEqual => AssignOp::Mod,
            TokenKind::StarStarEqual => AssignOp::Exp,
            TokenKind::LessLessEqual => AssignOp::ShiftLeft,
            TokenKind::GreaterGreaterEqual => AssignOp::ShiftRight,
            TokenKind::GreaterGreaterGreaterEqual => AssignOp::UnsignedShiftRight,
            TokenKind::AmpersandEqual => AssignOp::BitAnd,
            TokenKind::PipeEqual => AssignOp::BitOr,
            TokenKind::CaretEqual => AssignOp::BitXor,
            TokenKind::AmpersandAmpersandEqual => AssignOp::And,
            TokenKind::PipePipeEqual => AssignOp::Or,
            TokenKind::QuestionQuestionEqual => AssignOp::Coalesce,
            _ => return Ok(left),
        };

        if !matches!(
            left,
            Expr::Ident(_) | Expr::Member(_) | Expr::Array(_) | Expr::Object(_)
        ) {
            return Err(self.error_here("invalid assignment target"));
        }

        self.advance();
        let right = self.parse_assignment_expression(no_in)?;
        let loc = SourceLocation {
            start: left.loc().start,
            end: right.loc().end,
        };
        Ok(Expr::Assign(Box::new(AssignExpr {
            loc,
            op,
            left: Box::new(left),
            right: Box::new(right),
        })))
    }

    fn parse_yield_expression(&mut self, no_in: bool) -> LariatResult<Expr> {
        let start = self.advance().span; // `yield`
        let delegate = !self.current().newline_before && self.eat(TokenKind::Star);
        let argument = if !self.current().newline_before && self.can_start_expression() {
            Some(Box::new(self.parse_assignment_expression(no_in)?))
        } else {
            None
        };
        Ok(Expr::Yield(Box::new(YieldExpr {
            loc: self.span_from(start),
            delegate,
            argument,
        })))
    }

    fn can_start_expression(&self) -> bool {
        !matches!(
            self.kind(),
            TokenKind::Semicolon
                | TokenKind::RightParen
                | TokenKind::RightBracket
                | TokenKind::RightBrace
                | TokenKind::Colon
                | TokenKind::Comma
                | TokenKind::TemplateMiddle
                | TokenKind::TemplateTail
                | TokenKind::Eof
        )
    }

    fn parse_conditional_expression(&mut self, no_in: bool) -> LariatResult<Expr> {
        let test = self.parse_binary_expression(PRECEDENCE_LOWEST, no_in)?;
        if !self.eat(TokenKind::Question) {
            return Ok(test);
        }
        let consequent = self.parse_assignment_expression(false)?;
        self.expect(TokenKind::Colon, "':' in conditional")?;
        let alternate = self.parse_assignment_expression(no_in)?;
        let loc = SourceLocation {
            start: test.loc().start,
            end: alternate.loc().end,
        };
        Ok(Expr::Conditional(Box::new(ConditionalExpr {
            loc,
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })))
    }

    /// Precedence of a binary/logical operator, or `None` for non-operators.
    fn binary_precedence(&self, kind: TokenKind, no_in: bool) -> Option<u8> {
        let prec = match kind {
            TokenKind::QuestionQuestion => 1,
            TokenKind::PipePipe => 2,
            TokenKind::AmpersandAmpersand => 3,
            TokenKind::Pipe => 4,
            TokenKind::Caret => 5,
            TokenKind::Ampersand => 6,
            TokenKind::EqualEqual
            | TokenKind::BangEqual
            | TokenKind::EqualEqualEqual
            | TokenKind::BangEqualEqual => 7,
            TokenKind::In if no_in => return None,
            TokenKind::Less
            | TokenKind::LessEqual
            | TokenKind::Greater
            | TokenKind::GreaterEqual
            | TokenKind::In
            | TokenKind::Instanceof => 8,
            TokenKind::LessLess | TokenKind::GreaterGreater | TokenKind::GreaterGreaterGreater => 9,
            TokenKind::Plus | TokenKind::Minus => 10,
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent => 11,
            TokenKind::StarStar => 12,
            _ => return None,
        };
        Some(prec)
    }

    fn parse_binary_expression(&mut self, min_prec: u8, no_in: bool) -> LariatResult<Expr> {
        let mut left = self.parse_unary_expression(no_in)?;
        while let Some(prec) = self.binary_precedence(self.kind(), no_in) {
            if prec < min_prec {
                break;
            }
            let op_token = self.advance();
            // `**` is right-associative; everything else is left-associative.
            let next_min = if op_token.kind == TokenKind::StarStar {
                prec
            } else {
                prec + 1
            };
            let right = self.parse_binary_expression(next_min, no_in)?;
            let loc = SourceLocation {
                start: left.loc().start,
                end: right.loc().end,
            };
            left = match op_token.kind {
                TokenKind::AmpersandAmpersand | TokenKind::PipePipe | TokenKind::QuestionQuestion => {
                    let op = match op_token.kind {
                        TokenKind::AmpersandAmpersand => LogicalOp::And,
                        TokenKind::PipePipe => LogicalOp::Or,
                        _ => LogicalOp::Coalesce,
                    };
                    Expr::Logical(Box::new(LogicalExpr {
                        loc,
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                    }))
                }
                kind => {
                    let op = match kind {
                        TokenKind::Plus => BinaryOp::Add,
                        TokenKind::Minus => BinaryOp::Sub,
                        TokenKind::Star => BinaryOp::Mul,
                        TokenKind::Slash => BinaryOp::Div,
                        TokenKind::Percent => BinaryOp::Mod,
                        TokenKind::StarStar => BinaryOp::Exp,
                        TokenKind::EqualEqual => BinaryOp::Eq,
                        TokenKind::BangEqual => BinaryOp::NotEq,
                        TokenKind::EqualEqualEqual => BinaryOp::StrictEq,
                        TokenKind::BangEqualEqual => BinaryOp::StrictNotEq,
                        TokenKind::Less => BinaryOp::Less,
                        TokenKind::LessEqual => BinaryOp::LessEq,
                        TokenKind::Greater => BinaryOp::Greater,
                        TokenKind::GreaterEqual => BinaryOp::GreaterEq,
                        TokenKind::LessLess => BinaryOp::ShiftLeft,
                        TokenKind::GreaterGreater => BinaryOp::ShiftRight,
                        TokenKind::GreaterGreaterGreater => BinaryOp::UnsignedShiftRight,
                        TokenKind::Ampersand => BinaryOp::BitAnd,
                        TokenKind::Pipe => BinaryOp::BitOr,
                        TokenKind::Caret => BinaryOp::BitXor,
                        TokenKind::In => BinaryOp::In,
                        TokenKind::Instanceof => BinaryOp::Instanceof,
                        _ => return Err(self.error_here("unexpected binary operator")),
                    };
                    Expr::Binary(Box::new(BinaryExpr {
                        loc,
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                    }))
                }
            };
        }
        Ok(left)
    }

    fn parse_unary_expression(&mut self, no_in: bool) -> LariatResult<Expr> {
        let op = match self.kind() {
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Minus => Some(UnaryOp::Minus),
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::Typeof => Some(UnaryOp::Typeof),
            TokenKind::Void => Some(UnaryOp::Void),
            TokenKind::Delete => Some(UnaryOp::Delete),
            _ => None,
        };
        if let Some(op) = op {
            let start = self.advance().span;
            let argument = self.parse_unary_expression(no_in)?;
            return Ok(Expr::Unary(Box::new(UnaryExpr {
                loc: self.span_from(start),
                op,
                argument: Box::new(argument),
            })));
        }

        if matches!(self.kind(), TokenKind::PlusPlus | TokenKind::MinusMinus) {
            let token = self.advance();
            let op = if token.kind == TokenKind::PlusPlus {
                UpdateOp::Increment
            } else {
                UpdateOp::Decrement
            };
            let argument = self.parse_unary_expression(no_in)?;
            return Ok(Expr::Update(Box::new(UpdateExpr {
                loc: self.span_from(token.span),
                op,
                prefix: true,
                argument: Box::new(argument),
            })));
        }

        if self.kind() == TokenKind::Await && self.flags.contains(ParseFlags::IN_ASYNC) {
            let start = self.advance().span;
            let argument = self.parse_unary_expression(no_in)?;
            return Ok(Expr::Await(Box::new(AwaitExpr {
                loc: self.span_from(start),
                argument: Box::new(argument),
            })));
        }

        let expr = self.parse_lhs_expression()?;

        // Postfix update: no line terminator permitted before the operator.
        if matches!(self.kind(), TokenKind::PlusPlus | TokenKind::MinusMinus)
            && !self.current().newline_before
        {
            let token = self.advance();
            let op = if token.kind == TokenKind::PlusPlus {
                UpdateOp::Increment
            } else {
                UpdateOp::Decrement
            };
            let loc = SourceLocation {
                start: expr.loc().start,
                end: token.span.end,
            };
            return Ok(Expr::Update(Box::new(UpdateExpr {
                loc,
                op,
                prefix: false,
                argument: Box::new(expr),
            })));
        }

        Ok(expr)
    }

    // ── Left-hand-side expressions ────────────────────────────────────────

    fn parse_lhs_expression(&mut self) -> LariatResult<Expr> {
        let base = if self.kind() == TokenKind::New {
            self.parse_new_expression()?
        } else {
            self.parse_primary_expression()?
        };
        self.parse_call_tail(base, true)
    }

    fn parse_new_expression(&mut self) -> LariatResult<Expr> {
        let start = self.advance().span; // `new`

        // `new.target`
        if self.eat(TokenKind::Dot) {
            self.expect(TokenKind::Target, "'target' after 'new.'")?;
            return Ok(Expr::MetaProp(MetaPropExpr {
                loc: self.span_from(start),
                kind: MetaPropKind::NewTarget,
            }));
        }

        let callee = if self.kind() == TokenKind::New {
            self.parse_new_expression()?
        } else {
            let primary = self.parse_primary_expression()?;
            // Member accesses bind tighter than `new`; calls do not.
            self.parse_call_tail(primary, false)?
        };
        let arguments = if self.kind() == TokenKind::LeftParen {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Ok(Expr::New(Box::new(NewExpr {
            loc: self.span_from(start),
            callee: Box::new(callee),
            arguments,
        })))
    }

    /// Member / call / tagged-template suffixes.
    fn parse_call_tail(&mut self, mut expr: Expr, allow_call: bool) -> LariatResult<Expr> {
        loop {
            match self.kind() {
                TokenKind::Dot => {
                    self.advance();
                    let property = self.parse_member_name()?;
                    let loc = SourceLocation {
                        start: expr.loc().start,
                        end: self.tokens[self.pos - 1].span.end,
                    };
                    expr = Expr::Member(Box::new(MemberExpr {
                        loc,
                        object: Box::new(expr),
                        property,
                        optional: false,
                    }));
                }
                TokenKind::QuestionDot => {
                    self.advance();
                    match self.kind() {
                        TokenKind::LeftParen if allow_call => {
                            let arguments = self.parse_arguments()?;
                            let loc = self.loc_to_prev(&expr);
                            expr = Expr::Call(Box::new(CallExpr {
                                loc,
                                callee: Box::new(expr),
                                arguments,
                                optional: true,
                            }));
                        }
                        TokenKind::LeftBracket => {
                            self.advance();
                            let prop = self.parse_expression(false)?;
                            self.expect(TokenKind::RightBracket, "']' after member index")?;
                            let loc = self.loc_to_prev(&expr);
                            expr = Expr::Member(Box::new(MemberExpr {
                                loc,
                                object: Box::new(expr),
                                property: MemberProp::Computed(Box::new(prop)),
                                optional: true,
                            }));
                        }
                        _ => {
                            let property = self.parse_member_name()?;
                            let loc = self.loc_to_prev(&expr);
                            expr = Expr::Member(Box::new(MemberExpr {
                                loc,
                                object: Box::new(expr),
                                property,
                                optional: true,
                            }));
                        }
                    }
                }
                TokenKind::LeftBracket => {
                    self.advance();
                    let prop = self.parse_expression(false)?;
                    self.expect(TokenKind::RightBracket, "']' after member index")?;
                    let loc = self.loc_to_prev(&expr);
                    expr = Expr::Member(Box::new(MemberExpr {
                        loc,
                        object: Box::new(expr),
                        property: MemberProp::Computed(Box::new(prop)),
                        optional: false,
                    }));
                }
                TokenKind::LeftParen if allow_call => {
                    let arguments = self.parse_arguments()?;
                    let loc = self.loc_to_prev(&expr);
                    expr = Expr::Call(Box::new(CallExpr {
                        loc,
                        callee: Box::new(expr),
                        arguments,
                        optional: false,
                    }));
                }
                TokenKind::NoSubstitutionTemplate | TokenKind::TemplateHead => {
                    let quasi = self.parse_template_literal()?;
                    let loc = SourceLocation {
                        start: expr.loc().start,
                        end: quasi.loc.end,
                    };
                    expr = Expr::TaggedTemplate(Box::new(TaggedTemplateExpr {
                        loc,
                        tag: Box::new(expr),
                        quasi,
                    }));
                }
                _ => return Ok(expr),
            }
        }
    }

    fn loc_to_prev(&self, expr: &Expr) -> SourceLocation {
        SourceLocation {
            start: expr.loc().start,
            end: self.tokens[self.pos - 1].span.end,
        }
    }

    fn parse_member_name(&mut self) -> LariatResult<MemberProp> {
        match self.kind() {
            TokenKind::PrivateIdentifier => {
                let token = self.advance();
                Ok(MemberProp::Private(PrivateIdent {
                    loc: token.span,
                    name: token.text().to_owned(),
                }))
            }
            TokenKind::Identifier => {
                let token = self.advance();
                Ok(MemberProp::Ident(Ident {
                    loc: token.span,
                    name: token.text().to_owned(),
                }))
            }
            kind if kind.is_keyword() => {
                let token = self.advance();
                Ok(MemberProp::Ident(Ident {
                    loc: token.span,
                    name: self.token_text(&token).to_owned(),
                }))
            }
            _ => Err(self.error_here("expected member name after '.'")),
        }
    }

    fn parse_arguments(&mut self) -> LariatResult<Vec<Expr>> {
        self.expect(TokenKind::LeftParen, "'(' before arguments")?;
        let mut arguments = Vec::new();
        while self.kind() != TokenKind::RightParen {
            if self.kind() == TokenKind::DotDotDot {
                let start = self.advance().span;
                let argument = self.parse_assignment_expression(false)?;
                let loc = SourceLocation {
                    start: start.start,
                    end: argument.loc().end,
                };
                arguments.push(Expr::Spread(Box::new(SpreadElement {
                    loc,
                    argument: Box::new(argument),
                })));
            } else {
                arguments.push(self.parse_assignment_expression(false)?);
            }
            if self.kind() != TokenKind::RightParen {
                self.expect(TokenKind::Comma, "',' between arguments")?;
            }
        }
        self.advance(); // `)`
        Ok(arguments)
    }

    // ── Arrow functions ───────────────────────────────────────────────────

    /// Detect and parse an arrow function at the current position, or
    /// return `None` without consuming anything.
    fn try_parse_arrow_function(&mut self) -> LariatResult<Option<Expr>> {
        // `async` arrows: `async x => …` / `async (…) => …`.
        if self.kind() == TokenKind::Async && !self.token_at(1).newline_before {
            if self.is_identifier_like(1) && self.kind_at(2) == TokenKind::Arrow {
                let start = self.advance().span; // `async`
                return Ok(Some(self.parse_arrow_rest(start, true)?));
            }
            if self.kind_at(1) == TokenKind::LeftParen && self.is_arrow_ahead(1) {
                let start = self.advance().span; // `async`
                return Ok(Some(self.parse_arrow_rest(start, true)?));
            }
            return Ok(None);
        }

        if self.is_identifier_like(0) && self.kind_at(1) == TokenKind::Arrow {
            let start = self.current().span;
            return Ok(Some(self.parse_arrow_rest(start, false)?));
        }

        if self.kind() == TokenKind::LeftParen && self.is_arrow_ahead(0) {
            let start = self.current().span;
            return Ok(Some(self.parse_arrow_rest(start, false)?));
        }

        Ok(None)
    }

    /// Returns `true` when the `(` at token offset `n` closes with a `)`
    /// that is immediately followed by `=>`.
    fn is_arrow_ahead(&self, n: usize) -> bool {
        debug_assert_eq!(self.kind_at(n), TokenKind::LeftParen);
        let mut depth = 0usize;
        let mut i = self.pos + n;
        while let Some(token) = self.tokens.get(i) {
            match token.kind {
                TokenKind::LeftParen | TokenKind::LeftBracket | TokenKind::LeftBrace => depth += 1,
                TokenKind::RightParen | TokenKind::RightBracket | TokenKind::RightBrace => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return token.kind == TokenKind::RightParen
                            && self.tokens.get(i + 1).is_some_and(|t| t.kind == TokenKind::Arrow);
                    }
                }
                TokenKind::Eof => return false,
                _ => {}
            }
            i += 1;
        }
        false
    }

    /// Parse an arrow function whose parameter list starts at the current
    /// token (`async` already consumed if present).
    fn parse_arrow_rest(&mut self, start: SourceLocation, is_async: bool) -> LariatResult<Expr> {
        let params = if self.kind() == TokenKind::LeftParen {
            self.parse_params()?
        } else {
            vec![Pat::Ident(self.parse_identifier("arrow parameter")?)]
        };
        self.expect(TokenKind::Arrow, "'=>'")?;

        let mut flags = ParseFlags::IN_FUNCTION;
        flags.set(ParseFlags::IN_ASYNC, is_async);
        let body = if self.kind() == TokenKind::LeftBrace {
            ArrowBody::Block(self.with_flags(flags, |p| p.parse_block())?)
        } else {
            ArrowBody::Expr(Box::new(
                self.with_flags(flags, |p| p.parse_assignment_expression(false))?,
            ))
        };
        Ok(Expr::Arrow(Box::new(ArrowExpr {
            loc: self.span_from(start),
            is_async,
            params,
            body,
        })))
    }

    // ── Primary expressions ───────────────────────────────────────────────

    fn parse_primary_expression(&mut self) -> LariatResult<Expr> {
        match self.kind() {
            TokenKind::Null => {
                let token = self.advance();
                Ok(Expr::Null(NullLit { loc: token.span }))
            }
            TokenKind::True | TokenKind::False => {
                let token = self.advance();
                Ok(Expr::Bool(BoolLit {
                    loc: token.span,
                    value: token.kind == TokenKind::True,
                }))
            }
            TokenKind::NumericLiteral => {
                let token = self.advance();
                let value = match token.value {
                    TokenValue::Number(n) => n,
                    _ => 0.0,
                };
                Ok(Expr::Num(NumLit {
                    loc: token.span,
                    value,
                }))
            }
            TokenKind::BigIntLiteral => {
                let token = self.advance();
                Ok(Expr::BigInt(BigIntLit {
                    loc: token.span,
                    value: token.text().to_owned(),
                }))
            }
            TokenKind::StringLiteral => {
                let token = self.advance();
                Ok(Expr::Str(StringLit {
                    loc: token.span,
                    value: token.text().to_owned(),
                }))
            }
            TokenKind::RegExpLiteral => {
                let token = self.advance();
                let raw = token.text();
                // Split `/pattern/flags` at the final slash.
                let close = raw.rfind('/').unwrap_or(0);
                Ok(Expr::Regexp(RegExpLit {
                    loc: token.span,
                    pattern: raw[1..close].to_owned(),
                    flags: raw[close + 1..].to_owned(),
                }))
            }
            TokenKind::NoSubstitutionTemplate | TokenKind::TemplateHead => {
                let template = self.parse_template_literal()?;
                Ok(Expr::Template(Box::new(template)))
            }
            TokenKind::This => {
                let token = self.advance();
                Ok(Expr::This(ThisExpr { loc: token.span }))
            }
            TokenKind::Super => {
                let token = self.advance();
                Ok(Expr::Super(SuperExpr { loc: token.span }))
            }
            TokenKind::LeftBracket => self.parse_array_literal(),
            TokenKind::LeftBrace => self.parse_object_literal(),
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.parse_expression(false)?;
                self.expect(TokenKind::RightParen, "')'")?;
                Ok(expr)
            }
            TokenKind::Function => {
                self.advance();
                let func = self.parse_function_rest(false, false)?;
                Ok(Expr::Fn(Box::new(func)))
            }
            TokenKind::Async
                if self.kind_at(1) == TokenKind::Function && !self.token_at(1).newline_before =>
            {
                self.advance();
                self.advance();
                let func = self.parse_function_rest(true, false)?;
                Ok(Expr::Fn(Box::new(func)))
            }
            TokenKind::Class => {
                let class = self.parse_class(false)?;
                Ok(Expr::Class(Box::new(class)))
            }
            TokenKind::Import => {
                let start = self.advance().span;
                if self.eat(TokenKind::Dot) {
                    self.expect(TokenKind::Meta, "'meta' after 'import.'")?;
                    return Ok(Expr::MetaProp(MetaPropExpr {
                        loc: self.span_from(start),
                        kind: MetaPropKind::ImportMeta,
                    }));
                }
                self.expect(TokenKind::LeftParen, "'(' after 'import'")?;
                let source = self.parse_assignment_expression(false)?;
                let options = if self.eat(TokenKind::Comma) && self.kind() != TokenKind::RightParen
                {
                    Some(Box::new(self.parse_assignment_expression(false)?))
                } else {
                    None
                };
                self.expect(TokenKind::RightParen, "')' after import call")?;
                Ok(Expr::ImportCall(Box::new(ImportExpr {
                    loc: self.span_from(start),
                    source: Box::new(source),
                    options,
                })))
            }
            _ if self.is_identifier_like(0) => {
                let ident = self.parse_identifier("expression")?;
                Ok(Expr::Ident(ident))
            }
            _ => Err(self.error_here("unexpected token in expression")),
        }
    }

    fn parse_array_literal(&mut self) -> LariatResult<Expr> {
        let start = self.advance().span; // `[`
        let mut elements = Vec::new();
        while self.kind() != TokenKind::RightBracket {
            if self.eat(TokenKind::Comma) {
                elements.push(None);
                continue;
            }
            if self.kind() == TokenKind::DotDotDot {
                let spread_start = self.advance().span;
                let argument = self.parse_assignment_expression(false)?;
                let loc = SourceLocation {
                    start: spread_start.start,
                    end: argument.loc().end,
                };
                elements.push(Some(Expr::Spread(Box::new(SpreadElement {
                    loc,
                    argument: Box::new(argument),
                }))));
            } else {
                elements.push(Some(self.parse_assignment_expression(false)?));
            }
            if self.kind() != TokenKind::RightBracket {
                self.expect(TokenKind::Comma, "',' in array literal")?;
            }
        }
        self.advance(); // `]`
        Ok(Expr::Array(Box::new(ArrayExpr {
            loc: self.span_from(start),
            elements,
        })))
    }

    fn parse_object_literal(&mut self) -> LariatResult<Expr> {
        let start = self.advance().span; // `{`
        let mut props = Vec::new();
        while self.kind() != TokenKind::RightBrace {
            if self.kind() == TokenKind::DotDotDot {
                let spread_start = self.advance().span;
                let argument = self.parse_assignment_expression(false)?;
                let loc = SourceLocation {
                    start: spread_start.start,
                    end: argument.loc().end,
                };
                props.push(ObjectProp::Spread(SpreadElement {
                    loc,
                    argument: Box::new(argument),
                }));
            } else {
                props.push(ObjectProp::Prop(Box::new(self.parse_object_property()?)));
            }
            if self.kind() != TokenKind::RightBrace {
                self.expect(TokenKind::Comma, "',' in object literal")?;
            }
        }
        self.advance(); // `}`
        Ok(Expr::Object(Box::new(ObjectExpr {
            loc: self.span_from(start),
            props,
        })))
    }

    fn parse_object_property(&mut self) -> LariatResult<Prop> {
        let start = self.current().span;

        // `async` method modifier.
        let is_async = self.kind() == TokenKind::Async
            && !self.token_at(1).newline_before
            && (self.is_property_key_start(1) || matches!(self.kind_at(1), TokenKind::Star));
        if is_async {
            self.advance();
        }

        let is_generator = self.eat(TokenKind::Star);

        // `get key()` / `set key()` accessors.
        if !is_async && !is_generator && self.is_property_key_start(1) {
            let accessor = match self.kind() {
                TokenKind::Get => Some(MethodKind::Get),
                TokenKind::Set => Some(MethodKind::Set),
                _ => None,
            };
            if let Some(accessor_kind) = accessor {
                self.advance();
                let key = self.parse_property_key()?;
                let params = self.parse_params()?;
                let body = self.parse_function_body(false, false)?;
                let func = Function {
                    loc: self.span_from(start),
                    name: None,
                    is_async: false,
                    is_generator: false,
                    params,
                    body,
                };
                let value = match accessor_kind {
                    MethodKind::Get => PropValue::Get(func),
                    _ => PropValue::Set(func),
                };
                return Ok(Prop {
                    loc: self.span_from(start),
                    key,
                    value,
                });
            }
        }

        let key = self.parse_property_key()?;

        // Method: `key(params) { … }`.
        if self.kind() == TokenKind::LeftParen {
            let params = self.parse_params()?;
            let body = self.parse_function_body(is_async, is_generator)?;
            let func = Function {
                loc: self.span_from(start),
                name: None,
                is_async,
                is_generator,
                params,
                body,
            };
            return Ok(Prop {
                loc: self.span_from(start),
                key,
                value: PropValue::Method(func),
            });
        }

        // Ordinary `key: value`.
        if self.eat(TokenKind::Colon) {
            let value = self.parse_assignment_expression(false)?;
            return Ok(Prop {
                loc: self.span_from(start),
                key,
                value: PropValue::Value(Box::new(value)),
            });
        }

        // Shorthand `{ x }` or `{ x = default }` (cover grammar).
        if !matches!(key, PropKey::Ident(_)) {
            return Err(self.error_here("expected ':' after property name"));
        }
        let default = if self.eat(TokenKind::Equal) {
            Some(Box::new(self.parse_assignment_expression(false)?))
        } else {
            None
        };
        Ok(Prop {
            loc: self.span_from(start),
            key,
            value: PropValue::Shorthand { default },
        })
    }

    // ── Template literals ─────────────────────────────────────────────────

    fn parse_template_literal(&mut self) -> LariatResult<TemplateLit> {
        let head = self.advance();
        let start = head.span;

        if head.kind == TokenKind::NoSubstitutionTemplate {
            return Ok(TemplateLit {
                loc: start,
                quasis: vec![TemplateElement {
                    loc: head.span,
                    raw: head.text().to_owned(),
                    tail: true,
                }],
                expressions: Vec::new(),
            });
        }

        let mut quasis = vec![TemplateElement {
            loc: head.span,
            raw: head.text().to_owned(),
            tail: false,
        }];
        let mut expressions = Vec::new();
        loop {
            expressions.push(self.parse_expression(false)?);
            match self.kind() {
                TokenKind::TemplateMiddle => {
                    let token = self.advance();
                    quasis.push(TemplateElement {
                        loc: token.span,
                        raw: token.text().to_owned(),
                        tail: false,
                    });
                }
                TokenKind::TemplateTail => {
                    let token = self.advance();
                    quasis.push(TemplateElement {
                        loc: token.span,
                        raw: token.text().to_owned(),
                        tail: true,
                    });
                    return Ok(TemplateLit {
                        loc: self.span_from(start),
                        quasis,
                        expressions,
                    });
                }
                _ => return Err(self.error_here("expected '}' in template literal")),
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Program {
        parse(source).unwrap_or_else(|e| panic!("parse failed for {source:?}: {e}"))
    }

    fn first_expr(program: &Program) -> &Expr {
        match &program.body[0] {
            Stmt::Expr(s) => &s.expr,
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    // ── Statements ────────────────────────────────────────────────────────

    #[test]
    fn test_parse_var_declarations() {
        let program = parse_ok("var a = 1; let b; const c = a + 2;");
        assert_eq!(program.body.len(), 3);
        let Stmt::VarDecl(decl) = &program.body[0] else {
            panic!("expected var decl");
        };
        assert_eq!(decl.kind, VarKind::Var);
        assert!(decl.declarators[0].init.is_some());
    }

    #[test]
    fn test_parse_function_declaration() {
        let program = parse_ok("function add(a, b) { return a + b; }");
        let Stmt::FnDecl(func) = &program.body[0] else {
            panic!("expected function declaration");
        };
        assert_eq!(func.name.as_ref().unwrap().name, "add");
        assert_eq!(func.params.len(), 2);
        assert!(!func.is_generator);
    }

    #[test]
    fn test_parse_generator_declaration() {
        let program = parse_ok("function* gen() { yield 1; yield* inner(); }");
        let Stmt::FnDecl(func) = &program.body[0] else {
            panic!("expected function declaration");
        };
        assert!(func.is_generator);
        let Stmt::Expr(stmt) = &func.body.body[1] else {
            panic!("expected expression statement");
        };
        let Expr::Yield(y) = stmt.expr.as_ref() else {
            panic!("expected yield");
        };
        assert!(y.delegate);
    }

    #[test]
    fn test_parse_if_else_chain() {
        let program = parse_ok("if (a) b(); else if (c) d(); else e();");
        let Stmt::If(stmt) = &program.body[0] else {
            panic!("expected if");
        };
        assert!(matches!(stmt.alternate.as_deref(), Some(Stmt::If(_))));
    }

    #[test]
    fn test_parse_for_variants() {
        parse_ok("for (var i = 0; i < 10; i++) f(i);");
        parse_ok("for (;;) break;");
        parse_ok("for (const k in obj) f(k);");
        parse_ok("for (const v of list) f(v);");
        parse_ok("for ([a, b] of pairs) f(a, b);");
        parse_ok("for (x in obj) f(x);");
    }

    #[test]
    fn test_parse_try_catch_finally() {
        let program = parse_ok("try { f(); } catch (e) { g(e); } finally { h(); }");
        let Stmt::Try(stmt) = &program.body[0] else {
            panic!("expected try");
        };
        assert!(stmt.handler.is_some());
        assert!(stmt.finalizer.is_some());
    }

    #[test]
    fn test_parse_optional_catch_binding() {
        let program = parse_ok("try { f(); } catch { g(); }");
        let Stmt::Try(stmt) = &program.body[0] else {
            panic!("expected try");
        };
        assert!(stmt.handler.as_ref().unwrap().param.is_none());
    }

    #[test]
    fn test_parse_switch() {
        let program = parse_ok("switch (x) { case 1: f(); break; default: g(); }");
        let Stmt::Switch(stmt) = &program.body[0] else {
            panic!("expected switch");
        };
        assert_eq!(stmt.cases.len(), 2);
        assert!(stmt.cases[1].test.is_none());
    }

    #[test]
    fn test_parse_labeled_statement() {
        let program = parse_ok("outer: for (;;) break outer;");
        assert!(matches!(&program.body[0], Stmt::Labeled(_)));
    }

    #[test]
    fn test_asi_inserts_semicolons() {
        let program = parse_ok("var a = 1\nvar b = 2\nf()");
        assert_eq!(program.body.len(), 3);
    }

    #[test]
    fn test_asi_restricted_return() {
        // `return` followed by a newline returns undefined.
        let program = parse_ok("function f() { return\n1; }");
        let Stmt::FnDecl(func) = &program.body[0] else {
            panic!("expected function");
        };
        let Stmt::Return(ret) = &func.body.body[0] else {
            panic!("expected return");
        };
        assert!(ret.argument.is_none());
    }

    #[test]
    fn test_missing_semicolon_is_error() {
        assert!(parse("var a = 1 var b = 2").is_err());
    }

    // ── Expressions ───────────────────────────────────────────────────────

    #[test]
    fn test_precedence_mul_over_add() {
        let program = parse_ok("a + b * c;");
        let Expr::Binary(add) = first_expr(&program) else {
            panic!("expected binary");
        };
        assert_eq!(add.op, BinaryOp::Add);
        let Expr::Binary(mul) = add.right.as_ref() else {
            panic!("expected nested binary");
        };
        assert_eq!(mul.op, BinaryOp::Mul);
    }

    #[test]
    fn test_exponent_right_associative() {
        let program = parse_ok("a ** b ** c;");
        let Expr::Binary(outer) = first_expr(&program) else {
            panic!("expected binary");
        };
        assert!(matches!(outer.left.as_ref(), Expr::Ident(_)));
        assert!(matches!(outer.right.as_ref(), Expr::Binary(_)));
    }

    #[test]
    fn test_assignment_right_associative() {
        let program = parse_ok("a = b = c;");
        let Expr::Assign(outer) = first_expr(&program) else {
            panic!("expected assignment");
        };
        assert!(matches!(outer.right.as_ref(), Expr::Assign(_)));
    }

    #[test]
    fn test_conditional_expression() {
        let program = parse_ok("a ? b : c ? d : e;");
        let Expr::Conditional(cond) = first_expr(&program) else {
            panic!("expected conditional");
        };
        assert!(matches!(cond.alternate.as_ref(), Expr::Conditional(_)));
    }

    #[test]
    fn test_member_and_call_chain() {
        let program = parse_ok("a.b.c(1)[d]?.e?.(2);");
        // Outermost: optional call.
        let Expr::Call(call) = first_expr(&program) else {
            panic!("expected call");
        };
        assert!(call.optional);
        let Expr::Member(member) = call.callee.as_ref() else {
            panic!("expected member callee");
        };
        assert!(member.optional);
    }

    #[test]
    fn test_new_expression() {
        let program = parse_ok("new Foo(1).bar;");
        let Expr::Member(member) = first_expr(&program) else {
            panic!("expected member");
        };
        assert!(matches!(member.object.as_ref(), Expr::New(_)));
    }

    #[test]
    fn test_new_without_arguments() {
        let program = parse_ok("new Foo;");
        let Expr::New(new) = first_expr(&program) else {
            panic!("expected new");
        };
        assert!(new.arguments.is_empty());
    }

    #[test]
    fn test_new_target_meta_property() {
        let program = parse_ok("function f() { return new.target; }");
        let Stmt::FnDecl(func) = &program.body[0] else {
            panic!("expected function");
        };
        let Stmt::Return(ret) = &func.body.body[0] else {
            panic!("expected return");
        };
        assert!(matches!(
            ret.argument.as_deref(),
            Some(Expr::MetaProp(MetaPropExpr {
                kind: MetaPropKind::NewTarget,
                ..
            }))
        ));
    }

    #[test]
    fn test_keyword_member_name() {
        parse_ok("promise.catch(handle).finally(done);");
    }

    #[test]
    fn test_spread_arguments() {
        let program = parse_ok("f(...args, 1);");
        let Expr::Call(call) = first_expr(&program) else {
            panic!("expected call");
        };
        assert!(matches!(call.arguments[0], Expr::Spread(_)));
    }

    #[test]
    fn test_object_literal_forms() {
        let program = parse_ok(
            "x = { a: 1, b, c() {}, get d() { return 1; }, set d(v) {}, \
             [k]: 2, 'str': 3, 42: 4, ...rest, async e() {}, *f() {} };",
        );
        let Expr::Assign(assign) = first_expr(&program) else {
            panic!("expected assignment");
        };
        let Expr::Object(object) = assign.right.as_ref() else {
            panic!("expected object literal");
        };
        assert_eq!(object.props.len(), 11);
    }

    #[test]
    fn test_array_literal_with_elisions() {
        let program = parse_ok("x = [1, , 2, ...rest];");
        let Expr::Assign(assign) = first_expr(&program) else {
            panic!("expected assignment");
        };
        let Expr::Array(array) = assign.right.as_ref() else {
            panic!("expected array literal");
        };
        assert_eq!(array.elements.len(), 4);
        assert!(array.elements[1].is_none());
    }

    #[test]
    fn test_template_literal_expression() {
        let program = parse_ok("x = `a${b}c${d}e`;");
        let Expr::Assign(assign) = first_expr(&program) else {
            panic!("expected assignment");
        };
        let Expr::Template(template) = assign.right.as_ref() else {
            panic!("expected template");
        };
        assert_eq!(template.quasis.len(), 3);
        assert_eq!(template.expressions.len(), 2);
    }

    #[test]
    fn test_tagged_template() {
        let program = parse_ok("tag`a${b}c`;");
        assert!(matches!(first_expr(&program), Expr::TaggedTemplate(_)));
    }

    #[test]
    fn test_sequence_expression() {
        let program = parse_ok("a, b, c;");
        let Expr::Sequence(seq) = first_expr(&program) else {
            panic!("expected sequence");
        };
        assert_eq!(seq.expressions.len(), 3);
    }

    #[test]
    fn test_typeof_unary() {
        let program = parse_ok("typeof x;");
        let Expr::Unary(unary) = first_expr(&program) else {
            panic!("expected unary");
        };
        assert_eq!(unary.op, UnaryOp::Typeof);
    }

    // ── Arrow functions ───────────────────────────────────────────────────

    #[test]
    fn test_single_param_arrow() {
        let program = parse_ok("x => x + 1;");
        let Expr::Arrow(arrow) = first_expr(&program) else {
            panic!("expected arrow");
        };
        assert_eq!(arrow.params.len(), 1);
        assert!(matches!(arrow.body, ArrowBody::Expr(_)));
    }

    #[test]
    fn test_paren_params_arrow() {
        let program = parse_ok("(a, b = 1, ...rest) => { return a; };");
        let Expr::Arrow(arrow) = first_expr(&program) else {
            panic!("expected arrow");
        };
        assert_eq!(arrow.params.len(), 3);
        assert!(matches!(arrow.params[1], Pat::Assign(_)));
        assert!(matches!(arrow.params[2], Pat::Rest(_)));
    }

    #[test]
    fn test_destructuring_param_arrow() {
        let program = parse_ok("({ x: y = z } = w) => y;");
        let Expr::Arrow(arrow) = first_expr(&program) else {
            panic!("expected arrow");
        };
        // One parameter: an object pattern with a whole-pattern default.
        assert_eq!(arrow.params.len(), 1);
        assert!(matches!(arrow.params[0], Pat::Assign(_)));
    }

    #[test]
    fn test_paren_expr_is_not_arrow() {
        let program = parse_ok("(a + b) * c;");
        assert!(matches!(first_expr(&program), Expr::Binary(_)));
    }

    #[test]
    fn test_async_arrow() {
        let program = parse_ok("async (a) => await g(a);");
        let Expr::Arrow(arrow) = first_expr(&program) else {
            panic!("expected arrow");
        };
        assert!(arrow.is_async);
        let ArrowBody::Expr(body) = &arrow.body else {
            panic!("expected expression body");
        };
        assert!(matches!(body.as_ref(), Expr::Await(_)));
    }

    #[test]
    fn test_async_call_is_not_arrow() {
        // `async(x)` is a plain call of a function named `async`.
        let program = parse_ok("async(x);");
        assert!(matches!(first_expr(&program), Expr::Call(_)));
    }

    // ── Classes ───────────────────────────────────────────────────────────

    #[test]
    fn test_parse_class_members() {
        let program = parse_ok(
            "class Point extends Base { \
               constructor(x) { super(x); this.x = x; } \
               get x() { return this._x; } \
               static of(x) { return new Point(x); } \
               #hidden = 1; \
               static { init(); } \
             }",
        );
        let Stmt::ClassDecl(class) = &program.body[0] else {
            panic!("expected class");
        };
        assert_eq!(class.name.as_ref().unwrap().name, "Point");
        assert!(class.super_class.is_some());
        assert_eq!(class.members.len(), 5);
        let ClassMember::Method(ctor) = &class.members[0] else {
            panic!("expected method");
        };
        assert_eq!(ctor.kind, MethodKind::Constructor);
        let ClassMember::Method(getter) = &class.members[1] else {
            panic!("expected method");
        };
        assert_eq!(getter.kind, MethodKind::Get);
        let ClassMember::Method(st) = &class.members[2] else {
            panic!("expected method");
        };
        assert!(st.is_static);
        assert!(matches!(&class.members[3], ClassMember::Field(_)));
        assert!(matches!(&class.members[4], ClassMember::StaticBlock(_)));
    }

    #[test]
    fn test_class_expression() {
        let program = parse_ok("x = class { m() {} };");
        let Expr::Assign(assign) = first_expr(&program) else {
            panic!("expected assignment");
        };
        assert!(matches!(assign.right.as_ref(), Expr::Class(_)));
    }

    // ── Patterns ──────────────────────────────────────────────────────────

    #[test]
    fn test_destructuring_declarations() {
        let program = parse_ok("const { a, b: { c }, d = 1, ...rest } = obj;");
        let Stmt::VarDecl(decl) = &program.body[0] else {
            panic!("expected declaration");
        };
        let Pat::Object(pattern) = &decl.declarators[0].id else {
            panic!("expected object pattern");
        };
        assert_eq!(pattern.props.len(), 4);
    }

    #[test]
    fn test_array_pattern_with_holes() {
        let program = parse_ok("const [a, , b = 2, ...rest] = list;");
        let Stmt::VarDecl(decl) = &program.body[0] else {
            panic!("expected declaration");
        };
        let Pat::Array(pattern) = &decl.declarators[0].id else {
            panic!("expected array pattern");
        };
        assert_eq!(pattern.elements.len(), 4);
        assert!(pattern.elements[1].is_none());
    }

    // ── Await / dynamic import ────────────────────────────────────────────

    #[test]
    fn test_async_function_await() {
        let program = parse_ok("async function f() { return await g(); }");
        let Stmt::FnDecl(func) = &program.body[0] else {
            panic!("expected function");
        };
        assert!(func.is_async);
    }

    #[test]
    fn test_await_is_identifier_outside_async() {
        let program = parse_ok("var await = 1; f(await);");
        assert_eq!(program.body.len(), 2);
    }

    #[test]
    fn test_dynamic_import() {
        let program = parse_ok("import('mod').then(f);");
        let Expr::Call(call) = first_expr(&program) else {
            panic!("expected call");
        };
        let Expr::Member(member) = call.callee.as_ref() else {
            panic!("expected member");
        };
        assert!(matches!(member.object.as_ref(), Expr::ImportCall(_)));
    }

    // ── Errors ────────────────────────────────────────────────────────────

    #[test]
    fn test_unbalanced_brace_is_error() {
        assert!(parse("function f() { return 1;").is_err());
    }

    #[test]
    fn test_invalid_assignment_target_is_error() {
        assert!(parse("1 = 2;").is_err());
    }

    #[test]
    fn test_return_outside_function_is_error() {
        assert!(parse("return 1;").is_err());
        assert!(parse("() => { return 1; };").is_ok());
    }

    #[test]
    fn test_error_mentions_location() {
        let err = parse("var = 1;").unwrap_err();
        assert!(err.to_string().contains("1:5"), "got: {err}");
    }
}
