//! JavaScript lexer for host-stringified function sources.
//!
//! See [`Scanner`] for the main entry point, or [`tokenize`] to lex a whole
//! source string at once.  Comments and whitespace are consumed silently;
//! every emitted token records whether a line terminator preceded it, which
//! the parser uses for automatic semicolon insertion.

use crate::error::{LariatError, LariatResult};

// ─────────────────────────────────────────────────────────────────────────────
// Position / Span
// ─────────────────────────────────────────────────────────────────────────────

/// A byte offset + line/column location in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    /// Byte offset from the beginning of the source string.
    pub offset: usize,
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number, measured in Unicode scalar values.
    pub column: u32,
}

/// A half-open `[start, end)` source span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Inclusive start of the span.
    pub start: Position,
    /// Exclusive end of the span.
    pub end: Position,
}

impl Span {
    /// The source text this span covers.
    pub fn text<'src>(&self, source: &'src str) -> &'src str {
        &source[self.start.offset..self.end.offset]
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TokenKind
// ─────────────────────────────────────────────────────────────────────────────

/// The syntactic category of a JavaScript lexical token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // ── Literals ──────────────────────────────────────────────────────────
    /// Decimal, hex (`0x…`), binary (`0b…`), or octal (`0o…`) numeric
    /// literal.
    NumericLiteral,
    /// BigInt literal (`42n`); the payload omits the trailing `n`.
    BigIntLiteral,
    /// String literal enclosed in `"` or `'`; the payload is the decoded
    /// value.
    StringLiteral,
    /// Regular expression literal; the payload is the raw `/pattern/flags`
    /// text.
    RegExpLiteral,

    // ── Template literals ─────────────────────────────────────────────────
    /// A complete template with no substitutions: `` `…` ``.
    NoSubstitutionTemplate,
    /// Opening span of a substituted template: `` `…${ ``.
    TemplateHead,
    /// Middle span between two substitutions: `}…${`.
    TemplateMiddle,
    /// Closing span of a substituted template: ``}…` ``.
    TemplateTail,

    // ── Identifiers ───────────────────────────────────────────────────────
    /// An identifier that is not a reserved word.
    Identifier,
    /// A private identifier beginning with `#`.
    PrivateIdentifier,

    // ── Reserved words ────────────────────────────────────────────────────
    /// `await`
    Await,
    /// `break`
    Break,
    /// `case`
    Case,
    /// `catch`
    Catch,
    /// `class`
    Class,
    /// `const`
    Const,
    /// `continue`
    Continue,
    /// `debugger`
    Debugger,
    /// `default`
    Default,
    /// `delete`
    Delete,
    /// `do`
    Do,
    /// `else`
    Else,
    /// `extends`
    Extends,
    /// `false`
    False,
    /// `finally`
    Finally,
    /// `for`
    For,
    /// `function`
    Function,
    /// `if`
    If,
    /// `import`
    Import,
    /// `in`
    In,
    /// `instanceof`
    Instanceof,
    /// `let`
    Let,
    /// `new`
    New,
    /// `null`
    Null,
    /// `return`
    Return,
    /// `super`
    Super,
    /// `switch`
    Switch,
    /// `this`
    This,
    /// `throw`
    Throw,
    /// `true`
    True,
    /// `try`
    Try,
    /// `typeof`
    Typeof,
    /// `var`
    Var,
    /// `void`
    Void,
    /// `while`
    While,
    /// `with`
    With,
    /// `yield`
    Yield,

    // ── Contextual keywords ───────────────────────────────────────────────
    /// `async`
    Async,
    /// `get`
    Get,
    /// `set`
    Set,
    /// `of`
    Of,
    /// `static`
    Static,
    /// `target`
    Target,
    /// `meta`
    Meta,

    // ── Punctuators ───────────────────────────────────────────────────────
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,
    /// `.`
    Dot,
    /// `...`
    DotDotDot,
    /// `;`
    Semicolon,
    /// `,`
    Comma,
    /// `<`
    Less,
    /// `>`
    Greater,
    /// `<=`
    LessEqual,
    /// `>=`
    GreaterEqual,
    /// `==`
    EqualEqual,
    /// `!=`
    BangEqual,
    /// `===`
    EqualEqualEqual,
    /// `!==`
    BangEqualEqual,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `**`
    StarStar,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `++`
    PlusPlus,
    /// `--`
    MinusMinus,
    /// `<<`
    LessLess,
    /// `>>`
    GreaterGreater,
    /// `>>>`
    GreaterGreaterGreater,
    /// `&`
    Ampersand,
    /// `|`
    Pipe,
    /// `^`
    Caret,
    /// `!`
    Bang,
    /// `~`
    Tilde,
    /// `&&`
    AmpersandAmpersand,
    /// `||`
    PipePipe,
    /// `??`
    QuestionQuestion,
    /// `?`
    Question,
    /// `?.`
    QuestionDot,
    /// `:`
    Colon,
    /// `=`
    Equal,
    /// `+=`
    PlusEqual,
    /// `-=`
    MinusEqual,
    /// `*=`
    StarEqual,
    /// `**=`
    StarStarEqual,
    /// `/=`
    SlashEqual,
    /// `%=`
    PercentEqual,
    /// `<<=`
    LessLessEqual,
    /// `>>=`
    GreaterGreaterEqual,
    /// `>>>=`
    GreaterGreaterGreaterEqual,
    /// `&=`
    AmpersandEqual,
    /// `|=`
    PipeEqual,
    /// `^=`
    CaretEqual,
    /// `&&=`
    AmpersandAmpersandEqual,
    /// `||=`
    PipePipeEqual,
    /// `??=`
    QuestionQuestionEqual,
    /// `=>`
    Arrow,

    // ── End of input ──────────────────────────────────────────────────────
    /// End of input.
    Eof,
}

impl TokenKind {
    /// Returns `true` for reserved words and contextual keywords that hosts
    /// nevertheless allow as member names and method names.
    pub fn is_keyword(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            Await
                | Break
                | Case
                | Catch
                | Class
                | Const
                | Continue
                | Debugger
                | Default
                | Delete
                | Do
                | Else
                | Extends
                | False
                | Finally
                | For
                | Function
                | If
                | Import
                | In
                | Instanceof
                | Let
                | New
                | Null
                | Return
                | Super
                | Switch
                | This
                | Throw
                | True
                | Try
                | Typeof
                | Var
                | Void
                | While
                | With
                | Yield
                | Async
                | Get
                | Set
                | Of
                | Static
                | Target
                | Meta
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TokenValue / Token
// ─────────────────────────────────────────────────────────────────────────────

/// The payload value associated with a [`Token`].
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    /// No semantic value (punctuators, reserved words, EOF).
    None,
    /// Text payload: identifier names, decoded string values, raw template
    /// fragments, raw regexp text, BigInt digits.
    Str(String),
    /// Parsed numeric value for [`TokenKind::NumericLiteral`].
    Number(f64),
}

/// A single lexical token produced by the [`Scanner`].
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The syntactic category.
    pub kind: TokenKind,
    /// The associated value, if any.
    pub value: TokenValue,
    /// Source location of this token.
    pub span: Span,
    /// `true` when at least one line terminator appeared between the
    /// previous token and this one.  Drives automatic semicolon insertion.
    pub newline_before: bool,
}

impl Token {
    /// The text payload, or `""` for tokens without one.
    pub fn text(&self) -> &str {
        match &self.value {
            TokenValue::Str(s) => s.as_str(),
            _ => "",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Character classification
// ─────────────────────────────────────────────────────────────────────────────

/// Returns `true` for *LineTerminator* code points.
fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

/// Returns `true` for *WhiteSpace* characters (line terminators excluded).
fn is_whitespace(c: char) -> bool {
    matches!(
        c,
        '\t' | '\x0B' | '\x0C' | ' ' | '\u{00A0}' | '\u{FEFF}' | '\u{1680}'
            | '\u{2000}'..='\u{200A}'
            | '\u{202F}'
            | '\u{205F}'
            | '\u{3000}'
    )
}

/// Returns `true` for characters that may start an identifier.
pub fn is_id_start(c: char) -> bool {
    c == '$' || c == '_' || c.is_alphabetic()
}

/// Returns `true` for characters that may continue an identifier.
pub fn is_id_continue(c: char) -> bool {
    c == '$' || c == '_' || c == '\u{200C}' || c == '\u{200D}' || c.is_alphanumeric()
}

/// Returns `true` when `s` is a single well-formed identifier.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if is_id_start(c) => chars.all(is_id_continue),
        _ => false,
    }
}

/// Returns `true` for reserved words that cannot name a function expression
/// (contextual keywords like `get` or `async` remain legal names).
pub fn is_reserved_word(s: &str) -> bool {
    matches!(
        s,
        "await"
            | "break"
            | "case"
            | "catch"
            | "class"
            | "const"
            | "continue"
            | "debugger"
            | "default"
            | "delete"
            | "do"
            | "else"
            | "enum"
            | "export"
            | "extends"
            | "false"
            | "finally"
            | "for"
            | "function"
            | "if"
            | "import"
            | "in"
            | "instanceof"
            | "let"
            | "new"
            | "null"
            | "return"
            | "super"
            | "switch"
            | "this"
            | "throw"
            | "true"
            | "try"
            | "typeof"
            | "var"
            | "void"
            | "while"
            | "with"
            | "yield"
    )
}

/// Map an identifier to its reserved-word / contextual-keyword kind, or
/// `None` for plain identifiers.
fn keyword_kind(s: &str) -> Option<TokenKind> {
    let kind = match s {
        "await" => TokenKind::Await,
        "break" => TokenKind::Break,
        "case" => TokenKind::Case,
        "catch" => TokenKind::Catch,
        "class" => TokenKind::Class,
        "const" => TokenKind::Const,
        "continue" => TokenKind::Continue,
        "debugger" => TokenKind::Debugger,
        "default" => TokenKind::Default,
        "delete" => TokenKind::Delete,
        "do" => TokenKind::Do,
        "else" => TokenKind::Else,
        "extends" => TokenKind::Extends,
        "false" => TokenKind::False,
        "finally" => TokenKind::Finally,
        "for" => TokenKind::For,
        "function" => TokenKind::Function,
        "if" => TokenKind::If,
        "import" => TokenKind::Import,
        "in" => TokenKind::In,
        "instanceof" => TokenKind::Instanceof,
        "let" => TokenKind::Let,
        "new" => TokenKind::New,
        "null" => TokenKind::Null,
        "return" => TokenKind::Return,
        "super" => TokenKind::Super,
        "switch" => TokenKind::Switch,
        "this" => TokenKind::This,
        "throw" => TokenKind::Throw,
        "true" => TokenKind::True,
        "try" => TokenKind::Try,
        "typeof" => TokenKind::Typeof,
        "var" => TokenKind::Var,
        "void" => TokenKind::Void,
        "while" => TokenKind::While,
        "with" => TokenKind::With,
        "yield" => TokenKind::Yield,
        "async" => TokenKind::Async,
        "get" => TokenKind::Get,
        "set" => TokenKind::Set,
        "of" => TokenKind::Of,
        "static" => TokenKind::Static,
        "target" => TokenKind::Target,
        "meta" => TokenKind::Meta,
        _ => return None,
    };
    Some(kind)
}

/// Returns `true` when a `/` at the current position opens a regular
/// expression literal rather than acting as division, given the most recent
/// significant token.
///
/// `/` is division only after tokens that complete a value (identifier,
/// literal, `)`, `]`, `++`, `--`, `this`, `super`, and the literal
/// keywords); every other context opens a regexp.
fn slash_starts_regexp(last: Option<TokenKind>) -> bool {
    match last {
        None => true,
        Some(k) => !matches!(
            k,
            TokenKind::Identifier
                | TokenKind::PrivateIdentifier
                | TokenKind::NumericLiteral
                | TokenKind::BigIntLiteral
                | TokenKind::StringLiteral
                | TokenKind::NoSubstitutionTemplate
                | TokenKind::TemplateTail
                | TokenKind::RegExpLiteral
                | TokenKind::RightParen
                | TokenKind::RightBracket
                | TokenKind::PlusPlus
                | TokenKind::MinusMinus
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
                | TokenKind::This
                | TokenKind::Super
        ),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scanner
// ─────────────────────────────────────────────────────────────────────────────

/// JavaScript lexer.
///
/// Produces a stream of [`Token`]s from a UTF-8 source string.  Call
/// [`Scanner::next_token`] repeatedly until a token with [`TokenKind::Eof`]
/// is returned, or use [`tokenize`] to collect the whole stream.
pub struct Scanner<'src> {
    source: &'src str,
    /// Current byte position.
    pos: usize,
    /// Current 1-based line.
    line: u32,
    /// Current 1-based column.
    column: u32,
    /// `{` nesting depth outside template substitutions.
    brace_depth: usize,
    /// `brace_depth` snapshots taken at each `` `…${ `` entry; a `}` at the
    /// recorded depth resumes the template instead of closing a block.
    template_stack: Vec<usize>,
    /// Most recent significant token kind, for regexp/division
    /// disambiguation.
    last_kind: Option<TokenKind>,
}

/// Lex `source` to completion, returning every token up to and including
/// the final [`TokenKind::Eof`].
pub fn tokenize(source: &str) -> LariatResult<Vec<Token>> {
    let mut scanner = Scanner::new(source);
    let mut tokens = Vec::new();
    loop {
        let token = scanner.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

impl<'src> Scanner<'src> {
    /// Create a new scanner for the given UTF-8 source string.
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            pos: 0,
            line: 1,
            column: 1,
            brace_depth: 0,
            template_stack: Vec::new(),
            last_kind: None,
        }
    }

    // ── Low-level helpers ─────────────────────────────────────────────────

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.source[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if is_line_terminator(c) {
            // Treat \r\n as a single terminator.
            if c == '\r' && self.peek() == Some('\n') {
                self.pos += 1;
            }
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn position(&self) -> Position {
        Position {
            offset: self.pos,
            line: self.line,
            column: self.column,
        }
    }

    fn error_at(&self, pos: Position, msg: &str) -> LariatError {
        LariatError::Syntax(format!("{} at {}:{}", msg, pos.line, pos.column))
    }

    /// Skip whitespace and comments; returns `true` if a line terminator was
    /// crossed.
    fn skip_trivia(&mut self) -> LariatResult<bool> {
        let mut saw_newline = false;
        loop {
            match self.peek() {
                Some(c) if is_whitespace(c) => {
                    self.bump();
                }
                Some(c) if is_line_terminator(c) => {
                    saw_newline = true;
                    self.bump();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if is_line_terminator(c) {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    let start = self.position();
                    self.bump();
                    self.bump();
                    let mut closed = false;
                    while let Some(c) = self.bump() {
                        if is_line_terminator(c) {
                            saw_newline = true;
                        }
                        if c == '*' && self.peek() == Some('/') {
                            self.bump();
                            closed = true;
                            break;
                        }
                    }
                    if !closed {
                        return Err(self.error_at(start, "unterminated comment"));
                    }
                }
                _ => return Ok(saw_newline),
            }
        }
    }

    // ── Token production ──────────────────────────────────────────────────

    /// Lex and return the next significant token.
    pub fn next_token(&mut self) -> LariatResult<Token> {
        let newline_before = self.skip_trivia()?;
        let start = self.position();

        let Some(c) = self.peek() else {
            return Ok(self.finish(start, TokenKind::Eof, TokenValue::None, newline_before));
        };

        let token = match c {
            '`' => self.scan_template(start, newline_before)?,
            '}' if self
                .template_stack
                .last()
                .is_some_and(|&depth| depth == self.brace_depth) =>
            {
                self.template_stack.pop();
                self.scan_template_continuation(start, newline_before)?
            }
            '"' | '\'' => self.scan_string(start, newline_before)?,
            '0'..='9' => self.scan_number(start, newline_before)?,
            '.' if matches!(self.peek_at(1), Some('0'..='9')) => {
                self.scan_number(start, newline_before)?
            }
            '#' => self.scan_private_identifier(start, newline_before)?,
            '/' if slash_starts_regexp(self.last_kind) => {
                self.scan_regexp(start, newline_before)?
            }
            c if is_id_start(c) => self.scan_identifier(start, newline_before),
            _ => self.scan_punctuator(start, newline_before)?,
        };

        self.last_kind = Some(token.kind);
        Ok(token)
    }

    fn finish(
        &self,
        start: Position,
        kind: TokenKind,
        value: TokenValue,
        newline_before: bool,
    ) -> Token {
        Token {
            kind,
            value,
            span: Span {
                start,
                end: self.position(),
            },
            newline_before,
        }
    }

    // ── Identifiers ───────────────────────────────────────────────────────

    fn scan_identifier(&mut self, start: Position, newline_before: bool) -> Token {
        while let Some(c) = self.peek() {
            if !is_id_continue(c) {
                break;
            }
            self.bump();
        }
        let text = &self.source[start.offset..self.pos];
        match keyword_kind(text) {
            Some(kind) => self.finish(start, kind, TokenValue::None, newline_before),
            None => self.finish(
                start,
                TokenKind::Identifier,
                TokenValue::Str(text.to_owned()),
                newline_before,
            ),
        }
    }

    fn scan_private_identifier(
        &mut self,
        start: Position,
        newline_before: bool,
    ) -> LariatResult<Token> {
        self.bump(); // `#`
        match self.peek() {
            Some(c) if is_id_start(c) => {}
            _ => return Err(self.error_at(start, "expected identifier after '#'")),
        }
        while let Some(c) = self.peek() {
            if !is_id_continue(c) {
                break;
            }
            self.bump();
        }
        let name = &self.source[start.offset + 1..self.pos];
        Ok(self.finish(
            start,
            TokenKind::PrivateIdentifier,
            TokenValue::Str(name.to_owned()),
            newline_before,
        ))
    }

    // ── Numbers ───────────────────────────────────────────────────────────

    fn scan_number(&mut self, start: Position, newline_before: bool) -> LariatResult<Token> {
        if self.peek() == Some('0')
            && matches!(
                self.peek_at(1),
                Some('x' | 'X' | 'o' | 'O' | 'b' | 'B')
            )
        {
            return self.scan_radix_number(start, newline_before);
        }

        self.eat_digits();
        let mut is_float = false;
        if self.peek() == Some('.') {
            is_float = true;
            self.bump();
            self.eat_digits();
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            is_float = true;
            self.bump();
            if matches!(self.peek(), Some('+' | '-')) {
                self.bump();
            }
            if !matches!(self.peek(), Some('0'..='9')) {
                return Err(self.error_at(start, "missing exponent digits"));
            }
            self.eat_digits();
        }

        let raw = &self.source[start.offset..self.pos];
        let digits: String = raw.chars().filter(|&c| c != '_').collect();

        if !is_float && self.peek() == Some('n') {
            self.bump();
            return Ok(self.finish(
                start,
                TokenKind::BigIntLiteral,
                TokenValue::Str(digits),
                newline_before,
            ));
        }

        let value: f64 = digits
            .parse()
            .map_err(|_| self.error_at(start, "malformed numeric literal"))?;
        Ok(self.finish(
            start,
            TokenKind::NumericLiteral,
            TokenValue::Number(value),
            newline_before,
        ))
    }

    fn scan_radix_number(&mut self, start: Position, newline_before: bool) -> LariatResult<Token> {
        self.bump(); // `0`
        let radix_char = self.bump().expect("radix prefix peeked above");
        let radix = match radix_char {
            'x' | 'X' => 16,
            'o' | 'O' => 8,
            _ => 2,
        };
        let digits_start = self.pos;
        while let Some(c) = self.peek() {
            if c == '_' || c.is_digit(radix) {
                self.bump();
            } else {
                break;
            }
        }
        if self.pos == digits_start {
            return Err(self.error_at(start, "missing digits in numeric literal"));
        }
        let digits: String = self.source[digits_start..self.pos]
            .chars()
            .filter(|&c| c != '_')
            .collect();

        if self.peek() == Some('n') {
            self.bump();
            return Ok(self.finish(
                start,
                TokenKind::BigIntLiteral,
                TokenValue::Str(digits),
                newline_before,
            ));
        }

        let value = u64::from_str_radix(&digits, radix)
            .map(|v| v as f64)
            .map_err(|_| self.error_at(start, "malformed numeric literal"))?;
        Ok(self.finish(
            start,
            TokenKind::NumericLiteral,
            TokenValue::Number(value),
            newline_before,
        ))
    }

    fn eat_digits(&mut self) {
        while let Some(c) = self.peek() {
            if matches!(c, '0'..='9' | '_') {
                self.bump();
            } else {
                break;
            }
        }
    }

    // ── Strings ───────────────────────────────────────────────────────────

    fn scan_string(&mut self, start: Position, newline_before: bool) -> LariatResult<Token> {
        let quote = self.bump().expect("quote peeked above");
        let mut value = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(self.error_at(start, "unterminated string literal"));
            };
            if c == quote {
                self.bump();
                break;
            }
            if is_line_terminator(c) {
                return Err(self.error_at(start, "unterminated string literal"));
            }
            if c == '\\' {
                self.bump();
                self.scan_escape(start, &mut value)?;
            } else {
                value.push(c);
                self.bump();
            }
        }
        Ok(self.finish(
            start,
            TokenKind::StringLiteral,
            TokenValue::Str(value),
            newline_before,
        ))
    }

    /// Decode one escape sequence (the `\` has been consumed) into `out`.
    fn scan_escape(&mut self, start: Position, out: &mut String) -> LariatResult<()> {
        let Some(c) = self.bump() else {
            return Err(self.error_at(start, "unterminated escape sequence"));
        };
        match c {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{0008}'),
            'f' => out.push('\u{000C}'),
            'v' => out.push('\u{000B}'),
            '0' if !matches!(self.peek(), Some('0'..='9')) => out.push('\0'),
            'x' => {
                let code = self.scan_hex_digits(start, 2)?;
                out.push(
                    char::from_u32(code)
                        .ok_or_else(|| self.error_at(start, "invalid hex escape"))?,
                );
            }
            'u' => {
                let code = if self.peek() == Some('{') {
                    self.bump();
                    let mut code: u32 = 0;
                    let mut any = false;
                    while let Some(h) = self.peek() {
                        if h == '}' {
                            break;
                        }
                        let digit = h
                            .to_digit(16)
                            .ok_or_else(|| self.error_at(start, "invalid unicode escape"))?;
                        code = code
                            .checked_mul(16)
                            .and_then(|c| c.checked_add(digit))
                            .ok_or_else(|| self.error_at(start, "invalid unicode escape"))?;
                        any = true;
                        self.bump();
                    }
                    if !any || self.bump() != Some('}') {
                        return Err(self.error_at(start, "invalid unicode escape"));
                    }
                    code
                } else {
                    self.scan_hex_digits(start, 4)?
                };
                out.push(
                    char::from_u32(code)
                        .ok_or_else(|| self.error_at(start, "invalid unicode escape"))?,
                );
            }
            c if is_line_terminator(c) => {
                // Line continuation: the terminator is consumed, nothing is
                // emitted.
            }
            other => out.push(other),
        }
        Ok(())
    }

    fn scan_hex_digits(&mut self, start: Position, count: usize) -> LariatResult<u32> {
        let mut code: u32 = 0;
        for _ in 0..count {
            let digit = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error_at(start, "invalid hex escape"))?;
            code = code * 16 + digit;
        }
        Ok(code)
    }

    // ── Templates ─────────────────────────────────────────────────────────

    /// Lex from an opening `` ` `` to either `${` or the closing backtick.
    fn scan_template(&mut self, start: Position, newline_before: bool) -> LariatResult<Token> {
        self.bump(); // backtick
        self.scan_template_chars(start, newline_before, true)
    }

    /// Lex from the `}` that closes a substitution to the next `${` or the
    /// closing backtick.
    fn scan_template_continuation(
        &mut self,
        start: Position,
        newline_before: bool,
    ) -> LariatResult<Token> {
        self.bump(); // `}`
        self.scan_template_chars(start, newline_before, false)
    }

    fn scan_template_chars(
        &mut self,
        start: Position,
        newline_before: bool,
        is_head: bool,
    ) -> LariatResult<Token> {
        let raw_start = self.pos;
        loop {
            let Some(c) = self.peek() else {
                return Err(self.error_at(start, "unterminated template literal"));
            };
            match c {
                '`' => {
                    let raw = self.source[raw_start..self.pos].to_owned();
                    self.bump();
                    let kind = if is_head {
                        TokenKind::NoSubstitutionTemplate
                    } else {
                        TokenKind::TemplateTail
                    };
                    return Ok(self.finish(start, kind, TokenValue::Str(raw), newline_before));
                }
                '$' if self.peek_at(1) == Some('{') => {
                    let raw = self.source[raw_start..self.pos].to_owned();
                    self.bump();
                    self.bump();
                    self.template_stack.push(self.brace_depth);
                    let kind = if is_head {
                        TokenKind::TemplateHead
                    } else {
                        TokenKind::TemplateMiddle
                    };
                    return Ok(self.finish(start, kind, TokenValue::Str(raw), newline_before));
                }
                '\\' => {
                    self.bump();
                    self.bump();
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    // ── Regular expressions ───────────────────────────────────────────────

    fn scan_regexp(&mut self, start: Position, newline_before: bool) -> LariatResult<Token> {
        self.bump(); // `/`
        let mut in_class = false;
        loop {
            let Some(c) = self.peek() else {
                return Err(self.error_at(start, "unterminated regular expression"));
            };
            if is_line_terminator(c) {
                return Err(self.error_at(start, "unterminated regular expression"));
            }
            match c {
                '\\' => {
                    self.bump();
                    self.bump();
                }
                '[' => {
                    in_class = true;
                    self.bump();
                }
                ']' => {
                    in_class = false;
                    self.bump();
                }
                '/' if !in_class => {
                    self.bump();
                    break;
                }
                _ => {
                    self.bump();
                }
            }
        }
        // Flags.
        while let Some(c) = self.peek() {
            if !is_id_continue(c) {
                break;
            }
            self.bump();
        }
        let raw = self.source[start.offset..self.pos].to_owned();
        Ok(self.finish(
            start,
            TokenKind::RegExpLiteral,
            TokenValue::Str(raw),
            newline_before,
        ))
    }

    // ── Punctuators ───────────────────────────────────────────────────────

    fn scan_punctuator(&mut self, start: Position, newline_before: bool) -> LariatResult<Token> {
        use TokenKind::*;
        let c = self.bump().expect("punctuator peeked above");
        let kind = match c {
            '{' => {
                self.brace_depth += 1;
                LeftBrace
            }
            '}' => {
                self.brace_depth = self.brace_depth.saturating_sub(1);
                RightBrace
            }
            '(' => LeftParen,
            ')' => RightParen,
            '[' => LeftBracket,
            ']' => RightBracket,
            ';' => Semicolon,
            ',' => Comma,
            ':' => Colon,
            '~' => Tilde,
            '.' => {
                if self.peek() == Some('.') && self.peek_at(1) == Some('.') {
                    self.bump();
                    self.bump();
                    DotDotDot
                } else {
                    Dot
                }
            }
            '<' => match self.peek() {
                Some('=') => {
                    self.bump();
                    LessEqual
                }
                Some('<') => {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        LessLessEqual
                    } else {
                        LessLess
                    }
                }
                _ => Less,
            },
            '>' => match self.peek() {
                Some('=') => {
                    self.bump();
                    GreaterEqual
                }
                Some('>') => {
                    self.bump();
                    match self.peek() {
                        Some('>') => {
                            self.bump();
                            if self.peek() == Some('=') {
                                self.bump();
                                GreaterGreaterGreaterEqual
                            } else {
                                GreaterGreaterGreater
                            }
                        }
                        Some('=') => {
                            self.bump();
                            GreaterGreaterEqual
                        }
                        _ => GreaterGreater,
                    }
                }
                _ => Greater,
            },
            '=' => match self.peek() {
                Some('=') => {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        EqualEqualEqual
                    } else {
                        EqualEqual
                    }
                }
                Some('>') => {
                    self.bump();
                    Arrow
                }
                _ => Equal,
            },
            '!' => match self.peek() {
                Some('=') => {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        BangEqualEqual
                    } else {
                        BangEqual
                    }
                }
                _ => Bang,
            },
            '+' => match self.peek() {
                Some('+') => {
                    self.bump();
                    PlusPlus
                }
                Some('=') => {
                    self.bump();
                    PlusEqual
                }
                _ => Plus,
            },
            '-' => match self.peek() {
                Some('-') => {
                    self.bump();
                    MinusMinus
                }
                Some('=') => {
                    self.bump();
                    MinusEqual
                }
                _ => Minus,
            },
            '*' => match self.peek() {
                Some('*') => {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        StarStarEqual
                    } else {
                        StarStar
                    }
                }
                Some('=') => {
                    self.bump();
                    StarEqual
                }
                _ => Star,
            },
            '/' => match self.peek() {
                Some('=') => {
                    self.bump();
                    SlashEqual
                }
                _ => Slash,
            },
            '%' => match self.peek() {
                Some('=') => {
                    self.bump();
                    PercentEqual
                }
                _ => Percent,
            },
            '&' => match self.peek() {
                Some('&') => {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        AmpersandAmpersandEqual
                    } else {
                        AmpersandAmpersand
                    }
                }
                Some('=') => {
                    self.bump();
                    AmpersandEqual
                }
                _ => Ampersand,
            },
            '|' => match self.peek() {
                Some('|') => {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        PipePipeEqual
                    } else {
                        PipePipe
                    }
                }
                Some('=') => {
                    self.bump();
                    PipeEqual
                }
                _ => Pipe,
            },
            '^' => match self.peek() {
                Some('=') => {
                    self.bump();
                    CaretEqual
                }
                _ => Caret,
            },
            '?' => match self.peek() {
                Some('?') => {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        QuestionQuestionEqual
                    } else {
                        QuestionQuestion
                    }
                }
                // `?.3` is a conditional with a fractional literal, not
                // optional chaining.
                Some('.') if !matches!(self.peek_at(1), Some('0'..='9')) => {
                    self.bump();
                    QuestionDot
                }
                _ => Question,
            },
            other => {
                return Err(self.error_at(start, &format!("unexpected character '{other}'")));
            }
        };
        Ok(self.finish(start, kind, TokenValue::None, newline_before))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    // ── Identifiers & keywords ────────────────────────────────────────────

    #[test]
    fn test_identifier_and_keyword() {
        let tokens = tokenize("function foo").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Function);
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].text(), "foo");
    }

    #[test]
    fn test_dollar_and_underscore_identifiers() {
        let tokens = tokenize("$a _b c$d").unwrap();
        let names: Vec<_> = tokens[..3].iter().map(|t| t.text()).collect();
        assert_eq!(names, vec!["$a", "_b", "c$d"]);
    }

    #[test]
    fn test_contextual_keywords() {
        assert_eq!(
            kinds("async get set of static"),
            vec![
                TokenKind::Async,
                TokenKind::Get,
                TokenKind::Set,
                TokenKind::Of,
                TokenKind::Static,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_private_identifier() {
        let tokens = tokenize("#count").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::PrivateIdentifier);
        assert_eq!(tokens[0].text(), "count");
    }

    // ── Numbers ───────────────────────────────────────────────────────────

    #[test]
    fn test_numeric_literals() {
        let tokens = tokenize("42 3.14 1e3 0xff 0b101 0o17 1_000").unwrap();
        let values: Vec<f64> = tokens[..7]
            .iter()
            .map(|t| match t.value {
                TokenValue::Number(n) => n,
                _ => panic!("expected number"),
            })
            .collect();
        assert_eq!(values, vec![42.0, 3.14, 1000.0, 255.0, 5.0, 15.0, 1000.0]);
    }

    #[test]
    fn test_leading_dot_number() {
        let tokens = tokenize(".5").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::NumericLiteral);
        assert_eq!(tokens[0].value, TokenValue::Number(0.5));
    }

    #[test]
    fn test_bigint_literal() {
        let tokens = tokenize("42n 0xffn").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::BigIntLiteral);
        assert_eq!(tokens[0].text(), "42");
        assert_eq!(tokens[1].kind, TokenKind::BigIntLiteral);
        assert_eq!(tokens[1].text(), "ff");
    }

    // ── Strings ───────────────────────────────────────────────────────────

    #[test]
    fn test_string_escapes() {
        let tokens = tokenize(r#""a\nb\tA\x41\u{1F600}""#).unwrap();
        assert_eq!(tokens[0].text(), "a\nb\tAA\u{1F600}");
    }

    #[test]
    fn test_single_quoted_string() {
        let tokens = tokenize("'it\\'s'").unwrap();
        assert_eq!(tokens[0].text(), "it's");
    }

    #[test]
    fn test_unterminated_string_is_error() {
        assert!(tokenize("\"abc").is_err());
    }

    // ── Templates ─────────────────────────────────────────────────────────

    #[test]
    fn test_no_substitution_template() {
        let tokens = tokenize("`hello`").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::NoSubstitutionTemplate);
        assert_eq!(tokens[0].text(), "hello");
    }

    #[test]
    fn test_template_with_substitution() {
        assert_eq!(
            kinds("`a${x}b`"),
            vec![
                TokenKind::TemplateHead,
                TokenKind::Identifier,
                TokenKind::TemplateTail,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_template_with_nested_braces() {
        // The `}` of the object literal must not close the substitution.
        assert_eq!(
            kinds("`a${ {b: 1} }c`"),
            vec![
                TokenKind::TemplateHead,
                TokenKind::LeftBrace,
                TokenKind::Identifier,
                TokenKind::Colon,
                TokenKind::NumericLiteral,
                TokenKind::RightBrace,
                TokenKind::TemplateTail,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_template_middle() {
        assert_eq!(
            kinds("`${a}-${b}`"),
            vec![
                TokenKind::TemplateHead,
                TokenKind::Identifier,
                TokenKind::TemplateMiddle,
                TokenKind::Identifier,
                TokenKind::TemplateTail,
                TokenKind::Eof,
            ]
        );
    }

    // ── Regular expressions ───────────────────────────────────────────────

    #[test]
    fn test_regexp_after_equals() {
        let tokens = tokenize("x = /ab+c/gi").unwrap();
        assert_eq!(tokens[2].kind, TokenKind::RegExpLiteral);
        assert_eq!(tokens[2].text(), "/ab+c/gi");
    }

    #[test]
    fn test_slash_is_division_after_identifier() {
        assert_eq!(
            kinds("a / b"),
            vec![
                TokenKind::Identifier,
                TokenKind::Slash,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_regexp_class_with_slash() {
        let tokens = tokenize("= /[/]/").unwrap();
        assert_eq!(tokens[1].kind, TokenKind::RegExpLiteral);
    }

    // ── Punctuators ───────────────────────────────────────────────────────

    #[test]
    fn test_multi_char_punctuators() {
        assert_eq!(
            kinds("=> === !== ** ??= ?. ... >>>="),
            vec![
                TokenKind::Arrow,
                TokenKind::EqualEqualEqual,
                TokenKind::BangEqualEqual,
                TokenKind::StarStar,
                TokenKind::QuestionQuestionEqual,
                TokenKind::QuestionDot,
                TokenKind::DotDotDot,
                TokenKind::GreaterGreaterGreaterEqual,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_question_dot_digit_is_conditional() {
        // `a ? .5 : 0` — `?.` must not swallow the fractional literal.
        assert_eq!(
            kinds("a ? .5 : 0"),
            vec![
                TokenKind::Identifier,
                TokenKind::Question,
                TokenKind::NumericLiteral,
                TokenKind::Colon,
                TokenKind::NumericLiteral,
                TokenKind::Eof,
            ]
        );
    }

    // ── Trivia ────────────────────────────────────────────────────────────

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("a /* comment */ b // trailing"),
            vec![TokenKind::Identifier, TokenKind::Identifier, TokenKind::Eof]
        );
    }

    #[test]
    fn test_newline_before_flag() {
        let tokens = tokenize("a\nb c").unwrap();
        assert!(!tokens[0].newline_before);
        assert!(tokens[1].newline_before);
        assert!(!tokens[2].newline_before);
    }

    #[test]
    fn test_newline_inside_block_comment_sets_flag() {
        let tokens = tokenize("a /* x\ny */ b").unwrap();
        assert!(tokens[1].newline_before);
    }

    #[test]
    fn test_spans() {
        let source = "let x";
        let tokens = tokenize(source).unwrap();
        assert_eq!(tokens[0].span.text(source), "let");
        assert_eq!(tokens[1].span.text(source), "x");
        assert_eq!(tokens[1].span.start.line, 1);
        assert_eq!(tokens[1].span.start.column, 5);
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("foo"));
        assert!(is_identifier("$_ab1"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("1a"));
        assert!(!is_identifier("[computed]"));
        assert!(!is_identifier("a b"));
    }

    #[test]
    fn test_unexpected_character_is_error() {
        assert!(tokenize("@").is_err());
    }
}
