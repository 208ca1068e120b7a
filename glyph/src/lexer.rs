//! Tokenizer for both concrete syntaxes
//!
//! Compact sources spell directives as symbols (`@ GET /users`, `$ x = 1`, `> x`),
//! expanded sources spell them as keywords (`route GET /users`, `let x = 1`,
//! `return x`). Both produce the same token kinds, so the parser never needs to
//! know which syntax it is reading.
//!
//! A symbol that is the first token on its line is flagged as a directive. The
//! parser relies on that flag to tell `+ auth(jwt)` (middleware) apart from
//! `"Hello, " + name` (concatenation), and to stop an expression at the end of its
//! line.

use crate::ast::Span;
use crate::error::GlyphError;
use crate::GlyphResult;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Which concrete syntax a source unit is written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SyntaxMode {
    /// Symbolic directives, `.glyph` files
    #[default]
    Compact,
    /// Keyword directives, `.glyphx` files
    Expanded,
}

impl SyntaxMode {
    /// Select the syntax from a file extension; anything but `.glyphx` is compact
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("glyphx") => SyntaxMode::Expanded,
            _ => SyntaxMode::Compact,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            SyntaxMode::Compact => "glyph",
            SyntaxMode::Expanded => "glyphx",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Ident,
    /// Route path such as `/users/:id`
    Path,
    Integer,
    Float,
    /// String literal; the lexeme holds the unescaped contents
    Str,

    True,
    False,
    Null,
    If,
    Else,
    While,
    For,
    In,
    Switch,
    Case,
    Default,
    Break,
    Continue,
    Async,
    Await,
    Import,
    From,
    As,
    Module,
    Const,
    Contract,
    Func,

    At,
    Colon,
    Dollar,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Tilde,
    Bang,
    Question,
    Ampersand,
    Pipe,
    Lt,
    Gt,
    LtEq,
    GtEq,
    EqEq,
    NotEq,
    Assign,
    AndAnd,
    OrOr,
    Arrow,
    FatArrow,
    Dot,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,

    Eof,
}

impl TokenKind {
    /// Tokens after which a `/` is division and a `-` is subtraction
    fn is_value(&self) -> bool {
        matches!(
            self,
            TokenKind::Ident
                | TokenKind::Path
                | TokenKind::Integer
                | TokenKind::Float
                | TokenKind::Str
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
                | TokenKind::RParen
                | TokenKind::RBracket
                | TokenKind::RBrace
        )
    }

    pub fn is_keyword(&self) -> bool {
        keyword_kind(self.describe()).is_some()
    }

    /// Human-readable token name for diagnostics
    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::Ident => "identifier",
            TokenKind::Path => "path",
            TokenKind::Integer => "integer",
            TokenKind::Float => "float",
            TokenKind::Str => "string",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Null => "null",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::For => "for",
            TokenKind::In => "in",
            TokenKind::Switch => "switch",
            TokenKind::Case => "case",
            TokenKind::Default => "default",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::Async => "async",
            TokenKind::Await => "await",
            TokenKind::Import => "import",
            TokenKind::From => "from",
            TokenKind::As => "as",
            TokenKind::Module => "module",
            TokenKind::Const => "const",
            TokenKind::Contract => "contract",
            TokenKind::Func => "func",
            TokenKind::At => "'@'",
            TokenKind::Colon => "':'",
            TokenKind::Dollar => "'$'",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Percent => "'%'",
            TokenKind::Tilde => "'~'",
            TokenKind::Bang => "'!'",
            TokenKind::Question => "'?'",
            TokenKind::Ampersand => "'&'",
            TokenKind::Pipe => "'|'",
            TokenKind::Lt => "'<'",
            TokenKind::Gt => "'>'",
            TokenKind::LtEq => "'<='",
            TokenKind::GtEq => "'>='",
            TokenKind::EqEq => "'=='",
            TokenKind::NotEq => "'!='",
            TokenKind::Assign => "'='",
            TokenKind::AndAnd => "'&&'",
            TokenKind::OrOr => "'||'",
            TokenKind::Arrow => "'->'",
            TokenKind::FatArrow => "'=>'",
            TokenKind::Dot => "'.'",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::Comma => "','",
            TokenKind::Eof => "end of input",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub span: Span,
    /// First token on its line, or a directive spelled as an expanded keyword
    pub directive: bool,
}

impl Token {
    /// The identifier text of an identifier or keyword token.
    ///
    /// Keywords are allowed as object keys and field names (`event.from`, `{default: 1}`).
    pub fn word(&self) -> Option<&str> {
        let is_word = self.kind == TokenKind::Ident
            || self
                .lexeme
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && self.kind != TokenKind::Str
                && self.kind != TokenKind::Path;
        is_word.then_some(self.lexeme.as_str())
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

fn keyword_kind(word: &str) -> Option<TokenKind> {
    let kind = match word {
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "null" => TokenKind::Null,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "while" => TokenKind::While,
        "for" => TokenKind::For,
        "in" => TokenKind::In,
        "switch" => TokenKind::Switch,
        "case" => TokenKind::Case,
        "default" => TokenKind::Default,
        "break" => TokenKind::Break,
        "continue" => TokenKind::Continue,
        "async" => TokenKind::Async,
        "await" => TokenKind::Await,
        "import" => TokenKind::Import,
        "from" => TokenKind::From,
        "as" => TokenKind::As,
        "module" => TokenKind::Module,
        "const" => TokenKind::Const,
        "contract" => TokenKind::Contract,
        "func" | "fn" => TokenKind::Func,
        _ => return None,
    };
    Some(kind)
}

/// Directive keywords of the expanded syntax that introduce a top-level item.
/// They only act as directives when they start a line.
pub(crate) const ITEM_KEYWORDS: &[(&str, char)] = &[
    ("route", '@'),
    ("type", ':'),
    ("handle", '~'),
    ("cron", '*'),
    ("command", '!'),
    ("queue", '&'),
    ("func", '='),
];

/// Directive keywords of the expanded syntax that introduce a statement or a body
/// directive. They act as directives at the start of a line or right after `{`.
pub(crate) const STATEMENT_KEYWORDS: &[(&str, char)] = &[
    ("let", '$'),
    ("return", '>'),
    ("middleware", '+'),
    ("use", '%'),
    ("expects", '<'),
    ("validate", '?'),
];

fn directive_symbol_kind(symbol: char) -> Option<TokenKind> {
    let kind = match symbol {
        '@' => TokenKind::At,
        ':' => TokenKind::Colon,
        '~' => TokenKind::Tilde,
        '*' => TokenKind::Star,
        '!' => TokenKind::Bang,
        '&' => TokenKind::Ampersand,
        '=' => TokenKind::Func,
        '$' => TokenKind::Dollar,
        '>' => TokenKind::Gt,
        '+' => TokenKind::Plus,
        '%' => TokenKind::Percent,
        '<' => TokenKind::Lt,
        '?' => TokenKind::Question,
        _ => return None,
    };
    Some(kind)
}

/// Tokenize a source unit
pub fn tokenize(source: &str, mode: SyntaxMode) -> GlyphResult<Vec<Token>> {
    Lexer::new(source, mode).tokenize()
}

/// Single-use tokenizer over one source string
pub struct Lexer<'a> {
    source: &'a str,
    source_id: String,
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    mode: SyntaxMode,
    tokens: Vec<Token>,
    line_has_token: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, mode: SyntaxMode) -> Self {
        Self {
            source,
            source_id: "<input>".to_string(),
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            mode,
            tokens: Vec::new(),
            line_has_token: false,
        }
    }

    /// Name used for the source in error messages
    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = source_id.into();
        self
    }

    pub fn tokenize(mut self) -> GlyphResult<Vec<Token>> {
        loop {
            self.skip_trivia();
            let Some(c) = self.peek() else {
                break;
            };
            let start = (self.pos, self.line, self.col);
            let kind = self.next_kind(c)?;
            self.push(kind, start);
        }

        let eof = Span::new(self.pos, self.pos, self.line, self.col);
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            lexeme: String::new(),
            span: eof,
            directive: !self.line_has_token,
        });
        Ok(self.tokens)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
            self.line_has_token = false;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                ' ' | '\t' | '\r' | '\n' => {
                    self.advance();
                }
                '#' => self.skip_line(),
                '/' if self.peek_at(1) == Some('/') => self.skip_line(),
                _ => break,
            }
        }
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn previous(&self) -> Option<&Token> {
        self.tokens.last()
    }

    fn previous_is_value(&self) -> bool {
        self.previous().is_some_and(|t| t.kind.is_value())
    }

    fn error(&self, message: impl Into<String>, start: (usize, usize, usize)) -> GlyphError {
        GlyphError::lex(
            message,
            Span::new(start.0, self.pos.max(start.0 + 1), start.1, start.2),
            self.source_id.clone(),
            Arc::from(self.source),
        )
    }

    fn push(&mut self, kind: (TokenKind, String, bool), start: (usize, usize, usize)) {
        let (kind, lexeme, keyword_directive) = kind;
        let directive = keyword_directive || !self.line_has_token;
        self.line_has_token = true;
        self.tokens.push(Token {
            kind,
            lexeme,
            span: Span::new(start.0, self.pos, start.1, start.2),
            directive,
        });
    }

    /// Scan one token starting at `c`; returns kind, lexeme and whether it is a keyword directive
    fn next_kind(&mut self, c: char) -> GlyphResult<(TokenKind, String, bool)> {
        let start = (self.pos, self.line, self.col);

        if c.is_ascii_digit() {
            return self.read_number(start, false);
        }
        if c == '-'
            && self.peek_at(1).is_some_and(|n| n.is_ascii_digit())
            && !self.previous_is_value()
        {
            return self.read_number(start, true);
        }
        if c.is_ascii_alphabetic() || c == '_' {
            return Ok(self.read_word());
        }
        if c == '"' || c == '\'' {
            return self.read_string(start, c);
        }
        if c == '/' {
            if let Some(path) = self.read_path() {
                return Ok((TokenKind::Path, path, false));
            }
        }

        self.advance();
        let two = |lexer: &mut Self, next: char, kind: TokenKind, text: &str| {
            if lexer.peek() == Some(next) {
                lexer.advance();
                Some((kind, text.to_string(), false))
            } else {
                None
            }
        };

        let single = |kind: TokenKind| Ok((kind, c.to_string(), false));
        match c {
            '=' => {
                if let Some(t) = two(self, '=', TokenKind::EqEq, "==") {
                    return Ok(t);
                }
                if let Some(t) = two(self, '>', TokenKind::FatArrow, "=>") {
                    return Ok(t);
                }
                single(TokenKind::Assign)
            }
            '!' => two(self, '=', TokenKind::NotEq, "!=").map_or(single(TokenKind::Bang), Ok),
            '<' => two(self, '=', TokenKind::LtEq, "<=").map_or(single(TokenKind::Lt), Ok),
            '>' => two(self, '=', TokenKind::GtEq, ">=").map_or(single(TokenKind::Gt), Ok),
            '&' => two(self, '&', TokenKind::AndAnd, "&&").map_or(single(TokenKind::Ampersand), Ok),
            '|' => two(self, '|', TokenKind::OrOr, "||").map_or(single(TokenKind::Pipe), Ok),
            '-' => two(self, '>', TokenKind::Arrow, "->").map_or(single(TokenKind::Minus), Ok),
            '@' => single(TokenKind::At),
            ':' => single(TokenKind::Colon),
            '$' => single(TokenKind::Dollar),
            '+' => single(TokenKind::Plus),
            '*' => single(TokenKind::Star),
            '/' => single(TokenKind::Slash),
            '%' => single(TokenKind::Percent),
            '~' => single(TokenKind::Tilde),
            '?' => single(TokenKind::Question),
            '.' => single(TokenKind::Dot),
            '(' => single(TokenKind::LParen),
            ')' => single(TokenKind::RParen),
            '{' => single(TokenKind::LBrace),
            '}' => single(TokenKind::RBrace),
            '[' => single(TokenKind::LBracket),
            ']' => single(TokenKind::RBracket),
            ',' => single(TokenKind::Comma),
            other => Err(self.error(format!("unexpected character '{}'", other), start)),
        }
    }

    fn read_number(
        &mut self,
        start: (usize, usize, usize),
        negative: bool,
    ) -> GlyphResult<(TokenKind, String, bool)> {
        let mut text = String::new();
        if negative {
            text.push('-');
            self.advance();
        }
        while let Some(c) = self.peek().filter(char::is_ascii_digit) {
            text.push(c);
            self.advance();
        }

        let is_float = self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit());
        if is_float {
            text.push('.');
            self.advance();
            while let Some(c) = self.peek().filter(char::is_ascii_digit) {
                text.push(c);
                self.advance();
            }
        }

        if self.peek().is_some_and(|c| c.is_ascii_alphabetic() || c == '_') {
            return Err(self.error(format!("invalid number literal '{}'", text), start));
        }

        let kind = if is_float {
            TokenKind::Float
        } else {
            TokenKind::Integer
        };
        Ok((kind, text, false))
    }

    fn read_word(&mut self) -> (TokenKind, String, bool) {
        let mut word = String::new();
        while let Some(c) = self.peek().filter(|c| c.is_ascii_alphanumeric() || *c == '_') {
            word.push(c);
            self.advance();
        }

        if self.mode == SyntaxMode::Expanded {
            if let Some(kind) = self.expanded_directive(&word) {
                return (kind, word, true);
            }
        }

        match keyword_kind(&word) {
            Some(kind) => (kind, word, false),
            None => (TokenKind::Ident, word, false),
        }
    }

    /// Token kind of an expanded directive keyword in directive position
    fn expanded_directive(&self, word: &str) -> Option<TokenKind> {
        if self.previous().is_some_and(|t| t.kind == TokenKind::Dot) {
            return None;
        }

        let mut offset = 0;
        while matches!(self.peek_at(offset), Some(' ') | Some('\t')) {
            offset += 1;
        }
        if matches!(self.peek_at(offset), Some(':') | Some('.')) {
            return None;
        }

        let after_brace = self
            .previous()
            .is_some_and(|t| t.kind == TokenKind::LBrace);
        let line_start = !self.line_has_token;

        let symbol = if word == "fn" || word == "func" {
            None
        } else if let Some((_, symbol)) = ITEM_KEYWORDS.iter().find(|(kw, _)| *kw == word) {
            line_start.then_some(*symbol)
        } else if word == "inject" {
            (line_start || after_brace).then_some('%')
        } else {
            STATEMENT_KEYWORDS
                .iter()
                .find(|(kw, _)| *kw == word)
                .and_then(|(_, symbol)| (line_start || after_brace).then_some(*symbol))
        };

        symbol.and_then(directive_symbol_kind)
    }

    fn read_string(
        &mut self,
        start: (usize, usize, usize),
        quote: char,
    ) -> GlyphResult<(TokenKind, String, bool)> {
        self.advance();
        let mut value = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    return Err(self.error("unterminated string literal", start));
                }
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    match self.advance() {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('r') => value.push('\r'),
                        Some(other) => value.push(other),
                        None => return Err(self.error("unterminated string literal", start)),
                    }
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }
        Ok((TokenKind::Str, value, false))
    }

    /// Read a route path at the current `/`, if the context calls for one
    fn read_path(&mut self) -> Option<String> {
        let route_context = self.previous().is_some_and(|t| match t.kind {
            TokenKind::At => true,
            TokenKind::Ident => {
                t.lexeme == "route" || crate::ast::HttpMethod::parse(&t.lexeme).is_some()
            }
            _ => false,
        });
        let next = self.peek_at(1);
        let starts_segment = next.is_some_and(|c| c.is_ascii_alphabetic() || c == ':' || c == '_');

        if !(starts_segment && (route_context || !self.previous_is_value())) {
            let is_root = route_context
                && next.map_or(true, |c| c.is_whitespace() || c == '{' || c == '[');
            if is_root {
                self.advance();
                return Some("/".to_string());
            }
            return None;
        }

        let mut path = String::new();
        while let Some(c) = self
            .peek()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | ':' | '-' | '_' | '.'))
        {
            path.push(c);
            self.advance();
        }
        Some(path)
    }
}
