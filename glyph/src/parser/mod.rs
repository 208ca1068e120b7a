//! Recursive-descent parser
//!
//! Builds a [`Module`] from the token stream. Parsing stops at the first malformed
//! construct; the error carries the offending position and, for common mistakes,
//! a hint.

use crate::ast::{Expr, Module, Span, Statement};
use crate::error::GlyphError;
use crate::lexer::{Lexer, SyntaxMode, Token, TokenKind};
use crate::resource_limits::ResourceLimits;
use crate::GlyphResult;
use std::sync::Arc;

pub mod expressions;
pub mod items;
pub mod statements;
pub mod types;

/// Parse a whole source unit into a module
pub fn parse(
    content: &str,
    filename: Option<String>,
    mode: SyntaxMode,
    limits: &ResourceLimits,
) -> GlyphResult<Module> {
    check_file_size(content, limits)?;
    let source_id = filename.unwrap_or_else(|| "<input>".to_string());
    let tokens = Lexer::new(content, mode)
        .with_source_id(source_id.clone())
        .tokenize()?;
    Parser::new(tokens, content, source_id, limits).parse_module()
}

/// Parse with default limits and no file name
pub fn parse_str(content: &str, mode: SyntaxMode) -> GlyphResult<Module> {
    parse(content, None, mode, &ResourceLimits::default())
}

/// Parse a single expression, e.g. a REPL line
pub fn parse_expression(content: &str, mode: SyntaxMode) -> GlyphResult<Expr> {
    let limits = ResourceLimits::default();
    check_file_size(content, &limits)?;
    let tokens = Lexer::new(content, mode).tokenize()?;
    let mut parser = Parser::new(tokens, content, "<input>".to_string(), &limits);
    let expr = parser.parse_expression()?;
    parser.expect_end()?;
    Ok(expr)
}

/// Parse a sequence of statements outside of any declaration
pub fn parse_statements(content: &str, mode: SyntaxMode) -> GlyphResult<Vec<Statement>> {
    let limits = ResourceLimits::default();
    check_file_size(content, &limits)?;
    let tokens = Lexer::new(content, mode).tokenize()?;
    let mut parser = Parser::new(tokens, content, "<input>".to_string(), &limits);
    let mut statements = Vec::new();
    while !parser.is_at_end() {
        statements.push(parser.parse_statement()?);
    }
    Ok(statements)
}

fn check_file_size(content: &str, limits: &ResourceLimits) -> GlyphResult<()> {
    if content.len() > limits.max_file_size_bytes {
        return Err(GlyphError::ResourceLimitExceeded {
            limit_name: "max_file_size_bytes".to_string(),
            limit_value: format!(
                "{} bytes ({} MB)",
                limits.max_file_size_bytes,
                limits.max_file_size_bytes / (1024 * 1024)
            ),
            actual_value: format!(
                "{} bytes ({:.2} MB)",
                content.len(),
                content.len() as f64 / (1024.0 * 1024.0)
            ),
            suggestion: "Reduce file size or split the service into several modules".to_string(),
        });
    }
    Ok(())
}

/// Cursor over a token stream plus the source it came from
pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    source: Arc<str>,
    source_id: String,
    limits: &'a ResourceLimits,
    depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(
        mut tokens: Vec<Token>,
        source: &str,
        source_id: String,
        limits: &'a ResourceLimits,
    ) -> Self {
        if tokens.last().map_or(true, |t| t.kind != TokenKind::Eof) {
            let end = source.chars().count();
            tokens.push(Token {
                kind: TokenKind::Eof,
                lexeme: String::new(),
                span: Span::new(end, end, 0, 0),
                directive: true,
            });
        }
        Self {
            tokens,
            pos: 0,
            source: Arc::from(source),
            source_id,
            limits,
            depth: 0,
        }
    }

    pub(crate) fn current(&self) -> &Token {
        // The stream always ends with Eof and the cursor never moves past it
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    pub(crate) fn peek(&self, offset: usize) -> &Token {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)]
    }

    pub(crate) fn previous_span(&self) -> Span {
        if self.pos == 0 {
            self.current().span
        } else {
            self.tokens[self.pos - 1].span
        }
    }

    /// Span from `start` to the end of the last consumed token
    pub(crate) fn span_from(&self, start: Span) -> Span {
        start.to(self.previous_span())
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.current().kind == TokenKind::Eof
    }

    pub(crate) fn check(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    /// Current token is `kind` and is not the first token of a new line
    pub(crate) fn check_inline(&self, kind: TokenKind) -> bool {
        self.check(kind) && !self.current().directive
    }

    pub(crate) fn check_word(&self, word: &str) -> bool {
        self.current().kind == TokenKind::Ident && self.current().lexeme == word
    }

    pub(crate) fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn skip_commas(&mut self) {
        while self.eat(TokenKind::Comma) {}
    }

    pub(crate) fn expect(&mut self, kind: TokenKind) -> GlyphResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.expect_error(kind))
        }
    }

    pub(crate) fn expect_ident(&mut self, what: &str) -> GlyphResult<Token> {
        if self.check(TokenKind::Ident) {
            Ok(self.advance())
        } else {
            Err(self.error(format!(
                "Expected {}, but found {}",
                what,
                self.describe_current()
            )))
        }
    }

    /// Identifier or keyword used as a name (object keys, field names)
    pub(crate) fn expect_word(&mut self, what: &str) -> GlyphResult<String> {
        match self.current().word() {
            Some(word) => {
                let word = word.to_string();
                self.advance();
                Ok(word)
            }
            None => Err(self.error(format!(
                "Expected {}, but found {}",
                what,
                self.describe_current()
            ))),
        }
    }

    pub(crate) fn expect_end(&self) -> GlyphResult<()> {
        if self.is_at_end() {
            Ok(())
        } else {
            Err(self.error(format!(
                "Unexpected {} after end of expression",
                self.describe_current()
            )))
        }
    }

    pub(crate) fn describe_current(&self) -> String {
        let token = self.current();
        match token.kind {
            TokenKind::Ident | TokenKind::Path | TokenKind::Integer | TokenKind::Float => {
                format!("'{}'", token.lexeme)
            }
            TokenKind::Str => format!("string \"{}\"", token.lexeme),
            kind if token.lexeme.chars().any(char::is_alphabetic) => {
                format!("'{}' ({})", token.lexeme, kind)
            }
            kind => kind.to_string(),
        }
    }

    pub(crate) fn error(&self, message: impl Into<String>) -> GlyphError {
        self.error_at(message, self.current().span)
    }

    pub(crate) fn error_at(&self, message: impl Into<String>, span: Span) -> GlyphError {
        GlyphError::parse(message, span, self.source_id.clone(), self.source.clone())
    }

    pub(crate) fn error_with_hint(
        &self,
        message: impl Into<String>,
        hint: impl Into<String>,
    ) -> GlyphError {
        GlyphError::parse_with_hint(
            message,
            self.current().span,
            self.source_id.clone(),
            self.source.clone(),
            hint,
        )
    }

    fn expect_error(&self, expected: TokenKind) -> GlyphError {
        let got = self.current().kind;
        let message = format!("Expected {}, but found {}", expected, self.describe_current());
        let hint = match (expected, got) {
            (TokenKind::LBrace, TokenKind::Arrow) => {
                Some("The '->' symbol declares a return type and must be followed by a type")
            }
            (TokenKind::LBrace, TokenKind::Eof) => Some("Did you forget to add a body '{ ... }'?"),
            (TokenKind::RBrace, TokenKind::Eof) => Some(
                "Missing closing brace '}'. Check that all opened braces are properly closed",
            ),
            (TokenKind::RParen, TokenKind::Eof) => Some(
                "Missing closing parenthesis ')'. Check that all opened parentheses are properly closed",
            ),
            (TokenKind::RBracket, TokenKind::Eof) => Some("Missing closing bracket ']'"),
            (TokenKind::Colon, TokenKind::Ident) => {
                Some("Fields are written as 'name: type', e.g. 'email: string!'")
            }
            (TokenKind::Assign, TokenKind::Eof) => Some("Assignments need a value: '$ name = value'"),
            _ => None,
        };
        match hint {
            Some(hint) => self.error_with_hint(message, hint),
            None => self.error(message),
        }
    }

    /// Increment the nesting depth, failing past the configured limit
    pub(crate) fn push_depth(&mut self) -> GlyphResult<()> {
        self.depth += 1;
        if self.depth > self.limits.max_expression_depth {
            return Err(GlyphError::ResourceLimitExceeded {
                limit_name: "max_expression_depth".to_string(),
                limit_value: self.limits.max_expression_depth.to_string(),
                actual_value: self.depth.to_string(),
                suggestion: "Simplify nested expressions to reduce depth".to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn pop_depth(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Consume a parenthesised group without interpreting it.
    ///
    /// The cursor must be on `(`. Returns the tokens between the outer parentheses
    /// and their raw source text.
    pub(crate) fn skip_balanced(&mut self, owner: &str) -> GlyphResult<(Vec<Token>, String)> {
        let open = self.expect(TokenKind::LParen)?;
        let mut depth = 1usize;
        let mut inner = Vec::new();

        loop {
            match self.current().kind {
                TokenKind::Eof => {
                    return Err(GlyphError::parse_with_hint(
                        format!("unbalanced parentheses in arguments of {}", owner),
                        open.span,
                        self.source_id.clone(),
                        self.source.clone(),
                        "Every '(' needs a matching ')'",
                    ));
                }
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            inner.push(self.advance());
        }

        let close = self.advance();
        let raw: String = self
            .source
            .chars()
            .skip(open.span.end)
            .take(close.span.start.saturating_sub(open.span.end))
            .collect();
        Ok((inner, raw.trim().to_string()))
    }

    /// Index of the `)` matching the `(` at `offset` tokens ahead, if any
    pub(crate) fn matching_paren(&self, offset: usize) -> Option<usize> {
        let mut depth = 0usize;
        let mut index = self.pos + offset;
        while let Some(token) = self.tokens.get(index) {
            match token.kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Some(index - self.pos);
                    }
                }
                TokenKind::Eof => return None,
                _ => {}
            }
            index += 1;
        }
        None
    }
}
