use crate::ast::Span;
use std::fmt;
use std::sync::Arc;

/// Detailed error information with source location
#[derive(Debug, Clone)]
pub struct ErrorDetails {
    pub message: String,
    pub span: Span,
    pub source_id: String,
    pub source_text: Arc<str>,
    pub hint: Option<String>,
}

/// Position-only view of a syntax error, as shown by editors and the REPL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub hint: Option<String>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, " (hint: {})", hint)?;
        }
        Ok(())
    }
}

/// Failures raised while evaluating a syntactically valid program
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    #[error("undefined variable: {0}")]
    UndefinedVariable(String),

    #[error("undefined function: {0}")]
    UndefinedFunction(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("{name} expects {expected} argument(s), got {actual}")]
    ArityMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("missing required argument: {0}")]
    MissingRequiredParam(String),

    #[error("division by zero")]
    DivideByZero,

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("duplicate {kind}: {name}")]
    Duplicate { kind: &'static str, name: String },

    #[error("cannot reassign constant: {0}")]
    ConstantReassignment(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("return type mismatch in {context}: {detail}")]
    ReturnTypeMismatch { context: String, detail: String },

    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("{0} outside of a loop")]
    InvalidControlFlow(&'static str),
}

/// Error types for the Glyph engine
#[derive(Debug, Clone)]
pub enum GlyphError {
    /// Tokenizer error with source location
    Lex(Box<ErrorDetails>),

    /// Parse error with source location
    Parse(Box<ErrorDetails>),

    /// Evaluation error, located at the innermost statement that failed when known
    Runtime {
        error: RuntimeError,
        span: Option<Span>,
    },

    /// Import resolution failure
    Module(String),

    ResourceLimitExceeded {
        limit_name: String,
        limit_value: String,
        actual_value: String,
        suggestion: String,
    },

    /// Multiple errors collected together
    MultipleErrors(Vec<GlyphError>),
}

impl GlyphError {
    /// Create a lex error with source information
    pub fn lex(
        message: impl Into<String>,
        span: Span,
        source_id: impl Into<String>,
        source_text: Arc<str>,
    ) -> Self {
        Self::Lex(Box::new(ErrorDetails {
            message: message.into(),
            span,
            source_id: source_id.into(),
            source_text,
            hint: None,
        }))
    }

    /// Create a parse error with source information
    pub fn parse(
        message: impl Into<String>,
        span: Span,
        source_id: impl Into<String>,
        source_text: Arc<str>,
    ) -> Self {
        Self::Parse(Box::new(ErrorDetails {
            message: message.into(),
            span,
            source_id: source_id.into(),
            source_text,
            hint: None,
        }))
    }

    /// Create a parse error with a hint
    pub fn parse_with_hint(
        message: impl Into<String>,
        span: Span,
        source_id: impl Into<String>,
        source_text: Arc<str>,
        hint: impl Into<String>,
    ) -> Self {
        Self::Parse(Box::new(ErrorDetails {
            message: message.into(),
            span,
            source_id: source_id.into(),
            source_text,
            hint: Some(hint.into()),
        }))
    }

    pub fn runtime(error: RuntimeError) -> Self {
        Self::Runtime { error, span: None }
    }

    /// Attach a location to a runtime error that does not have one yet
    pub fn at(self, location: Span) -> Self {
        match self {
            GlyphError::Runtime { error, span: None } => GlyphError::Runtime {
                error,
                span: Some(location),
            },
            other => other,
        }
    }

    /// The runtime error, if this is one
    pub fn as_runtime(&self) -> Option<&RuntimeError> {
        match self {
            GlyphError::Runtime { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_syntax(&self) -> bool {
        match self {
            GlyphError::Lex(_) | GlyphError::Parse(_) => true,
            GlyphError::MultipleErrors(errors) => errors.iter().all(GlyphError::is_syntax),
            _ => false,
        }
    }

    /// Syntax errors as editor diagnostics; other errors yield nothing
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        match self {
            GlyphError::Lex(details) | GlyphError::Parse(details) => vec![Diagnostic {
                message: details.message.clone(),
                line: details.span.line,
                column: details.span.col,
                hint: details.hint.clone(),
            }],
            GlyphError::MultipleErrors(errors) => {
                errors.iter().flat_map(GlyphError::diagnostics).collect()
            }
            _ => Vec::new(),
        }
    }
}

impl From<RuntimeError> for GlyphError {
    fn from(error: RuntimeError) -> Self {
        GlyphError::runtime(error)
    }
}

impl fmt::Display for GlyphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlyphError::Lex(details) => {
                write!(f, "Lex error: {}", details.message)?;
                write!(
                    f,
                    " at {}:{}:{}",
                    details.source_id, details.span.line, details.span.col
                )
            }
            GlyphError::Parse(details) => {
                write!(f, "Parse error: {}", details.message)?;
                if let Some(hint) = &details.hint {
                    write!(f, " (hint: {})", hint)?;
                }
                write!(
                    f,
                    " at {}:{}:{}",
                    details.source_id, details.span.line, details.span.col
                )
            }
            GlyphError::Runtime { error, span } => {
                write!(f, "Runtime error: {}", error)?;
                if let Some(span) = span {
                    write!(f, " at line {}:{}", span.line, span.col)?;
                }
                Ok(())
            }
            GlyphError::Module(msg) => write!(f, "Module error: {}", msg),
            GlyphError::ResourceLimitExceeded {
                limit_name,
                limit_value,
                actual_value,
                suggestion,
            } => write!(
                f,
                "Resource limit exceeded: {} (limit {}, actual {}). {}",
                limit_name, limit_value, actual_value, suggestion
            ),
            GlyphError::MultipleErrors(errors) => {
                writeln!(f, "Multiple errors:")?;
                for (i, error) in errors.iter().enumerate() {
                    write!(f, "  {}. {}", i + 1, error)?;
                    if i < errors.len() - 1 {
                        writeln!(f)?;
                    }
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for GlyphError {}
