//! # Glyph Engine
//!
//! **Backend services in a few lines**
//!
//! Glyph is a small language for declaring HTTP routes, CLI commands, scheduled
//! tasks, event handlers, queue workers and GraphQL resolvers, together with the
//! types and functions they share. Sources come in two concrete syntaxes: a
//! compact one built from directive symbols and an expanded one that spells the
//! same directives as keywords.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use glyph::{HttpMethod, Interpreter, GlyphResult, Request, SyntaxMode};
//!
//! fn main() -> GlyphResult<()> {
//!     let mut interpreter = Interpreter::new();
//!
//!     interpreter.load_source(r#"
//!         : User { id: int!, name: string! }
//!
//!         @ GET /users/:id -> User {
//!             > {id: 1, name: "Ada"}
//!         }
//!     "#, Some("users.glyph"), SyntaxMode::Compact)?;
//!
//!     let user = interpreter.dispatch(HttpMethod::Get, "/users/1", &Request::new())?;
//!     println!("{}", user.to_json());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Core Concepts
//!
//! ### Modules and items
//! A module is one parsed source file: an ordered list of items. Loading a
//! module registers each item in a per-kind registry.
//!
//! ### Environments
//! Scopes form a parent-linked chain. Functions and lambdas capture the scope
//! they were created in, so lookups are lexical.
//!
//! ### Contracts
//! A contract lists endpoint signatures. [`contract::verify`] checks a module
//! against one and [`contract::diff`] compares two versions.

pub mod ast;
pub mod contract;
pub mod environment;
pub mod error;
pub mod evaluator;
pub mod interpreter;
pub mod lexer;
pub mod modules;
pub mod parser;
pub mod registry;
pub mod resource_limits;
pub mod routing;
pub mod transform;
pub mod types;
pub mod value;

pub use ast::{HttpMethod, GraphQLOperation, Item, Module, Span};
pub use environment::Environment;
pub use error::{Diagnostic, GlyphError, RuntimeError};
pub use evaluator::{ControlSignal, Request};
pub use interpreter::{Interpreter, InterpreterOptions};
pub use lexer::{tokenize, SyntaxMode, Token, TokenKind};
pub use parser::{parse, parse_expression, parse_statements, parse_str};
pub use registry::{DuplicatePolicy, Registry};
pub use resource_limits::ResourceLimits;
pub use transform::{compact_source, expand_source};
pub use types::{is_compatible, type_to_string, Type};
pub use value::Value;

/// Result type for Glyph operations
pub type GlyphResult<T> = Result<T, GlyphError>;

#[cfg(test)]
mod tests;
