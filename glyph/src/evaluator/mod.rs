//! Tree-walking evaluator
//!
//! An [`Evaluator`] runs statements and expressions against one module's
//! registry and global scope. Statements report how control leaves them through
//! [`ControlSignal`]; expressions produce a [`Value`].
//!
//! The evaluator is created per top-level execution (a route invocation, a REPL
//! line) and owns nothing but the call depth. Timeouts and loop bounds come from
//! [`ResourceLimits`].

pub mod builtins;
pub mod call;
pub mod context;
pub mod control;
pub mod expression;
pub mod operations;
pub mod stack;
pub mod statement;
pub mod timeout;
pub mod typecheck;

use crate::ast::Statement;
use crate::environment::Environment;
use crate::error::RuntimeError;
use crate::registry::Registry;
use crate::types::Type;
use crate::value::Value;
use crate::{GlyphError, GlyphResult, ResourceLimits};

pub use context::Request;
pub use control::ControlSignal;
pub use timeout::{Checkpoint, TimeoutTracker};

pub struct Evaluator<'a> {
    registry: &'a Registry,
    globals: Environment,
    limits: &'a ResourceLimits,
    timeout: &'a TimeoutTracker,
    call_depth: usize,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        registry: &'a Registry,
        globals: Environment,
        limits: &'a ResourceLimits,
        timeout: &'a TimeoutTracker,
    ) -> Self {
        Self {
            registry,
            globals,
            limits,
            timeout,
            call_depth: 0,
        }
    }

    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    pub fn globals(&self) -> &Environment {
        &self.globals
    }

    pub fn limits(&self) -> &'a ResourceLimits {
        self.limits
    }

    /// Run a handler or function body to completion.
    ///
    /// A `return` yields its value and falling off the end yields null. `break`
    /// or `continue` escaping the body is an error.
    pub fn run_body(&mut self, body: &[Statement], env: &Environment) -> GlyphResult<Value> {
        match self.execute_block(body, env)? {
            ControlSignal::Return(value) => Ok(value),
            ControlSignal::Normal => Ok(Value::Null),
            ControlSignal::Break => Err(RuntimeError::InvalidControlFlow("break").into()),
            ControlSignal::Continue => Err(RuntimeError::InvalidControlFlow("continue").into()),
        }
    }

    /// Check a produced value against a declared return type
    pub fn check_return(&self, context: &str, declared: &Type, value: &Value) -> GlyphResult<()> {
        if typecheck::conforms(value, declared, self.registry) {
            return Ok(());
        }
        Err(RuntimeError::ReturnTypeMismatch {
            context: context.to_string(),
            detail: format!(
                "expected {}, got {}",
                declared,
                typecheck::infer_type(value)
            ),
        }
        .into())
    }

    fn check_loop(&self, iterations: &mut u64) -> GlyphResult<()> {
        *iterations += 1;
        if *iterations > self.limits.max_loop_iterations {
            return Err(GlyphError::ResourceLimitExceeded {
                limit_name: "max_loop_iterations".to_string(),
                limit_value: self.limits.max_loop_iterations.to_string(),
                actual_value: iterations.to_string(),
                suggestion: "Check the loop condition or raise the iteration limit".to_string(),
            });
        }
        self.timeout.check(Checkpoint::LoopIteration(*iterations))
    }
}
