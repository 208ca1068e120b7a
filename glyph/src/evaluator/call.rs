//! Function calls and parameter binding

use super::expression::access_field;
use super::timeout::Checkpoint;
use super::{builtins, typecheck, Evaluator};
use crate::ast::{Expr, Field, LambdaBody};
use crate::environment::Environment;
use crate::error::RuntimeError;
use crate::value::{Closure, Value};
use crate::{GlyphError, GlyphResult};
use std::rc::Rc;

impl Evaluator<'_> {
    /// Evaluate `name(args)`.
    ///
    /// A dotted name whose first segment is a variable is a method call: a
    /// callable field of the receiver wins, otherwise the builtin of that name is
    /// called with the receiver as its first argument. Plain names resolve to a
    /// variable holding a function, then a declared function, then a builtin.
    pub(crate) fn evaluate_call(
        &mut self,
        name: &str,
        args: &[Expr],
        env: &Environment,
    ) -> GlyphResult<Value> {
        let mut values = args
            .iter()
            .map(|arg| self.evaluate(arg, env))
            .collect::<GlyphResult<Vec<_>>>()?;

        if let Some((root, rest)) = name.split_once('.') {
            if let Some(mut receiver) = env.lookup(root) {
                let mut segments: Vec<&str> = rest.split('.').collect();
                let method = segments.pop().unwrap_or(rest);
                for segment in segments {
                    receiver = access_field(&receiver, segment)?;
                }
                if let Value::Object(fields) = &receiver {
                    if let Some(callee) = fields.get(method).filter(|v| is_callable(v)) {
                        let callee = callee.clone();
                        return self.call_value(&callee, values);
                    }
                }
                if !builtins::exists(method) {
                    return Err(RuntimeError::UndefinedFunction(name.to_string()).into());
                }
                values.insert(0, receiver);
                return builtins::call(self, method, values);
            }
        }

        if let Some(callee) = env.lookup(name) {
            if !is_callable(&callee) {
                return Err(RuntimeError::TypeMismatch(format!(
                    "'{}' is {}, not a function",
                    name,
                    callee.type_name()
                ))
                .into());
            }
            return self.call_value(&callee, values);
        }

        if let Some(function) = self.registry.functions.get(name) {
            let closure = self.function_closure(function);
            return self.call_closure(&closure, values);
        }

        if builtins::exists(name) {
            return builtins::call(self, name, values);
        }

        Err(RuntimeError::UndefinedFunction(name.to_string()).into())
    }

    /// Call any callable value
    pub fn call_value(&mut self, callee: &Value, args: Vec<Value>) -> GlyphResult<Value> {
        match callee {
            Value::Function(closure) => self.call_closure(closure, args),
            Value::Builtin(name) => builtins::call(self, name, args),
            other => Err(RuntimeError::TypeMismatch(format!(
                "{} is not callable",
                other.type_name()
            ))
            .into()),
        }
    }

    /// Call a closure, switching to its home module when it was imported
    pub fn call_closure(&mut self, closure: &Rc<Closure>, args: Vec<Value>) -> GlyphResult<Value> {
        if let Some(home) = &closure.home {
            if !std::ptr::eq(&home.registry, self.registry) {
                let home = Rc::clone(home);
                let mut nested = Evaluator {
                    registry: &home.registry,
                    globals: home.globals.clone(),
                    limits: self.limits,
                    timeout: self.timeout,
                    call_depth: self.call_depth,
                };
                return nested.invoke(closure, args);
            }
        }
        self.invoke(closure, args)
    }

    fn invoke(&mut self, closure: &Closure, args: Vec<Value>) -> GlyphResult<Value> {
        if self.call_depth >= self.limits.max_call_depth {
            return Err(GlyphError::ResourceLimitExceeded {
                limit_name: "max_call_depth".to_string(),
                limit_value: self.limits.max_call_depth.to_string(),
                actual_value: (self.call_depth + 1).to_string(),
                suggestion: format!(
                    "Calls nested deeper than {} frames; check '{}' for unbounded recursion",
                    self.limits.max_call_depth,
                    closure.display_name()
                ),
            });
        }

        let name = closure.display_name();
        self.timeout.check(Checkpoint::Call(name))?;

        let frame = closure.env.child();
        self.bind_params(name, &closure.params, args, &frame)?;

        self.call_depth += 1;
        let result = match &closure.body {
            LambdaBody::Expr(expr) => self.evaluate(expr, &frame),
            LambdaBody::Block(body) => self.run_body(body, &frame),
        };
        self.call_depth -= 1;

        let value = result?;
        if let Some(declared) = &closure.return_type {
            self.check_return(&format!("function {}", name), declared, &value)?;
        }
        Ok(value)
    }

    /// Bind `args` to `params` positionally in `frame`.
    ///
    /// Omitted parameters take their default, evaluated in `frame` so it can
    /// refer to earlier parameters, or null when the parameter is optional.
    pub fn bind_params(
        &mut self,
        name: &str,
        params: &[Field],
        args: Vec<Value>,
        frame: &Environment,
    ) -> GlyphResult<()> {
        if args.len() > params.len() {
            return Err(RuntimeError::ArityMismatch {
                name: name.to_string(),
                expected: params.len(),
                actual: args.len(),
            }
            .into());
        }

        let mut args = args.into_iter();
        for param in params {
            let value = match args.next() {
                Some(value) => value,
                None => match &param.default {
                    Some(default) => self.evaluate(default, frame)?,
                    None if param.is_optional() => Value::Null,
                    None => {
                        return Err(RuntimeError::MissingRequiredParam(format!(
                            "{} (in {})",
                            param.name, name
                        ))
                        .into())
                    }
                },
            };
            if !typecheck::conforms(&value, &param.type_annotation, self.registry) {
                return Err(RuntimeError::TypeMismatch(format!(
                    "argument '{}' of {} expects {}, got {}",
                    param.name,
                    name,
                    param.type_annotation,
                    typecheck::infer_type(&value)
                ))
                .into());
            }
            frame.define(param.name.clone(), value);
        }
        Ok(())
    }
}

pub fn is_callable(value: &Value) -> bool {
    matches!(value, Value::Function(_) | Value::Builtin(_))
}
