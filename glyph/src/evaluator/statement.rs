//! Statement execution

use super::control::ControlSignal;
use super::expression::checked_index;
use super::stack::ensure_sufficient_stack;
use super::{typecheck, Evaluator};
use crate::ast::{AssignTarget, PathStep, Statement, StatementKind};
use crate::environment::Environment;
use crate::error::RuntimeError;
use crate::value::Value;
use crate::GlyphResult;

impl Evaluator<'_> {
    /// Execute statements in order until one leaves the block early
    pub fn execute_block(
        &mut self,
        statements: &[Statement],
        env: &Environment,
    ) -> GlyphResult<ControlSignal> {
        for statement in statements {
            let signal = self.execute(statement, env)?;
            if !signal.is_normal() {
                return Ok(signal);
            }
        }
        Ok(ControlSignal::Normal)
    }

    /// Execute one statement. Errors without a location get this statement's span.
    pub fn execute(&mut self, statement: &Statement, env: &Environment) -> GlyphResult<ControlSignal> {
        ensure_sufficient_stack(|| self.execute_statement(statement, env))
            .map_err(|error| error.at(statement.span))
    }

    fn execute_statement(
        &mut self,
        statement: &Statement,
        env: &Environment,
    ) -> GlyphResult<ControlSignal> {
        match &statement.kind {
            StatementKind::Assign {
                target,
                type_annotation,
                value,
            } => {
                let value = self.evaluate(value, env)?;
                if let Some(declared) = type_annotation {
                    if !typecheck::conforms(&value, declared, self.registry) {
                        return Err(RuntimeError::TypeMismatch(format!(
                            "'{}' is declared as {}, got {}",
                            target.name,
                            declared,
                            typecheck::infer_type(&value)
                        ))
                        .into());
                    }
                }
                self.assign(target, value, env)?;
                Ok(ControlSignal::Normal)
            }

            StatementKind::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.evaluate(expr, env)?,
                    None => Value::Null,
                };
                Ok(ControlSignal::Return(value))
            }

            StatementKind::If {
                condition,
                then_block,
                else_block,
            } => {
                if self.evaluate(condition, env)?.is_truthy() {
                    self.execute_block(then_block, &env.child())
                } else if let Some(else_block) = else_block {
                    self.execute_block(else_block, &env.child())
                } else {
                    Ok(ControlSignal::Normal)
                }
            }

            StatementKind::While { condition, body } => {
                let mut iterations = 0;
                loop {
                    self.check_loop(&mut iterations)?;
                    if !self.evaluate(condition, env)?.is_truthy() {
                        break;
                    }
                    match self.execute_block(body, &env.child())? {
                        ControlSignal::Break => break,
                        signal @ ControlSignal::Return(_) => return Ok(signal),
                        ControlSignal::Continue | ControlSignal::Normal => {}
                    }
                }
                Ok(ControlSignal::Normal)
            }

            StatementKind::For {
                key_var,
                value_var,
                iterable,
                body,
            } => {
                let iterable = self.evaluate(iterable, env)?;
                let pairs = iteration_pairs(iterable, key_var.is_some())?;
                let mut iterations = 0;
                for (key, item) in pairs {
                    self.check_loop(&mut iterations)?;
                    let scope = env.child();
                    if let Some(key_var) = key_var {
                        scope.define(key_var.clone(), key);
                    }
                    scope.define(value_var.clone(), item);
                    match self.execute_block(body, &scope)? {
                        ControlSignal::Break => break,
                        signal @ ControlSignal::Return(_) => return Ok(signal),
                        ControlSignal::Continue | ControlSignal::Normal => {}
                    }
                }
                Ok(ControlSignal::Normal)
            }

            StatementKind::Switch {
                value,
                cases,
                default,
            } => {
                let subject = self.evaluate(value, env)?;
                for case in cases {
                    if self.evaluate(&case.value, env)? == subject {
                        return self.execute_block(&case.body, &env.child());
                    }
                }
                match default {
                    Some(body) => self.execute_block(body, &env.child()),
                    None => Ok(ControlSignal::Normal),
                }
            }

            StatementKind::Validate(condition) => {
                let result = self.evaluate(condition, env)?;
                if !result.is_truthy() {
                    return Err(RuntimeError::ValidationFailed(format!(
                        "condition on line {} evaluated to {}",
                        statement.span.line, result
                    ))
                    .into());
                }
                Ok(ControlSignal::Normal)
            }

            StatementKind::Expression(expr) => {
                self.evaluate(expr, env)?;
                Ok(ControlSignal::Normal)
            }

            StatementKind::Break => Ok(ControlSignal::Break),
            StatementKind::Continue => Ok(ControlSignal::Continue),
        }
    }

    fn assign(&mut self, target: &AssignTarget, value: Value, env: &Environment) -> GlyphResult<()> {
        if target.path.is_empty() {
            return Ok(env.assign(&target.name, value)?);
        }

        let mut keys = Vec::with_capacity(target.path.len());
        for step in &target.path {
            keys.push(match step {
                PathStep::Field(name) => Value::string(name.clone()),
                PathStep::Index(expr) => self.evaluate(expr, env)?,
            });
        }

        let root = env.get(&target.name)?;
        let updated = set_path(root, &keys, value)?;
        Ok(env.set(&target.name, updated)?)
    }
}

/// `(key, item)` pairs visited by a `for` loop.
///
/// Arrays and strings pair each element with its index. Objects pair keys with
/// values, or yield the keys themselves when the loop names a single variable.
fn iteration_pairs(iterable: Value, with_keys: bool) -> Result<Vec<(Value, Value)>, RuntimeError> {
    match iterable {
        Value::Array(items) => Ok(items
            .into_iter()
            .enumerate()
            .map(|(i, item)| (Value::Int(i as i64), item))
            .collect()),
        Value::Object(fields) => Ok(fields
            .into_iter()
            .map(|(key, value)| {
                if with_keys {
                    (Value::String(key), value)
                } else {
                    (Value::Null, Value::String(key))
                }
            })
            .collect()),
        Value::String(s) => Ok(s
            .chars()
            .enumerate()
            .map(|(i, c)| (Value::Int(i as i64), Value::String(c.to_string())))
            .collect()),
        other => Err(RuntimeError::TypeMismatch(format!(
            "cannot iterate over {}",
            other.type_name()
        ))),
    }
}

/// Rebuild `container` with the value at `keys` replaced.
///
/// Missing object fields along the way are created; a null container becomes
/// an empty object.
fn set_path(container: Value, keys: &[Value], value: Value) -> Result<Value, RuntimeError> {
    let Some((key, rest)) = keys.split_first() else {
        return Ok(value);
    };

    match (container, key) {
        (Value::Object(mut fields), Value::String(name)) => {
            let child = fields.remove(name).unwrap_or(Value::Null);
            fields.insert(name.clone(), set_path(child, rest, value)?);
            Ok(Value::Object(fields))
        }
        (Value::Null, Value::String(name)) => {
            let mut fields = std::collections::BTreeMap::new();
            fields.insert(name.clone(), set_path(Value::Null, rest, value)?);
            Ok(Value::Object(fields))
        }
        (Value::Array(mut items), Value::Int(index)) => {
            let position = checked_index(*index, items.len())?;
            let child = std::mem::take(&mut items[position]);
            items[position] = set_path(child, rest, value)?;
            Ok(Value::Array(items))
        }
        (container, key) => Err(RuntimeError::TypeMismatch(format!(
            "cannot assign through {} with a {} key",
            container.type_name(),
            key.type_name()
        ))),
    }
}
