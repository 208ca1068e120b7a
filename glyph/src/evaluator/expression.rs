//! Expression evaluation

use super::operations::{binary_operation, unary_operation};
use super::stack::ensure_sufficient_stack;
use super::{builtins, Evaluator};
use crate::ast::{BinaryOp, Expr, ExprKind, LambdaBody, Literal};
use crate::environment::Environment;
use crate::error::RuntimeError;
use crate::value::{Closure, Value};
use crate::GlyphResult;
use std::collections::BTreeMap;
use std::rc::Rc;

impl Evaluator<'_> {
    /// Evaluate an expression in `env`
    pub fn evaluate(&mut self, expr: &Expr, env: &Environment) -> GlyphResult<Value> {
        ensure_sufficient_stack(|| self.evaluate_expr(expr, env))
    }

    fn evaluate_expr(&mut self, expr: &Expr, env: &Environment) -> GlyphResult<Value> {
        match &expr.kind {
            ExprKind::Literal(literal) => Ok(literal_value(literal)),

            ExprKind::Variable(name) => self.lookup_variable(name, env),

            ExprKind::Binary { op, left, right } => {
                let left = self.evaluate(left, env)?;
                match op {
                    BinaryOp::And if !left.is_truthy() => Ok(Value::Bool(false)),
                    BinaryOp::Or if left.is_truthy() => Ok(Value::Bool(true)),
                    _ => {
                        let right = self.evaluate(right, env)?;
                        Ok(binary_operation(*op, &left, &right)?)
                    }
                }
            }

            ExprKind::Unary { op, operand } => {
                let operand = self.evaluate(operand, env)?;
                Ok(unary_operation(*op, &operand)?)
            }

            ExprKind::Call { name, args } => self.evaluate_call(name, args, env),

            ExprKind::Object(fields) => {
                let mut object = BTreeMap::new();
                for (key, value) in fields {
                    object.insert(key.clone(), self.evaluate(value, env)?);
                }
                Ok(Value::Object(object))
            }

            ExprKind::Array(elements) => elements
                .iter()
                .map(|element| self.evaluate(element, env))
                .collect::<GlyphResult<Vec<_>>>()
                .map(Value::Array),

            ExprKind::FieldAccess { object, field } => {
                let target = self.evaluate(object, env)?;
                Ok(access_field(&target, field)?)
            }

            ExprKind::Index { object, index } => {
                let target = self.evaluate(object, env)?;
                let index = self.evaluate(index, env)?;
                Ok(index_value(&target, &index)?)
            }

            ExprKind::Lambda { params, body } => Ok(Value::Function(Rc::new(Closure {
                name: None,
                params: params.clone(),
                return_type: None,
                body: body.clone(),
                env: env.clone(),
                home: None,
            }))),

            // No scheduler behind await; the operand is simply evaluated
            ExprKind::Await(inner) => self.evaluate(inner, env),
        }
    }

    /// Scope first, then declared functions, then builtins
    fn lookup_variable(&self, name: &str, env: &Environment) -> GlyphResult<Value> {
        if let Some(value) = env.lookup(name) {
            return Ok(value);
        }
        if let Some(function) = self.registry.functions.get(name) {
            return Ok(Value::Function(self.function_closure(function)));
        }
        if builtins::exists(name) {
            return Ok(Value::Builtin(name.to_string()));
        }
        Err(RuntimeError::UndefinedVariable(name.to_string()).into())
    }

    /// A declared function as a callable value over this module's globals
    pub(crate) fn function_closure(&self, function: &crate::ast::Function) -> Rc<Closure> {
        Rc::new(Closure {
            name: Some(function.name.clone()),
            params: function.params.clone(),
            return_type: function.return_type.clone(),
            body: LambdaBody::Block(function.body.clone()),
            env: self.globals.clone(),
            home: None,
        })
    }
}

pub fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Int(i) => Value::Int(*i),
        Literal::Float(f) => Value::Float(*f),
        Literal::String(s) => Value::String(s.clone()),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Null => Value::Null,
    }
}

/// `target.field`
///
/// Missing object fields read as null. Strings and arrays expose `length`.
pub fn access_field(target: &Value, field: &str) -> Result<Value, RuntimeError> {
    match (target, field) {
        (Value::Object(fields), _) => Ok(fields.get(field).cloned().unwrap_or(Value::Null)),
        (Value::String(s), "length") => Ok(Value::Int(s.chars().count() as i64)),
        (Value::Array(items), "length") => Ok(Value::Int(items.len() as i64)),
        (other, _) => Err(RuntimeError::TypeMismatch(format!(
            "cannot access field '{}' on {}",
            field,
            other.type_name()
        ))),
    }
}

/// `target[index]`
pub fn index_value(target: &Value, index: &Value) -> Result<Value, RuntimeError> {
    match (target, index) {
        (Value::Array(items), Value::Int(i)) => {
            let position = checked_index(*i, items.len())?;
            Ok(items[position].clone())
        }
        (Value::String(s), Value::Int(i)) => {
            let chars: Vec<char> = s.chars().collect();
            let position = checked_index(*i, chars.len())?;
            Ok(Value::String(chars[position].to_string()))
        }
        (Value::Object(fields), Value::String(key)) => {
            Ok(fields.get(key).cloned().unwrap_or(Value::Null))
        }
        (target, index) => Err(RuntimeError::TypeMismatch(format!(
            "cannot index {} with {}",
            target.type_name(),
            index.type_name()
        ))),
    }
}

pub(crate) fn checked_index(index: i64, len: usize) -> Result<usize, RuntimeError> {
    if index < 0 || index as usize >= len {
        return Err(RuntimeError::IndexOutOfBounds { index, len });
    }
    Ok(index as usize)
}
