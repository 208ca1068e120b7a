//! Operator semantics
//!
//! Arithmetic promotes to float as soon as either operand is a float. `+` also
//! concatenates: two strings, a string and a number or bool, or two arrays.

use crate::ast::{BinaryOp, UnaryOp};
use crate::error::RuntimeError;
use crate::value::Value;
use std::cmp::Ordering;

/// Apply a binary operator to two evaluated operands.
///
/// `&&` and `||` are short-circuited by the evaluator before reaching this
/// function; here they just combine truthiness.
pub fn binary_operation(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    match op {
        BinaryOp::Add => add(left, right),
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => arithmetic(op, left, right),
        BinaryOp::Eq => Ok(Value::Bool(left == right)),
        BinaryOp::NotEq => Ok(Value::Bool(left != right)),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            let ordering = compare(left, right).ok_or_else(|| {
                RuntimeError::TypeMismatch(format!(
                    "cannot compare {} and {} with {}",
                    left.type_name(),
                    right.type_name(),
                    op
                ))
            })?;
            let result = match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::LtEq => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            Ok(Value::Bool(result))
        }
        BinaryOp::And => Ok(Value::Bool(left.is_truthy() && right.is_truthy())),
        BinaryOp::Or => Ok(Value::Bool(left.is_truthy() || right.is_truthy())),
    }
}

pub fn unary_operation(op: UnaryOp, operand: &Value) -> Result<Value, RuntimeError> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!operand.is_truthy())),
        UnaryOp::Neg => match operand {
            Value::Int(i) => i
                .checked_neg()
                .map(Value::Int)
                .ok_or_else(|| RuntimeError::UnsupportedOperation("integer overflow in negation".to_string())),
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Err(RuntimeError::TypeMismatch(format!(
                "cannot negate {}",
                other.type_name()
            ))),
        },
    }
}

fn add(left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    match (left, right) {
        (Value::String(l), Value::String(r)) => Ok(Value::String(format!("{}{}", l, r))),
        (Value::String(l), other) if stringifies(other) => {
            Ok(Value::String(format!("{}{}", l, other.to_display_string())))
        }
        (other, Value::String(r)) if stringifies(other) => {
            Ok(Value::String(format!("{}{}", other.to_display_string(), r)))
        }
        (Value::String(_), other) | (other, Value::String(_)) => Err(RuntimeError::TypeMismatch(
            format!("cannot concatenate string and {}", other.type_name()),
        )),
        (Value::Array(l), Value::Array(r)) => {
            let mut items = l.clone();
            items.extend(r.iter().cloned());
            Ok(Value::Array(items))
        }
        _ => arithmetic(BinaryOp::Add, left, right),
    }
}

/// Values that may be concatenated to a string
fn stringifies(value: &Value) -> bool {
    matches!(value, Value::Int(_) | Value::Float(_) | Value::Bool(_))
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => int_arithmetic(op, *l, *r),
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(l), Some(r)) => float_arithmetic(op, l, r),
            _ => Err(RuntimeError::TypeMismatch(format!(
                "cannot apply {} to {} and {}",
                op,
                left.type_name(),
                right.type_name()
            ))),
        },
    }
}

fn int_arithmetic(op: BinaryOp, l: i64, r: i64) -> Result<Value, RuntimeError> {
    if matches!(op, BinaryOp::Div | BinaryOp::Mod) && r == 0 {
        return Err(RuntimeError::DivideByZero);
    }
    let result = match op {
        BinaryOp::Add => l.checked_add(r),
        BinaryOp::Sub => l.checked_sub(r),
        BinaryOp::Mul => l.checked_mul(r),
        BinaryOp::Div => l.checked_div(r),
        BinaryOp::Mod => l.checked_rem(r),
        _ => None,
    };
    result
        .map(Value::Int)
        .ok_or_else(|| RuntimeError::UnsupportedOperation(format!("integer overflow in {} {} {}", l, op, r)))
}

fn float_arithmetic(op: BinaryOp, l: f64, r: f64) -> Result<Value, RuntimeError> {
    if matches!(op, BinaryOp::Div | BinaryOp::Mod) && r == 0.0 {
        return Err(RuntimeError::DivideByZero);
    }
    let result = match op {
        BinaryOp::Add => l + r,
        BinaryOp::Sub => l - r,
        BinaryOp::Mul => l * r,
        BinaryOp::Div => l / r,
        BinaryOp::Mod => l % r,
        _ => {
            return Err(RuntimeError::UnsupportedOperation(format!(
                "{} is not an arithmetic operator",
                op
            )))
        }
    };
    Ok(Value::Float(result))
}

/// Ordering of two numbers or two strings
pub fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => Some(l.cmp(r)),
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        _ => {
            let (l, r) = (left.as_f64()?, right.as_f64()?);
            l.partial_cmp(&r)
        }
    }
}
