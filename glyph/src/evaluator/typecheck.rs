//! Runtime conformance of values to declared types
//!
//! Declared types are checked at the edges of a call: arguments, returns, route
//! input and annotated assignments. Names that are not registered type
//! definitions (type parameters, `any`) accept every value.

use crate::error::RuntimeError;
use crate::registry::Registry;
use crate::types::Type;
use crate::value::Value;

pub fn conforms(value: &Value, ty: &Type, registry: &Registry) -> bool {
    match ty {
        Type::Int => matches!(value, Value::Int(_)),
        Type::Float => value.is_numeric(),
        Type::String => matches!(value, Value::String(_)),
        Type::Bool => matches!(value, Value::Bool(_)),
        Type::Optional(inner) => value.is_null() || conforms(value, inner, registry),
        Type::Union(members) => members.iter().any(|member| conforms(value, member, registry)),
        Type::Array(element) => match value {
            Value::Array(items) => items.iter().all(|item| conforms(item, element, registry)),
            _ => false,
        },
        Type::Function { .. } => matches!(value, Value::Function(_) | Value::Builtin(_)),
        Type::Database => true,
        Type::Generic { base, args } => conforms_generic(value, base, args, registry),
        Type::Named(name) => conforms_named(value, name, registry),
    }
}

fn conforms_generic(value: &Value, base: &str, args: &[Type], registry: &Registry) -> bool {
    match base {
        "List" | "Array" => match (value, args.first()) {
            (Value::Array(items), Some(element)) => {
                items.iter().all(|item| conforms(item, element, registry))
            }
            (Value::Array(_), None) => true,
            _ => false,
        },
        "Map" | "Record" => matches!(value, Value::Object(_)),
        _ if registry.types.contains(base) => conforms_named(value, base, registry),
        _ => true,
    }
}

fn conforms_named(value: &Value, name: &str, registry: &Registry) -> bool {
    if let Some(def) = registry.types.get(name) {
        let Value::Object(fields) = value else {
            return false;
        };
        return def.fields.iter().all(|field| match fields.get(&field.name) {
            Some(Value::Null) | None => {
                !(field.required && field.default.is_none())
                    || matches!(field.type_annotation, Type::Optional(_))
            }
            Some(present) => conforms(present, &field.type_annotation, registry),
        });
    }

    match name {
        "any" => true,
        "null" => value.is_null(),
        "object" | "map" => matches!(value, Value::Object(_)),
        "array" | "list" => matches!(value, Value::Array(_)),
        "number" => value.is_numeric(),
        _ => true,
    }
}

/// Most specific type describing a value
pub fn infer_type(value: &Value) -> Type {
    match value {
        Value::Null => Type::Named("null".to_string()),
        Value::Bool(_) => Type::Bool,
        Value::Int(_) => Type::Int,
        Value::Float(_) => Type::Float,
        Value::String(_) => Type::String,
        Value::Array(items) => {
            let mut members: Vec<Type> = Vec::new();
            for item in items {
                let ty = infer_type(item);
                if !members.contains(&ty) {
                    members.push(ty);
                }
            }
            let element = match members.len() {
                0 => Type::Named("any".to_string()),
                _ => Type::union(members),
            };
            Type::Array(Box::new(element))
        }
        Value::Object(_) => Type::Named("object".to_string()),
        Value::Function(closure) => Type::Function {
            params: closure
                .params
                .iter()
                .map(|param| param.type_annotation.clone())
                .collect(),
            ret: Box::new(
                closure
                    .return_type
                    .clone()
                    .unwrap_or_else(|| Type::Named("any".to_string())),
            ),
        },
        Value::Builtin(_) => Type::Named("function".to_string()),
    }
}

/// Convert text from a query string or command line into a value of `ty`
pub fn coerce_scalar(text: &str, ty: &Type) -> Result<Value, RuntimeError> {
    let mismatch = || RuntimeError::TypeMismatch(format!("expected {}, got \"{}\"", ty, text));

    match ty {
        Type::Int => text.trim().parse::<i64>().map(Value::Int).map_err(|_| mismatch()),
        Type::Float => text.trim().parse::<f64>().map(Value::Float).map_err(|_| mismatch()),
        Type::Bool => match text.trim() {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(mismatch()),
        },
        Type::Optional(inner) => coerce_scalar(text, inner),
        Type::Array(element) => text
            .split(',')
            .filter(|part| !part.is_empty())
            .map(|part| coerce_scalar(part, element))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Type::Union(members) => Ok(members
            .iter()
            .find_map(|member| coerce_scalar(text, member).ok())
            .unwrap_or_else(|| Value::string(text))),
        _ => Ok(Value::string(text)),
    }
}
