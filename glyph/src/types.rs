//! Type model
//!
//! `Type` is the structural type annotation attached to fields, parameters and
//! return positions. Its `Display` rendering is the stable textual form used by
//! contract diffing, schema generation and diagnostics, and it is also the basis of
//! the compatibility rule in [`is_compatible`].

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Int,
    String,
    Bool,
    Float,
    Named(String),
    Array(Box<Type>),
    Optional(Box<Type>),
    /// Always holds at least one member
    Union(Vec<Type>),
    Generic {
        base: String,
        args: Vec<Type>,
    },
    Function {
        params: Vec<Type>,
        ret: Box<Type>,
    },
    Database,
}

impl Type {
    /// Map a bare type name to a scalar type, or a named type otherwise
    pub fn from_name(name: &str) -> Type {
        match name {
            "int" => Type::Int,
            "str" | "string" => Type::String,
            "bool" => Type::Bool,
            "float" => Type::Float,
            "Database" => Type::Database,
            other => Type::Named(other.to_string()),
        }
    }

    /// Build a union, collapsing the single-member case
    pub fn union(mut members: Vec<Type>) -> Type {
        if members.len() == 1 {
            members.remove(0)
        } else {
            Type::Union(members)
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Type::Int | Type::String | Type::Bool | Type::Float)
    }

    /// Union members, or the type itself for non-unions
    pub fn members(&self) -> Vec<&Type> {
        match self {
            Type::Union(members) => members.iter().collect(),
            other => vec![other],
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => f.write_str("int"),
            Type::String => f.write_str("string"),
            Type::Bool => f.write_str("bool"),
            Type::Float => f.write_str("float"),
            Type::Database => f.write_str("Database"),
            Type::Named(name) => f.write_str(name),
            Type::Array(element) => write!(f, "[{}]", element),
            Type::Optional(inner) => match inner.as_ref() {
                Type::Union(_) | Type::Function { .. } => write!(f, "({})?", inner),
                _ => write!(f, "{}?", inner),
            },
            Type::Union(members) => {
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{}", member)?;
                }
                Ok(())
            }
            Type::Generic { base, args } if args.is_empty() => f.write_str(base),
            Type::Generic { base, args } => {
                write!(f, "{}<", base)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(">")
            }
            Type::Function { params, ret } => {
                f.write_str("(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", param)?;
                }
                write!(f, ") -> {}", ret)
            }
        }
    }
}

/// Canonical textual rendering of a type
pub fn type_to_string(ty: &Type) -> String {
    ty.to_string()
}

/// Contract compatibility between an expected type and an implementation type.
///
/// Identical renderings are compatible; a contract union is compatible with an
/// implementation union containing all of its members; a contract member type is
/// compatible with an implementation union containing it. The comparison is textual,
/// so `[int]` and `[int]` match while differently spelled equivalents do not.
pub fn is_compatible(contract: &Type, implementation: &Type) -> bool {
    let contract_text = contract.to_string();
    if contract_text == implementation.to_string() {
        return true;
    }

    match (contract, implementation) {
        (Type::Union(expected), Type::Union(actual)) => {
            let actual: Vec<String> = actual.iter().map(Type::to_string).collect();
            expected
                .iter()
                .all(|member| actual.contains(&member.to_string()))
        }
        (_, Type::Union(actual)) => actual.iter().any(|member| member.to_string() == contract_text),
        _ => false,
    }
}
