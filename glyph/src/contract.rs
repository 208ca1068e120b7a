//! Contract verification and diffing
//!
//! A contract lists endpoint signatures a service promises to provide. Verifying
//! checks a module's routes against those promises; diffing compares two
//! versions of a contract for changes that would break consumers.

use crate::ast::{ContractDef, ContractEndpoint, HttpMethod, Module, Route};
use crate::types::{is_compatible, Type};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    /// `METHOD /path` of the contract endpoint
    pub endpoint: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.endpoint, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifyResult {
    pub contract_name: String,
    pub violations: Vec<Violation>,
    pub passed: bool,
}

/// Check every endpoint of `contract` against the routes of `module`
pub fn verify(contract: &ContractDef, module: &Module) -> VerifyResult {
    verify_routes(contract, module.routes())
}

/// Check `contract` against an explicit set of implementation routes
pub fn verify_routes<'a>(
    contract: &ContractDef,
    routes: impl IntoIterator<Item = &'a Route>,
) -> VerifyResult {
    let routes: Vec<&Route> = routes.into_iter().collect();
    let mut violations = Vec::new();

    for endpoint in &contract.endpoints {
        let Some(route) = find_route(&routes, endpoint.method, &endpoint.path) else {
            violations.push(Violation {
                endpoint: endpoint.key(),
                message: "endpoint not found in implementation".to_string(),
            });
            continue;
        };

        let Some(expected) = &endpoint.return_type else {
            continue;
        };
        let compatible = route
            .return_type
            .as_ref()
            .is_some_and(|actual| is_compatible(expected, actual));
        if !compatible {
            violations.push(Violation {
                endpoint: endpoint.key(),
                message: format!(
                    "return type mismatch: contract expects {}, implementation returns {}",
                    expected,
                    render_optional(route.return_type.as_ref())
                ),
            });
        }
    }

    VerifyResult {
        contract_name: contract.name.clone(),
        passed: violations.is_empty(),
        violations,
    }
}

/// Exact path first, then the same template with differently named parameters
fn find_route<'a>(routes: &[&'a Route], method: HttpMethod, path: &str) -> Option<&'a Route> {
    routes
        .iter()
        .find(|r| r.method == method && r.path == path)
        .or_else(|| {
            let shape = template_shape(path);
            routes
                .iter()
                .find(|r| r.method == method && template_shape(&r.path) == shape)
        })
        .copied()
}

/// `/users/:id` and `/users/:userId` share the shape `/users/:`
fn template_shape(path: &str) -> String {
    path.trim_end_matches('/')
        .split('/')
        .map(|segment| if segment.starts_with(':') { ":" } else { segment })
        .collect::<Vec<_>>()
        .join("/")
}

fn render_optional(ty: Option<&Type>) -> String {
    ty.map_or_else(|| "nothing".to_string(), Type::to_string)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChangeKind {
    Added,
    Removed,
    ReturnTypeChanged,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Change {
    pub kind: ChangeKind,
    pub endpoint: String,
    pub detail: String,
    pub breaking: bool,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = if self.breaking { "BREAKING" } else { "info" };
        write!(f, "[{}] {}: {}", marker, self.endpoint, self.detail)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffResult {
    pub changes: Vec<Change>,
}

impl DiffResult {
    pub fn is_breaking(&self) -> bool {
        self.changes.iter().any(|change| change.breaking)
    }

    pub fn breaking_changes(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter().filter(|change| change.breaking)
    }
}

/// Compare two versions of a contract.
///
/// Removed endpoints and changed return types break consumers; added endpoints do not.
pub fn diff(old: &ContractDef, new: &ContractDef) -> DiffResult {
    let mut changes = Vec::new();

    for before in &old.endpoints {
        match find_endpoint(new, before) {
            None => changes.push(Change {
                kind: ChangeKind::Removed,
                endpoint: before.key(),
                detail: "endpoint removed".to_string(),
                breaking: true,
            }),
            Some(after) => {
                let (old_type, new_type) = (
                    render_optional(before.return_type.as_ref()),
                    render_optional(after.return_type.as_ref()),
                );
                if old_type != new_type {
                    changes.push(Change {
                        kind: ChangeKind::ReturnTypeChanged,
                        endpoint: before.key(),
                        detail: format!("return type changed from {} to {}", old_type, new_type),
                        breaking: true,
                    });
                }
            }
        }
    }

    for after in &new.endpoints {
        if find_endpoint(old, after).is_none() {
            changes.push(Change {
                kind: ChangeKind::Added,
                endpoint: after.key(),
                detail: "endpoint added".to_string(),
                breaking: false,
            });
        }
    }

    DiffResult { changes }
}

fn find_endpoint<'a>(contract: &'a ContractDef, like: &ContractEndpoint) -> Option<&'a ContractEndpoint> {
    let shape = template_shape(&like.path);
    contract
        .endpoints
        .iter()
        .find(|e| e.method == like.method && template_shape(&e.path) == shape)
}
