use crate::contract::{diff, verify, ChangeKind};
use crate::lexer::SyntaxMode;
use crate::parser::parse_str;
use crate::Module;

fn module(source: &str) -> Module {
    parse_str(source, SyntaxMode::Compact).unwrap()
}

const CONTRACT: &str = r#"
contract UserApi {
  GET /users -> [User]
  GET /users/:id -> User | Error
  POST /users -> User
  DELETE /users/:id
}
"#;

#[test]
fn test_verify_passes_for_full_implementation() {
    let contract_module = module(CONTRACT);
    let contract = contract_module.contracts().next().unwrap();
    let implementation = module(
        r#"
@ GET /users -> [User] { > [] }
@ GET /users/:userId -> User | Error { > null }
@ POST /users -> User { > null }
@ DELETE /users/:id { > true }
"#,
    );

    let result = verify(contract, &implementation);
    assert!(result.passed, "violations: {:?}", result.violations);
    assert_eq!(result.contract_name, "UserApi");
}

#[test]
fn test_verify_reports_missing_and_mismatched_endpoints() {
    let contract_module = module(CONTRACT);
    let contract = contract_module.contracts().next().unwrap();
    let implementation = module(
        r#"
@ GET /users -> User { > null }
@ GET /users/:id -> User { > null }
@ POST /users { > null }
"#,
    );

    let result = verify(contract, &implementation);
    assert!(!result.passed);
    let messages: Vec<String> = result.violations.iter().map(|v| v.to_string()).collect();
    assert_eq!(
        messages,
        vec![
            "GET /users: return type mismatch: contract expects [User], implementation returns User",
            "GET /users/:id: return type mismatch: contract expects User | Error, implementation returns User",
            "POST /users: return type mismatch: contract expects User, implementation returns nothing",
            "DELETE /users/:id: endpoint not found in implementation",
        ]
    );
}

#[test]
fn test_contract_subset_of_implementation_union() {
    let contract_module = module("contract Lookup {\n  GET /users/:id -> User\n}");
    let contract = contract_module.contracts().next().unwrap();
    let implementation = module("@ GET /users/:id -> User | Error { > null }");
    assert!(verify(contract, &implementation).passed);
}

#[test]
fn test_diff_classifies_changes() {
    let old_module = module(
        r#"
contract Api {
  GET /users -> [User]
  GET /users/:id -> User
  DELETE /users/:id
}
"#,
    );
    let new_module = module(
        r#"
contract Api {
  GET /users -> [Account]
  GET /users/:userId -> User
  GET /health -> bool
}
"#,
    );
    let old = old_module.contracts().next().unwrap();
    let new = new_module.contracts().next().unwrap();

    let result = diff(old, new);
    assert!(result.is_breaking());

    let kinds: Vec<(ChangeKind, &str, bool)> = result
        .changes
        .iter()
        .map(|c| (c.kind, c.endpoint.as_str(), c.breaking))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (ChangeKind::ReturnTypeChanged, "GET /users", true),
            (ChangeKind::Removed, "DELETE /users/:id", true),
            (ChangeKind::Added, "GET /health", false),
        ]
    );
    assert_eq!(result.breaking_changes().count(), 2);
    assert_eq!(
        result.changes[0].to_string(),
        "[BREAKING] GET /users: return type changed from [User] to [Account]"
    );
}

#[test]
fn test_diff_of_identical_contracts_is_empty() {
    let old_module = module(CONTRACT);
    let new_module = module(CONTRACT);
    let result = diff(
        old_module.contracts().next().unwrap(),
        new_module.contracts().next().unwrap(),
    );
    assert!(result.changes.is_empty());
    assert!(!result.is_breaking());
}
