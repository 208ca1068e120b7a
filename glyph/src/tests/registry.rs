use crate::error::{GlyphError, RuntimeError};
use crate::lexer::SyntaxMode;
use crate::parser::parse_str;
use crate::registry::{DuplicatePolicy, Registry};
use crate::value::Value;
use crate::{HttpMethod, Interpreter, InterpreterOptions, Request};

const TWICE: &str = r#"
@ GET /status { > "first" }
@ GET /status { > "second" }
"#;

#[test]
fn test_register_keys_by_kind() {
    let module = parse_str(
        r#"
: Order { id: int! }
@ GET /orders { > [] }
func total(order) { > 0 }
! export "Export orders" { > true }
* "0 * * * *" { > true }
~ order.paid { > true }
& "orders.sync" { > true }
@ query order(id: int!) { > null }
contract Orders { GET /orders -> [Order] }
"#,
        SyntaxMode::Compact,
    )
    .unwrap();

    let mut registry = Registry::new();
    for item in &module.items {
        registry.register(item, DuplicatePolicy::Error).unwrap();
    }

    assert_eq!(registry.len(), 9);
    assert!(registry.types.contains("Order"));
    assert_eq!(registry.routes.keys().collect::<Vec<_>>(), vec!["GET /orders"]);
    assert!(registry.route(HttpMethod::Get, "/orders").is_some());
    assert!(registry.functions.contains("total"));
    assert!(registry.commands.contains("export"));
    assert!(registry.cron_tasks.contains("0 * * * *"));
    assert!(registry.cron_task("0 * * * *").is_some());
    assert!(registry.event_handlers.contains("order.paid"));
    assert!(registry.queue_workers.contains("orders.sync"));
    assert!(registry.resolvers.contains("query.order"));
    assert!(registry.contracts.contains("Orders"));
}

#[test]
fn test_duplicate_route_is_an_error_by_default() {
    let err = Interpreter::new()
        .load_source(TWICE, None, SyntaxMode::Compact)
        .unwrap_err();
    match err {
        GlyphError::Runtime { error, span } => {
            assert_eq!(
                error,
                RuntimeError::Duplicate {
                    kind: "route",
                    name: "GET /status".to_string()
                }
            );
            assert_eq!(span.map(|s| s.line), Some(3));
        }
        other => panic!("unexpected error {}", other),
    }
}

#[test]
fn test_overwrite_policy_keeps_later_declaration() {
    let mut interpreter = Interpreter::with_options(InterpreterOptions {
        duplicate_policy: DuplicatePolicy::Overwrite,
        ..InterpreterOptions::default()
    });
    interpreter
        .load_source(TWICE, None, SyntaxMode::Compact)
        .unwrap();

    assert_eq!(interpreter.get_routes().len(), 1);
    assert_eq!(
        interpreter
            .dispatch(HttpMethod::Get, "/status", &Request::new())
            .unwrap(),
        Value::from("second")
    );
}

#[test]
fn test_duplicate_function_and_constant() {
    let err = Interpreter::new()
        .load_source(
            "func f() { > 1 }\nfunc f() { > 2 }",
            None,
            SyntaxMode::Compact,
        )
        .unwrap_err();
    assert!(matches!(
        err.as_runtime(),
        Some(RuntimeError::Duplicate { kind: "function", .. })
    ));

    let err = Interpreter::new()
        .load_source("const A = 1\nconst A = 2", None, SyntaxMode::Compact)
        .unwrap_err();
    assert_eq!(
        err.as_runtime(),
        Some(&RuntimeError::Duplicate {
            kind: "constant",
            name: "A".to_string()
        })
    );
}

#[test]
fn test_tables_keep_declaration_order() {
    let mut interpreter = Interpreter::new();
    interpreter
        .load_source(
            "func b() { > 1 }\nfunc a() { > 2 }\nfunc c() { > 3 }",
            None,
            SyntaxMode::Compact,
        )
        .unwrap();
    let names: Vec<&str> = interpreter.registry().functions.keys().collect();
    assert_eq!(names, vec!["b", "a", "c"]);
}

#[test]
fn test_routes_differing_only_in_param_names_collide() {
    let source = r#"
@ GET /users/:id { > id }
@ GET /users/:uid { > "later" }
"#;
    let err = Interpreter::new()
        .load_source(source, None, SyntaxMode::Compact)
        .unwrap_err();
    assert_eq!(
        err.as_runtime(),
        Some(&RuntimeError::Duplicate {
            kind: "route",
            name: "GET /users/:uid".to_string()
        })
    );

    let mut interpreter = Interpreter::with_options(InterpreterOptions {
        duplicate_policy: DuplicatePolicy::Overwrite,
        ..InterpreterOptions::default()
    });
    interpreter
        .load_source(source, None, SyntaxMode::Compact)
        .unwrap();
    assert_eq!(interpreter.get_routes().len(), 1);
    assert!(interpreter.get_route(HttpMethod::Get, "/users/:any").is_some());
    assert_eq!(
        interpreter
            .dispatch(HttpMethod::Get, "/users/7", &Request::new())
            .unwrap(),
        Value::from("later")
    );
}
