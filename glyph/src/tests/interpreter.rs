use crate::ast::GraphQLOperation;
use crate::error::{GlyphError, RuntimeError};
use crate::lexer::SyntaxMode;
use crate::routing::RouteMatch;
use crate::value::Value;
use crate::{HttpMethod, Interpreter, Request};
use std::collections::BTreeMap;

const SERVICE: &str = r#"
module shop.api

: User {
  id: int!
  name: string!
}

const GREETING = "Hello, "

func greeting(name: string) -> string {
  > GREETING + name
}

@ GET /users/:id -> User {
  > {id: parseInt(id), name: "user" + id}
}

@ GET /users/me -> User {
  > {id: 0, name: "me"}
}

@ GET /hello/:name {
  > greeting(name)
}

@ GET /search {
  ? q: string!
  ? page: int = 1
  ? tags: [string]
  > {q: q, page: page, tags: tags, raw: query}
}

@ POST /users -> User {
  < input: User
  > input
}

@ GET /profile {
  + auth(jwt)
  > auth.sub
}

@ GET /stock {
  % db: Database
  % cache: Cache
  > {db: db, cache: cache}
}

@ GET /broken -> User {
  > {id: "nope"}
}

@ PUT /echo/:slug {
  > request
}
"#;

fn service() -> Interpreter {
    let mut interpreter = Interpreter::new();
    interpreter
        .load_source(SERVICE, Some("shop.glyph"), SyntaxMode::Compact)
        .unwrap();
    interpreter
}

fn runtime_error<T: std::fmt::Debug>(result: Result<T, GlyphError>) -> RuntimeError {
    match result {
        Err(GlyphError::Runtime { error, .. }) => error,
        other => panic!("expected a runtime error, got {:?}", other),
    }
}

fn get(interpreter: &Interpreter, path: &str) -> Value {
    interpreter
        .dispatch(HttpMethod::Get, path, &Request::new())
        .unwrap()
}

#[test]
fn test_accessors_after_load() {
    let interpreter = service();
    assert_eq!(interpreter.module_name(), Some("shop.api"));
    assert_eq!(interpreter.get_routes().len(), 9);
    assert!(interpreter.get_route(HttpMethod::Post, "/users").is_some());
    assert!(interpreter.get_route(HttpMethod::Delete, "/users").is_none());
    assert_eq!(interpreter.get_type_def("User").unwrap().fields.len(), 2);
    assert!(interpreter.globals().is_constant("GREETING"));
}

#[test]
fn test_dispatch_binds_path_params_as_strings() {
    let interpreter = service();
    assert_eq!(
        get(&interpreter, "/users/42"),
        Value::object([("id", Value::Int(42)), ("name", Value::from("user42"))])
    );
    assert_eq!(get(&interpreter, "/hello/Ada"), Value::from("Hello, Ada"));
}

#[test]
fn test_literal_route_beats_parameter_route() {
    let interpreter = service();
    assert_eq!(
        get(&interpreter, "/users/me"),
        Value::object([("id", Value::Int(0)), ("name", Value::from("me"))])
    );
}

#[test]
fn test_match_route_reports_allowed_methods() {
    let interpreter = service();
    match interpreter.match_route(HttpMethod::Delete, "/users") {
        RouteMatch::MethodNotAllowed { allowed } => assert_eq!(allowed, vec![HttpMethod::Post]),
        other => panic!("unexpected match {:?}", other),
    }
    assert_eq!(
        interpreter.match_route(HttpMethod::Get, "/nowhere"),
        RouteMatch::NotFound
    );
}

#[test]
fn test_dispatch_unknown_route() {
    let interpreter = service();
    assert_eq!(
        runtime_error(interpreter.dispatch(HttpMethod::Get, "/nowhere", &Request::new())),
        RuntimeError::NotFound {
            kind: "route",
            name: "GET /nowhere".to_string()
        }
    );
}

#[test]
fn test_query_params_are_coerced() {
    let interpreter = service();
    let request = Request::new().with_query_string("q=shoes&page=3&tags=red&tags=blue");
    let result = interpreter
        .dispatch(HttpMethod::Get, "/search", &request)
        .unwrap();
    let Value::Object(fields) = result else {
        panic!("expected an object");
    };
    assert_eq!(fields["q"], Value::from("shoes"));
    assert_eq!(fields["page"], Value::Int(3));
    assert_eq!(
        fields["tags"],
        Value::Array(vec![Value::from("red"), Value::from("blue")])
    );
    assert_eq!(
        fields["raw"],
        Value::object([
            ("page", Value::from("3")),
            ("q", Value::from("shoes")),
            (
                "tags",
                Value::Array(vec![Value::from("red"), Value::from("blue")])
            ),
        ])
    );
}

#[test]
fn test_query_param_defaults_and_requirements() {
    let interpreter = service();
    let result = interpreter
        .dispatch(HttpMethod::Get, "/search", &Request::new().with_query("q", "x"))
        .unwrap();
    let Value::Object(fields) = result else {
        panic!("expected an object");
    };
    assert_eq!(fields["page"], Value::Int(1));
    assert_eq!(fields["tags"], Value::Null);

    assert_eq!(
        runtime_error(interpreter.dispatch(HttpMethod::Get, "/search", &Request::new())),
        RuntimeError::MissingRequiredParam("q".to_string())
    );

    let bad_page = Request::new().with_query_string("q=x&page=two");
    assert!(matches!(
        runtime_error(interpreter.dispatch(HttpMethod::Get, "/search", &bad_page)),
        RuntimeError::TypeMismatch(_)
    ));
}

#[test]
fn test_input_body_is_checked() {
    let interpreter = service();
    let user = Value::object([("id", Value::Int(7)), ("name", Value::from("Grace"))]);
    let created = interpreter
        .dispatch(
            HttpMethod::Post,
            "/users",
            &Request::new().with_body(user.clone()),
        )
        .unwrap();
    assert_eq!(created, user);

    let error = runtime_error(interpreter.dispatch(
        HttpMethod::Post,
        "/users",
        &Request::new().with_body(Value::object([("id", Value::Int(7))])),
    ));
    assert_eq!(
        error,
        RuntimeError::TypeMismatch(
            "input 'input' of POST /users expects User, got object".to_string()
        )
    );
}

#[test]
fn test_auth_principal_is_bound() {
    let interpreter = service();
    let request = Request::new().with_auth(Value::object([("sub", Value::from("u-1"))]));
    assert_eq!(
        interpreter
            .dispatch(HttpMethod::Get, "/profile", &request)
            .unwrap(),
        Value::from("u-1")
    );
    // Without a principal `auth` is null
    assert!(interpreter
        .dispatch(HttpMethod::Get, "/profile", &Request::new())
        .is_err());
}

#[test]
fn test_injections_use_providers() {
    let mut interpreter = service();
    interpreter.provide("db", Value::from("primary"));
    interpreter.provide("Cache", Value::from("redis"));
    assert_eq!(
        get(&interpreter, "/stock"),
        Value::object([("cache", Value::from("redis")), ("db", Value::from("primary"))])
    );
}

#[test]
fn test_missing_provider_injects_null() {
    let interpreter = service();
    assert_eq!(
        get(&interpreter, "/stock"),
        Value::object([("cache", Value::Null), ("db", Value::Null)])
    );
}

#[test]
fn test_route_return_type_is_checked() {
    let interpreter = service();
    assert_eq!(
        runtime_error(interpreter.dispatch(HttpMethod::Get, "/broken", &Request::new())),
        RuntimeError::ReturnTypeMismatch {
            context: "route GET /broken".to_string(),
            detail: "expected User, got object".to_string()
        }
    );
}

#[test]
fn test_request_object() {
    let interpreter = service();
    let request = Request::new()
        .with_header("X-Trace", "abc")
        .with_body(Value::Int(1));
    let result = interpreter
        .dispatch(HttpMethod::Put, "/echo/intro", &request)
        .unwrap();
    assert_eq!(
        result,
        Value::object([
            ("body", Value::Int(1)),
            ("headers", Value::object([("x-trace", Value::from("abc"))])),
            ("method", Value::from("PUT")),
            ("path", Value::from("/echo/intro")),
        ])
    );
}

#[test]
fn test_routes_do_not_leak_bindings() {
    let interpreter = service();
    get(&interpreter, "/users/1");
    assert!(!interpreter.globals().has("id"));
}

const TOOLS: &str = r#"
! greet "Say hello" name: string! times: int = 1 --loud {
  $ message = "hi " + name
  if loud { message = upper(message) }
  > {message: message, times: times}
}

! version {
  > "0.4.0"
}

* "0 3 * * *" nightly {
  > "cleaned"
}

* "*/5 * * * *" {
  > "ticked"
}

~ "user.created" {
  > "welcome " + event.name
}

& "email.send" {
  > message.to == input.to
}

@ query user(id: int!, verbose: bool = false) -> User {
  > {id: id, name: "user" + args.id, verbose: verbose}
}

@ mutation rename(id: int!, name: string!) {
  > name
}
"#;

fn tools() -> Interpreter {
    let mut interpreter = Interpreter::new();
    interpreter
        .load_source(
            &format!(": User {{ id: int!, name: string! }}\n{}", TOOLS),
            Some("tools.glyph"),
            SyntaxMode::Compact,
        )
        .unwrap();
    interpreter
}

fn flags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_execute_command() {
    let interpreter = tools();
    let result = interpreter
        .execute_command("greet", &["ada".to_string(), "3".to_string()], &flags(&[]))
        .unwrap();
    assert_eq!(
        result,
        Value::object([("message", Value::from("hi ada")), ("times", Value::Int(3))])
    );

    let loud = interpreter
        .execute_command("greet", &["ada".to_string()], &flags(&[("loud", "")]))
        .unwrap();
    assert_eq!(
        loud,
        Value::object([("message", Value::from("HI ADA")), ("times", Value::Int(1))])
    );
}

#[test]
fn test_command_argument_errors() {
    let interpreter = tools();
    assert_eq!(
        runtime_error(interpreter.execute_command("greet", &[], &flags(&[]))),
        RuntimeError::MissingRequiredParam("name".to_string())
    );
    assert_eq!(
        runtime_error(interpreter.execute_command(
            "greet",
            &["a".to_string()],
            &flags(&[("quiet", "")])
        )),
        RuntimeError::NotFound {
            kind: "flag",
            name: "--quiet".to_string()
        }
    );
    assert_eq!(
        runtime_error(interpreter.execute_command(
            "version",
            &["extra".to_string()],
            &flags(&[])
        )),
        RuntimeError::ArityMismatch {
            name: "version".to_string(),
            expected: 0,
            actual: 1
        }
    );
    assert!(matches!(
        runtime_error(interpreter.execute_command("deploy", &[], &flags(&[]))),
        RuntimeError::NotFound { kind: "command", .. }
    ));
}

#[test]
fn test_cron_tasks_by_name_or_schedule() {
    let interpreter = tools();
    assert_eq!(interpreter.get_cron_tasks().len(), 2);
    assert_eq!(
        interpreter.execute_cron_task("nightly").unwrap(),
        Value::from("cleaned")
    );
    assert_eq!(
        interpreter.execute_cron_task("*/5 * * * *").unwrap(),
        Value::from("ticked")
    );
    assert!(interpreter.execute_cron_task("hourly").is_err());
}

#[test]
fn test_emit_event() {
    let interpreter = tools();
    let data = Value::object([("name", Value::from("Ada"))]);
    assert_eq!(
        interpreter.emit_event("user.created", data.clone()).unwrap(),
        Value::from("welcome Ada")
    );
    assert_eq!(
        runtime_error(interpreter.emit_event("user.deleted", data)),
        RuntimeError::NotFound {
            kind: "event handler",
            name: "user.deleted".to_string()
        }
    );
}

#[test]
fn test_queue_worker() {
    let interpreter = tools();
    assert_eq!(interpreter.get_queue_workers().len(), 1);
    let message = Value::object([("to", Value::from("ada@example.com"))]);
    assert_eq!(
        interpreter
            .execute_queue_worker("email.send", message)
            .unwrap(),
        Value::Bool(true)
    );
}

#[test]
fn test_execute_resolver() {
    let interpreter = tools();
    assert_eq!(interpreter.get_graphql_resolvers().len(), 2);

    let args = BTreeMap::from([("id".to_string(), Value::Int(5))]);
    assert_eq!(
        interpreter
            .execute_resolver(GraphQLOperation::Query, "user", &args)
            .unwrap(),
        Value::object([
            ("id", Value::Int(5)),
            ("name", Value::from("user5")),
            ("verbose", Value::Bool(false)),
        ])
    );

    let wrong = BTreeMap::from([("id".to_string(), Value::from("5"))]);
    assert_eq!(
        runtime_error(interpreter.execute_resolver(GraphQLOperation::Query, "user", &wrong)),
        RuntimeError::TypeMismatch("argument 'id' of query.user expects int, got string".to_string())
    );

    assert_eq!(
        runtime_error(interpreter.execute_resolver(
            GraphQLOperation::Mutation,
            "rename",
            &args
        )),
        RuntimeError::MissingRequiredParam("name".to_string())
    );
    assert!(matches!(
        runtime_error(interpreter.execute_resolver(
            GraphQLOperation::Subscription,
            "user",
            &args
        )),
        RuntimeError::NotFound { kind: "resolver", .. }
    ));
}

#[test]
fn test_reset_clears_everything() {
    let mut interpreter = tools();
    interpreter.reset();
    assert!(interpreter.registry().is_empty());
    assert!(interpreter.globals().get_all().is_empty());
    assert!(interpreter.execute_cron_task("nightly").is_err());
}

#[test]
fn test_expanded_source_runs_like_compact() {
    let mut interpreter = Interpreter::new();
    interpreter
        .load_source(
            r#"
type User {
  id: int!
}

route GET /users/:id -> User {
  let n = parseInt(id)
  validate n > 0
  return {id: n}
}
"#,
            Some("users.glyphx"),
            SyntaxMode::Expanded,
        )
        .unwrap();
    assert_eq!(interpreter.mode(), SyntaxMode::Expanded);
    assert_eq!(
        get(&interpreter, "/users/9"),
        Value::object([("id", Value::Int(9))])
    );
    assert!(matches!(
        runtime_error(interpreter.dispatch(HttpMethod::Get, "/users/0", &Request::new())),
        RuntimeError::ValidationFailed(_)
    ));
}

#[test]
fn test_dropping_interpreter_frees_closure_scopes() {
    let mut interpreter = Interpreter::new();
    interpreter
        .load_source("const inc = (x) => x + 1", None, SyntaxMode::Compact)
        .unwrap();
    let globals = interpreter.globals().downgrade();
    drop(interpreter);
    assert!(globals.upgrade().is_none());
}

#[test]
fn test_handler_local_lambda_does_not_outlive_interpreter() {
    let mut interpreter = Interpreter::new();
    interpreter
        .load_source(
            "@ GET /double {\n  $ double = (x) => x * 2\n  > double(21)\n}",
            None,
            SyntaxMode::Compact,
        )
        .unwrap();
    assert_eq!(
        interpreter
            .dispatch(HttpMethod::Get, "/double", &Request::new())
            .unwrap(),
        Value::Int(42)
    );
    let globals = interpreter.globals().downgrade();
    drop(interpreter);
    assert!(globals.upgrade().is_none());
}

#[test]
fn test_returned_closure_keeps_its_scope_while_interpreter_lives() {
    let mut interpreter = Interpreter::new();
    interpreter
        .load_source(
            "func adder(n) {\n  $ add = (x) => x + n\n  > add\n}",
            None,
            SyntaxMode::Compact,
        )
        .unwrap();
    let add = interpreter.call_function("adder", vec![Value::Int(5)]).unwrap();
    interpreter.globals().define("add5", add);
    assert_eq!(interpreter.evaluate_source("add5(1)").unwrap(), Value::Int(6));
}

#[test]
fn test_interpreter_debug_output() {
    let mut interpreter = Interpreter::new();
    interpreter
        .load_source(SERVICE, Some("shop.glyph"), SyntaxMode::Compact)
        .unwrap();
    let debug = format!("{:?}", interpreter);
    assert!(debug.starts_with("Interpreter {"));
    assert!(debug.contains("shop.api"));
}
