use crate::error::{GlyphError, RuntimeError};
use crate::lexer::SyntaxMode;
use crate::value::Value;
use crate::{GlyphResult, Interpreter, ResourceLimits};

fn eval(source: &str) -> Value {
    Interpreter::new().evaluate_source(source).unwrap()
}

fn runtime_error(result: GlyphResult<Value>) -> RuntimeError {
    match result {
        Err(GlyphError::Runtime { error, .. }) => error,
        other => panic!("expected a runtime error, got {:?}", other),
    }
}

fn loaded(source: &str) -> Interpreter {
    let mut interpreter = Interpreter::new();
    interpreter
        .load_source(source, Some("test.glyph"), SyntaxMode::Compact)
        .unwrap();
    interpreter
}

fn strings(items: &[&str]) -> Value {
    Value::Array(items.iter().map(|s| Value::from(*s)).collect())
}

#[test]
fn test_integer_arithmetic() {
    assert_eq!(eval("1 + 2 * 3"), Value::Int(7));
    assert_eq!(eval("(1 + 2) * 3"), Value::Int(9));
    assert_eq!(eval("7 / 2"), Value::Int(3));
    assert_eq!(eval("7 % 3"), Value::Int(1));
    assert_eq!(eval("-3 + 1"), Value::Int(-2));
}

#[test]
fn test_float_promotion() {
    assert_eq!(eval("7 / 2.0"), Value::Float(3.5));
    assert_eq!(eval("0.5 + 1"), Value::Float(1.5));
    assert_eq!(eval("1 == 1.0"), Value::Bool(true));
}

#[test]
fn test_division_by_zero() {
    let interpreter = Interpreter::new();
    assert_eq!(
        runtime_error(interpreter.evaluate_source("1 / 0")),
        RuntimeError::DivideByZero
    );
    assert_eq!(
        runtime_error(interpreter.evaluate_source("1.5 % 0")),
        RuntimeError::DivideByZero
    );
}

#[test]
fn test_integer_overflow() {
    let error = runtime_error(Interpreter::new().evaluate_source("9223372036854775807 + 1"));
    assert!(matches!(error, RuntimeError::UnsupportedOperation(_)));
}

#[test]
fn test_string_concatenation() {
    assert_eq!(eval(r#""n=" + 5"#), Value::from("n=5"));
    assert_eq!(eval(r#"1.5 + "x""#), Value::from("1.5x"));
    assert_eq!(eval(r#""ok " + true"#), Value::from("ok true"));
    assert_eq!(
        runtime_error(Interpreter::new().evaluate_source(r#""a" + null"#)),
        RuntimeError::TypeMismatch("cannot concatenate string and null".to_string())
    );
}

#[test]
fn test_array_concatenation() {
    assert_eq!(
        eval("[1] + [2, 3]"),
        Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
    );
}

#[test]
fn test_comparisons() {
    assert_eq!(eval(r#""apple" < "banana""#), Value::Bool(true));
    assert_eq!(eval("2 >= 2.0"), Value::Bool(true));
    assert_eq!(eval("[1, 2] == [1, 2]"), Value::Bool(true));
    assert_eq!(eval("{a: 1} != {a: 2}"), Value::Bool(true));
    let error = runtime_error(Interpreter::new().evaluate_source(r#"1 < "b""#));
    assert!(matches!(error, RuntimeError::TypeMismatch(_)));
}

#[test]
fn test_logic_short_circuits() {
    assert_eq!(eval(r#"null || "x""#), Value::Bool(true));
    assert_eq!(eval("0 && undefined_thing"), Value::Bool(false));
    assert_eq!(eval("1 || undefined_thing"), Value::Bool(true));
    assert_eq!(eval(r#"!"""#), Value::Bool(true));
    assert_eq!(eval("![]"), Value::Bool(true));
    assert_eq!(eval("!0.0"), Value::Bool(true));
}

#[test]
fn test_field_access_and_indexing() {
    assert_eq!(eval("{a: 1}.a"), Value::Int(1));
    assert_eq!(eval("{a: 1}.missing"), Value::Null);
    assert_eq!(eval(r#""hey".length"#), Value::Int(3));
    assert_eq!(eval("[10, 20, 30].length"), Value::Int(3));
    assert_eq!(eval("[10, 20, 30][1]"), Value::Int(20));
    assert_eq!(eval(r#""abc"[0]"#), Value::from("a"));
    assert_eq!(eval(r#"{k: 2}["k"]"#), Value::Int(2));
    assert_eq!(
        runtime_error(Interpreter::new().evaluate_source("[1][5]")),
        RuntimeError::IndexOutOfBounds { index: 5, len: 1 }
    );
}

#[test]
fn test_field_access_on_scalar_fails() {
    let error = runtime_error(Interpreter::new().evaluate_source("true.value"));
    assert!(matches!(error, RuntimeError::TypeMismatch(_)));
}

#[test]
fn test_undefined_names() {
    let interpreter = Interpreter::new();
    assert_eq!(
        runtime_error(interpreter.evaluate_source("nope")),
        RuntimeError::UndefinedVariable("nope".to_string())
    );
    assert_eq!(
        runtime_error(interpreter.evaluate_source("nope(1)")),
        RuntimeError::UndefinedFunction("nope".to_string())
    );
}

#[test]
fn test_await_evaluates_operand() {
    assert_eq!(eval("await 5"), Value::Int(5));
}

#[test]
fn test_closures_capture_defining_scope() {
    let interpreter = loaded(
        r#"
func make_adder(n) {
  > (x) => x + n
}
"#,
    );
    let result = interpreter
        .execute_source("$ add5 = make_adder(5)\n$ add10 = make_adder(10)\nadd5(1) + add10(1)")
        .unwrap();
    assert_eq!(result, Value::Int(17));
}

#[test]
fn test_counter_closure_keeps_state() {
    let interpreter = loaded(
        r#"
func make_counter() {
  $ count = 0
  > () => {
    count = count + 1
    > count
  }
}
"#,
    );
    let result = interpreter
        .execute_source("$ next = make_counter()\nnext()\nnext()\nnext()")
        .unwrap();
    assert_eq!(result, Value::Int(3));
}

#[test]
fn test_recursion() {
    let interpreter = loaded(
        r#"
func fact(n: int) -> int {
  if n <= 1 { > 1 }
  > n * fact(n - 1)
}
"#,
    );
    assert_eq!(
        interpreter.call_function("fact", vec![Value::Int(5)]).unwrap(),
        Value::Int(120)
    );
}

#[test]
fn test_call_depth_limit() {
    let mut interpreter = Interpreter::with_limits(ResourceLimits {
        max_call_depth: 20,
        ..ResourceLimits::default()
    });
    interpreter
        .load_source(
            "func forever(n) {\n  > forever(n + 1)\n}",
            None,
            SyntaxMode::Compact,
        )
        .unwrap();
    let err = interpreter.call_function("forever", vec![Value::Int(0)]).unwrap_err();
    match err {
        GlyphError::ResourceLimitExceeded { limit_name, .. } => {
            assert_eq!(limit_name, "max_call_depth")
        }
        other => panic!("expected a resource limit error, got {}", other),
    }
}

#[test]
fn test_parameter_binding() {
    let interpreter = loaded(
        r#"
func greet(name: string = "world", punctuation: string?) {
  if punctuation == null { > "hello " + name }
  > "hello " + name + punctuation
}

func strict(name: string) {
  > name
}
"#,
    );

    assert_eq!(
        interpreter.call_function("greet", vec![]).unwrap(),
        Value::from("hello world")
    );
    assert_eq!(
        interpreter
            .call_function("greet", vec![Value::from("Ada"), Value::from("!")])
            .unwrap(),
        Value::from("hello Ada!")
    );
    assert_eq!(
        runtime_error(interpreter.call_function("strict", vec![])),
        RuntimeError::MissingRequiredParam("name (in strict)".to_string())
    );
    assert_eq!(
        runtime_error(interpreter.call_function("strict", vec![Value::Int(5)])),
        RuntimeError::TypeMismatch("argument 'name' of strict expects string, got int".to_string())
    );
    assert_eq!(
        runtime_error(interpreter.call_function(
            "strict",
            vec![Value::from("a"), Value::from("b")]
        )),
        RuntimeError::ArityMismatch {
            name: "strict".to_string(),
            expected: 1,
            actual: 2
        }
    );
}

#[test]
fn test_return_type_is_checked() {
    let interpreter = loaded("func bad() -> int {\n  > \"x\"\n}");
    assert_eq!(
        runtime_error(interpreter.call_function("bad", vec![])),
        RuntimeError::ReturnTypeMismatch {
            context: "function bad".to_string(),
            detail: "expected int, got string".to_string()
        }
    );
}

#[test]
fn test_function_without_return_yields_null() {
    let interpreter = loaded("func noop() {\n  $ x = 1\n}");
    assert_eq!(interpreter.call_function("noop", vec![]).unwrap(), Value::Null);
}

#[test]
fn test_calling_non_function_value() {
    let interpreter = Interpreter::new();
    let error = runtime_error(interpreter.execute_source("$ x = 1\nx(2)"));
    assert_eq!(
        error,
        RuntimeError::TypeMismatch("'x' is int, not a function".to_string())
    );
}

#[test]
fn test_method_calls() {
    let interpreter = Interpreter::new();
    assert_eq!(
        interpreter
            .execute_source("$ math = {double: (n) => n * 2}\nmath.double(21)")
            .unwrap(),
        Value::Int(42)
    );
    assert_eq!(
        interpreter.execute_source("$ name = \"ada\"\nname.upper()").unwrap(),
        Value::from("ADA")
    );
    assert_eq!(
        runtime_error(interpreter.execute_source("name.shout()")),
        RuntimeError::UndefinedFunction("name.shout".to_string())
    );
}

#[test]
fn test_builtins_are_values() {
    let interpreter = Interpreter::new();
    assert_eq!(
        interpreter.execute_source("$ f = upper\nf(\"x\")").unwrap(),
        Value::from("X")
    );
    assert_eq!(
        interpreter.evaluate_source(r#"map(["a", "b"], upper)"#).unwrap(),
        strings(&["A", "B"])
    );
}

#[test]
fn test_for_loops() {
    let interpreter = loaded(
        r#"
func sum_to(n: int) -> int {
  $ total = 0
  for i in range(n) {
    total = total + i
  }
  > total
}

func odd_only(items) {
  $ kept = []
  for item in items {
    if item % 2 == 0 { continue }
    kept = append(kept, item)
  }
  > kept
}

func describe(config) {
  $ parts = []
  for key, value in config {
    parts = append(parts, key + "=" + value)
  }
  > join(parts, ",")
}

func key_list(config) {
  $ names = []
  for key in config {
    names = append(names, key)
  }
  > names
}
"#,
    );

    assert_eq!(
        interpreter.call_function("sum_to", vec![Value::Int(5)]).unwrap(),
        Value::Int(10)
    );
    assert_eq!(
        interpreter
            .call_function(
                "odd_only",
                vec![Value::Array((1..=5).map(Value::Int).collect())]
            )
            .unwrap(),
        Value::Array(vec![Value::Int(1), Value::Int(3), Value::Int(5)])
    );

    let config = Value::object([("b", Value::Int(2)), ("a", Value::Int(1))]);
    assert_eq!(
        interpreter.call_function("describe", vec![config.clone()]).unwrap(),
        Value::from("a=1,b=2")
    );
    assert_eq!(
        interpreter.call_function("key_list", vec![config]).unwrap(),
        strings(&["a", "b"])
    );
}

#[test]
fn test_for_over_string_and_invalid_iterable() {
    let interpreter = Interpreter::new();
    assert_eq!(
        interpreter
            .execute_source("$ out = []\nfor c in \"hi\" { out = append(out, upper(c)) }\nout")
            .unwrap(),
        strings(&["H", "I"])
    );
    let error = runtime_error(interpreter.execute_source("for x in 5 { }"));
    assert_eq!(error, RuntimeError::TypeMismatch("cannot iterate over int".to_string()));
}

#[test]
fn test_while_with_break_and_early_return() {
    let interpreter = loaded(
        r#"
func count_up() {
  $ i = 0
  while true {
    i = i + 1
    if i >= 3 { break }
  }
  > i
}

func first_over(items, limit) {
  for item in items {
    if item > limit { > item }
  }
  > null
}
"#,
    );
    assert_eq!(interpreter.call_function("count_up", vec![]).unwrap(), Value::Int(3));
    assert_eq!(
        interpreter
            .call_function(
                "first_over",
                vec![
                    Value::Array(vec![Value::Int(1), Value::Int(7), Value::Int(9)]),
                    Value::Int(5)
                ]
            )
            .unwrap(),
        Value::Int(7)
    );
}

#[test]
fn test_loop_iteration_limit() {
    let interpreter = Interpreter::with_limits(ResourceLimits {
        max_loop_iterations: 10,
        ..ResourceLimits::default()
    });
    let err = interpreter.execute_source("while true { }").unwrap_err();
    assert!(matches!(
        err,
        GlyphError::ResourceLimitExceeded { ref limit_name, .. } if limit_name == "max_loop_iterations"
    ));
}

#[test]
fn test_switch_picks_first_match() {
    let interpreter = loaded(
        r#"
func rank(role) {
  switch role {
    case "admin" { > 3 }
    case "member" { > 2 }
    case "member" { > 99 }
    default { > 1 }
  }
}
"#,
    );
    let rank = |role: &str| interpreter.call_function("rank", vec![Value::from(role)]).unwrap();
    assert_eq!(rank("admin"), Value::Int(3));
    assert_eq!(rank("member"), Value::Int(2));
    assert_eq!(rank("guest"), Value::Int(1));
}

#[test]
fn test_block_scoping() {
    let interpreter = Interpreter::new();
    let result = interpreter
        .execute_source("$ x = 1\nif true {\n  $ y = 2\n  x = x + y\n}\nx")
        .unwrap();
    assert_eq!(result, Value::Int(3));
    assert!(!interpreter.globals().has("y"));
}

#[test]
fn test_nested_assignment() {
    let interpreter = Interpreter::new();
    assert_eq!(
        interpreter
            .execute_source("$ user = {name: \"Ada\"}\nuser.address.city = \"London\"\nuser")
            .unwrap(),
        Value::object([
            ("address", Value::object([("city", Value::from("London"))])),
            ("name", Value::from("Ada")),
        ])
    );
    assert_eq!(
        interpreter
            .execute_source("$ items = [1, 2, 3]\nitems[1] = 20\nitems")
            .unwrap(),
        Value::Array(vec![Value::Int(1), Value::Int(20), Value::Int(3)])
    );
}

#[test]
fn test_annotated_assignment_is_checked() {
    let error = runtime_error(Interpreter::new().execute_source("$ n: int = \"five\""));
    assert_eq!(
        error,
        RuntimeError::TypeMismatch("'n' is declared as int, got string".to_string())
    );
}

#[test]
fn test_validate_failure() {
    let interpreter = loaded("func positive(n) {\n  ? n > 0\n  > n\n}");
    assert_eq!(
        interpreter.call_function("positive", vec![Value::Int(2)]).unwrap(),
        Value::Int(2)
    );
    assert_eq!(
        runtime_error(interpreter.call_function("positive", vec![Value::Int(-1)])),
        RuntimeError::ValidationFailed("condition on line 2 evaluated to false".to_string())
    );
}

#[test]
fn test_constants() {
    let interpreter = loaded("const LIMIT: int = 5\nconst DOUBLE = LIMIT * 2");
    assert_eq!(interpreter.evaluate_source("DOUBLE").unwrap(), Value::Int(10));
    assert_eq!(
        runtime_error(interpreter.execute_source("LIMIT = 6")),
        RuntimeError::ConstantReassignment("LIMIT".to_string())
    );
}

#[test]
fn test_constant_type_annotation() {
    let err = Interpreter::new()
        .load_source("const NAME: int = \"x\"", None, SyntaxMode::Compact)
        .unwrap_err();
    assert!(err
        .to_string()
        .contains("constant 'NAME' is declared as int, got string"));
}

#[test]
fn test_break_outside_loop() {
    assert_eq!(
        runtime_error(Interpreter::new().execute_source("break")),
        RuntimeError::InvalidControlFlow("break")
    );
    let interpreter = loaded("func f() {\n  continue\n}");
    assert_eq!(
        runtime_error(interpreter.call_function("f", vec![])),
        RuntimeError::InvalidControlFlow("continue")
    );
}

#[test]
fn test_runtime_errors_carry_statement_location() {
    let err = Interpreter::new()
        .execute_source("$ a = 1\n$ b = a / 0")
        .unwrap_err();
    match &err {
        GlyphError::Runtime {
            error: RuntimeError::DivideByZero,
            span: Some(span),
        } => assert_eq!(span.line, 2),
        other => panic!("unexpected error {:?}", other),
    }
    assert!(err.to_string().ends_with("at line 2:1"));
}

#[test]
fn test_execute_source_returns_value() {
    let interpreter = Interpreter::new();
    assert_eq!(
        interpreter.execute_source("$ x = 2\n> x * 21\nx").unwrap(),
        Value::Int(42)
    );
    assert_eq!(interpreter.execute_source("$ y = 1").unwrap(), Value::Null);
}
