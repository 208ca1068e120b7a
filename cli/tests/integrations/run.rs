use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const SERVICE: &str = r#"
: User { id: int!, name: string! }

@ GET /users/:id -> User {
  > {id: parseInt(id), name: "user" + id}
}

@ GET /search {
  ? q: string!
  ? limit: int = 10
  > {q: q, limit: limit}
}

@ POST /echo {
  < payload: object
  > payload
}

! greet name: string! times: int = 1 --loud {
  $ message = "hi " + name
  if loud { message = upper(message) }
  > {message: message, times: times}
}

! boom {
  > 1 / 0
}

* "0 3 * * *" nightly {
  > "cleaned"
}

~ "user.created" {
  > "welcome " + event.name
}

& "email.send" {
  > "sent to " + message.to
}

@ query user(id: int!) -> User {
  > {id: id, name: "resolved"}
}
"#;

fn service() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("service.glyph");
    fs::write(&file, SERVICE).unwrap();
    (dir, file)
}

fn glyph() -> Command {
    Command::cargo_bin("glyph").unwrap()
}

#[test]
fn test_run_route_with_path_param() {
    let (_dir, file) = service();
    glyph()
        .arg("run")
        .arg(&file)
        .arg("--route")
        .arg("GET /users/7")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"id\": 7"))
        .stdout(predicate::str::contains("\"name\": \"user7\""));
}

#[test]
fn test_run_route_with_query_and_body() {
    let (_dir, file) = service();
    glyph()
        .arg("run")
        .arg(&file)
        .args(["--route", "GET /search", "-q", "q=lamps"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"q\": \"lamps\""))
        .stdout(predicate::str::contains("\"limit\": 10"));

    glyph()
        .arg("run")
        .arg(&file)
        .args(["--route", "POST /echo", "--data", r#"{"ok": true}"#])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"ok\": true"));
}

#[test]
fn test_run_command_with_args_and_flags() {
    let (_dir, file) = service();
    glyph()
        .arg("run")
        .arg(&file)
        .args(["--command", "greet", "ada", "2", "--loud"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"message\": \"HI ADA\""))
        .stdout(predicate::str::contains("\"times\": 2"));
}

#[test]
fn test_run_event_cron_queue_and_resolver() {
    let (_dir, file) = service();
    glyph()
        .arg("run")
        .arg(&file)
        .args(["--event", "user.created", "--data", r#"{"name": "Ada"}"#])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"welcome Ada\""));

    glyph()
        .arg("run")
        .arg(&file)
        .args(["--cron", "nightly"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"cleaned\""));

    glyph()
        .arg("run")
        .arg(&file)
        .args(["--queue", "email.send", "--data", r#"{"to": "ada@example.com"}"#])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"sent to ada@example.com\""));

    glyph()
        .arg("run")
        .arg(&file)
        .args(["--resolver", "query.user", "--data", r#"{"id": 3}"#])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"id\": 3"));
}

#[test]
fn test_run_reports_runtime_errors() {
    let (_dir, file) = service();
    glyph()
        .arg("run")
        .arg(&file)
        .args(["--command", "boom"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Runtime error: division by zero"));

    glyph()
        .arg("run")
        .arg(&file)
        .args(["--route", "GET /missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("route not found: GET /missing"));
}

#[test]
fn test_run_requires_an_entry_point() {
    let (_dir, file) = service();
    glyph().arg("run").arg(&file).assert().failure();

    glyph()
        .arg("run")
        .arg(&file)
        .args(["--cron", "nightly", "--event", "user.created"])
        .assert()
        .failure();
}

#[test]
fn test_run_reports_parse_errors_with_hint() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("broken.glyph");
    fs::write(&file, "@ GET users {\n  > 1\n}\n").unwrap();

    glyph()
        .arg("run")
        .arg(&file)
        .args(["--route", "GET /users"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Expected route path"))
        .stderr(predicate::str::contains("Route paths must start with '/'"));
}
