use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_serve_command_available() {
    let mut cmd = Command::cargo_bin("glyph").unwrap();
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("serve"));
}

#[test]
fn test_serve_requires_existing_file() {
    let mut cmd = Command::cargo_bin("glyph").unwrap();
    cmd.arg("serve").arg("does-not-exist.glyph").arg("--port").arg("0");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("cannot read does-not-exist.glyph"));
}

#[test]
fn test_serve_rejects_invalid_source_before_binding() {
    let dir = tempfile::TempDir::new().unwrap();
    let file = dir.path().join("broken.glyph");
    std::fs::write(&file, "@ GET users {\n}\n").unwrap();

    let mut cmd = Command::cargo_bin("glyph").unwrap();
    cmd.arg("serve").arg(&file).arg("--port").arg("0");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Expected route path"));
}
