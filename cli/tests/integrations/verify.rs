use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const CONTRACT: &str = r#"
contract UserApi {
  GET /users -> [User]
  GET /users/:id -> User
}
"#;

fn write(dir: &TempDir, name: &str, routes: &str) -> PathBuf {
    let file = dir.path().join(name);
    fs::write(&file, format!("{}\n{}", CONTRACT, routes)).unwrap();
    file
}

#[test]
fn test_verify_passes() {
    let dir = TempDir::new().unwrap();
    let file = write(
        &dir,
        "api.glyph",
        "@ GET /users -> [User] {\n  > []\n}\n@ GET /users/:userId -> User {\n  > null\n}\n",
    );

    Command::cargo_bin("glyph")
        .unwrap()
        .arg("verify")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ contract UserApi satisfied"));
}

#[test]
fn test_verify_fails_on_violations() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "api.glyph", "@ GET /users -> User {\n  > null\n}\n");

    Command::cargo_bin("glyph")
        .unwrap()
        .arg("verify")
        .arg(&file)
        .assert()
        .failure()
        .stdout(predicate::str::contains("✗ contract UserApi: 2 violation(s)"))
        .stdout(predicate::str::contains(
            "GET /users/:id: endpoint not found in implementation",
        ))
        .stderr(predicate::str::contains("1 of 1 contract(s) failed verification"));
}

#[test]
fn test_verify_unknown_contract() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "api.glyph", "");

    Command::cargo_bin("glyph")
        .unwrap()
        .args(["verify", "--contract", "Billing"])
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("contract 'Billing' not found"));
}

#[test]
fn test_diff_flags_breaking_changes() {
    let dir = TempDir::new().unwrap();
    let old = dir.path().join("v1.glyph");
    let new = dir.path().join("v2.glyph");
    fs::write(&old, CONTRACT).unwrap();
    fs::write(
        &new,
        "contract UserApi {\n  GET /users -> [Account]\n  GET /users/:id -> User\n  POST /users -> User\n}\n",
    )
    .unwrap();

    Command::cargo_bin("glyph")
        .unwrap()
        .arg("diff")
        .arg(&old)
        .arg(&new)
        .assert()
        .failure()
        .stdout(predicate::str::contains("contract UserApi: 2 change(s), 1 breaking"))
        .stdout(predicate::str::contains(
            "[BREAKING] GET /users: return type changed from [User] to [Account]",
        ))
        .stdout(predicate::str::contains("[info] POST /users"));

    Command::cargo_bin("glyph")
        .unwrap()
        .arg("diff")
        .arg(&old)
        .arg(&old)
        .assert()
        .success()
        .stdout(predicate::str::contains("contract UserApi: no changes"));
}
