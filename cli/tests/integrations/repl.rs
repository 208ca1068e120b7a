use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_repl_reads_piped_input() {
    let mut cmd = Command::cargo_bin("glyph").unwrap();
    cmd.arg("repl")
        .write_stdin("1 + 2\n$ name = \"ada\"\nupper(name)\n:type [1, 2]\n:quit\nnever + evaluated\n");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("3"))
        .stdout(predicate::str::contains("\"ADA\""))
        .stdout(predicate::str::contains("[int]"))
        .stdout(predicate::str::contains("never").not());
}

#[test]
fn test_repl_multi_line_declaration() {
    let mut cmd = Command::cargo_bin("glyph").unwrap();
    cmd.arg("repl")
        .write_stdin("func square(n) {\n  > n * n\n}\nsquare(9)\n:functions\n");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("ok"))
        .stdout(predicate::str::contains("81"))
        .stdout(predicate::str::contains("square(n)"));
}

#[test]
fn test_repl_preloads_module() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("lib.glyph");
    fs::write(&file, "const GREETING = \"hello\"\n").unwrap();

    let mut cmd = Command::cargo_bin("glyph").unwrap();
    cmd.arg("repl")
        .arg("--load")
        .arg(&file)
        .write_stdin("GREETING + \" world\"\n");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Loaded"))
        .stdout(predicate::str::contains("\"hello world\""));
}
