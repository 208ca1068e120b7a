use assert_cmd::Command;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_expand_prints_keywords() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("users.glyph");
    fs::write(&file, "@ GET /users/:id -> User {\n  $ user = find(id)\n  > user\n}\n").unwrap();

    let output = Command::cargo_bin("glyph")
        .unwrap()
        .arg("expand")
        .arg(&file)
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8(output.stdout).unwrap(),
        "route GET /users/:id -> User {\n  let user = find(id)\n  return user\n}\n"
    );
}

#[test]
fn test_compact_writes_output_file() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("users.glyphx");
    let target = dir.path().join("users.glyph");
    fs::write(&file, "type User {\n  id: int!\n}\n").unwrap();

    Command::cargo_bin("glyph")
        .unwrap()
        .arg("compact")
        .arg(&file)
        .arg("--output")
        .arg(&target)
        .assert()
        .success();

    assert_eq!(fs::read_to_string(&target).unwrap(), ": User {\n  id: int!\n}\n");
}
