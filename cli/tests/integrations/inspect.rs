use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_show_lists_declarations() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("shop.glyph");
    fs::write(
        &file,
        r#"
module shop

: Product { sku: string!, price: float! }

@ GET /products -> [Product] {
  > []
}

~ "order.placed" {
  > event
}
"#,
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("glyph").unwrap();
    cmd.arg("show").arg(&file);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Module shop"))
        .stdout(predicate::str::contains("Product"))
        .stdout(predicate::str::contains("GET /products"))
        .stdout(predicate::str::contains("-> [Product]"))
        .stdout(predicate::str::contains("order.placed"));
}

#[test]
fn test_list_scans_both_syntaxes() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("a.glyph"),
        ": A { x: int }\n@ GET /a {\n  > 1\n}\n",
    )
    .unwrap();
    fs::create_dir(dir.path().join("nested")).unwrap();
    fs::write(
        dir.path().join("nested").join("b.glyphx"),
        "route GET /b {\n  return 2\n}\n",
    )
    .unwrap();
    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let mut cmd = Command::cargo_bin("glyph").unwrap();
    cmd.arg("list").arg(dir.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Workspace contains 2 files, 3 declarations"))
        .stdout(predicate::str::contains("a.glyph"))
        .stdout(predicate::str::contains("b.glyphx"))
        .stdout(predicate::str::contains("expanded"))
        .stdout(predicate::str::contains("notes.txt").not());
}
