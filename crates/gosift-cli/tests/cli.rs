use predicates::prelude::*;
use std::fs;

fn gosift() -> assert_cmd::Command {
    assert_cmd::Command::cargo_bin("gosift").unwrap()
}

/// Lay out a one-package tree under a temp dir and return it.
fn demo_package() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let pkg = dir.path().join("demo");
    fs::create_dir_all(&pkg).unwrap();
    fs::write(
        pkg.join("main.go"),
        "package demo\n\nvar a, b int = 1, 2\n\nfunc double(n int) int {\n\treturn n + n\n}\n",
    )
    .unwrap();
    dir
}

// ── contracts command ───────────────────────────────────────

#[test]
fn contracts_prints_the_stream() {
    let dir = demo_package();
    gosift()
        .args(["-r", dir.path().to_str().unwrap(), "contracts", "demo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("package demo"))
        .stdout(predicate::str::contains("IsCompatibleWith"))
        .stdout(predicate::str::contains("BinaryOp"));
}

// ── symbols command ─────────────────────────────────────────

#[test]
fn symbols_prints_the_global_table_as_json() {
    let dir = demo_package();
    gosift()
        .args(["-r", dir.path().to_str().unwrap(), "symbols", "demo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"variables\""))
        .stdout(predicate::str::contains("\"double\""));
}

// ── failure modes ───────────────────────────────────────────

#[test]
fn missing_package_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    gosift()
        .args(["-r", dir.path().to_str().unwrap(), "contracts", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn unresolved_symbol_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let pkg = dir.path().join("bad");
    fs::create_dir_all(&pkg).unwrap();
    fs::write(pkg.join("main.go"), "package bad\n\nvar x = missing()\n").unwrap();

    gosift()
        .args(["-r", dir.path().to_str().unwrap(), "contracts", "bad"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("stalled"));
}
