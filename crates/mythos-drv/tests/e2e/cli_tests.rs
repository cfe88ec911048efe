//! CLI interface tests: help, run, emit dumps, build/round-trip, the
//! REPL over piped stdin, and the documented exit codes.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

/// Path to the fixtures directory.
fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("e2e")
        .join("fixtures")
}

fn mythos() -> Command {
    Command::cargo_bin("mythos").expect("mythos binary")
}

#[test]
fn test_cli_help() {
    mythos()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("mythos"));
}

#[test]
fn test_cli_version() {
    mythos()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mythos"));
}

#[test]
fn test_run_hello() {
    mythos()
        .arg("run")
        .arg(fixtures_dir().join("hello.mythos"))
        .assert()
        .success()
        .stdout("hello, world\n");
}

#[test]
fn test_run_recursive_program() {
    mythos()
        .arg("run")
        .arg(fixtures_dir().join("fib.mythos"))
        .assert()
        .success()
        .stdout("55\n");
}

#[test]
fn test_compile_error_exits_1() {
    mythos()
        .arg("run")
        .arg(fixtures_dir().join("bad_syntax.mythos"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_runtime_error_exits_2() {
    mythos()
        .arg("run")
        .arg(fixtures_dir().join("runtime_error.mythos"))
        .assert()
        .code(2)
        .stdout(predicate::str::contains("before"))
        .stderr(predicate::str::contains("NameError"));
}

#[test]
fn test_missing_file_exits_1() {
    mythos()
        .arg("run")
        .arg(fixtures_dir().join("no_such_file.mythos"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot read"));
}

#[test]
fn test_emit_tokens() {
    mythos()
        .arg("run")
        .arg(fixtures_dir().join("hello.mythos"))
        .arg("--emit")
        .arg("tokens")
        .assert()
        .success()
        .stdout(predicate::str::contains("Ident"))
        .stdout(predicate::str::contains("Eof"));
}

#[test]
fn test_emit_ast() {
    mythos()
        .arg("run")
        .arg(fixtures_dir().join("hello.mythos"))
        .arg("--emit")
        .arg("ast")
        .assert()
        .success()
        .stdout(predicate::str::contains("Program"));
}

#[test]
fn test_emit_bytecode() {
    mythos()
        .arg("run")
        .arg(fixtures_dir().join("fib.mythos"))
        .arg("--emit")
        .arg("bytecode")
        .assert()
        .success()
        .stdout(predicate::str::contains("LOAD_CONST"))
        .stdout(predicate::str::contains("CALL"))
        .stdout(predicate::str::contains("== fib"));
}

#[test]
fn test_build_then_run_image() {
    let temp = TempDir::new().expect("temp dir");
    let image = temp.path().join("hello.mythc");

    mythos()
        .arg("build")
        .arg(fixtures_dir().join("hello.mythos"))
        .arg("-o")
        .arg(&image)
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote"));

    assert!(image.exists(), "image file should exist");

    mythos()
        .arg("run")
        .arg(&image)
        .assert()
        .success()
        .stdout("hello, world\n");
}

#[test]
fn test_corrupt_image_is_rejected() {
    let temp = TempDir::new().expect("temp dir");
    let image = temp.path().join("broken.mythc");
    std::fs::write(&image, "{definitely not an image").unwrap();

    mythos()
        .arg("run")
        .arg(&image)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("malformed"));
}

#[test]
fn test_repl_prints_expression_values() {
    mythos()
        .arg("repl")
        .write_stdin("1 + 2\n:quit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("3"));
}

#[test]
fn test_repl_state_persists_between_lines() {
    mythos()
        .arg("repl")
        .write_stdin("x = 20\nx + 22\n:quit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("42"));
}

#[test]
fn test_repl_recovers_from_errors() {
    mythos()
        .arg("repl")
        .write_stdin("nope()\n\"still \" + \"alive\"\n:quit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("still alive"))
        .stderr(predicate::str::contains("NameError"));
}
