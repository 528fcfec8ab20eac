use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn missing_output_is_a_usage_error() {
    Command::cargo_bin("gale")
        .unwrap()
        .args(["--sources", "A.java"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("--output"));
}

#[test]
fn conflicting_platform_flags_fail() {
    Command::cargo_bin("gale")
        .unwrap()
        .args([
            "--output", "out.jar", "--release", "11", "--system", "some/jdk",
        ])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn syntax_error_prints_caret_diagnostic() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("Bad.java");
    std::fs::write(&source, "class Bad {\n  int = 3;\n}\n").unwrap();
    let output = dir.path().join("out.jar");

    Command::cargo_bin("gale")
        .unwrap()
        .args([
            "--output",
            output.to_str().unwrap(),
            "--sources",
            source.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Bad.java:2: error:"))
        .stderr(predicate::str::contains("^"));
}

#[test]
fn empty_source_set_still_produces_a_jar() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.jar");

    Command::cargo_bin("gale")
        .unwrap()
        .args(["--output", output.to_str().unwrap()])
        .assert()
        .success();
    assert!(output.exists());
}
