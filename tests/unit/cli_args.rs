//! CLI surface tests using the compiled binary

use assert_cmd::Command;

#[test]
fn test_help_prints_usage() {
    Command::cargo_bin("scanner-spec-generator")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains("generate"));
}

#[test]
fn test_markets_command_with_empty_data_dir() {
    let dir = tempfile::TempDir::new().unwrap();

    Command::cargo_bin("scanner-spec-generator")
        .unwrap()
        .arg("--data-dir")
        .arg(dir.path().join("data"))
        .arg("--specs-dir")
        .arg(dir.path().join("specs"))
        .arg("--cache-dir")
        .arg(dir.path().join("cache"))
        .arg("markets")
        .assert()
        .success()
        .stdout(predicates::str::contains("No markets known"));
}

#[test]
fn test_generate_without_markets_fails() {
    let dir = tempfile::TempDir::new().unwrap();

    Command::cargo_bin("scanner-spec-generator")
        .unwrap()
        .arg("--data-dir")
        .arg(dir.path().join("data"))
        .arg("--specs-dir")
        .arg(dir.path().join("specs"))
        .arg("--cache-dir")
        .arg(dir.path().join("cache"))
        .arg("generate")
        .assert()
        .failure();
}

#[test]
fn test_rejects_unknown_output_format() {
    Command::cargo_bin("scanner-spec-generator")
        .unwrap()
        .args(["--format", "xml", "generate", "crypto"])
        .assert()
        .failure();
}
