//! CLI integration tests
//!
//! Each test runs the `veritas` binary inside its own temporary crate, so
//! no test changes the process working directory.

mod common;

use assert_cmd::Command;
use common::{sample_crate, write_files};
use predicates::prelude::*;
use std::fs;

fn veritas(dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("veritas").unwrap();
    cmd.current_dir(dir).env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_init_writes_config() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    veritas(temp_dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created veritas.toml"));
    let config = fs::read_to_string(temp_dir.path().join("veritas.toml")).unwrap();
    assert!(config.contains("[veritas]"));

    veritas(temp_dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("--force"));
}

#[test]
fn test_extract_writes_rule_file() {
    let temp_dir = sample_crate();
    veritas(temp_dir.path())
        .arg("extract")
        .assert()
        .success()
        .stderr(predicate::str::contains("Wrote 3 rule set(s) to rules.json"));

    let json = fs::read_to_string(temp_dir.path().join("rules.json")).unwrap();
    let rules: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(rules["shop::models.User"]["typeRules"][0], "self.age >= 18");
    assert_eq!(
        rules["shop::models.Matrix"]["fieldRules"]["rows"][0],
        "self.all(x, x.all(x, x != 0))"
    );
}

#[test]
fn test_extract_to_stdout() {
    let temp_dir = sample_crate();
    veritas(temp_dir.path())
        .args(["extract", "src/models.rs", "--out", "-"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"shop::models.User\""))
        .stdout(predicate::str::contains("Holder").not());
}

#[test]
fn test_extract_fails_on_invalid_tags() {
    let temp_dir = sample_crate();
    write_files(
        temp_dir.path(),
        &[(
            "src/bad.rs",
            "pub struct Bad {\n    #[validate(\"keys,nonzero\")]\n    pub name: String,\n}\n",
        )],
    );
    veritas(temp_dir.path())
        .arg("extract")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid tag on shop::bad.Bad.name"));
    assert!(!temp_dir.path().join("rules.json").exists());
}

#[test]
fn test_gen_writes_registration_module() {
    let temp_dir = sample_crate();
    veritas(temp_dir.path()).arg("gen").assert().success();

    let code = fs::read_to_string(temp_dir.path().join("src/validation_rules.rs")).unwrap();
    assert!(code.starts_with("// @generated by veritas"));
    assert!(code.contains("veritas::register("));
    assert!(code.contains("\"shop::models.User\","));
    assert!(code.contains("pub fn known_types()"));
}

#[test]
fn test_list_jsonl() {
    let temp_dir = sample_crate();
    let output = veritas(temp_dir.path())
        .args(["list", "--format", "jsonl"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let records: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(records.len(), 4);
    assert_eq!(records[0]["key"], "shop.Holder[T]");
    assert_eq!(records[3]["type"], "status");
    assert_eq!(records[3]["rule_sets"], 3);
}

#[test]
fn test_list_human_without_color() {
    let temp_dir = sample_crate();
    veritas(temp_dir.path())
        .args(["list", "--color", "never"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Rule sets (3,"))
        .stdout(predicate::str::contains("  (type) self.age >= 18"));
}

#[test]
fn test_lint_clean_crate() {
    let temp_dir = sample_crate();
    veritas(temp_dir.path())
        .arg("lint")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("No issues found"));
}

#[test]
fn test_lint_rule_file_with_issues() {
    let temp_dir = sample_crate();
    fs::write(
        temp_dir.path().join("rules.json"),
        r#"{"shop::models.User": {"typeRules": ["self.age >="], "fieldRules": {"nickname": ["self != ''"]}}}"#,
    )
    .unwrap();

    let output = veritas(temp_dir.path())
        .args(["lint", "--rules", "rules.json", "--format", "jsonl"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let stdout = String::from_utf8(output.stdout).unwrap();
    let kinds: Vec<String> = stdout
        .lines()
        .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap())
        .filter(|r| r["type"] == "issue")
        .map(|r| r["kind"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(kinds.len(), 2);
    assert!(kinds.contains(&"invalid_type_rule".to_string()));
    assert!(kinds.contains(&"unknown_field".to_string()));
}

#[test]
fn test_invalid_config_exit_code() {
    let temp_dir = sample_crate();
    fs::write(temp_dir.path().join("veritas.toml"), "[veritas\nversion = 1").unwrap();
    veritas(temp_dir.path())
        .arg("list")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Configuration error"));

    fs::write(
        temp_dir.path().join("veritas.toml"),
        "[veritas]\nversion = \"9\"\n",
    )
    .unwrap();
    veritas(temp_dir.path()).arg("extract").assert().code(3);
}

#[test]
fn test_config_overrides_crate_name_and_outputs() {
    let temp_dir = sample_crate();
    fs::write(
        temp_dir.path().join("veritas.toml"),
        "[veritas]\nversion = \"1\"\ncrate_name = \"store\"\n\n[output]\nrules = \"out/rules.json\"\n",
    )
    .unwrap();
    veritas(temp_dir.path()).arg("extract").assert().success();

    let json = fs::read_to_string(temp_dir.path().join("out/rules.json")).unwrap();
    assert!(json.contains("\"store::models.User\""));
}

#[test]
fn test_missing_rule_file_is_an_error() {
    let temp_dir = sample_crate();
    veritas(temp_dir.path())
        .args(["lint", "--rules", "nope.json"])
        .assert()
        .code(2);
}
