//! Configuration loading tests

mod common;

use common::{TestResult, sample_crate, write_files};
use std::path::Path;
use veritas::config::{Config, DEFAULT_CONFIG};
use veritas::{ConfigError, Engine};

#[test]
fn test_load_from_disk() -> TestResult {
    let temp_dir = sample_crate();
    write_files(
        temp_dir.path(),
        &[(
            "veritas.toml",
            "[veritas]\nversion = \"1\"\nroot = \"crates/core/src\"\nexclude = [\"**/generated/**\"]\n\n[engine]\ncache_capacity = 8\n",
        )],
    );

    let config = Config::load(temp_dir.path().join("veritas.toml"))?;
    assert_eq!(config.veritas.root, Path::new("crates/core/src"));
    assert_eq!(config.veritas.exclude.len(), 1);
    assert_eq!(config.output.rules, Path::new("rules.json"));
    assert_eq!(config.crate_name(temp_dir.path()), "shop");

    let engine = Engine::with_config(&config.engine);
    assert_eq!(engine.cache().capacity(), 8);
    Ok(())
}

#[test]
fn test_missing_file_is_io_error() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let err = Config::load(temp_dir.path().join("veritas.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn test_crate_name_falls_back_to_directory() -> TestResult {
    let temp_dir = tempfile::TempDir::new()?;
    let dir = temp_dir.path().join("my-service");
    std::fs::create_dir(&dir)?;

    let config = Config::parse(DEFAULT_CONFIG)?;
    assert_eq!(config.crate_name(&dir), "my_service");
    Ok(())
}

#[test]
fn test_validation_errors() {
    for (toml, needle) in [
        ("[veritas]\nversion = \"0\"\n", "Unsupported configuration version"),
        ("[veritas]\nversion = \"1\"\ninclude = [\"{a\"]\n", "Invalid include glob pattern"),
        ("[veritas]\nversion = \"1\"\ncrate_name = \"\"\n", "crate_name must not be empty"),
        (
            "[veritas]\nversion = \"1\"\n[engine]\nregex_cache_capacity = 0\n",
            "regex_cache_capacity",
        ),
    ] {
        let err = Config::parse(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)), "{toml}: {err}");
        assert!(err.to_string().contains(needle), "{err}");
    }
}

#[test]
fn test_missing_section_is_parse_error() {
    let err = Config::parse("[output]\nrules = \"r.json\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}
