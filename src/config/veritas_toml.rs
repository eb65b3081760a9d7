//! Parsing and validation for veritas.toml configuration files

use crate::engine::EngineConfig;
use crate::error::ConfigError;
use crate::types::GlobPattern;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up by the CLI
pub const CONFIG_FILE: &str = "veritas.toml";

/// Configuration written by `veritas init`
pub const DEFAULT_CONFIG: &str = r#"# Veritas configuration
[veritas]
version = "1"
# Crate name used as the module path prefix; read from Cargo.toml when unset
# crate_name = "my_crate"
root = "src"
include = ["**/*.rs"]
exclude = []

[output]
rules = "rules.json"
code = "src/validation_rules.rs"

[engine]
cache_capacity = 256
"#;

/// Main configuration struct for veritas.toml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Source discovery settings
    pub veritas: VeritasMeta,

    /// Output locations and formatting
    #[serde(default)]
    pub output: OutputConfig,

    /// Expression engine tuning
    #[serde(default)]
    pub engine: EngineConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.veritas.version != "1" {
            return Err(ConfigError::Validation(format!(
                "Unsupported configuration version '{}'. Expected '1'",
                self.veritas.version
            )));
        }

        if let Some(name) = &self.veritas.crate_name
            && name.trim().is_empty()
        {
            return Err(ConfigError::Validation(
                "crate_name must not be empty".to_string(),
            ));
        }

        for (kind, patterns) in [
            ("include", &self.veritas.include),
            ("exclude", &self.veritas.exclude),
        ] {
            for pattern in patterns {
                globset::Glob::new(pattern.as_str()).map_err(|e| {
                    ConfigError::Validation(format!(
                        "Invalid {} glob pattern '{}': {}",
                        kind,
                        pattern.as_str(),
                        e
                    ))
                })?;
            }
        }

        if self.engine.cache_capacity == 0 {
            return Err(ConfigError::Validation(
                "engine.cache_capacity must be greater than 0".to_string(),
            ));
        }
        if self.engine.regex_cache_capacity == 0 {
            return Err(ConfigError::Validation(
                "engine.regex_cache_capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Crate name for module paths: the configured one, else the package
    /// name from `Cargo.toml` in `base`, else the directory name
    pub fn crate_name(&self, base: &Path) -> String {
        if let Some(name) = &self.veritas.crate_name {
            return name.replace('-', "_");
        }
        package_name(&base.join("Cargo.toml"))
            .or_else(|| {
                base.canonicalize()
                    .ok()?
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "crate".to_string())
            .replace('-', "_")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            veritas: VeritasMeta::default(),
            output: OutputConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

fn package_name(manifest: &Path) -> Option<String> {
    let content = fs::read_to_string(manifest).ok()?;
    let value: toml::Value = toml::from_str(&content).ok()?;
    value
        .get("package")?
        .get("name")?
        .as_str()
        .map(str::to_string)
}

/// `[veritas]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VeritasMeta {
    /// Configuration version (must be "1")
    pub version: String,

    /// Crate name used as the module path prefix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crate_name: Option<String>,

    /// Source root that module paths are computed from
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// File patterns to include, relative to `root`
    #[serde(default = "default_include")]
    pub include: Vec<GlobPattern>,

    /// File patterns to exclude, relative to `root`
    #[serde(default)]
    pub exclude: Vec<GlobPattern>,
}

impl Default for VeritasMeta {
    fn default() -> Self {
        Self {
            version: "1".to_string(),
            crate_name: None,
            root: default_root(),
            include: default_include(),
            exclude: Vec::new(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("src")
}

fn default_include() -> Vec<GlobPattern> {
    vec![GlobPattern::new("**/*.rs")]
}

/// `[output]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// JSON rule file written by `extract`
    #[serde(default = "default_rules_path")]
    pub rules: PathBuf,

    /// Registration module written by `gen`
    #[serde(default = "default_code_path")]
    pub code: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            rules: default_rules_path(),
            code: default_code_path(),
        }
    }
}

fn default_rules_path() -> PathBuf {
    PathBuf::from("rules.json")
}

fn default_code_path() -> PathBuf {
    PathBuf::from("src/validation_rules.rs")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_parses() {
        let config = Config::parse(DEFAULT_CONFIG).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_full_config() {
        let config = Config::parse(
            r#"
[veritas]
version = "1"
crate_name = "my-app"
root = "crates/app/src"
include = ["models/**"]
exclude = ["**/generated/**"]

[output]
rules = "out/rules.json"
code = "src/rules_gen.rs"

[engine]
cache_capacity = 64
regex_cache_capacity = 8
"#,
        )
        .unwrap();
        assert_eq!(config.veritas.root, PathBuf::from("crates/app/src"));
        assert_eq!(config.veritas.include, vec![GlobPattern::new("models/**")]);
        assert_eq!(config.output.code, PathBuf::from("src/rules_gen.rs"));
        assert_eq!(config.engine.cache_capacity, 64);
        assert_eq!(config.engine.regex_cache_capacity, 8);
        assert_eq!(config.crate_name(Path::new(".")), "my_app");
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config = Config::parse("[veritas]\nversion = \"1\"\n").unwrap();
        assert_eq!(config.veritas.root, PathBuf::from("src"));
        assert_eq!(config.output.rules, PathBuf::from("rules.json"));
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn test_invalid_version() {
        let err = Config::parse("[veritas]\nversion = \"2\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("Unsupported configuration version"));
    }

    #[test]
    fn test_missing_version() {
        let err = Config::parse("[veritas]\nroot = \"src\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_invalid_glob() {
        let err = Config::parse("[veritas]\nversion = \"1\"\nexclude = [\"[oops\"]\n").unwrap_err();
        assert!(err.to_string().contains("Invalid exclude glob pattern '[oops'"));
    }

    #[test]
    fn test_zero_cache_capacity() {
        let err = Config::parse("[veritas]\nversion = \"1\"\n[engine]\ncache_capacity = 0\n")
            .unwrap_err();
        assert!(err.to_string().contains("cache_capacity"));
    }

    #[test]
    fn test_unknown_section_value_type() {
        let result = Config::parse("[veritas]\nversion = \"1\"\n[output]\nrules = 3\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_crate_name_from_manifest() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("Cargo.toml"),
            "[package]\nname = \"shop-api\"\nversion = \"0.1.0\"\n",
        )
        .unwrap();
        let config = Config::default();
        assert_eq!(config.crate_name(dir.path()), "shop_api");
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, DEFAULT_CONFIG).unwrap();
        assert!(Config::load(&path).is_ok());
        assert!(matches!(
            Config::load(dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
