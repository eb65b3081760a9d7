//! Rule providers
//!
//! A provider hands a validator the rule sets it should enforce. The
//! validator asks once, at construction time.

use super::registry::{self, RuleRegistry};
use crate::error::ProviderError;
use crate::types::RuleSets;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// A source of rule sets
pub trait RuleProvider: Send + Sync {
    /// Returns every rule set keyed by qualified type name
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` if the rules cannot be read or decoded.
    fn rule_sets(&self) -> Result<RuleSets, ProviderError>;
}

/// Reads a snapshot of a registry; the process-wide one by default
#[derive(Debug, Clone, Default)]
pub struct RegistryProvider {
    registry: Option<Arc<RuleRegistry>>,
}

impl RegistryProvider {
    /// A provider over the process-wide registry
    pub fn global() -> Self {
        Self::default()
    }

    /// A provider over an explicitly owned registry
    pub fn new(registry: Arc<RuleRegistry>) -> Self {
        Self {
            registry: Some(registry),
        }
    }
}

impl RuleProvider for RegistryProvider {
    fn rule_sets(&self) -> Result<RuleSets, ProviderError> {
        let snapshot = match &self.registry {
            Some(registry) => registry.snapshot(),
            None => registry::global().snapshot(),
        };
        Ok(snapshot)
    }
}

/// Loads rule sets from a JSON rule file
#[derive(Debug, Clone)]
pub struct JsonFileProvider {
    path: PathBuf,
}

impl JsonFileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RuleProvider for JsonFileProvider {
    fn rule_sets(&self) -> Result<RuleSets, ProviderError> {
        let bytes = fs::read(&self.path).map_err(|source| ProviderError::Read {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "loaded rule file");
        decode(&bytes)
    }
}

/// Decodes rule sets from an in-memory JSON document
#[derive(Debug, Clone)]
pub struct JsonBytesProvider {
    bytes: Vec<u8>,
}

impl JsonBytesProvider {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

impl RuleProvider for JsonBytesProvider {
    fn rule_sets(&self) -> Result<RuleSets, ProviderError> {
        decode(&self.bytes)
    }
}

/// Serves a fixed set of rule sets
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    rules: RuleSets,
}

impl StaticProvider {
    pub fn new(rules: RuleSets) -> Self {
        Self { rules }
    }
}

impl RuleProvider for StaticProvider {
    fn rule_sets(&self) -> Result<RuleSets, ProviderError> {
        Ok(self.rules.clone())
    }
}

impl<P: RuleProvider + ?Sized> RuleProvider for Arc<P> {
    fn rule_sets(&self) -> Result<RuleSets, ProviderError> {
        (**self).rule_sets()
    }
}

/// Parses the persisted rule format and rejects empty rule strings
///
/// # Errors
///
/// Returns `ProviderError::Decode` for malformed JSON and
/// `ProviderError::InvalidRuleSet` for empty rules.
pub fn decode(bytes: &[u8]) -> Result<RuleSets, ProviderError> {
    let rules: RuleSets = serde_json::from_slice(bytes)?;
    for (type_name, rule_set) in &rules {
        rule_set
            .check_non_empty()
            .map_err(|message| ProviderError::InvalidRuleSet {
                type_name: type_name.clone(),
                message,
            })?;
    }
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RuleSet;
    use std::io::Write;

    const RULES: &str = r#"{
        "app.User": {
            "typeRules": ["self.Age >= 18"],
            "fieldRules": {"Name": ["self != \"\""]}
        },
        "app.Item": {"fieldRules": {"Name": ["self != \"\""]}, "comment": "ignored"}
    }"#;

    #[test]
    fn test_bytes_provider() {
        let rules = JsonBytesProvider::new(RULES).rule_sets().unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules["app.User"].type_rules, vec!["self.Age >= 18".to_string()]);
        assert!(rules["app.Item"].type_rules.is_empty());
    }

    #[test]
    fn test_file_provider() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(RULES.as_bytes()).unwrap();
        let rules = JsonFileProvider::new(file.path()).rule_sets().unwrap();
        assert_eq!(rules["app.User"].rules_for("Name"), [r#"self != """#.to_string()]);
    }

    #[test]
    fn test_file_provider_missing_file() {
        let err = JsonFileProvider::new("/nonexistent/rules.json")
            .rule_sets()
            .unwrap_err();
        assert!(matches!(err, ProviderError::Read { .. }));
    }

    #[test]
    fn test_malformed_json() {
        let err = JsonBytesProvider::new("{not json").rule_sets().unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)));
    }

    #[test]
    fn test_empty_rule_rejected() {
        let err = JsonBytesProvider::new(r#"{"app.A": {"typeRules": [""]}}"#)
            .rule_sets()
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRuleSet { .. }));
    }

    #[test]
    fn test_registry_provider_snapshot() {
        let registry = Arc::new(RuleRegistry::new());
        registry.register("app.A", RuleSet::new().with_type_rule("true"));
        let provider = RegistryProvider::new(Arc::clone(&registry));
        let rules = provider.rule_sets().unwrap();
        registry.unregister_all();
        assert_eq!(rules.len(), 1);
    }
}
