#![forbid(unsafe_code)]

//! Rule registry
//!
//! The registry maps qualified type names to rule sets. A process-wide
//! instance backs the free functions [`register`], [`unregister`] and
//! [`unregister_all`], which generated registration code calls at startup.
//! Validators never read it directly; they take a snapshot through a
//! provider when they are built.

use crate::types::{RuleSet, RuleSets};
use parking_lot::RwLock;
use std::sync::LazyLock;
use tracing::debug;

/// Thread-safe mapping from qualified type name to rule set
#[derive(Debug, Default)]
pub struct RuleRegistry {
    rules: RwLock<RuleSets>,
}

impl RuleRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the rule set for `type_name`
    pub fn register(&self, type_name: impl Into<String>, rule_set: RuleSet) {
        let type_name = type_name.into();
        debug!(type_name = %type_name, rules = rule_set.rule_count(), "registered rule set");
        self.rules.write().insert(type_name, rule_set);
    }

    /// Removes the rule set for `type_name`, returning it if present
    pub fn unregister(&self, type_name: &str) -> Option<RuleSet> {
        self.rules.write().remove(type_name)
    }

    /// Removes every rule set
    pub fn unregister_all(&self) {
        self.rules.write().clear();
    }

    /// Returns a copy of the rule set for `type_name`
    pub fn get(&self, type_name: &str) -> Option<RuleSet> {
        self.rules.read().get(type_name).cloned()
    }

    /// Returns a copy of every registered rule set.
    ///
    /// Later changes to the registry do not affect the returned map.
    pub fn snapshot(&self) -> RuleSets {
        self.rules.read().clone()
    }

    /// Get the number of registered rule sets
    pub fn len(&self) -> usize {
        self.rules.read().len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.rules.read().is_empty()
    }
}

static GLOBAL: LazyLock<RuleRegistry> = LazyLock::new(RuleRegistry::new);

/// The process-wide registry
pub fn global() -> &'static RuleRegistry {
    &GLOBAL
}

/// Adds a rule set to the process-wide registry
pub fn register(type_name: impl Into<String>, rule_set: RuleSet) {
    GLOBAL.register(type_name, rule_set);
}

/// Removes a rule set from the process-wide registry
pub fn unregister(type_name: &str) {
    GLOBAL.unregister(type_name);
}

/// Clears the process-wide registry. Intended for tests.
pub fn unregister_all() {
    GLOBAL.unregister_all();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_get() {
        let registry = RuleRegistry::new();
        assert!(registry.is_empty());

        registry.register("app.User", RuleSet::new().with_type_rule("self.Age >= 18"));
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get("app.User").unwrap().type_rules,
            vec!["self.Age >= 18".to_string()]
        );
    }

    #[test]
    fn test_register_replaces() {
        let registry = RuleRegistry::new();
        registry.register("app.User", RuleSet::new().with_type_rule("true"));
        registry.register("app.User", RuleSet::new().with_type_rule("false"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("app.User").unwrap().type_rules, vec!["false".to_string()]);
    }

    #[test]
    fn test_unregister() {
        let registry = RuleRegistry::new();
        registry.register("app.A", RuleSet::new().with_type_rule("true"));
        registry.register("app.B", RuleSet::new().with_type_rule("true"));

        assert!(registry.unregister("app.A").is_some());
        assert!(registry.unregister("app.A").is_none());
        assert_eq!(registry.len(), 1);

        registry.unregister_all();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let registry = RuleRegistry::new();
        registry.register("app.A", RuleSet::new().with_type_rule("true"));
        let snapshot = registry.snapshot();
        registry.unregister_all();
        assert_eq!(snapshot.len(), 1);
        assert!(registry.is_empty());
    }
}
