#![forbid(unsafe_code)]

//! Core domain types for Veritas
//!
//! This module defines the rule model shared by the extractor, the registry
//! and the validator: rule sets keyed by qualified type name, the field
//! categories used to pick shorthand expansions, and the type descriptors
//! produced while scanning source files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Validation rules attached to one named record type.
///
/// Serialized in the persisted rule file as
/// `{"typeRules": [...], "fieldRules": {"Field": [...]}}`. Missing arrays
/// deserialize as empty and unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    /// Expressions evaluated with `self` bound to the whole record
    #[serde(default)]
    pub type_rules: Vec<String>,

    /// Expressions evaluated with `self` bound to a single field value
    #[serde(default)]
    pub field_rules: BTreeMap<String, Vec<String>>,
}

impl RuleSet {
    /// Creates an empty rule set
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a type-level rule
    pub fn with_type_rule(mut self, rule: impl Into<String>) -> Self {
        self.type_rules.push(rule.into());
        self
    }

    /// Appends a field-level rule
    pub fn with_field_rule(mut self, field: impl Into<String>, rule: impl Into<String>) -> Self {
        self.field_rules
            .entry(field.into())
            .or_default()
            .push(rule.into());
        self
    }

    /// Returns true if the set carries no rules at all
    pub fn is_empty(&self) -> bool {
        self.type_rules.is_empty() && self.field_rules.values().all(Vec::is_empty)
    }

    /// Total number of rule strings in this set
    pub fn rule_count(&self) -> usize {
        self.type_rules.len() + self.field_rules.values().map(Vec::len).sum::<usize>()
    }

    /// Returns the rules for a field, or an empty slice
    pub fn rules_for(&self, field: &str) -> &[String] {
        self.field_rules.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Merges another rule set into this one.
    ///
    /// Type rules are appended. Field rules of `other` replace any existing
    /// entry for the same field name.
    pub fn merge(&mut self, other: RuleSet) {
        self.type_rules.extend(other.type_rules);
        for (field, rules) in other.field_rules {
            self.field_rules.insert(field, rules);
        }
    }

    /// Checks that no rule string is empty or whitespace only
    pub fn check_non_empty(&self) -> Result<(), String> {
        if self.type_rules.iter().any(|r| r.trim().is_empty()) {
            return Err("empty type rule".to_string());
        }
        for (field, rules) in &self.field_rules {
            if rules.iter().any(|r| r.trim().is_empty()) {
                return Err(format!("empty rule for field '{}'", field));
            }
        }
        Ok(())
    }
}

/// Rule sets keyed by qualified type name (`<module path>.<TypeName>`).
///
/// A `BTreeMap` keeps serialization sorted so repeated extraction produces
/// byte-identical output.
pub type RuleSets = BTreeMap<String, RuleSet>;

/// Field category used to select a shorthand expansion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldCategory {
    String,
    Int,
    Uint,
    Float,
    Bool,
    Ptr,
    Slice,
    Map,
    Other,
}

impl FieldCategory {
    /// Returns the lowercase category name
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldCategory::String => "string",
            FieldCategory::Int => "int",
            FieldCategory::Uint => "uint",
            FieldCategory::Float => "float",
            FieldCategory::Bool => "bool",
            FieldCategory::Ptr => "ptr",
            FieldCategory::Slice => "slice",
            FieldCategory::Map => "map",
            FieldCategory::Other => "other",
        }
    }
}

impl fmt::Display for FieldCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved field type: its category plus element/key types for containers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldType {
    /// Category of the (dereferenced) field type
    pub category: FieldCategory,

    /// Source text of the type as written
    pub display: String,

    /// Element type for slices, value type for maps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elem: Option<Box<FieldType>>,

    /// Key type for maps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Box<FieldType>>,
}

impl FieldType {
    /// Creates a leaf type with no element or key types
    pub fn leaf(category: FieldCategory, display: impl Into<String>) -> Self {
        Self {
            category,
            display: display.into(),
            elem: None,
            key: None,
        }
    }

    /// Creates a slice type
    pub fn slice(display: impl Into<String>, elem: FieldType) -> Self {
        Self {
            category: FieldCategory::Slice,
            display: display.into(),
            elem: Some(Box::new(elem)),
            key: None,
        }
    }

    /// Creates a map type
    pub fn map(display: impl Into<String>, key: FieldType, value: FieldType) -> Self {
        Self {
            category: FieldCategory::Map,
            display: display.into(),
            elem: Some(Box::new(value)),
            key: Some(Box::new(key)),
        }
    }
}

/// A field discovered on a record type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field name as declared
    pub name: String,

    /// Resolved type of the field
    pub ty: FieldType,

    /// Raw `validate` tag value, if present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// A record type discovered by the extractor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    /// Module path the type lives in, e.g. `my_crate::models`
    pub module_path: String,

    /// Last segment of the module path
    pub module_name: String,

    /// Type name without generic parameters
    pub type_name: String,

    /// Declared generic type parameter names
    #[serde(default)]
    pub type_params: Vec<String>,

    /// Fields in declaration order
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

impl TypeDescriptor {
    /// Returns the registry key for this type.
    ///
    /// Generic types keep their parameter names: `my_crate::m.Pair[K, V]`.
    pub fn qualified_name(&self) -> String {
        qualified_name(&self.module_path, &self.type_name, &self.type_params)
    }
}

/// Builds a registry key from its parts
pub fn qualified_name(module_path: &str, type_name: &str, type_params: &[String]) -> String {
    if type_params.is_empty() {
        format!("{}.{}", module_path, type_name)
    } else {
        format!("{}.{}[{}]", module_path, type_name, type_params.join(", "))
    }
}

/// A validated glob pattern for file matching
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlobPattern(String);

impl GlobPattern {
    /// Creates a new GlobPattern
    pub fn new(pattern: impl Into<String>) -> Self {
        GlobPattern(pattern.into())
    }

    /// Returns the pattern as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GlobPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_set_json_names() {
        let set = RuleSet::new()
            .with_type_rule("self.Age >= 18")
            .with_field_rule("Name", "self != \"\"");
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(
            json,
            r#"{"typeRules":["self.Age >= 18"],"fieldRules":{"Name":["self != \"\""]}}"#
        );
    }

    #[test]
    fn test_rule_set_missing_arrays_default() {
        let set: RuleSet = serde_json::from_str(r#"{"unknown": 1}"#).unwrap();
        assert!(set.is_empty());
        assert_eq!(set.rule_count(), 0);
    }

    #[test]
    fn test_rule_set_merge_last_writer_wins() {
        let mut outer = RuleSet::new().with_field_rule("ID", "self != 0");
        let inner = RuleSet::new()
            .with_type_rule("true")
            .with_field_rule("ID", "self > 1");
        outer.merge(inner);
        assert_eq!(outer.rules_for("ID"), ["self > 1".to_string()]);
        assert_eq!(outer.type_rules, vec!["true".to_string()]);
    }

    #[test]
    fn test_check_non_empty() {
        let set = RuleSet::new().with_field_rule("Name", "  ");
        assert!(set.check_non_empty().is_err());
        assert!(RuleSet::new().with_type_rule("true").check_non_empty().is_ok());
    }

    #[test]
    fn test_qualified_name() {
        assert_eq!(qualified_name("app::models", "User", &[]), "app::models.User");
        assert_eq!(
            qualified_name("app", "Pair", &["K".to_string(), "V".to_string()]),
            "app.Pair[K, V]"
        );
    }

    #[test]
    fn test_field_category_serde() {
        let json = serde_json::to_string(&FieldCategory::Ptr).unwrap();
        assert_eq!(json, "\"ptr\"");
        assert_eq!(FieldCategory::Slice.to_string(), "slice");
    }
}
