#![forbid(unsafe_code)]

//! Rule linter
//!
//! Checks extracted or hand-written rule sets before they reach a
//! validator: every rule must compile, field rules must name fields that
//! exist on the discovered struct, and `required` only makes sense on
//! optional fields.

use crate::cel::Type;
use crate::engine::Engine;
use crate::error::FatalError;
use crate::types::{FieldCategory, RuleSets, TypeDescriptor};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// What a lint issue is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LintKind {
    /// A type rule does not compile
    InvalidTypeRule,
    /// A field rule does not compile
    InvalidFieldRule,
    /// A field rule names a field the struct does not declare
    UnknownField,
    /// `required` on a field that is not an `Option`
    RequiredNotOptional,
    /// A `validate` tag that could not be translated
    InvalidTag,
}

/// A single lint finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LintIssue {
    pub kind: LintKind,
    /// Rule set key
    pub type_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl fmt::Display for LintIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{}.{}: {}", self.type_name, field, self.message),
            None => write!(f, "{}: {}", self.type_name, self.message),
        }
    }
}

/// Lints rule sets against the types they were extracted from
#[derive(Debug, Clone, Default)]
pub struct Linter {
    engine: Engine,
}

impl Linter {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// Runs every check and returns the issues sorted by rule set key
    ///
    /// # Errors
    ///
    /// Returns `FatalError` if the lint environment cannot be created.
    pub fn lint(
        &self,
        rule_sets: &RuleSets,
        descriptors: &[TypeDescriptor],
    ) -> Result<Vec<LintIssue>, FatalError> {
        let env = self
            .engine
            .environment()
            .variable("self", Type::Dyn)
            .build()
            .map_err(|e| FatalError::new(format!("failed to create lint environment: {}", e)))?;

        let by_key: HashMap<String, &TypeDescriptor> = descriptors
            .iter()
            .map(|d| (d.qualified_name(), d))
            .collect();

        let mut issues = Vec::new();
        for (key, rule_set) in rule_sets {
            debug!(key = %key, rules = rule_set.rule_count(), "linting rule set");
            for rule in &rule_set.type_rules {
                if let Err(e) = self.engine.compile(&env, rule) {
                    issues.push(LintIssue {
                        kind: LintKind::InvalidTypeRule,
                        type_name: key.clone(),
                        field: None,
                        message: format!("invalid type rule `{}`: {}", rule, e),
                    });
                }
            }

            let descriptor = by_key.get(key);
            for (field, rules) in &rule_set.field_rules {
                for rule in rules {
                    if let Err(e) = self.engine.compile(&env, rule) {
                        issues.push(LintIssue {
                            kind: LintKind::InvalidFieldRule,
                            type_name: key.clone(),
                            field: Some(field.clone()),
                            message: format!("invalid field rule `{}`: {}", rule, e),
                        });
                    }
                }
                if let Some(descriptor) = descriptor
                    && !descriptor.fields.iter().any(|f| &f.name == field)
                {
                    issues.push(LintIssue {
                        kind: LintKind::UnknownField,
                        type_name: key.clone(),
                        field: Some(field.clone()),
                        message: format!("field {} does not exist in struct {}", field, descriptor.type_name),
                    });
                }
            }
        }

        for descriptor in descriptors {
            for field in &descriptor.fields {
                let required = field
                    .tag
                    .as_deref()
                    .is_some_and(|tag| tag.split(',').any(|t| t.trim() == "required"));
                if required && field.ty.category != FieldCategory::Ptr {
                    issues.push(LintIssue {
                        kind: LintKind::RequiredNotOptional,
                        type_name: descriptor.qualified_name(),
                        field: Some(field.name.clone()),
                        message: format!(
                            "'required' can only be used with Option types, found {}",
                            field.ty.display
                        ),
                    });
                }
            }
        }

        issues.sort_by(|a, b| (&a.type_name, &a.field).cmp(&(&b.type_name, &b.field)));
        Ok(issues)
    }
}

/// Lints with a default engine
///
/// # Errors
///
/// Returns `FatalError` if the lint environment cannot be created.
pub fn lint(rule_sets: &RuleSets, descriptors: &[TypeDescriptor]) -> Result<Vec<LintIssue>, FatalError> {
    Linter::default().lint(rule_sets, descriptors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldDescriptor, FieldType, RuleSet};

    fn user_descriptor(tag: Option<&str>, category: FieldCategory) -> TypeDescriptor {
        TypeDescriptor {
            module_path: "app".into(),
            module_name: "app".into(),
            type_name: "User".into(),
            type_params: Vec::new(),
            fields: vec![FieldDescriptor {
                name: "name".into(),
                ty: FieldType::leaf(category, "String"),
                tag: tag.map(str::to_string),
            }],
        }
    }

    #[test]
    fn test_clean_rules_have_no_issues() {
        let mut rules = RuleSets::new();
        rules.insert(
            "app.User".into(),
            RuleSet::new()
                .with_type_rule("self.name != ''")
                .with_field_rule("name", "self.size() > 0 && strings.ToUpper(self) != ''"),
        );
        let issues = lint(&rules, &[user_descriptor(Some("nonzero"), FieldCategory::String)]).unwrap();
        assert!(issues.is_empty(), "{:?}", issues);
    }

    #[test]
    fn test_reports_compile_failures() {
        let mut rules = RuleSets::new();
        rules.insert(
            "app.User".into(),
            RuleSet::new()
                .with_type_rule("self.name ==")
                .with_field_rule("name", "nosuch(self)"),
        );
        let issues = lint(&rules, &[]).unwrap();
        let kinds: Vec<LintKind> = issues.iter().map(|i| i.kind).collect();
        assert_eq!(kinds, vec![LintKind::InvalidTypeRule, LintKind::InvalidFieldRule]);
        assert_eq!(issues[1].field.as_deref(), Some("name"));
    }

    #[test]
    fn test_reports_unknown_fields() {
        let mut rules = RuleSets::new();
        rules.insert(
            "app.User".into(),
            RuleSet::new().with_field_rule("Email", "self != ''"),
        );
        let issues = lint(&rules, &[user_descriptor(None, FieldCategory::String)]).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, LintKind::UnknownField);
        assert_eq!(issues[0].to_string(), "app.User.Email: field Email does not exist in struct User");
    }

    #[test]
    fn test_required_on_non_optional() {
        let issues = lint(
            &RuleSets::new(),
            &[user_descriptor(Some("nonzero, required"), FieldCategory::String)],
        )
        .unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, LintKind::RequiredNotOptional);

        let issues = lint(
            &RuleSets::new(),
            &[user_descriptor(Some("required"), FieldCategory::Ptr)],
        )
        .unwrap();
        assert!(issues.is_empty());
    }
}
