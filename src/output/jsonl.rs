#![forbid(unsafe_code)]

//! JSONL output formatter for machine-readable output
//!
//! One JSON object per line, records first and a single trailing status
//! record, all in a deterministic order.

use crate::lint::{LintIssue, LintKind};
use crate::types::RuleSets;
use serde::Serialize;
use std::collections::BTreeMap;

/// JSONL output formatter
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonlFormatter;

impl JsonlFormatter {
    pub fn new() -> Self {
        JsonlFormatter
    }

    /// One `rule_set` record per key in key order, then a `status` record
    pub fn format_rule_sets(&self, rule_sets: &RuleSets) -> String {
        let mut output = String::new();
        let mut rules = 0;
        for (key, rule_set) in rule_sets {
            rules += rule_set.rule_count();
            push_line(
                &mut output,
                &RuleSetRecord {
                    record_type: "rule_set",
                    key,
                    type_rules: &rule_set.type_rules,
                    field_rules: &rule_set.field_rules,
                },
            );
        }
        push_line(
            &mut output,
            &ListStatusRecord {
                record_type: "status",
                rule_sets: rule_sets.len(),
                rules,
            },
        );
        output
    }

    /// One `issue` record per lint issue, then a `status` record
    pub fn format_lint(&self, issues: &[LintIssue]) -> String {
        let mut output = String::new();
        for issue in issues {
            push_line(
                &mut output,
                &IssueRecord {
                    record_type: "issue",
                    kind: issue.kind,
                    type_name: &issue.type_name,
                    field: issue.field.as_deref(),
                    message: &issue.message,
                },
            );
        }
        push_line(
            &mut output,
            &LintStatusRecord {
                record_type: "status",
                passed: issues.is_empty(),
                issues: issues.len(),
            },
        );
        output
    }
}

fn push_line<T: Serialize>(output: &mut String, record: &T) {
    if let Ok(json) = serde_json::to_string(record) {
        output.push_str(&json);
        output.push('\n');
    }
}

#[derive(Debug, Serialize)]
struct RuleSetRecord<'a> {
    #[serde(rename = "type")]
    record_type: &'static str,
    key: &'a str,
    type_rules: &'a [String],
    field_rules: &'a BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Serialize)]
struct ListStatusRecord {
    #[serde(rename = "type")]
    record_type: &'static str,
    rule_sets: usize,
    rules: usize,
}

#[derive(Debug, Serialize)]
struct IssueRecord<'a> {
    #[serde(rename = "type")]
    record_type: &'static str,
    kind: LintKind,
    type_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'a str>,
    message: &'a str,
}

#[derive(Debug, Serialize)]
struct LintStatusRecord {
    #[serde(rename = "type")]
    record_type: &'static str,
    passed: bool,
    issues: usize,
}
