//! Lint command implementation
//!
//! Lints either a JSON rule file (`--rules`) or the freshly extracted rule
//! sets. Structs discovered in the scanned sources provide the field names
//! that field rules are checked against.

use crate::cli::args::{ColorChoice, OutputFormat};
use crate::cli::common::{self, CommandError, EXIT_ISSUES, EXIT_SUCCESS};
use crate::engine::Engine;
use crate::error::ExtractError;
use crate::lint::{LintIssue, LintKind, Linter};
use crate::output::{HumanFormatter, JsonlFormatter};
use crate::rules::{JsonFileProvider, RuleProvider};
use std::path::{Path, PathBuf};

/// Run the lint command
///
/// # Arguments
///
/// * `rules` - JSON rule file to lint; extracted rules when `None`
/// * `paths` - Files or directories to scan; the configured root when empty
/// * `format` - Output format
/// * `color` - Color choice for human output
///
/// # Returns
///
/// Exit code:
/// - 0: No issues
/// - 1: Issues found
/// - 2: Error
/// - 3: Invalid veritas.toml
pub fn run_lint(
    rules: Option<&Path>,
    paths: &[PathBuf],
    format: OutputFormat,
    color: ColorChoice,
) -> i32 {
    common::finish(run_lint_inner(rules, paths, format, color))
}

fn run_lint_inner(
    rules: Option<&Path>,
    paths: &[PathBuf],
    format: OutputFormat,
    color: ColorChoice,
) -> Result<i32, CommandError> {
    let config = common::load_config()?;
    let extraction = common::extract(&config, paths)?;

    let rule_sets = match rules {
        Some(path) => JsonFileProvider::new(path).rule_sets()?,
        None => extraction.rule_sets.clone(),
    };

    let linter = Linter::new(Engine::with_config(&config.engine));
    let mut issues = linter.lint(&rule_sets, &extraction.descriptors)?;
    if rules.is_none() {
        let tag_issues: Vec<LintIssue> = extraction
            .tag_errors
            .iter()
            .filter_map(|e| match e {
                ExtractError::Tag {
                    type_name,
                    field,
                    message,
                } => Some(LintIssue {
                    kind: LintKind::InvalidTag,
                    type_name: type_name.clone(),
                    field: Some(field.clone()),
                    message: message.clone(),
                }),
                _ => None,
            })
            .collect();
        // `required` misuse is already reported by the linter
        for issue in tag_issues {
            let reported = issues
                .iter()
                .any(|i| i.type_name == issue.type_name && i.field == issue.field);
            if !reported {
                issues.push(issue);
            }
        }
        issues.sort_by(|a, b| (&a.type_name, &a.field).cmp(&(&b.type_name, &b.field)));
    }

    match format {
        OutputFormat::Human => {
            HumanFormatter::new(common::color_choice(color)).print_lint(&issues)?;
        }
        OutputFormat::Jsonl => print!("{}", JsonlFormatter::new().format_lint(&issues)),
    }

    Ok(if issues.is_empty() {
        EXIT_SUCCESS
    } else {
        EXIT_ISSUES
    })
}
