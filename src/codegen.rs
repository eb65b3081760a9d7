#![forbid(unsafe_code)]

//! Registration code generator
//!
//! Renders extracted rule sets as a Rust module that registers them with the
//! global registry at startup, so an application can ship its rules compiled
//! in instead of reading a rule file:
//!
//! ```text
//! pub fn register_rules() { veritas::register("app.User", veritas::RuleSet { .. }); }
//! pub fn known_types() -> &'static [&'static str] { &["app.User"] }
//! ```
//!
//! Keys and field names are emitted in sorted order and rules as raw string
//! literals, so the output is stable across runs.

use crate::types::{RuleSet, RuleSets, TypeDescriptor};
use std::fmt::Write as _;
use std::io;

const HEADER: &str = "// @generated by veritas. Do not edit by hand.";

/// Writes registration modules
#[derive(Debug, Clone)]
pub struct CodeGenerator {
    crate_path: String,
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeGenerator {
    pub fn new() -> Self {
        Self {
            crate_path: "veritas".to_string(),
        }
    }

    /// Path the generated code uses to reach this library, for crates that
    /// re-export it under another name
    pub fn crate_path(mut self, path: impl Into<String>) -> Self {
        self.crate_path = path.into();
        self
    }

    /// Renders the module source
    pub fn render(&self, rule_sets: &RuleSets, descriptors: &[TypeDescriptor]) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail
        let _ = self.write_module(&mut out, rule_sets, descriptors);
        out
    }

    /// Writes the module to `writer`
    ///
    /// # Errors
    ///
    /// Returns any I/O error from `writer`.
    pub fn generate<W: io::Write>(
        &self,
        rule_sets: &RuleSets,
        descriptors: &[TypeDescriptor],
        writer: &mut W,
    ) -> io::Result<()> {
        writer.write_all(self.render(rule_sets, descriptors).as_bytes())
    }

    fn write_module(
        &self,
        out: &mut String,
        rule_sets: &RuleSets,
        descriptors: &[TypeDescriptor],
    ) -> std::fmt::Result {
        writeln!(out, "{}", HEADER)?;
        writeln!(out)?;
        writeln!(out, "/// Registers every extracted rule set with the global registry")?;
        writeln!(out, "pub fn register_rules() {{")?;
        for (key, rule_set) in rule_sets {
            self.write_register(out, key, rule_set)?;
        }
        writeln!(out, "}}")?;
        writeln!(out)?;

        let mut known: Vec<String> = descriptors.iter().map(TypeDescriptor::qualified_name).collect();
        known.sort();
        known.dedup();
        writeln!(out, "/// Qualified names of every type with extracted rules")?;
        writeln!(out, "pub fn known_types() -> &'static [&'static str] {{")?;
        if known.is_empty() {
            writeln!(out, "    &[]")?;
        } else {
            writeln!(out, "    &[")?;
            for name in &known {
                writeln!(out, "        {:?},", name)?;
            }
            writeln!(out, "    ]")?;
        }
        writeln!(out, "}}")
    }

    fn write_register(&self, out: &mut String, key: &str, rule_set: &RuleSet) -> std::fmt::Result {
        let krate = &self.crate_path;
        writeln!(out, "    {}::register(", krate)?;
        writeln!(out, "        {:?},", key)?;
        writeln!(out, "        {}::RuleSet {{", krate)?;

        if rule_set.type_rules.is_empty() {
            writeln!(out, "            type_rules: Vec::new(),")?;
        } else {
            writeln!(out, "            type_rules: vec![")?;
            for rule in &rule_set.type_rules {
                writeln!(out, "                {}.to_string(),", raw_literal(rule))?;
            }
            writeln!(out, "            ],")?;
        }

        if rule_set.field_rules.is_empty() {
            writeln!(out, "            field_rules: ::std::collections::BTreeMap::new(),")?;
        } else {
            writeln!(out, "            field_rules: ::std::collections::BTreeMap::from([")?;
            for (field, rules) in &rule_set.field_rules {
                writeln!(out, "                (")?;
                writeln!(out, "                    {:?}.to_string(),", field)?;
                writeln!(out, "                    vec![")?;
                for rule in rules {
                    writeln!(out, "                        {}.to_string(),", raw_literal(rule))?;
                }
                writeln!(out, "                    ],")?;
                writeln!(out, "                ),")?;
            }
            writeln!(out, "            ]),")?;
        }

        writeln!(out, "        }},")?;
        writeln!(out, "    );")
    }
}

/// Quotes `s` as a raw string literal with enough `#` to contain it
fn raw_literal(s: &str) -> String {
    let mut fence = String::from("#");
    while s.contains(&format!("\"{}", fence)) {
        fence.push('#');
    }
    format!("r{fence}\"{s}\"{fence}")
}
