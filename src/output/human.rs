#![forbid(unsafe_code)]

//! Human-readable output formatter
//!
//! Writes through a [`termcolor::WriteColor`] so the same code renders to a
//! colored terminal, a plain pipe, or an in-memory buffer in tests.

use crate::lint::LintIssue;
use crate::types::RuleSets;
use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Human-readable formatter
#[derive(Debug, Clone, Copy)]
pub struct HumanFormatter {
    color: ColorChoice,
}

impl HumanFormatter {
    pub fn new(color: ColorChoice) -> Self {
        Self { color }
    }

    /// Writes one block per rule set: the key, then its type and field rules
    ///
    /// # Errors
    ///
    /// Returns any I/O error from `w`.
    pub fn write_rule_sets<W: WriteColor>(&self, w: &mut W, rule_sets: &RuleSets) -> io::Result<()> {
        let total: usize = rule_sets.values().map(|r| r.rule_count()).sum();
        writeln!(w, "Rule sets ({}, {} rules):", rule_sets.len(), total)?;

        for (key, rule_set) in rule_sets {
            writeln!(w)?;
            w.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)).set_bold(true))?;
            write!(w, "{}", key)?;
            w.reset()?;
            writeln!(w)?;

            for rule in &rule_set.type_rules {
                w.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)))?;
                write!(w, "  (type)")?;
                w.reset()?;
                writeln!(w, " {}", rule)?;
            }
            for (field, rules) in &rule_set.field_rules {
                for rule in rules {
                    w.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
                    write!(w, "  {}", field)?;
                    w.reset()?;
                    writeln!(w, " {}", rule)?;
                }
            }
        }
        Ok(())
    }

    /// Writes one line per lint issue followed by a summary line
    ///
    /// # Errors
    ///
    /// Returns any I/O error from `w`.
    pub fn write_lint<W: WriteColor>(&self, w: &mut W, issues: &[LintIssue]) -> io::Result<()> {
        for issue in issues {
            w.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
            write!(w, "error")?;
            w.reset()?;
            writeln!(w, ": {}", issue)?;
        }

        if issues.is_empty() {
            w.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
            write!(w, "✓")?;
            w.reset()?;
            writeln!(w, " No issues found")
        } else {
            writeln!(w)?;
            w.set_color(ColorSpec::new().set_fg(Some(Color::Red)))?;
            write!(w, "✗")?;
            w.reset()?;
            writeln!(
                w,
                " {} issue{} found",
                issues.len(),
                if issues.len() == 1 { "" } else { "s" }
            )
        }
    }

    pub fn print_rule_sets(&self, rule_sets: &RuleSets) -> io::Result<()> {
        let mut stdout = StandardStream::stdout(self.color);
        self.write_rule_sets(&mut stdout, rule_sets)?;
        stdout.flush()
    }

    pub fn print_lint(&self, issues: &[LintIssue]) -> io::Result<()> {
        let mut stdout = StandardStream::stdout(self.color);
        self.write_lint(&mut stdout, issues)?;
        stdout.flush()
    }
}
