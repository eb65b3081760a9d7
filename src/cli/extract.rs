//! Extract command implementation
//!
//! Scans the source root (or the given paths) and writes the rule sets as
//! the JSON rule file read by [`crate::rules::JsonFileProvider`].

use crate::cli::common::{self, CommandError, EXIT_SUCCESS};
use std::path::PathBuf;

/// Run the extract command
///
/// # Arguments
///
/// * `paths` - Files or directories to scan; the configured root when empty
/// * `out` - Output file, `-` for stdout; `output.rules` when `None`
///
/// # Returns
///
/// Exit code:
/// - 0: Rule file written
/// - 2: Error, including invalid `validate` tags
/// - 3: Invalid veritas.toml
pub fn run_extract(paths: &[PathBuf], out: Option<PathBuf>) -> i32 {
    common::finish(run_extract_inner(paths, out))
}

fn run_extract_inner(paths: &[PathBuf], out: Option<PathBuf>) -> Result<i32, CommandError> {
    let config = common::load_config()?;
    let extraction = common::extract(&config, paths)?;
    common::check_tags(&extraction)?;

    let mut json = serde_json::to_string_pretty(&extraction.rule_sets)?;
    json.push('\n');

    let out = out.unwrap_or(config.output.rules);
    common::write_output(&out, &json)?;
    if out.as_os_str() != "-" {
        eprintln!(
            "Wrote {} rule set(s) to {}",
            extraction.rule_sets.len(),
            out.display()
        );
    }
    Ok(EXIT_SUCCESS)
}
