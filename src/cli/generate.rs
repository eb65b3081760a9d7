//! Gen command implementation
//!
//! Scans the source root (or the given paths) and writes a Rust module that
//! registers every extracted rule set.

use crate::cli::common::{self, CommandError, EXIT_SUCCESS};
use crate::codegen::CodeGenerator;
use std::path::PathBuf;

/// Run the gen command
///
/// # Arguments
///
/// * `paths` - Files or directories to scan; the configured root when empty
/// * `out` - Output file, `-` for stdout; `output.code` when `None`
/// * `crate_path` - Path the generated code uses to reach veritas
///
/// # Returns
///
/// Exit code:
/// - 0: Module written
/// - 2: Error, including invalid `validate` tags
/// - 3: Invalid veritas.toml
pub fn run_gen(paths: &[PathBuf], out: Option<PathBuf>, crate_path: &str) -> i32 {
    common::finish(run_gen_inner(paths, out, crate_path))
}

fn run_gen_inner(
    paths: &[PathBuf],
    out: Option<PathBuf>,
    crate_path: &str,
) -> Result<i32, CommandError> {
    let config = common::load_config()?;
    let extraction = common::extract(&config, paths)?;
    common::check_tags(&extraction)?;

    let code = CodeGenerator::new()
        .crate_path(crate_path)
        .render(&extraction.rule_sets, &extraction.descriptors);

    let out = out.unwrap_or(config.output.code);
    common::write_output(&out, &code)?;
    if out.as_os_str() != "-" {
        eprintln!(
            "Wrote registration for {} rule set(s) to {}",
            extraction.rule_sets.len(),
            out.display()
        );
    }
    Ok(EXIT_SUCCESS)
}
