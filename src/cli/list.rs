//! List command implementation
//!
//! Extracts the configured source root and prints every discovered rule set
//! in human-readable or JSONL form. Invalid tags are reported as warnings.

use crate::cli::args::{ColorChoice, OutputFormat};
use crate::cli::common::{self, CommandError, EXIT_SUCCESS};
use crate::output::{HumanFormatter, JsonlFormatter};

/// Run the list command
///
/// # Returns
///
/// Exit code:
/// - 0: Success
/// - 2: Error
/// - 3: Invalid veritas.toml
pub fn run_list(format: OutputFormat, color: ColorChoice) -> i32 {
    common::finish(run_list_inner(format, color))
}

fn run_list_inner(format: OutputFormat, color: ColorChoice) -> Result<i32, CommandError> {
    let config = common::load_config()?;
    let extraction = common::extract(&config, &[])?;
    for error in &extraction.tag_errors {
        eprintln!("warning: {}", error);
    }

    match format {
        OutputFormat::Human => {
            if extraction.rule_sets.is_empty() {
                println!("No rule sets found under {}.", config.veritas.root.display());
            } else {
                HumanFormatter::new(common::color_choice(color))
                    .print_rule_sets(&extraction.rule_sets)?;
            }
        }
        OutputFormat::Jsonl => {
            print!(
                "{}",
                JsonlFormatter::new().format_rule_sets(&extraction.rule_sets)
            );
        }
    }
    Ok(EXIT_SUCCESS)
}
