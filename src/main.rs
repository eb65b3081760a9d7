//! Veritas CLI entry point

use clap::Parser;
use std::process;
use tracing_subscriber::EnvFilter;
use veritas::cli::{Command, args::Cli};

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = match cli.command {
        Command::Init { force } => match veritas::cli::init::run_init(force) {
            Ok(result) => {
                if result.skipped.is_empty() {
                    println!("Created veritas.toml.");
                } else {
                    println!("veritas.toml already exists. Use --force to overwrite it.");
                }
                0
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                2
            }
        },
        Command::Extract { paths, out } => veritas::cli::extract::run_extract(&paths, out),
        Command::Gen {
            paths,
            out,
            crate_path,
        } => veritas::cli::generate::run_gen(&paths, out, &crate_path),
        Command::List { format } => veritas::cli::list::run_list(format, cli.color),
        Command::Lint {
            rules,
            paths,
            format,
        } => veritas::cli::lint::run_lint(rules.as_deref(), &paths, format, cli.color),
    };

    process::exit(exit_code);
}

/// Logs to stderr; `RUST_LOG` wins over `--verbose`
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
