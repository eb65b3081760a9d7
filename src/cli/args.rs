//! CLI argument parsing using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for veritas commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON Lines format (one JSON object per line)
    Jsonl,
}

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Color when stdout is a terminal
    Auto,
    /// Always use color
    Always,
    /// Never use color
    Never,
}

/// Veritas CLI main entry point
#[derive(Parser, Debug)]
#[command(name = "veritas")]
#[command(about = "Declarative CEL validation rules for Rust structs")]
#[command(version)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Output coloring
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available veritas subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a default veritas.toml
    Init {
        /// Overwrite an existing veritas.toml
        #[arg(long)]
        force: bool,
    },

    /// Extract rule sets from source files into a JSON rule file
    Extract {
        /// Files or directories to scan (defaults to the configured root)
        paths: Vec<PathBuf>,

        /// Output file, `-` for stdout (defaults to output.rules)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Generate a Rust module registering the extracted rule sets
    Gen {
        /// Files or directories to scan (defaults to the configured root)
        paths: Vec<PathBuf>,

        /// Output file, `-` for stdout (defaults to output.code)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Path the generated code uses to reach veritas
        #[arg(long, default_value = "veritas")]
        crate_path: String,
    },

    /// List the rule sets discovered in the configured root
    List {
        /// Output format
        #[arg(short, long, default_value = "human")]
        format: OutputFormat,
    },

    /// Check that every rule compiles and names an existing field
    Lint {
        /// Lint a JSON rule file instead of freshly extracted rules
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Files or directories to scan (defaults to the configured root)
        paths: Vec<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "human")]
        format: OutputFormat,
    },
}
