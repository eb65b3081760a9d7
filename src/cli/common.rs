//! Common helper functions shared across CLI commands
//!
//! Configuration loading, extraction from the configured source root, output
//! destinations and the mapping from errors to exit codes.

use crate::cli::args::ColorChoice;
use crate::config::{CONFIG_FILE, Config};
use crate::error::{ConfigError, ExtractError, FatalError, ProviderError};
use crate::extract::{Extraction, Extractor};
use std::io::{self, IsTerminal, Write};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_ISSUES: i32 = 1;
pub const EXIT_ERROR: i32 = 2;
pub const EXIT_PARSE_ERROR: i32 = 3;

/// Errors surfaced by the extract, gen, list and lint commands
#[derive(Debug, thiserror::Error)]
pub(crate) enum CommandError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Rule file error: {0}")]
    Provider(#[from] ProviderError),

    #[error("{0}")]
    Fatal(#[from] FatalError),

    #[error("Failed to serialize rules: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{0} invalid validate tag(s)")]
    InvalidTags(usize),
}

impl CommandError {
    pub(crate) fn exit_code(&self) -> i32 {
        match self {
            CommandError::Config(ConfigError::Parse(_) | ConfigError::Validation(_)) => {
                EXIT_PARSE_ERROR
            }
            _ => EXIT_ERROR,
        }
    }
}

/// Reports `result` on stderr and turns it into an exit code
pub(crate) fn finish(result: Result<i32, CommandError>) -> i32 {
    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

/// Loads `veritas.toml` from the working directory
///
/// A missing file is not an error; the defaults apply.
///
/// # Errors
///
/// Returns `ConfigError::Parse` or `ConfigError::Validation` if the file
/// exists but is invalid.
pub(crate) fn load_config() -> Result<Config, ConfigError> {
    let path = Path::new(CONFIG_FILE);
    if !path.exists() {
        debug!("{} not found, using defaults", CONFIG_FILE);
        return Ok(Config::default());
    }
    Config::load(path)
}

/// Builds an extractor for the configured crate and source root
pub(crate) fn extractor(config: &Config) -> Extractor {
    Extractor::new(config.crate_name(Path::new(".")), &config.veritas.root)
        .include(config.veritas.include.clone())
        .exclude(config.veritas.exclude.clone())
}

/// Extracts from `paths`, or from the configured root when empty
///
/// # Errors
///
/// Returns `CommandError::Extract` if discovery fails.
pub(crate) fn extract(config: &Config, paths: &[PathBuf]) -> Result<Extraction, CommandError> {
    let extractor = extractor(config);
    let extraction = if paths.is_empty() {
        extractor.extract()?
    } else {
        extractor.extract_paths(paths)?
    };
    info!(
        rule_sets = extraction.rule_sets.len(),
        types = extraction.descriptors.len(),
        "extraction finished"
    );
    Ok(extraction)
}

/// Prints every tag error and fails when there was any
///
/// # Errors
///
/// Returns `CommandError::InvalidTags` when `extraction` carries tag errors.
pub(crate) fn check_tags(extraction: &Extraction) -> Result<(), CommandError> {
    for error in &extraction.tag_errors {
        eprintln!("error: {}", error);
    }
    match extraction.tag_errors.len() {
        0 => Ok(()),
        n => Err(CommandError::InvalidTags(n)),
    }
}

/// Writes `content` to `out`, or to stdout when `out` is `-`
///
/// # Errors
///
/// Returns `CommandError::Write` if the file or its parent directory cannot
/// be created.
pub(crate) fn write_output(out: &Path, content: &str) -> Result<(), CommandError> {
    if out == Path::new("-") {
        let mut stdout = io::stdout().lock();
        stdout.write_all(content.as_bytes())?;
        stdout.flush()?;
        return Ok(());
    }

    let write_err = |source| CommandError::Write {
        path: out.to_path_buf(),
        source,
    };
    if let Some(parent) = out.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    fs::write(out, content).map_err(write_err)
}

/// Resolves `--color` for stdout
pub(crate) fn color_choice(choice: ColorChoice) -> termcolor::ColorChoice {
    match choice {
        ColorChoice::Always => termcolor::ColorChoice::Always,
        ColorChoice::Never => termcolor::ColorChoice::Never,
        ColorChoice::Auto if io::stdout().is_terminal() => termcolor::ColorChoice::Auto,
        ColorChoice::Auto => termcolor::ColorChoice::Never,
    }
}
