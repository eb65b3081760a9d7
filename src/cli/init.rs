//! Initialize a veritas project
//!
//! Writes a default `veritas.toml` into the working directory.

use crate::config::{CONFIG_FILE, DEFAULT_CONFIG};
use std::fs;
use std::path::Path;

/// Error type for init command
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Path error
    #[error("Path error: {0}")]
    Path(String),
}

/// Result of init command
#[derive(Debug, Default, PartialEq, Eq)]
pub struct InitResult {
    /// Files that were created
    pub created: Vec<String>,
    /// Files that were skipped (already existed)
    pub skipped: Vec<String>,
    /// Files that were overwritten
    pub overwritten: Vec<String>,
}

/// Run the init command in the current directory
///
/// # Arguments
/// * `force` - If true, overwrite an existing `veritas.toml`
///
/// # Errors
///
/// Returns `InitError` if the file cannot be written.
pub fn run_init(force: bool) -> Result<InitResult, InitError> {
    run_init_in(Path::new("."), force)
}

/// Run the init command in `dir`
///
/// # Errors
///
/// Returns `InitError::Path` if `dir` is not a directory and
/// `InitError::Io` if the file cannot be written.
pub fn run_init_in(dir: &Path, force: bool) -> Result<InitResult, InitError> {
    if !dir.is_dir() {
        return Err(InitError::Path(format!(
            "'{}' is not a directory",
            dir.display()
        )));
    }

    let mut result = InitResult::default();
    let path = dir.join(CONFIG_FILE);

    if path.exists() {
        if force {
            fs::write(&path, DEFAULT_CONFIG)?;
            result.overwritten.push(CONFIG_FILE.to_string());
        } else {
            result.skipped.push(CONFIG_FILE.to_string());
        }
    } else {
        fs::write(&path, DEFAULT_CONFIG)?;
        result.created.push(CONFIG_FILE.to_string());
    }

    Ok(result)
}
