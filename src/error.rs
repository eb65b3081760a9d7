//! Error types for Veritas
//!
//! Two families live here. Build-time and construction errors
//! (`ConfigError`, `ExtractError`, `ProviderError`, `VeritasError`) follow the
//! usual `thiserror` hierarchy. Validation outcomes (`ValidationError`,
//! `FatalError`, `Cancelled`) are collected by the validator into a
//! `JoinedError` that reports every violation at once.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error reading the configuration file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML syntax or shape error
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Semantically invalid configuration
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Errors raised while extracting rules from source files
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// The source file could not be parsed
    #[error("Parse error in {file}: {message}")]
    Parse { file: PathBuf, message: String },

    /// A field tag could not be translated into rules
    #[error("Invalid tag on {type_name}.{field}: {message}")]
    Tag {
        type_name: String,
        field: String,
        message: String,
    },

    /// Walking the source tree failed
    #[error("File walker error: {0}")]
    Walk(#[from] crate::extract::file_walker::FileWalkerError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by rule providers
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The rule file could not be read
    #[error("Failed to read rule file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The rule document is not valid JSON of the expected shape
    #[error("Failed to decode rules: {0}")]
    Decode(#[from] serde_json::Error),

    /// A rule set contains an empty rule string
    #[error("Invalid rule set for {type_name}: {message}")]
    InvalidRuleSet { type_name: String, message: String },
}

/// Errors returned by type adapters
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdapterError {
    /// The adapter was handed a value of a different type
    #[error("adapter for {expected} received a different type")]
    TypeMismatch { expected: &'static str },

    /// The adapter could not convert the value
    #[error("{0}")]
    Failed(String),
}

impl AdapterError {
    /// Wraps any displayable failure
    pub fn msg(message: impl fmt::Display) -> Self {
        AdapterError::Failed(message.to_string())
    }
}

/// Top-level error type for Veritas
#[derive(Debug, thiserror::Error)]
pub enum VeritasError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Extraction error
    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    /// Rule provider error
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Validator construction failure
    #[error(transparent)]
    Fatal(#[from] FatalError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A rule violation on a record or one of its fields
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidationError {
    /// Qualified rule-set name of the record
    pub type_name: String,
    /// Field name, empty for type-level rules
    pub field: String,
    /// The rule that failed, or `evaluation error: ...`
    pub rule: String,
}

impl ValidationError {
    /// Creates a new validation error
    pub fn new(
        type_name: impl Into<String>,
        field: impl Into<String>,
        rule: impl Into<String>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            field: field.into(),
            rule: rule.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_empty() {
            write!(f, "{}: validation failed, rule: {}", self.type_name, self.rule)
        } else {
            write!(
                f,
                "{}.{}: validation failed, rule: {}",
                self.type_name, self.field, self.rule
            )
        }
    }
}

impl std::error::Error for ValidationError {}

/// A configuration or engine failure: compile errors, missing adapters,
/// environment construction failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("veritas fatal error: {message}")]
pub struct FatalError {
    pub message: String,
}

impl FatalError {
    /// Creates a new fatal error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Reason a validation run stopped early
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Cancelled {
    #[error("context canceled")]
    Canceled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// One entry of a validation report
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Fatal(#[from] FatalError),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl Error {
    /// Returns the validation error if this entry is one
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Error::Validation(e) => Some(e),
            _ => None,
        }
    }
}

/// All errors collected by a single `validate` call.
///
/// Displays as the individual messages joined by newlines.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JoinedError {
    errors: Vec<Error>,
}

impl JoinedError {
    /// Wraps a list of errors
    pub fn new(errors: Vec<Error>) -> Self {
        Self { errors }
    }

    /// Entries in the order they were collected
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// Consumes the report, returning its entries
    pub fn into_errors(self) -> Vec<Error> {
        self.errors
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns true if there are no entries
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Iterates over the validation entries only
    pub fn violations(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter().filter_map(Error::as_validation)
    }

    /// Returns true if the run was cut short by cancellation
    pub fn is_cancelled(&self) -> bool {
        self.errors.iter().any(|e| matches!(e, Error::Cancelled(_)))
    }
}

impl fmt::Display for JoinedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for JoinedError {}

/// Flattens a validation report into `field -> rule`.
///
/// Type-level violations are keyed by the type name. Fatal and cancellation
/// entries are ignored. When several violations share a key the last one is
/// kept.
pub fn to_error_map(err: &JoinedError) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for violation in err.violations() {
        let key = if violation.field.is_empty() {
            violation.type_name.clone()
        } else {
            violation.field.clone()
        };
        map.insert(key, violation.rule.clone());
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display_with_field() {
        let err = ValidationError::new("app.User", "Name", "self != \"\"");
        assert_eq!(
            err.to_string(),
            "app.User.Name: validation failed, rule: self != \"\""
        );
    }

    #[test]
    fn test_validation_error_display_without_field() {
        let err = ValidationError::new("app.User", "", "self.Age >= 18");
        assert_eq!(
            err.to_string(),
            "app.User: validation failed, rule: self.Age >= 18"
        );
    }

    #[test]
    fn test_fatal_error_display() {
        let err = FatalError::new("no adapter");
        assert_eq!(err.to_string(), "veritas fatal error: no adapter");
    }

    #[test]
    fn test_joined_error_display() {
        let joined = JoinedError::new(vec![
            ValidationError::new("a.T", "X", "r1").into(),
            Cancelled::Canceled.into(),
        ]);
        assert_eq!(
            joined.to_string(),
            "a.T.X: validation failed, rule: r1\ncontext canceled"
        );
        assert!(joined.is_cancelled());
        assert_eq!(joined.violations().count(), 1);
    }

    #[test]
    fn test_to_error_map_ignores_non_validation() {
        let joined = JoinedError::new(vec![
            ValidationError::new("a.T", "", "self.ok").into(),
            ValidationError::new("a.T", "Name", "self != \"\"").into(),
            FatalError::new("boom").into(),
        ]);
        let map = to_error_map(&joined);
        assert_eq!(map.len(), 2);
        assert_eq!(map["a.T"], "self.ok");
        assert_eq!(map["Name"], "self != \"\"");
    }
}
