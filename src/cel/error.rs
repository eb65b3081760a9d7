//! Errors produced while compiling and evaluating expressions

use std::fmt;

/// Stage at which compilation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileStage {
    /// Lexing or parsing
    Syntax,
    /// Type checking against the environment
    Check,
}

/// A compile-time failure with the source offset it refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub stage: CompileStage,
    pub message: String,
    pub position: usize,
}

impl CompileError {
    pub fn syntax(message: impl Into<String>, position: usize) -> Self {
        Self {
            stage: CompileStage::Syntax,
            message: message.into(),
            position,
        }
    }

    pub fn check(message: impl Into<String>, position: usize) -> Self {
        Self {
            stage: CompileStage::Check,
            message: message.into(),
            position,
        }
    }

    /// Returns true if the checker could not find an overload for the
    /// operand types of an operator or function
    pub fn is_no_matching_overload(&self) -> bool {
        self.message.contains("no matching overload")
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self.stage {
            CompileStage::Syntax => "syntax error",
            CompileStage::Check => "ERROR",
        };
        write!(f, "{} at {}: {}", stage, self.position, self.message)
    }
}

impl std::error::Error for CompileError {}

/// Runtime evaluation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("no such key: {0}")]
    NoSuchKey(String),

    #[error("no such field: {0}")]
    NoSuchField(String),

    #[error("no such attribute: {0}")]
    UnknownVariable(String),

    #[error("found no matching overload for '{function}' applied to '({args})'")]
    NoMatchingOverload { function: String, args: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("modulus by zero")]
    ModulusByZero,

    #[error("{0} overflow")]
    Overflow(&'static str),

    #[error("index out of range: {0}")]
    IndexOutOfRange(i64),

    #[error("invalid regular expression '{pattern}': {message}")]
    InvalidRegex { pattern: String, message: String },

    #[error("type conversion error: {0}")]
    Conversion(String),

    #[error("expression nesting exceeds maximum depth of {0}")]
    MaxDepth(usize),

    #[error("evaluation canceled")]
    Canceled,

    #[error("{0}")]
    Custom(String),
}

impl EvalError {
    /// Returns true if the failure is an operand-type mismatch
    pub fn is_no_matching_overload(&self) -> bool {
        matches!(self, EvalError::NoMatchingOverload { .. })
    }
}
