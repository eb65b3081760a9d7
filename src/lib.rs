#![forbid(unsafe_code)]

//! Veritas: declarative CEL validation for Rust structs
//!
//! Rules live next to the types they constrain, as `/// @cel:` doc lines and
//! `#[validate("...")]` field tags. The extractor turns them into rule sets
//! keyed by qualified type name, the registry or a rule file hands them to a
//! [`Validator`], and the validator walks object graphs evaluating every
//! rule through a cached expression engine.

pub mod cel;
pub mod cli;
pub mod codegen;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod extract;
pub mod lint;
pub mod output;
pub mod reflect;
pub mod rules;
pub mod types;
pub mod validator;

// Re-export error types for convenient access
pub use error::{
    AdapterError, Cancelled, ConfigError, Error, ExtractError, FatalError, JoinedError,
    ProviderError, ValidationError, VeritasError, to_error_map,
};

// Re-export core domain types for convenient access
pub use codegen::CodeGenerator;
pub use context::Context;
pub use engine::{Engine, EngineConfig};
pub use extract::{Extraction, Extractor};
pub use lint::{LintIssue, Linter};
pub use reflect::{Record, Reflect};
pub use rules::{RuleProvider, register, unregister, unregister_all};
pub use types::{RuleSet, RuleSets};
pub use validator::{AdaptedField, AdaptedRecord, Validator, ValidatorBuilder};
