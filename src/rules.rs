#![forbid(unsafe_code)]

//! Rule model, registry and providers
//!
//! - [`shorthand`]: the predefined shorthand tokens
//! - [`tree`]: parsing `validate` tags into directive trees and emitting
//!   expressions
//! - [`registry`]: the process-wide rule registry
//! - [`provider`]: sources of rule sets for validators

pub mod provider;
pub mod registry;
pub mod shorthand;
pub mod tree;

pub use provider::{
    JsonBytesProvider, JsonFileProvider, RegistryProvider, RuleProvider, StaticProvider,
};
pub use registry::{RuleRegistry, register, unregister, unregister_all};
pub use tree::{Directive, RuleNode, TagError, compile_tag, parse_tag};
