#![forbid(unsafe_code)]

//! Expression language
//!
//! A CEL-compatible subset: typed, side-effect free expressions over null,
//! bool, int, uint, double, string, list, map and record values. Rules are
//! parsed, checked against an [`Environment`] and compiled into a
//! [`Program`] that can be evaluated concurrently.
//!
//! ```
//! use std::sync::Arc;
//! use veritas::cel::{Activation, Environment, FunctionLibrary, RegexCache, Type, Value};
//! use veritas::Context;
//!
//! let functions = Arc::new(FunctionLibrary::with_defaults(RegexCache::default()));
//! let env = Environment::builder(functions)
//!     .variable("self", Type::Dyn)
//!     .build()
//!     .unwrap();
//! let program = env.compile("self.size() > 2").unwrap();
//! let result = program
//!     .evaluate(&Context::background(), &Activation::new().bind("self", "abc".into()))
//!     .unwrap();
//! assert_eq!(result, Value::Bool(true));
//! ```

pub mod ast;
mod checker;
pub mod env;
pub mod error;
pub mod functions;
mod interpreter;
pub mod lexer;
pub mod parser;
pub mod token;
pub mod types;
pub mod value;

pub use env::{Environment, EnvironmentBuilder, EnvironmentError, Program};
pub use error::{CompileError, CompileStage, EvalError};
pub use functions::{FunctionLibrary, RegexCache};
pub use interpreter::Activation;
pub use parser::parse;
pub use types::{RecordType, Type};
pub use value::{Key, RecordValue, Value};
