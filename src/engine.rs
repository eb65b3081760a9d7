//! Rule compilation engine
//!
//! The engine owns the function library shared by every environment and
//! the program cache. Validators hold a cheap clone of it.

pub mod cache;

pub use cache::{DEFAULT_CACHE_CAPACITY, ProgramCache};

use crate::cel::functions::DEFAULT_REGEX_CACHE_SIZE;
use crate::cel::{
    CompileError, Environment, EnvironmentBuilder, EnvironmentError, EvalError, FunctionLibrary,
    Program, RecordType, RegexCache, Type, Value,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Engine tuning, also read from the `[engine]` table of `veritas.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of compiled programs kept in the cache
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,

    /// Maximum number of compiled regular expressions kept for `matches`
    #[serde(default = "default_regex_cache_capacity")]
    pub regex_cache_capacity: u64,
}

fn default_cache_capacity() -> u64 {
    DEFAULT_CACHE_CAPACITY
}

fn default_regex_cache_capacity() -> u64 {
    DEFAULT_REGEX_CACHE_SIZE
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            regex_cache_capacity: DEFAULT_REGEX_CACHE_SIZE,
        }
    }
}

/// Compiles rules against environments, caching the results
#[derive(Clone, Debug)]
pub struct Engine {
    functions: Arc<FunctionLibrary>,
    cache: ProgramCache,
}

impl Engine {
    /// An engine with the default function library and cache size
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// An engine configured from `EngineConfig`
    pub fn with_config(config: &EngineConfig) -> Self {
        Self::builder()
            .cache_capacity(config.cache_capacity)
            .regex_cache_capacity(config.regex_cache_capacity)
            .build()
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn functions(&self) -> &Arc<FunctionLibrary> {
        &self.functions
    }

    pub fn cache(&self) -> &ProgramCache {
        &self.cache
    }

    /// Starts an environment that shares this engine's function library
    pub fn environment(&self) -> EnvironmentBuilder {
        Environment::builder(Arc::clone(&self.functions))
    }

    /// Builds an environment from variable declarations and record types
    ///
    /// # Errors
    ///
    /// Returns `EnvironmentError` on conflicting declarations.
    pub fn new_environment<V, R>(
        &self,
        variables: V,
        records: R,
    ) -> Result<Environment, EnvironmentError>
    where
        V: IntoIterator<Item = (String, Type)>,
        R: IntoIterator<Item = RecordType>,
    {
        let builder = variables
            .into_iter()
            .fold(self.environment(), |b, (name, ty)| b.variable(name, ty));
        records
            .into_iter()
            .fold(builder, |b, record| b.record(record))
            .build()
    }

    /// Returns the compiled program for `rule` in `env`, compiling on first use
    ///
    /// # Errors
    ///
    /// Returns `CompileError` if the rule does not parse or type-check.
    pub fn compile(&self, env: &Environment, rule: &str) -> Result<Arc<Program>, CompileError> {
        self.cache
            .get_or_compile(env.id(), rule, || env.compile(rule))
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `Engine`
pub struct EngineBuilder {
    cache_capacity: u64,
    regex_cache_capacity: u64,
    custom: Vec<Box<dyn FnOnce(&mut FunctionLibrary)>>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            regex_cache_capacity: DEFAULT_REGEX_CACHE_SIZE,
            custom: Vec::new(),
        }
    }
}

impl EngineBuilder {
    pub fn cache_capacity(mut self, capacity: u64) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn regex_cache_capacity(mut self, capacity: u64) -> Self {
        self.regex_cache_capacity = capacity;
        self
    }

    /// Adds a global function, e.g. `fmt.Title(s)`
    pub fn function<F>(mut self, name: &str, params: Vec<Type>, result: Type, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        let name = name.to_string();
        self.custom
            .push(Box::new(move |lib| lib.add_global(&name, params, result, f)));
        self
    }

    /// Adds a receiver-style function; the receiver is `params[0]`
    pub fn member_function<F>(mut self, name: &str, params: Vec<Type>, result: Type, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        let name = name.to_string();
        self.custom
            .push(Box::new(move |lib| lib.add_member(&name, params, result, f)));
        self
    }

    pub fn build(self) -> Engine {
        let mut functions =
            FunctionLibrary::with_defaults(RegexCache::new(self.regex_cache_capacity));
        for register in self.custom {
            register(&mut functions);
        }
        Engine {
            functions: Arc::new(functions),
            cache: ProgramCache::new(self.cache_capacity),
        }
    }
}
