#![forbid(unsafe_code)]

//! Validator core
//!
//! A [`Validator`] holds a snapshot of rule sets and evaluates them against
//! object graphs. It runs in one of two modes:
//!
//! - **native**: records are bound as typed record values, so type rules
//!   are checked against the record's declared field types.
//! - **adapter**: records are converted into maps by a user-supplied
//!   adapter and validated against a named target rule set.
//!
//! Field rules always see the field value as `self`.

mod adapter;
mod walk;

pub use adapter::{AdaptedField, AdaptedRecord};

use crate::cel::{Environment, RecordType, Type};
use crate::context::Context;
use crate::engine::Engine;
use crate::error::{AdapterError, FatalError, JoinedError, VeritasError};
use crate::reflect::{self, Record, Reflect, TypePath};
use crate::rules::provider::{JsonFileProvider, RegistryProvider, RuleProvider, StaticProvider};
use crate::types::{RuleSet, RuleSets};
use adapter::{AdapterTarget, TypedAdapter};
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Dispatch, debug};

/// How records are exposed to their rules
enum Mode {
    Native(HashSet<TypeId>),
    Adapter(HashMap<TypeId, AdapterTarget>),
}

/// Evaluates rule sets against values
pub struct Validator {
    engine: Engine,
    rules: RuleSets,
    /// Base name (`module.Type`) to generic rule key (`module.Type[T]`)
    generic_keys: HashMap<String, String>,
    object_env: Arc<Environment>,
    field_env: Arc<Environment>,
    native_envs: RwLock<HashMap<TypeId, Arc<Environment>>>,
    mode: Mode,
    logger: Option<Dispatch>,
}

impl Validator {
    pub fn builder() -> ValidatorBuilder {
        ValidatorBuilder::default()
    }

    /// Validates `value` and everything reachable from it.
    ///
    /// Values that are not records (after following options) pass. All
    /// violations are collected; evaluation errors are reported as
    /// violations and do not stop the walk. Cancellation of `ctx` adds a
    /// single entry and stops.
    ///
    /// # Errors
    ///
    /// Returns a `JoinedError` listing every violation, fatal error and
    /// cancellation, in walk order.
    pub fn validate<T: Reflect>(&self, ctx: &Context, value: &T) -> Result<(), JoinedError> {
        self.validate_dyn(ctx, value)
    }

    /// Same as [`validate`](Self::validate), for trait objects
    pub fn validate_dyn(&self, ctx: &Context, value: &dyn Reflect) -> Result<(), JoinedError> {
        let errors = match &self.logger {
            Some(dispatch) => {
                tracing::dispatcher::with_default(dispatch, || walk::run(self, ctx, value))
            }
            None => walk::run(self, ctx, value),
        };
        if errors.is_empty() {
            Ok(())
        } else {
            Err(JoinedError::new(errors))
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// The rule sets this validator enforces
    pub fn rule_sets(&self) -> &RuleSets {
        &self.rules
    }

    /// Finds the rule set for a runtime type.
    ///
    /// Generic instantiations match the rule key declared with parameter
    /// names, e.g. `Box<Option<i64>>` uses `module.Box[T]`.
    fn lookup(&self, path: &TypePath) -> Option<(&str, &RuleSet)> {
        let base = path.base_name();
        if path.is_generic()
            && let Some(key) = self.generic_keys.get(&base)
        {
            debug!(base = %base, key = %key, "matched generic rule set");
            return self
                .rules
                .get_key_value(key)
                .map(|(k, v)| (k.as_str(), v));
        }
        self.rules.get_key_value(&base).map(|(k, v)| (k.as_str(), v))
    }

    fn is_native(&self, type_id: TypeId) -> bool {
        matches!(&self.mode, Mode::Native(types) if types.contains(&type_id))
    }

    fn adapter_for(&self, type_id: TypeId) -> Option<&AdapterTarget> {
        match &self.mode {
            Mode::Adapter(adapters) => adapters.get(&type_id),
            Mode::Native(_) => None,
        }
    }

    /// Returns the native environment for a record's type, creating it on
    /// first use
    fn native_env(&self, record: &dyn Record) -> Result<Arc<Environment>, FatalError> {
        let type_id = Any::type_id(record.as_any());
        if let Some(env) = self.native_envs.read().get(&type_id) {
            return Ok(Arc::clone(env));
        }

        let env = Arc::new(build_native_env(&self.engine, reflect::record_type(record))?);
        let mut envs = self.native_envs.write();
        Ok(Arc::clone(envs.entry(type_id).or_insert(env)))
    }
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match &self.mode {
            Mode::Native(types) => format!("native({})", types.len()),
            Mode::Adapter(adapters) => format!("adapter({})", adapters.len()),
        };
        f.debug_struct("Validator")
            .field("rule_sets", &self.rules.len())
            .field("mode", &mode)
            .field("engine", &self.engine)
            .finish()
    }
}

fn build_native_env(engine: &Engine, record_type: RecordType) -> Result<Environment, FatalError> {
    debug!(type_name = %record_type.name, "creating native environment");
    let name = record_type.name.clone();
    engine
        .environment()
        .variable("self", Type::Record(name.clone()))
        .record(record_type)
        .build()
        .map_err(|e| {
            FatalError::new(format!(
                "failed to create native environment for {}: {}",
                name, e
            ))
        })
}

/// Builder for [`Validator`]
///
/// Exactly one mode must be configured: native types through
/// [`native`](Self::native) or [`native_type`](Self::native_type), or type
/// adapters through [`adapter`](Self::adapter).
#[derive(Default)]
pub struct ValidatorBuilder {
    engine: Option<Engine>,
    provider: Option<Box<dyn RuleProvider>>,
    logger: Option<Dispatch>,
    native: HashSet<TypeId>,
    samples: Vec<(TypeId, RecordType)>,
    adapters: HashMap<TypeId, AdapterTarget>,
}

impl ValidatorBuilder {
    /// Uses `engine` instead of a default one
    pub fn engine(mut self, engine: Engine) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Reads rules from `provider`; the global registry otherwise
    pub fn provider(mut self, provider: impl RuleProvider + 'static) -> Self {
        self.provider = Some(Box::new(provider));
        self
    }

    /// Uses a fixed set of rules
    pub fn rule_sets(self, rules: RuleSets) -> Self {
        self.provider(StaticProvider::new(rules))
    }

    /// Reads rules from a JSON rule file
    pub fn json_file(self, path: impl Into<PathBuf>) -> Self {
        self.provider(JsonFileProvider::new(path))
    }

    /// Runs validation under `logger` instead of the current dispatcher
    pub fn logger(mut self, logger: Dispatch) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Validates `T` natively; the environment for `T` is built from
    /// `sample` during [`build`](Self::build)
    pub fn native<T: Record>(mut self, sample: &T) -> Self {
        self.native.insert(TypeId::of::<T>());
        self.samples
            .push((TypeId::of::<T>(), reflect::record_type(sample)));
        self
    }

    /// Validates `T` natively; its environment is built on first use
    pub fn native_type<T: Record>(mut self) -> Self {
        self.native.insert(TypeId::of::<T>());
        self
    }

    /// Validates `T` through `adapt`, against the rule set named `target`
    pub fn adapter<T, F>(mut self, target: impl Into<String>, adapt: F) -> Self
    where
        T: Record,
        F: for<'a> Fn(&'a T) -> Result<AdaptedRecord<'a>, AdapterError> + Send + Sync + 'static,
    {
        self.adapters.insert(
            TypeId::of::<T>(),
            AdapterTarget {
                target: target.into(),
                adapter: Box::new(TypedAdapter::<T, F>::new(adapt)),
            },
        );
        self
    }

    /// Builds the validator, taking a snapshot of the provider's rules
    ///
    /// # Errors
    ///
    /// Returns `VeritasError::Provider` if the rules cannot be loaded and
    /// `VeritasError::Fatal` if no mode or both modes are configured, or an
    /// environment cannot be created.
    pub fn build(self) -> Result<Validator, VeritasError> {
        let mode = match (self.native.is_empty(), self.adapters.is_empty()) {
            (false, true) => Mode::Native(self.native),
            (true, false) => Mode::Adapter(self.adapters),
            (true, true) => {
                return Err(FatalError::new(
                    "no validation mode configured: register native types or type adapters",
                )
                .into());
            }
            (false, false) => {
                return Err(FatalError::new(
                    "native types and type adapters cannot be combined in one validator",
                )
                .into());
            }
        };

        let engine = self.engine.unwrap_or_default();
        let provider = self
            .provider
            .unwrap_or_else(|| Box::new(RegistryProvider::global()));
        let rules = provider.rule_sets()?;
        for key in rules.keys() {
            debug!(key = %key, "loaded rule set");
        }

        let mut generic_keys = HashMap::new();
        for key in rules.keys() {
            if let Some(pos) = key.find('[') {
                generic_keys
                    .entry(key[..pos].to_string())
                    .or_insert_with(|| key.clone());
            }
        }

        let object_env = engine
            .environment()
            .variable("self", Type::map(Type::String, Type::Dyn))
            .build()
            .map_err(|e| FatalError::new(format!("failed to create object environment: {}", e)))?;
        let field_env = engine
            .environment()
            .variable("self", Type::Dyn)
            .build()
            .map_err(|e| FatalError::new(format!("failed to create field environment: {}", e)))?;

        let mut native_envs = HashMap::new();
        for (type_id, record_type) in self.samples {
            native_envs.insert(type_id, Arc::new(build_native_env(&engine, record_type)?));
        }

        Ok(Validator {
            engine,
            rules,
            generic_keys,
            object_env: Arc::new(object_env),
            field_env: Arc::new(field_env),
            native_envs: RwLock::new(native_envs),
            mode,
            logger: self.logger,
        })
    }
}
