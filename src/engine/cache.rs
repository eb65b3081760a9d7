//! Bounded LRU cache of compiled programs
//!
//! Keyed by environment id and the exact rule string. Concurrent first use
//! of a key compiles once; other callers wait for that result. Failed
//! compilations are not cached.

use crate::cel::{CompileError, Program};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Default number of programs kept in the cache
pub const DEFAULT_CACHE_CAPACITY: u64 = 256;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ProgramKey {
    env_id: u64,
    rule: String,
}

/// Shared cache of compiled programs
#[derive(Clone)]
pub struct ProgramCache {
    programs: moka::sync::Cache<ProgramKey, Arc<Program>>,
    compilations: Arc<AtomicU64>,
    capacity: u64,
}

impl ProgramCache {
    /// Creates a cache holding at most `capacity` programs
    pub fn new(capacity: u64) -> Self {
        Self {
            programs: moka::sync::Cache::builder().max_capacity(capacity).build(),
            compilations: Arc::new(AtomicU64::new(0)),
            capacity,
        }
    }

    /// Returns the cached program for `(env_id, rule)`, compiling it on a miss
    ///
    /// # Errors
    ///
    /// Returns the `CompileError` produced by `compile`. The failure is not
    /// cached, so a later call retries.
    pub fn get_or_compile<F>(
        &self,
        env_id: u64,
        rule: &str,
        compile: F,
    ) -> Result<Arc<Program>, CompileError>
    where
        F: FnOnce() -> Result<Program, CompileError>,
    {
        let key = ProgramKey {
            env_id,
            rule: rule.to_string(),
        };

        if let Some(program) = self.programs.get(&key) {
            debug!(rule = %rule, env = env_id, "cache hit");
            return Ok(program);
        }

        debug!(rule = %rule, env = env_id, "cache miss");
        self.programs
            .try_get_with(key, || {
                self.compilations.fetch_add(1, Ordering::Relaxed);
                compile().map(Arc::new)
            })
            .map_err(|e| CompileError::clone(&e))
    }

    /// Number of programs currently cached
    pub fn len(&self) -> u64 {
        self.programs.run_pending_tasks();
        self.programs.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured maximum number of programs
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Total number of compilations performed through this cache
    pub fn compilations(&self) -> u64 {
        self.compilations.load(Ordering::Relaxed)
    }

    /// Drops every cached program
    pub fn purge(&self) {
        self.programs.invalidate_all();
        self.programs.run_pending_tasks();
    }
}

impl Default for ProgramCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl std::fmt::Debug for ProgramCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramCache")
            .field("capacity", &self.capacity)
            .field("entries", &self.programs.entry_count())
            .field("compilations", &self.compilations())
            .finish()
    }
}
