//! Named guard predicates
//!
//! Steps reference guards by name; the registry maps names to boolean
//! predicates supplied by external detection collaborators. The engine only
//! consumes the boolean result and never performs detection itself.

#![allow(dead_code)] // Registry introspection is for plan tooling

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A guard predicate. Evaluated at step time, so a guard may observe state
/// written by earlier steps.
pub type GuardFn = Arc<dyn Fn() -> bool + Send + Sync>;

/// Registry of named guards.
#[derive(Default)]
pub struct GuardRegistry {
    guards: HashMap<String, GuardFn>,
}

impl GuardRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a predicate under `name`, replacing any previous guard.
    pub fn register<F>(&mut self, name: impl Into<String>, guard: F)
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.guards.insert(name.into(), Arc::new(guard));
    }

    /// Register a pre-evaluated fact (detection done once at startup).
    pub fn register_fact(&mut self, name: impl Into<String>, value: bool) {
        self.register(name, move || value);
    }

    pub fn get(&self, name: &str) -> Option<GuardFn> {
        self.guards.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.guards.contains_key(name)
    }

    /// Registered guard names, sorted for stable output.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.guards.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for GuardRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardRegistry")
            .field("names", &self.names())
            .finish()
    }
}
