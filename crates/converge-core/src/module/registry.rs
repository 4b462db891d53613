//! Kind → module lookup

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::Module;

/// Typed registry of modules keyed by resource kind
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, Arc<dyn Module>>,
}

impl ModuleRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module for `kind`, returning the one it replaced
    pub fn register(
        &mut self,
        kind: impl Into<String>,
        module: Arc<dyn Module>,
    ) -> Option<Arc<dyn Module>> {
        self.modules.insert(kind.into(), module)
    }

    /// Builder form of [`ModuleRegistry::register`]
    #[must_use]
    pub fn with(mut self, kind: impl Into<String>, module: impl Module + 'static) -> Self {
        self.register(kind, Arc::new(module));
        self
    }

    /// Module registered for `kind`
    #[must_use]
    pub fn get(&self, kind: &str) -> Option<Arc<dyn Module>> {
        self.modules.get(kind).cloned()
    }

    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.modules.contains_key(kind)
    }

    /// Registered kinds, sorted
    #[must_use]
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.modules.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
