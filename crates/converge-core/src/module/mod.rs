//! Modules: the handlers that converge one resource kind
//!
//! A module receives a [`ModuleContext`] built for a single invocation and
//! returns a [`ModuleResult`]. Nothing else flows between the engine and a
//! module, so independent resources can be invoked concurrently.

pub mod external;
pub mod file;
pub mod invoker;
pub mod package;
pub mod registry;
pub mod result;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::ModuleError;
use crate::plan::PlanStep;

pub use external::ExternalModule;
pub use file::FileModule;
pub use invoker::ModuleInvoker;
pub use package::PackageModule;
pub use registry::ModuleRegistry;
pub use result::ModuleResult;

/// Everything a module may see during one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleContext {
    /// Id of the resource being converged
    pub resource_id: String,
    /// Resource kind
    pub kind: String,
    /// Decoded parameters, keyed by lower-case name
    pub params: BTreeMap<String, String>,
    /// Report what would change without changing it
    pub check_mode: bool,
}

impl ModuleContext {
    /// Build the context for a plan step
    #[must_use]
    pub fn for_step(step: &PlanStep, check_mode: bool) -> Self {
        Self {
            resource_id: step.id.clone(),
            kind: step.declaration.kind.clone(),
            params: step.declaration.params.clone(),
            check_mode,
        }
    }

    /// Parameter value by name
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// Check and converge logic for one resource kind
///
/// Returning `Ok` with `success = false` is an ordinary outcome. `Err` is
/// reserved for faults that prevented the module from producing a result.
#[async_trait]
pub trait Module: Send + Sync {
    /// Check (and unless in check mode, apply) the resource's desired state
    async fn run(&self, ctx: &ModuleContext) -> Result<ModuleResult, ModuleError>;
}
