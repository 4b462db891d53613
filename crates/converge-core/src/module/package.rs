//! `package` module: ensure a system package is present or absent
//!
//! Parameters:
//! - `name` (required): package name
//! - `state`: `present` (default) or `absent`

use std::sync::Arc;

use async_trait::async_trait;
use converge_pkg::{PackageBackend, PackageError};
use tracing::{info, instrument};

use super::{Module, ModuleContext, ModuleResult};
use crate::error::ModuleError;

/// Desired package state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Desired {
    Present,
    Absent,
}

impl Desired {
    fn verb(self) -> &'static str {
        match self {
            Desired::Present => "install",
            Desired::Absent => "remove",
        }
    }

    fn past(self) -> &'static str {
        match self {
            Desired::Present => "installed",
            Desired::Absent => "removed",
        }
    }
}

/// Package module over a [`PackageBackend`]
pub struct PackageModule {
    backend: Arc<dyn PackageBackend>,
}

impl PackageModule {
    pub fn new(backend: Arc<dyn PackageBackend>) -> Self {
        Self { backend }
    }

    fn tool_missing(&self, tool: &str) -> ModuleResult {
        ModuleResult::failed(format!(
            "'{tool}' command not found. This module requires {}.",
            self.backend.manager_type().required_os()
        ))
    }

    fn mutation_failed(&self, name: &str, desired: Desired, err: &PackageError) -> ModuleResult {
        if let PackageError::ManagerNotFound(tool) = err {
            return self.tool_missing(tool);
        }

        let detail = err.stderr().map_or_else(|| err.to_string(), str::to_string);
        let mut result = ModuleResult::failed(format!(
            "Failed to {} package '{name}'.",
            desired.verb()
        ))
        .with_diagnostic("stderr", detail);

        if err.is_retryable() {
            result = result.with_diagnostic("retryable", true);
        }
        if err.needs_sudo() {
            result = result.with_diagnostic("hint", "enable sudo for package operations");
        }
        result
    }
}

#[async_trait]
impl Module for PackageModule {
    #[instrument(skip(self, ctx), fields(resource = %ctx.resource_id, manager = %self.backend.manager_type()))]
    async fn run(&self, ctx: &ModuleContext) -> Result<ModuleResult, ModuleError> {
        let Some(name) = ctx.param("name").filter(|n| !n.is_empty()) else {
            return Ok(ModuleResult::failed(
                "Missing required 'name' parameter for package.",
            ));
        };
        // A leading dash would be read as an option by the package tools
        if name.starts_with('-') {
            return Ok(ModuleResult::failed(format!(
                "Invalid package name '{name}'."
            )));
        }

        let desired = match ctx.param("state").unwrap_or("present") {
            "present" => Desired::Present,
            "absent" => Desired::Absent,
            other => {
                return Ok(ModuleResult::failed(format!(
                    "Unsupported state '{other}' for package '{name}'; expected 'present' or 'absent'."
                )));
            }
        };

        let installed = match self.backend.is_installed(name).await {
            Ok(installed) => installed,
            Err(PackageError::ManagerNotFound(tool)) => return Ok(self.tool_missing(&tool)),
            Err(err) => {
                return Ok(
                    ModuleResult::failed(format!("Failed to query package '{name}'."))
                        .with_diagnostic("stderr", err.to_string()),
                );
            }
        };

        match (desired, installed) {
            (Desired::Present, true) => {
                return Ok(ModuleResult::unchanged(format!(
                    "Package '{name}' is already installed."
                )));
            }
            (Desired::Absent, false) => {
                return Ok(ModuleResult::unchanged(format!(
                    "Package '{name}' is not installed."
                )));
            }
            _ => {}
        }

        if ctx.check_mode {
            return Ok(ModuleResult::changed(format!(
                "Package '{name}' would be {}.",
                desired.past()
            )));
        }

        info!(package = %name, action = desired.verb(), "changing package state");
        let outcome = match desired {
            Desired::Present => self.backend.install(name).await,
            Desired::Absent => self.backend.remove(name).await,
        };

        Ok(match outcome {
            Ok(()) => ModuleResult::changed(format!(
                "Package '{name}' was successfully {}.",
                desired.past()
            )),
            Err(err) => self.mutation_failed(name, desired, &err),
        })
    }
}
