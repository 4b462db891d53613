//! `file` module: manage the content of a single file
//!
//! Parameters: `path` (required), `content` (default empty) and `state`
//! (`present` or `absent`).

use std::io::ErrorKind;

use async_trait::async_trait;
use tracing::{info, instrument};

use super::{Module, ModuleContext, ModuleResult};
use crate::error::ModuleError;

/// Writes or removes a file on the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FileModule;

impl FileModule {
    async fn present(path: &str, content: &str, check_mode: bool) -> ModuleResult {
        let existing = match tokio::fs::read(path).await {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                return ModuleResult::failed(format!("Failed to read file '{path}'."))
                    .with_diagnostic("stderr", e.to_string());
            }
        };

        if existing.as_deref() == Some(content.as_bytes()) {
            return ModuleResult::unchanged(format!("File '{path}' is up to date."));
        }

        let action = if existing.is_some() { "updated" } else { "created" };
        if check_mode {
            return ModuleResult::changed(format!("File '{path}' would be {action}."));
        }

        info!(path, action, "writing file");
        match tokio::fs::write(path, content).await {
            Ok(()) => ModuleResult::changed(format!("File '{path}' was {action}.")),
            Err(e) => ModuleResult::failed(format!("Failed to write file '{path}'."))
                .with_diagnostic("stderr", e.to_string()),
        }
    }

    async fn absent(path: &str, check_mode: bool) -> ModuleResult {
        match tokio::fs::try_exists(path).await {
            Ok(false) => return ModuleResult::unchanged(format!("File '{path}' is absent.")),
            Ok(true) => {}
            Err(e) => {
                return ModuleResult::failed(format!("Failed to inspect file '{path}'."))
                    .with_diagnostic("stderr", e.to_string());
            }
        }

        if check_mode {
            return ModuleResult::changed(format!("File '{path}' would be removed."));
        }

        info!(path, "removing file");
        match tokio::fs::remove_file(path).await {
            Ok(()) => ModuleResult::changed(format!("File '{path}' was removed.")),
            Err(e) => ModuleResult::failed(format!("Failed to remove file '{path}'."))
                .with_diagnostic("stderr", e.to_string()),
        }
    }
}

#[async_trait]
impl Module for FileModule {
    #[instrument(skip(self, ctx), fields(resource = %ctx.resource_id))]
    async fn run(&self, ctx: &ModuleContext) -> Result<ModuleResult, ModuleError> {
        let Some(path) = ctx.param("path").filter(|p| !p.is_empty()) else {
            return Ok(ModuleResult::failed(
                "Missing required 'path' parameter for file.",
            ));
        };

        let result = match ctx.param("state").unwrap_or("present") {
            "present" => Self::present(path, ctx.param("content").unwrap_or(""), ctx.check_mode).await,
            "absent" => Self::absent(path, ctx.check_mode).await,
            other => ModuleResult::failed(format!(
                "Unsupported state '{other}' for file '{path}'; expected 'present' or 'absent'."
            )),
        };
        Ok(result)
    }
}
