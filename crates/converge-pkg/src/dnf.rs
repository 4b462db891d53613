//! DNF backend (Fedora/RHEL/CentOS)

use std::sync::Arc;

use async_trait::async_trait;
use converge_exec::{CommandExecutor, CommandSpec};
use tracing::{debug, info, instrument};

use crate::error::PackageError;
use crate::traits::PackageBackend;
use crate::types::{BackendOptions, PackageManagerType};

/// DNF backend implementation
///
/// Falls back to `yum` if `dnf` is not available.
pub struct DnfBackend {
    executor: Arc<dyn CommandExecutor>,
    options: BackendOptions,
    /// Whether to use yum instead of dnf
    use_yum: bool,
}

impl DnfBackend {
    /// Create a new DNF backend
    pub fn new(executor: Arc<dyn CommandExecutor>, options: BackendOptions) -> Self {
        Self {
            executor,
            options,
            use_yum: false,
        }
    }

    /// Create a backend after probing whether to use dnf or yum
    ///
    /// # Errors
    /// Returns `PackageError::ManagerNotFound` if neither tool exists
    pub async fn detect(
        executor: Arc<dyn CommandExecutor>,
        options: BackendOptions,
    ) -> Result<Self, PackageError> {
        let use_yum = if executor.command_exists("dnf").await {
            false
        } else if executor.command_exists("yum").await {
            true
        } else {
            return Err(PackageError::ManagerNotFound(
                "neither dnf nor yum found".to_string(),
            ));
        };

        debug!(use_yum, "detected rpm package tool");

        Ok(Self {
            executor,
            options,
            use_yum,
        })
    }

    fn tool(&self) -> &'static str {
        if self.use_yum { "yum" } else { "dnf" }
    }

    /// Build dnf/yum command with optional sudo
    fn pkg_cmd(&self, action: &str, name: &str) -> CommandSpec {
        let mut cmd = CommandSpec::new(self.tool()).args([action, "-y"]);
        // dnf refreshes stale metadata on its own; only force it when asked
        if action == "install" && self.options.update_cache {
            cmd = cmd.arg("--refresh");
        }
        cmd.arg(name).with_sudo(self.options.use_sudo)
    }

    async fn run_mutation(&self, cmd: CommandSpec) -> Result<(), PackageError> {
        let result = self.executor.run(&cmd).await?;
        if result.success() {
            Ok(())
        } else {
            Err(PackageError::from_failure(result.status, &result.stderr))
        }
    }
}

#[async_trait]
impl PackageBackend for DnfBackend {
    #[instrument(skip(self))]
    async fn is_installed(&self, name: &str) -> Result<bool, PackageError> {
        let cmd = CommandSpec::new("rpm").args(["-q", name]);
        let result = self.executor.run(&cmd).await?;
        Ok(result.success())
    }

    #[instrument(skip(self))]
    async fn install(&self, name: &str) -> Result<(), PackageError> {
        info!(package = %name, tool = self.tool(), "installing package");
        self.run_mutation(self.pkg_cmd("install", name)).await
    }

    #[instrument(skip(self))]
    async fn remove(&self, name: &str) -> Result<(), PackageError> {
        info!(package = %name, tool = self.tool(), "removing package");
        self.run_mutation(self.pkg_cmd("remove", name)).await
    }

    fn manager_type(&self) -> PackageManagerType {
        PackageManagerType::Dnf
    }

    async fn is_available(&self) -> bool {
        self.executor.command_exists(self.tool()).await
    }
}
