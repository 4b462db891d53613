//! APT backend (Debian/Ubuntu)

use std::sync::Arc;

use async_trait::async_trait;
use converge_exec::{CommandExecutor, CommandSpec};
use tracing::{debug, info, instrument};

use crate::error::PackageError;
use crate::traits::PackageBackend;
use crate::types::{BackendOptions, PackageManagerType};

/// Status string reported by dpkg for a fully installed package
const INSTALLED_STATUS: &str = "install ok installed";

/// APT backend implementation
pub struct AptBackend {
    /// Executor for running dpkg/apt commands
    executor: Arc<dyn CommandExecutor>,
    options: BackendOptions,
}

impl AptBackend {
    /// Create a new APT backend
    ///
    /// # Arguments
    /// * `executor` - Executor for running dpkg-query and apt-get
    /// * `options` - Sudo and index refresh settings
    pub fn new(executor: Arc<dyn CommandExecutor>, options: BackendOptions) -> Self {
        Self { executor, options }
    }

    /// Build an apt-get command with optional sudo
    fn apt_get<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandSpec::new("apt-get")
            .args(args)
            .env("DEBIAN_FRONTEND", "noninteractive")
            .with_sudo(self.options.use_sudo)
    }

    /// Whether dpkg-query status output describes an installed package
    fn parse_status(output: &str) -> bool {
        output.contains(INSTALLED_STATUS)
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
impl PackageBackend for AptBackend {
    #[instrument(skip(self))]
    async fn is_installed(&self, name: &str) -> Result<bool, PackageError> {
        let cmd = CommandSpec::new("dpkg-query").args(["-W", "-f=${Status}", name]);
        let result = self.executor.run(&cmd).await?;

        // dpkg-query exits non-zero for packages it has never heard of
        if !result.success() {
            debug!(status = result.status, "package unknown to dpkg");
            return Ok(false);
        }

        Ok(Self::parse_status(&result.stdout))
    }

    #[instrument(skip(self))]
    async fn install(&self, name: &str) -> Result<(), PackageError> {
        if self.options.update_cache {
            info!("running apt-get update");
            let result = self.executor.run(&self.apt_get(["update"])).await?;
            if !result.success() {
                return Err(PackageError::RepositoryUnavailable(result.stderr));
            }
        }

        info!(package = %name, "installing package");
        self.run_mutation(self.apt_get(["install", "-y", name])).await
    }

    #[instrument(skip(self))]
    async fn remove(&self, name: &str) -> Result<(), PackageError> {
        info!(package = %name, "removing package");
        self.run_mutation(self.apt_get(["remove", "-y", name])).await
    }

    fn manager_type(&self) -> PackageManagerType {
        PackageManagerType::Apt
    }

    async fn is_available(&self) -> bool {
        self.executor.command_exists("apt-get").await
    }
}
