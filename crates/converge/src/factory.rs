//! Module registry construction for the local host

use std::sync::Arc;

use converge_core::{ExternalModule, FileModule, ModuleRegistry, PackageModule};
use converge_exec::{CommandExecutor, CommandSpec};
use converge_pkg::{AptBackend, BackendOptions, DnfBackend, PackageBackend};
use tracing::{info, warn};

use crate::config::{Config, ManagerChoice, PackageConfig};

/// Builds the module registry from configuration and host probing
pub struct ModuleFactory {
    executor: Arc<dyn CommandExecutor>,
}

impl ModuleFactory {
    /// Create a factory that probes and runs commands through `executor`
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    /// Whether package commands need sudo: configured, or not running as root
    async fn use_sudo(&self, config: &PackageConfig) -> bool {
        if let Some(use_sudo) = config.use_sudo {
            return use_sudo;
        }
        match self.executor.run(&CommandSpec::new("whoami")).await {
            Ok(result) if result.success() => result.stdout.trim() != "root",
            _ => true,
        }
    }

    /// Pick the package backend
    ///
    /// When probing finds no supported manager the apt backend is used, so
    /// `package` resources fail with a clear message instead of the kind
    /// being unknown.
    pub async fn create_package_backend(&self, config: &PackageConfig) -> Arc<dyn PackageBackend> {
        let options = BackendOptions {
            use_sudo: self.use_sudo(config).await,
            update_cache: config.update_cache,
        };
        let executor = self.executor.clone();

        match config.manager {
            ManagerChoice::Apt => Arc::new(AptBackend::new(executor, options)),
            ManagerChoice::Dnf => match DnfBackend::detect(executor.clone(), options).await {
                Ok(backend) => Arc::new(backend),
                Err(_) => Arc::new(DnfBackend::new(executor, options)),
            },
            ManagerChoice::Auto => {
                let apt = AptBackend::new(executor.clone(), options);
                if apt.is_available().await {
                    info!(use_sudo = options.use_sudo, "detected apt package manager");
                    return Arc::new(apt);
                }
                match DnfBackend::detect(executor, options).await {
                    Ok(backend) => {
                        info!(use_sudo = options.use_sudo, "detected dnf package manager");
                        Arc::new(backend)
                    }
                    Err(e) => {
                        warn!(error = %e, "no supported package manager found (tried apt, dnf, yum)");
                        Arc::new(apt)
                    }
                }
            }
        }
    }

    /// Registry with the built-in modules plus every configured external one
    pub async fn build_registry(&self, config: &Config) -> ModuleRegistry {
        let backend = self.create_package_backend(&config.package).await;
        let mut registry = ModuleRegistry::new()
            .with("package", PackageModule::new(backend))
            .with("file", FileModule);

        for (kind, path) in &config.modules {
            let module = ExternalModule::new(path.clone(), self.executor.clone());
            if registry.register(kind.clone(), Arc::new(module)).is_some() {
                warn!(kind = %kind, path = %path.display(), "external module replaces built-in");
            }
        }

        info!(
            kinds = ?registry.kinds(),
            executor = self.executor.executor_type(),
            "module registry ready"
        );
        registry
    }
}
