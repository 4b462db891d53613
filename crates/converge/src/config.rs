//! Configuration loading and types

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use converge_core::EngineOptions;
use eyre::WrapErr;
use serde::{Deserialize, Serialize};

/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "CONVERGE_CONFIG";

/// Top-level configuration, read from `converge.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub package: PackageConfig,
    /// Resource kind → module executable
    #[serde(default)]
    pub modules: BTreeMap<String, PathBuf>,
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Per-resource module timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Independent resources invoked at once
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            jobs: default_jobs(),
            log_level: default_log_level(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_jobs() -> usize {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Which package manager backs the `package` module
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManagerChoice {
    /// Probe the system
    #[default]
    Auto,
    Apt,
    Dnf,
}

/// Package module settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageConfig {
    #[serde(default)]
    pub manager: ManagerChoice,
    /// Prefix mutating commands with sudo; detected from `whoami` when unset
    #[serde(default)]
    pub use_sudo: Option<bool>,
    /// Refresh the package index before installing
    #[serde(default = "default_update_cache")]
    pub update_cache: bool,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            manager: ManagerChoice::default(),
            use_sudo: None,
            update_cache: default_update_cache(),
        }
    }
}

fn default_update_cache() -> bool {
    true
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .wrap_err_with(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Find the config file to use, if any
    ///
    /// An explicit path always wins, even if it does not exist, so that a
    /// typo surfaces as a load error instead of silently using defaults.
    #[must_use]
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }

        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }

        let mut paths = vec![
            PathBuf::from("converge.toml"),
            PathBuf::from("/etc/converge/converge.toml"),
        ];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("converge/converge.toml"));
        }

        paths.into_iter().find(|p| p.exists())
    }

    /// Engine options, with command-line overrides applied
    #[must_use]
    pub fn engine_options(&self, timeout_secs: Option<u64>, jobs: Option<usize>) -> EngineOptions {
        EngineOptions::default()
            .with_timeout(Duration::from_secs(
                timeout_secs.unwrap_or(self.engine.timeout_secs),
            ))
            .with_jobs(jobs.unwrap_or(self.engine.jobs))
    }
}
