//! Package backend trait

use async_trait::async_trait;

use crate::error::PackageError;
use crate::types::PackageManagerType;

/// Capability to query and change whether a single package is installed
#[async_trait]
pub trait PackageBackend: Send + Sync {
    /// Whether `name` is installed and configured
    async fn is_installed(&self, name: &str) -> Result<bool, PackageError>;

    /// Install `name`, refreshing the package index first if configured
    async fn install(&self, name: &str) -> Result<(), PackageError>;

    /// Remove `name`
    async fn remove(&self, name: &str) -> Result<(), PackageError>;

    /// Which package manager this backend drives
    fn manager_type(&self) -> PackageManagerType;

    /// Whether the package manager's tooling exists on this system
    async fn is_available(&self) -> bool;
}
