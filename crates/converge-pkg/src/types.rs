//! Type definitions for package management

use serde::{Deserialize, Serialize};

/// Package manager type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageManagerType {
    /// APT (Debian/Ubuntu)
    Apt,
    /// DNF or YUM (Fedora/RHEL)
    Dnf,
}

impl PackageManagerType {
    /// The operating system a backend requires, as a noun phrase for
    /// user-facing messages
    #[must_use]
    pub fn required_os(self) -> &'static str {
        match self {
            PackageManagerType::Apt => "a Debian-based OS",
            PackageManagerType::Dnf => "an RPM-based OS",
        }
    }
}

impl std::fmt::Display for PackageManagerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PackageManagerType::Apt => write!(f, "apt"),
            PackageManagerType::Dnf => write!(f, "dnf"),
        }
    }
}

/// Options shared by every backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendOptions {
    /// Prefix mutating commands with sudo
    pub use_sudo: bool,
    /// Refresh the package index before installing
    pub update_cache: bool,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            use_sudo: false,
            update_cache: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_os_phrase() {
        assert_eq!(PackageManagerType::Apt.required_os(), "a Debian-based OS");
        assert_eq!(PackageManagerType::Dnf.required_os(), "an RPM-based OS");
    }
}
