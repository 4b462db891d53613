//! converge-pkg: Package state abstraction
//!
//! Provides the package state checker/mutator capability and its
//! implementations for different package managers (apt, dnf)

pub mod apt;
pub mod dnf;
pub mod error;
pub mod traits;
pub mod types;

pub use apt::AptBackend;
pub use dnf::DnfBackend;
pub use error::PackageError;
pub use traits::PackageBackend;
pub use types::{BackendOptions, PackageManagerType};

#[cfg(test)]
mod test_support;
