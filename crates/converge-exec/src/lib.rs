//! converge-exec: Local process execution abstraction
//!
//! Provides the `CommandExecutor` capability used by package backends and
//! external modules, plus a `tokio::process` implementation.

pub mod error;
pub mod local;
pub mod result;
pub mod traits;

pub use error::ExecError;
pub use local::LocalExecutor;
pub use result::{CommandResult, CommandSpec};
pub use traits::CommandExecutor;
