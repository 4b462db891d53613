//! Command executor trait

use async_trait::async_trait;

use crate::error::ExecError;
use crate::result::{CommandResult, CommandSpec};

/// Capability to run a program and capture its output
///
/// A non-zero exit status is not an error at this layer; callers inspect
/// [`CommandResult::success`] and decide what it means for them.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run a command to completion
    async fn run(&self, cmd: &CommandSpec) -> Result<CommandResult, ExecError>;

    /// Short name of the executor implementation
    fn executor_type(&self) -> &'static str;

    /// Check whether `program` resolves on the executor's `PATH`
    async fn command_exists(&self, program: &str) -> bool {
        let probe = CommandSpec::new("which").arg(program);
        match self.run(&probe).await {
            Ok(result) => result.success(),
            Err(_) => false,
        }
    }
}
