//! Modules implemented as separate executables
//!
//! The executable receives its context through its own environment only:
//! `PARAM_<KEY>` for every parameter, `CONVERGE_CHECK_MODE` and
//! `CONVERGE_RESOURCE_ID`. Nothing else from the engine's environment is
//! passed on apart from `PATH` and locale basics. It must print one JSON
//! line on stdout.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use converge_exec::{CommandExecutor, CommandSpec};
use tracing::{debug, instrument};

use super::{Module, ModuleContext, ModuleResult};
use crate::error::ModuleError;

/// Environment variable carrying the check-mode flag
pub const CHECK_MODE_ENV: &str = "CONVERGE_CHECK_MODE";
/// Environment variable carrying the resource id
pub const RESOURCE_ID_ENV: &str = "CONVERGE_RESOURCE_ID";

/// Runs an executable as a module
pub struct ExternalModule {
    path: PathBuf,
    executor: Arc<dyn CommandExecutor>,
}

impl ExternalModule {
    /// Create a module backed by the executable at `path`
    pub fn new(path: impl Into<PathBuf>, executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            path: path.into(),
            executor,
        }
    }

    fn command(&self, ctx: &ModuleContext) -> CommandSpec {
        let mut cmd = CommandSpec::new(self.path.to_string_lossy())
            .isolated()
            .env(CHECK_MODE_ENV, ctx.check_mode.to_string())
            .env(RESOURCE_ID_ENV, ctx.resource_id.as_str());
        for (key, value) in &ctx.params {
            cmd = cmd.env(format!("PARAM_{}", key.to_ascii_uppercase()), value.as_str());
        }
        cmd
    }
}

#[async_trait]
impl Module for ExternalModule {
    #[instrument(skip(self, ctx), fields(module = %self.path.display(), resource = %ctx.resource_id))]
    async fn run(&self, ctx: &ModuleContext) -> Result<ModuleResult, ModuleError> {
        let output = self.executor.run(&self.command(ctx)).await?;
        debug!(status = output.status, duration = ?output.duration, "module process exited");

        let mut result = ModuleResult::parse_output(&output.stdout)?;
        if !output.success() {
            result = result.with_diagnostic("exit_status", output.status);
        }
        if !result.success && !output.stderr.is_empty() && !result.diagnostics.contains_key("stderr")
        {
            result = result.with_diagnostic("stderr", output.stderr.trim_end());
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use converge_exec::{CommandResult, ExecError};

    use super::*;

    /// Records the last command and replies with a canned result
    struct CannedExecutor {
        status: i32,
        stdout: &'static str,
        stderr: &'static str,
        last: Mutex<Option<CommandSpec>>,
    }

    impl CannedExecutor {
        fn new(status: i32, stdout: &'static str, stderr: &'static str) -> Self {
            Self {
                status,
                stdout,
                stderr,
                last: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl CommandExecutor for CannedExecutor {
        async fn run(&self, cmd: &CommandSpec) -> Result<CommandResult, ExecError> {
            *self.last.lock().unwrap() = Some(cmd.clone());
            Ok(CommandResult {
                status: self.status,
                stdout: self.stdout.to_string(),
                stderr: self.stderr.to_string(),
                duration: Duration::from_millis(1),
            })
        }

        fn executor_type(&self) -> &'static str {
            "canned"
        }
    }

    fn ctx() -> ModuleContext {
        ModuleContext {
            resource_id: "motd".to_string(),
            kind: "motd".to_string(),
            params: [
                ("content".to_string(), "line one\nline two".to_string()),
                ("owner".to_string(), "root".to_string()),
            ]
            .into(),
            check_mode: true,
        }
    }

    #[tokio::test]
    async fn test_context_passed_through_child_environment() {
        let executor = Arc::new(CannedExecutor::new(
            0,
            "{\"success\":true,\"changed\":true,\"msg\":\"would write\"}\n",
            "",
        ));
        let module = ExternalModule::new("/opt/modules/motd", executor.clone());

        let result = module.run(&ctx()).await.unwrap();
        assert!(result.changed);

        let cmd = executor.last.lock().unwrap().clone().unwrap();
        assert_eq!(cmd.program, "/opt/modules/motd");
        assert!(cmd.args.is_empty());
        assert!(cmd.clear_env);
        assert_eq!(cmd.env["PARAM_CONTENT"], "line one\nline two");
        assert_eq!(cmd.env["PARAM_OWNER"], "root");
        assert_eq!(cmd.env[CHECK_MODE_ENV], "true");
        assert_eq!(cmd.env[RESOURCE_ID_ENV], "motd");
    }

    #[tokio::test]
    async fn test_failure_keeps_stderr_and_exit_status() {
        let executor = Arc::new(CannedExecutor::new(
            3,
            "{\"success\":false,\"changed\":false,\"msg\":\"no\"}",
            "permission denied\n",
        ));
        let module = ExternalModule::new("/opt/modules/motd", executor);

        let result = module.run(&ctx()).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.diagnostics["exit_status"], 3);
        assert_eq!(result.diagnostic_str("stderr"), Some("permission denied"));
    }

    #[tokio::test]
    async fn test_unparseable_output() {
        let executor = Arc::new(CannedExecutor::new(0, "done!\n", ""));
        let module = ExternalModule::new("/opt/modules/motd", executor);

        let err = module.run(&ctx()).await.unwrap_err();
        assert!(matches!(err, ModuleError::InvalidOutput(ref raw) if raw == "done!\n"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_engine_environment_does_not_reach_module() {
        use std::os::unix::fs::PermissionsExt;

        use converge_exec::LocalExecutor;

        // SAFETY: no other test reads or writes this variable
        unsafe { std::env::set_var("PARAM_STRAY", "from-parent-env") };

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("echo-stray");
        std::fs::write(
            &script,
            "#!/bin/sh\nprintf '{\"success\":true,\"changed\":false,\"msg\":\"stray=%s owner=%s\"}\\n' \"$PARAM_STRAY\" \"$PARAM_OWNER\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let module = ExternalModule::new(&script, Arc::new(LocalExecutor::new()));
        let result = module.run(&ctx()).await.unwrap();

        assert!(result.success);
        assert_eq!(result.msg, "stray= owner=root");
    }
}
