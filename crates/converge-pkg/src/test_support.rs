//! Scripted executor shared by backend tests

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use converge_exec::{CommandExecutor, CommandResult, CommandSpec, ExecError};

/// Answers each program with a canned result and records every call
#[derive(Default)]
pub(crate) struct ScriptedExecutor {
    responses: HashMap<String, (i32, String, String)>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(mut self, program: &str, status: i32, stdout: &str, stderr: &str) -> Self {
        self.responses.insert(
            program.to_string(),
            (status, stdout.to_string(), stderr.to_string()),
        );
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn run(&self, cmd: &CommandSpec) -> Result<CommandResult, ExecError> {
        self.calls.lock().unwrap().push(cmd.to_string());
        let (status, stdout, stderr) = self
            .responses
            .get(&cmd.program)
            .cloned()
            .ok_or_else(|| ExecError::CommandNotFound(cmd.program.clone()))?;
        Ok(CommandResult {
            status,
            stdout,
            stderr,
            duration: Duration::from_millis(1),
        })
    }

    fn executor_type(&self) -> &'static str {
        "scripted"
    }
}
