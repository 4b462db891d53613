//! Command description and result types

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Variables a child keeps from the parent environment when
/// [`CommandSpec::clear_env`] is set
pub const INHERITED_ENV: &[&str] = &["PATH", "HOME", "LANG", "LC_ALL", "TMPDIR"];

/// A program invocation: argv plus an explicit, per-child environment
///
/// Arguments are passed to the program verbatim without a shell, so
/// values coming from a playbook are never re-interpreted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Program name or path
    pub program: String,
    /// Arguments
    pub args: Vec<String>,
    /// Environment variables added to the child process only
    pub env: BTreeMap<String, String>,
    /// Start from an empty environment, keeping only [`INHERITED_ENV`]
    #[serde(default)]
    pub clear_env: bool,
}

impl CommandSpec {
    /// Create a command for `program` with no arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            clear_env: false,
        }
    }

    /// Append a single argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Do not inherit the parent environment beyond [`INHERITED_ENV`]
    #[must_use]
    pub fn isolated(mut self) -> Self {
        self.clear_env = true;
        self
    }

    /// Prefix the command with `sudo` when `use_sudo` is set
    #[must_use]
    pub fn with_sudo(self, use_sudo: bool) -> Self {
        if !use_sudo {
            return self;
        }
        let mut args = Vec::with_capacity(self.args.len() + 2);
        // -E keeps the explicit child environment across sudo
        args.push("-E".to_string());
        args.push(self.program);
        args.extend(self.args);
        Self {
            program: "sudo".to_string(),
            args,
            env: self.env,
            clear_env: self.clear_env,
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Result of a command execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    /// Exit status code (0 for success, -1 when killed by a signal)
    pub status: i32,
    /// stdout output
    pub stdout: String,
    /// stderr output
    pub stderr: String,
    /// Time taken to execute
    pub duration: Duration,
}

impl CommandResult {
    /// Check if command succeeded (exit code 0)
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_sudo_prefixes_program() {
        let cmd = CommandSpec::new("apt-get")
            .args(["install", "-y", "curl"])
            .with_sudo(true);

        assert_eq!(cmd.program, "sudo");
        assert_eq!(cmd.args, vec!["-E", "apt-get", "install", "-y", "curl"]);
    }

    #[test]
    fn test_with_sudo_keeps_isolation() {
        let cmd = CommandSpec::new("/opt/modules/motd")
            .isolated()
            .env("PARAM_OWNER", "root")
            .with_sudo(true);

        assert!(cmd.clear_env);
        assert_eq!(cmd.env["PARAM_OWNER"], "root");
    }

    #[test]
    fn test_without_sudo_is_unchanged() {
        let cmd = CommandSpec::new("dpkg-query").arg("-W").with_sudo(false);

        assert_eq!(cmd.program, "dpkg-query");
        assert_eq!(cmd.to_string(), "dpkg-query -W");
    }
}
