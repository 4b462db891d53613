//! Error types for converge-pkg

use converge_exec::ExecError;
use thiserror::Error;

/// Errors that can occur during package operations
#[derive(Error, Debug, Clone)]
pub enum PackageError {
    /// Package manager tooling not found on system
    #[error("package manager not found: {0}")]
    ManagerNotFound(String),

    /// Repository index could not be refreshed
    #[error("repository unavailable: {0}")]
    RepositoryUnavailable(String),

    /// Lock file conflict (another process running)
    #[error("lock file conflict: {0}")]
    LockConflict(String),

    /// Insufficient permissions (need sudo)
    #[error("insufficient permissions: {0}")]
    PermissionDenied(String),

    /// Command execution failed
    #[error("command failed: {status} - {message}")]
    CommandFailed {
        /// Exit status
        status: i32,
        /// Error message
        message: String,
    },

    /// Execution error from the command executor
    #[error("execution error: {0}")]
    ExecutionError(String),
}

impl PackageError {
    /// Classify a non-zero exit from a mutating package command
    #[must_use]
    pub fn from_failure(status: i32, stderr: &str) -> Self {
        if stderr.contains("Could not get lock") || stderr.contains("waiting for process") {
            PackageError::LockConflict(stderr.to_string())
        } else if stderr.contains("Permission denied") || stderr.contains("are you root?") {
            PackageError::PermissionDenied(stderr.to_string())
        } else {
            PackageError::CommandFailed {
                status,
                message: stderr.to_string(),
            }
        }
    }

    /// Check if error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PackageError::LockConflict(_) | PackageError::RepositoryUnavailable(_)
        )
    }

    /// Check if error indicates need for sudo
    #[must_use]
    pub fn needs_sudo(&self) -> bool {
        matches!(self, PackageError::PermissionDenied(_))
    }

    /// Captured error output of the failing command, if any
    #[must_use]
    pub fn stderr(&self) -> Option<&str> {
        match self {
            PackageError::RepositoryUnavailable(s)
            | PackageError::LockConflict(s)
            | PackageError::PermissionDenied(s) => Some(s),
            PackageError::CommandFailed { message, .. } => Some(message),
            PackageError::ManagerNotFound(_) | PackageError::ExecutionError(_) => None,
        }
    }
}

impl From<ExecError> for PackageError {
    fn from(err: ExecError) -> Self {
        match err {
            ExecError::CommandNotFound(program) => PackageError::ManagerNotFound(program),
            other => PackageError::ExecutionError(other.to_string()),
        }
    }
}
