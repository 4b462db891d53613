//! Error types for converge-core
//!
//! Parse and structural errors abort a run before any module executes.
//! Invocation errors are contained to a single resource and surface in the
//! report as a failed outcome.

use std::time::Duration;

use converge_exec::ExecError;
use thiserror::Error;

/// A declaration field that cannot be carried by the transport format
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// `kind`, `id` or a `requires` entry is not an identifier
    #[error("invalid {field} '{value}': expected ASCII letters, digits, '_', '-', '.' or ':'")]
    InvalidIdentifier {
        /// Which field held the value
        field: &'static str,
        /// The rejected value
        value: String,
    },

    /// Parameter key outside the normalized alphabet
    #[error("invalid parameter key '{0}': expected lower-case ASCII letters, digits or '_'")]
    InvalidParamKey(String),

    /// Two parameter keys differ only in case
    #[error("parameter '{0}' is declared more than once (keys are case-insensitive)")]
    DuplicateParamKey(String),

    /// The same id appears twice in `requires`
    #[error("dependency '{0}' is listed more than once")]
    DuplicateRequirement(String),
}

/// Errors raised while loading a YAML playbook
#[derive(Error, Debug, Clone)]
pub enum PlaybookError {
    /// The document is not valid YAML or has the wrong shape
    #[error("invalid playbook YAML: {0}")]
    Yaml(String),

    /// The top-level `resources` sequence is absent
    #[error("playbook has no top-level 'resources' list")]
    MissingResources,

    /// A field that must be a scalar holds a sequence or mapping
    #[error("resource #{index}: '{field}' must be a scalar value")]
    NonScalar {
        /// Position of the resource in the playbook
        index: usize,
        /// Offending field or parameter name
        field: String,
    },

    /// A declaration failed validation
    #[error("resource #{index}: {source}")]
    Invalid {
        /// Position of the resource in the playbook
        index: usize,
        /// What was wrong
        #[source]
        source: ValidationError,
    },

    /// Reading the playbook failed
    #[error("failed to read playbook: {0}")]
    Io(String),
}

/// Errors raised by the line-oriented record codec
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A serialized line violates the record grammar
    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord {
        /// 1-based line number
        line: usize,
        /// What was wrong with it
        reason: String,
    },

    /// A declaration cannot be encoded
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Structural errors in the resource graph
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Two resources share an id
    #[error("duplicate resource id '{0}'")]
    DuplicateId(String),

    /// A `requires` entry names no declared resource
    #[error("resource '{resource}' requires unknown resource '{missing}'")]
    UnknownReference {
        /// Resource holding the reference
        resource: String,
        /// The id that does not exist
        missing: String,
    },

    /// A resource lists itself in `requires`
    #[error("resource '{0}' requires itself")]
    SelfDependency(String),

    /// Dependencies form at least one cycle
    #[error("dependency cycle detected among: {}", .0.join(", "))]
    CycleDetected(Vec<String>),
}

/// Errors reported by a module implementation
#[derive(Error, Debug, Clone)]
pub enum ModuleError {
    /// Output could not be read as a module result
    #[error("invalid module output: {0}")]
    InvalidOutput(String),

    /// The module's process could not be run
    #[error("execution error: {0}")]
    Exec(#[from] ExecError),
}

/// Per-resource invocation errors
#[derive(Error, Debug, Clone)]
pub enum InvokeError {
    /// No module is registered for the resource kind
    #[error("no module registered for kind '{0}'")]
    ModuleNotFound(String),

    /// The module's output is not a valid module result
    #[error("module output is not a valid result: {0}")]
    InvalidModuleOutput(String),

    /// The module did not finish within the invocation timeout
    #[error("module timed out after {0:?}")]
    ModuleTimeout(Duration),

    /// The module faulted before producing a result
    #[error("module failed: {0}")]
    ModuleFailed(String),
}

impl InvokeError {
    /// Stable name of the error variant, used as a report diagnostic
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            InvokeError::ModuleNotFound(_) => "ModuleNotFound",
            InvokeError::InvalidModuleOutput(_) => "InvalidModuleOutput",
            InvokeError::ModuleTimeout(_) => "ModuleTimeout",
            InvokeError::ModuleFailed(_) => "ModuleFailed",
        }
    }
}

impl From<ModuleError> for InvokeError {
    fn from(err: ModuleError) -> Self {
        match err {
            ModuleError::InvalidOutput(raw) => InvokeError::InvalidModuleOutput(raw),
            other => InvokeError::ModuleFailed(other.to_string()),
        }
    }
}

/// Fatal errors that abort a run before any resource is invoked
#[derive(Error, Debug, Clone)]
pub enum ConvergeError {
    /// Playbook could not be loaded
    #[error(transparent)]
    Playbook(#[from] PlaybookError),

    /// Serialized records could not be encoded or decoded
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Resource graph is invalid
    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl ConvergeError {
    /// Whether the error comes from graph structure rather than parsing
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(self, ConvergeError::Graph(_))
    }
}
