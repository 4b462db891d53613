//! Module result contract

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ModuleError;

/// Outcome reported by a module for one resource
///
/// On the wire this is a single JSON object with the required fields
/// `success`, `changed` and `msg`; any other field is kept as a diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleResult {
    /// The check or apply completed without internal error
    pub success: bool,
    /// State was (or in check mode would be) altered
    pub changed: bool,
    /// Human-readable explanation
    pub msg: String,
    /// Extra fields such as captured error output
    #[serde(flatten)]
    pub diagnostics: BTreeMap<String, Value>,
}

impl ModuleResult {
    fn new(success: bool, changed: bool, msg: impl Into<String>) -> Self {
        Self {
            success,
            changed,
            msg: msg.into(),
            diagnostics: BTreeMap::new(),
        }
    }

    /// Successful, nothing to do
    pub fn unchanged(msg: impl Into<String>) -> Self {
        Self::new(true, false, msg)
    }

    /// Successful, state was or would be altered
    pub fn changed(msg: impl Into<String>) -> Self {
        Self::new(true, true, msg)
    }

    /// Failed without altering state
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::new(false, false, msg)
    }

    /// Attach a diagnostic field
    #[must_use]
    pub fn with_diagnostic(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.diagnostics.insert(key.into(), value.into());
        self
    }

    /// Diagnostic value as a string, if present and textual
    #[must_use]
    pub fn diagnostic_str(&self, key: &str) -> Option<&str> {
        self.diagnostics.get(key).and_then(Value::as_str)
    }

    /// Parse the output of a module process
    ///
    /// Exactly one non-empty line is allowed; surrounding blank lines are
    /// ignored.
    ///
    /// # Errors
    /// Returns `ModuleError::InvalidOutput` carrying the raw output if it is
    /// not a single JSON object with the required fields
    pub fn parse_output(output: &str) -> Result<Self, ModuleError> {
        let invalid = || ModuleError::InvalidOutput(output.to_string());

        let mut lines = output.lines().map(str::trim).filter(|l| !l.is_empty());
        let line = lines.next().ok_or_else(invalid)?;
        if lines.next().is_some() {
            return Err(invalid());
        }

        serde_json::from_str(line).map_err(|_| invalid())
    }
}
