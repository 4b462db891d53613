//! Run report

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::ResourceState;

/// Terminal outcome of one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceOutcome {
    pub id: String,
    pub kind: String,
    pub state: ResourceState,
    pub changed: bool,
    pub msg: String,
    /// Module diagnostics such as captured error output
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub diagnostics: BTreeMap<String, Value>,
    /// Wall time of the invocation; zero when skipped
    pub duration_ms: u64,
}

/// Outcome counts for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub converged: usize,
    pub changed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} resources: {} converged ({} changed), {} failed, {} skipped",
            self.total, self.converged, self.changed, self.failed, self.skipped
        )
    }
}

/// Aggregated result of a convergence run, in plan order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub check_mode: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<ResourceOutcome>,
}

impl Report {
    /// True unless some resource failed
    #[must_use]
    pub fn success(&self) -> bool {
        !self
            .outcomes
            .iter()
            .any(|o| o.state == ResourceState::Failed)
    }

    /// Number of resources that changed or would change
    #[must_use]
    pub fn changed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.changed).count()
    }

    /// Outcome for a resource id
    #[must_use]
    pub fn outcome(&self, id: &str) -> Option<&ResourceOutcome> {
        self.outcomes.iter().find(|o| o.id == id)
    }

    #[must_use]
    pub fn summary(&self) -> RunSummary {
        let count = |state: ResourceState| self.outcomes.iter().filter(|o| o.state == state).count();
        RunSummary {
            total: self.outcomes.len(),
            converged: count(ResourceState::Converged),
            changed: self.changed_count(),
            failed: count(ResourceState::Failed),
            skipped: count(ResourceState::Skipped),
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for outcome in &self.outcomes {
            let changed = if outcome.changed { " (changed)" } else { "" };
            writeln!(
                f,
                "{} [{}] {}{}: {}",
                outcome.id, outcome.kind, outcome.state, changed, outcome.msg
            )?;
            if let Some(stderr) = outcome.diagnostics.get("stderr").and_then(Value::as_str) {
                for line in stderr.lines() {
                    writeln!(f, "    {line}")?;
                }
            }
        }
        let mode = if self.check_mode { " [check mode]" } else { "" };
        write!(f, "{}{mode}", self.summary())
    }
}
