//! Progress events published during a run

use serde::{Deserialize, Serialize};

use crate::state::ResourceState;

/// Event broadcast to subscribers of a [`crate::ConvergenceEngine`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RunEvent {
    /// A run began
    RunStarted {
        /// Resources in the plan
        total: usize,
        /// Whether modules only report what would change
        check_mode: bool,
    },
    /// A resource entered `running`
    ResourceStarted {
        /// Resource id
        id: String,
        /// Module kind handling it
        kind: String,
    },
    /// A resource reached a terminal state, including skips
    ResourceFinished {
        /// Resource id
        id: String,
        /// Terminal state
        state: ResourceState,
        /// Whether the module changed (or would change) the system
        changed: bool,
        /// Module or engine message
        msg: String,
    },
    /// Every resource is terminal
    RunFinished {
        /// False if any resource failed
        success: bool,
        /// Resources reporting a change
        changed: usize,
    },
}
