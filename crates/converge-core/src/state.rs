//! Per-resource lifecycle state

use serde::{Deserialize, Serialize};

/// Resource state during a run
///
/// `Pending → Running → {Converged, Failed}`, or `Pending → Skipped` when a
/// dependency did not converge or the run was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    /// Not yet started
    Pending,
    /// Module invocation in flight
    Running,
    /// Module reported success
    Converged,
    /// Never invoked
    Skipped,
    /// Module reported failure or could not be invoked
    Failed,
}

impl ResourceState {
    /// Whether the transition is allowed by the lifecycle
    #[must_use]
    pub fn can_transition_to(self, next: ResourceState) -> bool {
        matches!(
            (self, next),
            (ResourceState::Pending, ResourceState::Running | ResourceState::Skipped)
                | (ResourceState::Running, ResourceState::Converged | ResourceState::Failed)
        )
    }

    /// Whether no further transition can happen
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ResourceState::Converged | ResourceState::Skipped | ResourceState::Failed
        )
    }
}

impl std::fmt::Display for ResourceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceState::Pending => write!(f, "pending"),
            ResourceState::Running => write!(f, "running"),
            ResourceState::Converged => write!(f, "converged"),
            ResourceState::Skipped => write!(f, "skipped"),
            ResourceState::Failed => write!(f, "failed"),
        }
    }
}
