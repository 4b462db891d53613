//! Execution plan: resources in dependency order

use serde::Serialize;

use crate::codec;
use crate::error::{ConvergeError, GraphError};
use crate::graph::ResourceGraph;
use crate::playbook::{Playbook, ResourceDeclaration};
use crate::scheduler;

/// One resource placed in the plan
#[derive(Debug, Clone, Serialize)]
pub struct PlanStep {
    /// Resolved resource id
    pub id: String,
    /// The resource as declared
    pub declaration: ResourceDeclaration,
    /// Plan positions of the steps this one requires; always lower than
    /// this step's own position
    pub depends_on: Vec<usize>,
}

impl PlanStep {
    /// Module kind of the resource
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.declaration.kind
    }
}

/// Resources reordered so each follows everything it requires
///
/// Built once per run and consumed by the engine.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionPlan {
    steps: Vec<PlanStep>,
}

impl ExecutionPlan {
    /// Build the graph and schedule it in one go
    ///
    /// # Errors
    /// Returns any structural `GraphError`
    pub fn build(resources: &[ResourceDeclaration]) -> Result<Self, GraphError> {
        Self::from_graph(&ResourceGraph::build(resources)?)
    }

    /// Decode serialized records and plan them
    ///
    /// # Errors
    /// Returns `ConvergeError::Codec` for malformed records, otherwise any
    /// structural error
    pub fn from_records(records: &str) -> Result<Self, ConvergeError> {
        let resources = codec::decode(records)?;
        Ok(Self::build(&resources)?)
    }

    /// Plan a playbook by passing it through the record transport
    ///
    /// The execution stage only ever sees what survived encoding, so a
    /// playbook that cannot be carried fails here rather than mid-run.
    ///
    /// # Errors
    /// As [`ExecutionPlan::from_records`], plus encoding errors
    pub fn from_playbook(playbook: &Playbook) -> Result<Self, ConvergeError> {
        Self::from_records(&codec::encode(&playbook.resources)?)
    }

    /// Schedule an already built graph
    ///
    /// # Errors
    /// Returns `GraphError::CycleDetected` if the graph is cyclic
    pub fn from_graph(graph: &ResourceGraph) -> Result<Self, GraphError> {
        let order = scheduler::order_indices(graph)?;

        let mut position = vec![0; graph.len()];
        for (pos, &index) in order.iter().enumerate() {
            position[index] = pos;
        }

        let steps = order
            .iter()
            .filter_map(|&index| graph.node(index))
            .map(|node| PlanStep {
                id: node.id.clone(),
                declaration: node.declaration.clone(),
                depends_on: node.dependencies.iter().map(|&d| position[d]).collect(),
            })
            .collect();

        Ok(Self { steps })
    }

    /// Steps in execution order
    #[must_use]
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// Resource ids in execution order
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.id.as_str()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depends_on_uses_plan_positions() {
        let plan = ExecutionPlan::build(&[
            ResourceDeclaration::new("file").with_id("motd").requiring("pkg"),
            ResourceDeclaration::new("package").with_id("pkg"),
        ])
        .unwrap();

        assert_eq!(plan.ids(), vec!["pkg", "motd"]);
        assert!(plan.steps()[0].depends_on.is_empty());
        assert_eq!(plan.steps()[1].depends_on, vec![0]);
        assert_eq!(plan.steps()[1].kind(), "file");
    }

    #[test]
    fn test_from_playbook_goes_through_records() {
        let playbook = Playbook::from_yaml(
            "resources:\n  - kind: file\n    id: motd\n    params:\n      content: \"a\\nb\"\n",
        )
        .unwrap();

        let plan = ExecutionPlan::from_playbook(&playbook).unwrap();
        assert_eq!(plan.steps()[0].declaration.params["content"], "a\nb");
    }

    #[test]
    fn test_from_records_reports_structural_errors() {
        let err = ExecutionPlan::from_records("KIND=noop\nREQUIRES=ghost\n").unwrap_err();
        assert!(err.is_structural());

        let err = ExecutionPlan::from_records("KIND=noop\nbroken\n").unwrap_err();
        assert!(matches!(err, ConvergeError::Codec(_)));
    }

    #[test]
    fn test_cycle_prevents_plan() {
        let result = ExecutionPlan::build(&[
            ResourceDeclaration::new("noop").with_id("a").requiring("b"),
            ResourceDeclaration::new("noop").with_id("b").requiring("a"),
        ]);
        assert!(matches!(result, Err(GraphError::CycleDetected(_))));
    }
}
