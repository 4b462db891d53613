//! Deterministic topological ordering

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use tracing::debug;

use crate::error::GraphError;
use crate::graph::ResourceGraph;

/// Order resource ids so every resource follows all of its dependencies
///
/// Among resources whose dependencies are all placed, the one declared
/// earliest in the playbook goes first, so identical input always yields
/// an identical plan.
///
/// # Errors
/// Returns `GraphError::CycleDetected` listing every resource that could not
/// be placed, in declaration order
pub fn order(graph: &ResourceGraph) -> Result<Vec<String>, GraphError> {
    let indices = order_indices(graph)?;
    Ok(indices
        .into_iter()
        .filter_map(|i| graph.node(i).map(|n| n.id.clone()))
        .collect())
}

/// Same as [`order`], returning declaration indices
pub(crate) fn order_indices(graph: &ResourceGraph) -> Result<Vec<usize>, GraphError> {
    let mut remaining: Vec<usize> = graph.nodes().iter().map(|n| n.dependencies.len()).collect();

    let mut ready: BinaryHeap<Reverse<usize>> = remaining
        .iter()
        .enumerate()
        .filter(|(_, deps)| **deps == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut placed = Vec::with_capacity(graph.len());
    while let Some(Reverse(index)) = ready.pop() {
        placed.push(index);
        for &dependent in graph.dependents(index) {
            remaining[dependent] -= 1;
            if remaining[dependent] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }

    if placed.len() < graph.len() {
        let members: Vec<String> = graph
            .nodes()
            .iter()
            .filter(|n| remaining[n.index] > 0)
            .map(|n| n.id.clone())
            .collect();
        debug!(?members, "dependency cycle");
        return Err(GraphError::CycleDetected(members));
    }

    Ok(placed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playbook::ResourceDeclaration;

    fn res(id: &str) -> ResourceDeclaration {
        ResourceDeclaration::new("noop").with_id(id)
    }

    fn order_of(resources: &[ResourceDeclaration]) -> Result<Vec<String>, GraphError> {
        order(&ResourceGraph::build(resources).unwrap())
    }

    #[test]
    fn test_independent_resources_keep_declaration_order() {
        let ids = order_of(&[res("c"), res("a"), res("b")]).unwrap();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_dependency_moves_ahead() {
        let ids = order_of(&[
            res("web").requiring("pkg"),
            res("motd"),
            res("pkg").requiring("repo"),
            res("repo"),
        ])
        .unwrap();

        assert_eq!(ids, vec!["motd", "repo", "pkg", "web"]);
    }

    #[test]
    fn test_ties_break_by_declaration_order_after_release() {
        // "c" is ready from the start but "d" and "b" were declared before it
        let ids = order_of(&[
            res("d").requiring("a"),
            res("a"),
            res("b").requiring("a"),
            res("c"),
        ])
        .unwrap();

        assert_eq!(ids, vec!["a", "d", "b", "c"]);
    }

    #[test]
    fn test_every_resource_after_its_requires() {
        let resources = vec![
            res("e").requiring("d").requiring("b"),
            res("d").requiring("c"),
            res("c").requiring("a"),
            res("b").requiring("a"),
            res("a"),
        ];
        let ids = order_of(&resources).unwrap();
        let pos = |id: &str| ids.iter().position(|x| x == id).unwrap();

        for decl in &resources {
            let id = decl.id.as_deref().unwrap();
            for req in &decl.requires {
                assert!(pos(req) < pos(id), "{req} must precede {id}");
            }
        }
    }

    #[test]
    fn test_two_node_cycle_names_both() {
        let err = order_of(&[res("A").requiring("B"), res("B").requiring("A")]).unwrap_err();
        assert_eq!(
            err,
            GraphError::CycleDetected(vec!["A".to_string(), "B".to_string()])
        );
    }

    #[test]
    fn test_cycle_excludes_resolvable_resources() {
        let err = order_of(&[
            res("ok"),
            res("x").requiring("z").requiring("ok"),
            res("y").requiring("x"),
            res("z").requiring("y"),
        ])
        .unwrap_err();

        let GraphError::CycleDetected(members) = err else {
            panic!("expected cycle");
        };
        assert_eq!(members, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_empty_graph() {
        assert!(order_of(&[]).unwrap().is_empty());
    }
}
