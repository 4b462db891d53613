//! Resource dependency graph
//!
//! Nodes are resources in declaration order; edges point from a dependency
//! to each resource that requires it.

use std::collections::HashMap;

use crate::error::GraphError;
use crate::playbook::ResourceDeclaration;

/// A resource together with its resolved graph position
#[derive(Debug, Clone)]
pub struct ResourceNode {
    /// Declared or positional id
    pub id: String,
    /// Declaration order index
    pub index: usize,
    /// The declaration itself
    pub declaration: ResourceDeclaration,
    /// Indices of the resources this one requires, in `requires` order
    pub dependencies: Vec<usize>,
}

/// Validated dependency graph over a playbook's resources
#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    nodes: Vec<ResourceNode>,
    dependents: Vec<Vec<usize>>,
}

impl ResourceGraph {
    /// Build the graph, resolving every `requires` entry
    ///
    /// # Errors
    /// - `GraphError::DuplicateId` if two resources resolve to the same id
    /// - `GraphError::SelfDependency` if a resource requires itself
    /// - `GraphError::UnknownReference` if a dependency names no resource
    pub fn build(resources: &[ResourceDeclaration]) -> Result<Self, GraphError> {
        let mut by_id = HashMap::with_capacity(resources.len());
        for (index, decl) in resources.iter().enumerate() {
            let id = decl.resolved_id(index);
            if by_id.insert(id.clone(), index).is_some() {
                return Err(GraphError::DuplicateId(id));
            }
        }

        let mut nodes = Vec::with_capacity(resources.len());
        let mut dependents = vec![Vec::new(); resources.len()];

        for (index, decl) in resources.iter().enumerate() {
            let id = decl.resolved_id(index);
            let mut dependencies = Vec::with_capacity(decl.requires.len());

            for req in &decl.requires {
                if *req == id {
                    return Err(GraphError::SelfDependency(id));
                }
                let dep = *by_id.get(req).ok_or_else(|| GraphError::UnknownReference {
                    resource: id.clone(),
                    missing: req.clone(),
                })?;
                if !dependencies.contains(&dep) {
                    dependencies.push(dep);
                    dependents[dep].push(index);
                }
            }

            nodes.push(ResourceNode {
                id,
                index,
                declaration: decl.clone(),
                dependencies,
            });
        }

        Ok(Self { nodes, dependents })
    }

    /// Number of resources
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no resources
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in declaration order
    #[must_use]
    pub fn nodes(&self) -> &[ResourceNode] {
        &self.nodes
    }

    /// Node at a declaration index
    #[must_use]
    pub fn node(&self, index: usize) -> Option<&ResourceNode> {
        self.nodes.get(index)
    }

    /// Indices of resources that require the resource at `index`
    #[must_use]
    pub fn dependents(&self, index: usize) -> &[usize] {
        self.dependents.get(index).map_or(&[], Vec::as_slice)
    }
}
