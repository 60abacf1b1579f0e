// src/dag/graph.rs

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::dag::spec::{NodeId, NodeSpec};
use crate::engine::TaskName;
use crate::errors::{Result, SitepipeError};

/// Internal node structure: stores the task plus immediate deps and dependents.
#[derive(Debug, Clone)]
struct DagNode {
    task: TaskName,
    /// Direct dependencies: nodes that must succeed before this one can run.
    deps: Vec<NodeId>,
    /// Direct dependents: nodes that depend on this one.
    dependents: Vec<NodeId>,
}

/// In-memory DAG keyed by node id, built once from compiled [`NodeSpec`]s.
///
/// Node declaration order is kept so scheduling and dry-run output are
/// deterministic.
#[derive(Debug, Clone)]
pub struct DagGraph {
    nodes: HashMap<NodeId, DagNode>,
    order: Vec<NodeId>,
}

impl DagGraph {
    /// Build and validate a DAG.
    ///
    /// Fails on duplicate node ids, dependencies on unknown nodes and cycles.
    pub fn from_nodes(specs: Vec<NodeSpec>) -> Result<Self> {
        let mut nodes: HashMap<NodeId, DagNode> = HashMap::new();
        let mut order = Vec::with_capacity(specs.len());

        for spec in specs {
            if nodes.contains_key(&spec.id) {
                return Err(SitepipeError::ConfigError(format!(
                    "duplicate node '{}' in task graph",
                    spec.id
                )));
            }
            order.push(spec.id.clone());
            nodes.insert(
                spec.id,
                DagNode {
                    task: spec.task,
                    deps: spec.deps,
                    dependents: Vec::new(),
                },
            );
        }

        for id in order.iter() {
            let deps = nodes.get(id).map(|n| n.deps.clone()).unwrap_or_default();
            for dep in deps {
                match nodes.get_mut(&dep) {
                    Some(dep_node) => dep_node.dependents.push(id.clone()),
                    None => {
                        return Err(SitepipeError::ConfigError(format!(
                            "node '{id}' depends on unknown node '{dep}'"
                        )));
                    }
                }
            }
        }

        let graph = Self { nodes, order };
        graph.ensure_acyclic()?;
        Ok(graph)
    }

    fn ensure_acyclic(&self) -> Result<()> {
        // Edge direction: dep -> node.
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for id in self.order.iter() {
            graph.add_node(id.as_str());
        }
        for id in self.order.iter() {
            for dep in self.dependencies_of(id) {
                graph.add_edge(dep.as_str(), id.as_str(), ());
            }
        }

        match toposort(&graph, None) {
            Ok(_order) => Ok(()),
            Err(cycle) => Err(SitepipeError::DagCycle(format!(
                "cycle detected in task graph involving node '{}'",
                cycle.node_id()
            ))),
        }
    }

    /// All node ids in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Registry task run by a node.
    pub fn task_of(&self, id: &str) -> Option<&str> {
        self.nodes.get(id).map(|n| n.task.as_str())
    }

    /// Immediate dependencies of a node.
    pub fn dependencies_of(&self, id: &str) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a node.
    pub fn dependents_of(&self, id: &str) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Nodes without dependencies, in declaration order.
    pub fn roots(&self) -> Vec<NodeId> {
        self.order
            .iter()
            .filter(|id| self.dependencies_of(id).is_empty())
            .cloned()
            .collect()
    }
}
