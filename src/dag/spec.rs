// src/dag/spec.rs

//! Declarative graph combinators.
//!
//! A [`GraphSpec`] is a tree built from [`task`], [`sequence`] and
//! [`parallel`]. It is compiled once into a flat list of [`NodeSpec`]s where
//! ordering is expressed purely as dependencies:
//!
//! - every member of a sequence depends on the *exits* of the member before it;
//! - every member of a parallel group shares the group's entry dependencies,
//!   and the group's exits are the union of its members' exits.
//!
//! So `sequence([a, parallel([b, c]), d])` compiles to `b, c after a` and
//! `d after b, c`.

use std::collections::HashMap;

use crate::engine::TaskName;

/// Unique id of a node in a compiled graph.
///
/// Usually the task name. Watch bindings prefix it (`images/webp`), and a
/// task used twice in one graph gets a `#n` suffix on later uses.
pub type NodeId = String;

/// Declarative composition of named tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphSpec {
    Task(TaskName),
    Sequence(Vec<GraphSpec>),
    Parallel(Vec<GraphSpec>),
}

/// A single named task.
pub fn task(name: impl Into<TaskName>) -> GraphSpec {
    GraphSpec::Task(name.into())
}

/// Members run strictly in order; each starts after the previous one
/// settled successfully.
pub fn sequence<I>(items: I) -> GraphSpec
where
    I: IntoIterator,
    I::Item: Into<GraphSpec>,
{
    GraphSpec::Sequence(items.into_iter().map(Into::into).collect())
}

/// Members start together; the group settles when all of them have.
pub fn parallel<I>(items: I) -> GraphSpec
where
    I: IntoIterator,
    I::Item: Into<GraphSpec>,
{
    GraphSpec::Parallel(items.into_iter().map(Into::into).collect())
}

impl From<&str> for GraphSpec {
    fn from(name: &str) -> Self {
        task(name)
    }
}

impl From<String> for GraphSpec {
    fn from(name: String) -> Self {
        task(name)
    }
}

/// One node of a compiled graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpec {
    pub id: NodeId,
    /// Registry task this node runs.
    pub task: TaskName,
    /// Nodes that must complete successfully before this one starts.
    pub deps: Vec<NodeId>,
}

impl GraphSpec {
    /// Every task name referenced by this spec, in declaration order
    /// (duplicates included).
    pub fn task_names(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_names(&mut out);
        out
    }

    fn collect_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            GraphSpec::Task(name) => out.push(name.as_str()),
            GraphSpec::Sequence(items) | GraphSpec::Parallel(items) => {
                for item in items {
                    item.collect_names(out);
                }
            }
        }
    }

    /// Compile into nodes whose ids are the task names.
    pub fn compile(&self) -> Vec<NodeSpec> {
        self.compile_with_prefix(None)
    }

    /// Compile into nodes whose ids are `"{prefix}/{task}"` when a prefix is
    /// given.
    pub fn compile_with_prefix(&self, prefix: Option<&str>) -> Vec<NodeSpec> {
        let mut compiler = Compiler {
            prefix,
            nodes: Vec::new(),
            uses: HashMap::new(),
        };
        compiler.compile(self, Vec::new());
        compiler.nodes
    }
}

struct Compiler<'p> {
    prefix: Option<&'p str>,
    nodes: Vec<NodeSpec>,
    uses: HashMap<String, usize>,
}

impl Compiler<'_> {
    /// Compile `spec` with the given entry dependencies and return its exits.
    fn compile(&mut self, spec: &GraphSpec, entry: Vec<NodeId>) -> Vec<NodeId> {
        match spec {
            GraphSpec::Task(name) => {
                let id = self.next_id(name);
                self.nodes.push(NodeSpec {
                    id: id.clone(),
                    task: name.clone(),
                    deps: entry,
                });
                vec![id]
            }
            GraphSpec::Sequence(items) => {
                let mut current = entry;
                for item in items {
                    current = self.compile(item, current);
                }
                current
            }
            GraphSpec::Parallel(items) => {
                if items.is_empty() {
                    return entry;
                }
                let mut exits = Vec::new();
                for item in items {
                    for id in self.compile(item, entry.clone()) {
                        if !exits.contains(&id) {
                            exits.push(id);
                        }
                    }
                }
                exits
            }
        }
    }

    fn next_id(&mut self, task: &str) -> NodeId {
        let base = match self.prefix {
            Some(prefix) => format!("{prefix}/{task}"),
            None => task.to_string(),
        };
        let count = self.uses.entry(base.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            base
        } else {
            format!("{base}#{count}")
        }
    }
}
