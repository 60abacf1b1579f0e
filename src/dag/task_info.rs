// src/dag/task_info.rs

//! Node metadata and per-run state.

use std::path::{Path, PathBuf};

use crate::dag::spec::NodeId;
use crate::engine::TaskName;
use crate::fs::normalize_path;

/// Per-run state of a node (internal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Node is part of this run but waiting on dependencies or a write-set
    /// conflict.
    Pending,
    /// Node has been dispatched to the executor.
    Running,
    /// Node completed successfully in this run.
    DoneSuccess,
    /// Node failed in this run (or was blocked by a failed dependency).
    DoneFailed,
}

/// Public, read-only view of a node's per-run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRunState {
    /// The node is not participating in the current run.
    NotInRun,
    Pending,
    Running,
    DoneSuccess,
    DoneFailed,
}

impl From<Option<RunState>> for TaskRunState {
    fn from(state: Option<RunState>) -> Self {
        match state {
            None => TaskRunState::NotInRun,
            Some(RunState::Pending) => TaskRunState::Pending,
            Some(RunState::Running) => TaskRunState::Running,
            Some(RunState::DoneSuccess) => TaskRunState::DoneSuccess,
            Some(RunState::DoneFailed) => TaskRunState::DoneFailed,
        }
    }
}

/// Static node information plus per-run state.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub name: NodeId,
    pub task: TaskName,
    /// Directories this node writes into.
    pub writes: Vec<PathBuf>,
    /// Direct dependencies.
    pub deps: Vec<NodeId>,
    /// Declaration order in the graph.
    pub order: usize,

    /// Per-run state (None if not participating in the current run).
    pub run_state: Option<RunState>,

    /// Last run ID in which this node succeeded.
    pub last_successful_run: Option<u64>,

    /// Last run ID in which this node failed.
    pub last_failed_run: Option<u64>,
}

impl TaskInfo {
    pub fn new(
        name: NodeId,
        task: TaskName,
        writes: Vec<PathBuf>,
        deps: Vec<NodeId>,
        order: usize,
    ) -> Self {
        Self {
            name,
            task,
            writes: writes.iter().map(|p| normalize_path(p)).collect(),
            deps,
            order,
            run_state: None,
            last_successful_run: None,
            last_failed_run: None,
        }
    }

    /// Whether this node and `other` write into the same or nested
    /// directories. Both sides must already be normalised.
    pub fn write_conflicts_with(&self, other: &[PathBuf]) -> bool {
        self.writes
            .iter()
            .any(|mine| other.iter().any(|theirs| paths_overlap(mine, theirs)))
    }
}

fn paths_overlap(a: &Path, b: &Path) -> bool {
    a.starts_with(b) || b.starts_with(a)
}

/// A node the scheduler wants the executor to run now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTask {
    /// Node id, used for every event sent back to the runtime.
    pub name: NodeId,
    /// Registry task to execute.
    pub task: TaskName,
    /// Monotonically increasing run identifier shared by all nodes of a run.
    pub run_id: u64,
}

impl ScheduledTask {
    pub fn from_task_info(info: &TaskInfo, run_id: u64) -> Self {
        Self {
            name: info.name.clone(),
            task: info.task.clone(),
            run_id,
        }
    }
}
