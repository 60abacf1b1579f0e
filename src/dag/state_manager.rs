// src/dag/state_manager.rs

//! Node state transitions within one run.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::dag::DagGraph;
use crate::dag::spec::NodeId;
use crate::dag::task_info::{RunState, ScheduledTask, TaskInfo};

/// Mutable view over the node table for the active run.
pub struct StateManager<'a> {
    graph: &'a DagGraph,
    tasks: &'a mut HashMap<NodeId, TaskInfo>,
    current_run_id: Option<u64>,
}

impl<'a> StateManager<'a> {
    pub fn new(
        graph: &'a DagGraph,
        tasks: &'a mut HashMap<NodeId, TaskInfo>,
        current_run_id: Option<u64>,
    ) -> Self {
        Self {
            graph,
            tasks,
            current_run_id,
        }
    }

    /// Add `root` and everything downstream of it to the run. Nodes already
    /// in the run keep their state.
    pub fn enlist_downstream(&mut self, root: &str) {
        let mut stack: Vec<NodeId> = vec![root.to_string()];
        let mut seen: HashSet<NodeId> = HashSet::new();

        while let Some(id) = stack.pop() {
            if !seen.insert(id.clone()) {
                continue;
            }
            let Some(info) = self.tasks.get_mut(&id) else {
                warn!(node = %id, "graph node missing from the node table");
                continue;
            };

            if info.run_state.is_none() {
                info.run_state = Some(RunState::Pending);
                debug!(node = %info.name, "pending");
            }
            stack.extend(self.graph.dependents_of(&id).iter().cloned());
        }
    }

    /// Fail every unsettled node downstream of `failed`, which aborts the
    /// rest of its sequence. Returns them, `failed` excluded.
    pub fn fail_downstream(&mut self, failed: &str) -> Vec<NodeId> {
        let mut stack: Vec<NodeId> = self.graph.dependents_of(failed).to_vec();
        let mut newly_failed = Vec::new();

        while let Some(id) = stack.pop() {
            let Some(info) = self.tasks.get_mut(&id) else {
                continue;
            };
            if matches!(info.run_state, Some(RunState::Pending | RunState::Running)) {
                info.run_state = Some(RunState::DoneFailed);
                debug!(node = %info.name, upstream = %failed, "blocked by failure");
                newly_failed.push(info.name.clone());
                stack.extend(self.graph.dependents_of(&id).iter().cloned());
            }
        }

        newly_failed
    }

    /// Fail every node of the run that has not settled yet, sorted.
    pub fn fail_unsettled(&mut self) -> Vec<NodeId> {
        let mut failed: Vec<NodeId> = self
            .tasks
            .values_mut()
            .filter(|info| matches!(info.run_state, Some(RunState::Pending | RunState::Running)))
            .map(|info| {
                info.run_state = Some(RunState::DoneFailed);
                info.name.clone()
            })
            .collect();
        failed.sort();
        failed
    }

    /// Move ready `Pending` nodes to `Running`, in declaration order.
    ///
    /// A ready node whose write-set overlaps a running node, or one picked
    /// earlier in this call, stays `Pending` until that node settles.
    pub fn dispatch_ready(&mut self) -> Vec<ScheduledTask> {
        let mut candidates: Vec<(usize, NodeId)> = self
            .tasks
            .values()
            .filter(|info| {
                info.run_state == Some(RunState::Pending) && deps_satisfied(self.tasks, info)
            })
            .map(|info| (info.order, info.name.clone()))
            .collect();
        candidates.sort();

        let mut busy: Vec<PathBuf> = self
            .tasks
            .values()
            .filter(|info| info.run_state == Some(RunState::Running))
            .flat_map(|info| info.writes.iter().cloned())
            .collect();

        let run_id = self.current_run_id.unwrap_or(0);
        let mut ready = Vec::new();

        for (_, id) in candidates {
            let Some(info) = self.tasks.get_mut(&id) else {
                continue;
            };

            if info.write_conflicts_with(&busy) {
                debug!(node = %info.name, run_id, writes = ?info.writes, "write-set busy; deferring");
                continue;
            }

            if info.last_successful_run.is_some() || info.last_failed_run.is_some() {
                info!(node = %info.name, run_id, "re-running");
            } else {
                debug!(node = %info.name, run_id, "dispatching");
            }

            busy.extend(info.writes.iter().cloned());
            info.run_state = Some(RunState::Running);
            ready.push(ScheduledTask::from_task_info(info, run_id));
        }

        ready
    }

    /// No node of the run is pending or running.
    pub fn run_settled(&self) -> bool {
        !self
            .tasks
            .values()
            .any(|info| matches!(info.run_state, Some(RunState::Pending | RunState::Running)))
    }
}

/// A dependency inside the run must have succeeded in it; one outside the
/// run counts if it ever succeeded.
pub fn deps_satisfied(tasks: &HashMap<NodeId, TaskInfo>, info: &TaskInfo) -> bool {
    info.deps.iter().all(|dep_id| {
        let Some(dep) = tasks.get(dep_id) else {
            warn!(node = %info.name, dep = %dep_id, "dependency missing from the node table");
            return false;
        };
        match dep.run_state {
            Some(RunState::DoneSuccess) => true,
            Some(_) => false,
            None => dep.last_successful_run.is_some(),
        }
    })
}
