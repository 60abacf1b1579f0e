use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::dag::graph::DagGraph;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::spec::NodeId;
use crate::dag::state_manager::{deps_satisfied, StateManager};
use crate::dag::task_info::{RunState, ScheduledTask, TaskInfo, TaskRunState};
use crate::engine::TaskOutcome;

/// Write-sets keyed by registry task name.
pub type WriteSets = HashMap<String, Vec<PathBuf>>;

/// Scheduler holds the immutable DAG plus mutable per-run state.
///
/// It is responsible for:
/// - remembering which nodes are part of the current run
/// - deciding when a triggered node is ready (deps satisfied, no write-set
///   conflict with a running node)
/// - marking nodes as succeeded/failed
/// - failing dependents when a node fails
#[derive(Debug)]
pub struct Scheduler {
    graph: DagGraph,
    tasks: HashMap<NodeId, TaskInfo>,
    /// Monotonically increasing run ID.
    run_counter: u64,
    /// Currently active run ID, or `None` if there is no active run.
    current_run_id: Option<u64>,
}

impl Scheduler {
    /// Construct a scheduler for a validated graph.
    ///
    /// `write_sets` maps registry task names to the directories they write;
    /// tasks missing from the map write nothing.
    pub fn new(graph: DagGraph, write_sets: &WriteSets) -> Self {
        let mut tasks = HashMap::new();

        for (order, id) in graph.nodes().enumerate() {
            let task = graph.task_of(id).unwrap_or(id).to_string();
            let writes = write_sets.get(&task).cloned().unwrap_or_default();
            let deps = graph.dependencies_of(id).to_vec();
            tasks.insert(
                id.to_string(),
                TaskInfo::new(id.to_string(), task, writes, deps, order),
            );
        }

        Self {
            graph,
            tasks,
            run_counter: 0,
            current_run_id: None,
        }
    }

    /// Construct a scheduler without write-set serialization.
    pub fn without_write_sets(graph: DagGraph) -> Self {
        Self::new(graph, &WriteSets::new())
    }

    pub fn graph(&self) -> &DagGraph {
        &self.graph
    }

    /// Returns `true` if there is currently no active run.
    pub fn is_idle(&self) -> bool {
        self.current_run_id.is_none()
    }

    /// Read-only view of the given node's run state.
    pub fn run_state_of(&self, node: &str) -> Option<TaskRunState> {
        let info = self.tasks.get(node)?;
        Some(info.run_state.into())
    }

    /// Nodes participating in the active run (empty when idle).
    pub fn tasks_in_current_run(&self) -> Vec<NodeId> {
        if self.current_run_id.is_none() {
            return Vec::new();
        }

        self.tasks
            .values()
            .filter(|info| info.run_state.is_some())
            .map(|info| info.name.clone())
            .collect()
    }

    /// Whether the dependencies of `node` are satisfied for the current run.
    ///
    /// Returns `None` if the node is unknown.
    pub fn deps_satisfied(&self, node: &str) -> Option<bool> {
        let info = self.tasks.get(node)?;
        Some(deps_satisfied(&self.tasks, info))
    }

    /// Start a new run, resetting per-run state but keeping historical
    /// success information.
    pub fn start_new_run(&mut self) {
        self.run_counter += 1;
        self.current_run_id = Some(self.run_counter);

        for info in self.tasks.values_mut() {
            info.run_state = None;
        }

        debug!(run_id = self.run_counter, "scheduler: starting new run");
    }

    /// Handle a trigger for a node.
    pub fn handle_trigger(&mut self, node: &str) -> Vec<ScheduledTask> {
        self.trigger_step_internal(node).newly_scheduled
    }

    /// Handle completion of a node with a concrete outcome.
    pub fn handle_completion(&mut self, node: &str, outcome: TaskOutcome) -> Vec<ScheduledTask> {
        self.completion_step_internal(node, outcome).newly_scheduled
    }

    /// Manual-step variant of `handle_completion`.
    pub fn step_completion(&mut self, node: &str, outcome: TaskOutcome) -> SchedulerStep {
        self.completion_step_internal(node, outcome)
    }

    /// Abort the active run: every unsettled node is marked failed and the
    /// scheduler becomes idle.
    pub fn abort_run(&mut self) -> Vec<NodeId> {
        if self.current_run_id.is_none() {
            return Vec::new();
        }
        let mut manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
        let failed = manager.fail_unsettled();
        warn!(
            run_id = self.current_run_id,
            aborted = ?failed,
            "scheduler: aborting run"
        );
        self.current_run_id = None;
        failed
    }

    /// Clear `current_run_id` once every node is terminal.
    ///
    /// Returns `true` if this call transitioned the scheduler to idle.
    fn maybe_finish_run(&mut self) -> bool {
        if self.current_run_id.is_none() {
            return false;
        }

        let manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);

        if manager.run_settled() {
            info!(
                run_id = self.current_run_id,
                "scheduler: all tasks settled; run finished"
            );
            self.current_run_id = None;
            true
        } else {
            false
        }
    }

    fn trigger_step_internal(&mut self, node: &str) -> SchedulerStep {
        if self.current_run_id.is_none() {
            debug!(
                node = %node,
                "trigger with no active run; implicitly starting a new run"
            );
            self.start_new_run();
        }

        if self.tasks.contains_key(node) {
            let mut manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
            manager.enlist_downstream(node);
        } else {
            warn!(node = %node, "trigger for unknown node; ignoring");
        }

        let mut manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
        let newly_scheduled = manager.dispatch_ready();
        let run_just_finished = self.maybe_finish_run();

        SchedulerStep {
            newly_scheduled,
            newly_failed: Vec::new(),
            run_just_finished,
        }
    }

    fn completion_step_internal(&mut self, node: &str, outcome: TaskOutcome) -> SchedulerStep {
        let run_id = match self.current_run_id {
            Some(id) => id,
            None => {
                warn!(node = %node, "completion with no active run; ignoring");
                return SchedulerStep::empty();
            }
        };

        let mut newly_scheduled = Vec::new();
        let mut newly_failed = Vec::new();

        match self.tasks.get_mut(node) {
            Some(info) if info.run_state != Some(RunState::Running) => {
                warn!(
                    node = %info.name,
                    run_id,
                    state = ?info.run_state,
                    "completion for a node that is not running; ignoring"
                );
            }
            Some(info) => {
                match outcome {
                    TaskOutcome::Success => {
                        info.run_state = Some(RunState::DoneSuccess);
                        info.last_successful_run = Some(run_id);
                        debug!(node = %info.name, run_id, "task completed successfully");
                    }
                    TaskOutcome::Failed(ref message) => {
                        info.run_state = Some(RunState::DoneFailed);
                        info.last_failed_run = Some(run_id);
                        warn!(
                            node = %info.name,
                            run_id,
                            error = %message,
                            "task failed; failing dependents in this run"
                        );
                        newly_failed.push(info.name.clone());
                        let mut manager =
                            StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
                        newly_failed.append(&mut manager.fail_downstream(node));
                    }
                }
                // A settled node may unblock dependents or write-set waiters.
                let mut manager =
                    StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
                newly_scheduled.extend(manager.dispatch_ready());
            }
            None => {
                warn!(node = %node, "completion for unknown node; ignoring");
            }
        }

        let run_just_finished = self.maybe_finish_run();

        SchedulerStep {
            newly_scheduled,
            newly_failed,
            run_just_finished,
        }
    }
}
