// src/dag/scheduler_step.rs

//! Step-by-step execution result types for the scheduler.

use crate::dag::spec::NodeId;
use crate::dag::task_info::ScheduledTask;

/// Structured result of a single scheduler "step".
///
/// Useful for tests that manually step the graph and assert on what changed.
#[derive(Debug, Clone)]
pub struct SchedulerStep {
    /// Nodes that became ready to run as a result of this step.
    pub newly_scheduled: Vec<ScheduledTask>,
    /// Nodes newly marked as failed in this step (the failing node and any
    /// dependents).
    pub newly_failed: Vec<NodeId>,
    /// Whether this step finished the current run.
    pub run_just_finished: bool,
}

impl SchedulerStep {
    pub(crate) fn empty() -> Self {
        Self {
            newly_scheduled: Vec::new(),
            newly_failed: Vec::new(),
            run_just_finished: false,
        }
    }
}
