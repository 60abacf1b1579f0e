// src/dag/mod.rs

//! Task graph representation and scheduling.
//!
//! - [`spec`] holds the `task` / `sequence` / `parallel` combinators and
//!   compiles them into flat node lists.
//! - [`graph`] holds the validated directed acyclic graph of nodes.
//! - [`scheduler`] contains the per-run state machine that decides which
//!   nodes are ready to run.
//! - [`task_info`] provides node metadata and scheduled task types.
//! - [`scheduler_step`] defines the result type for scheduler steps.
//! - [`state_manager`] manages per-run state transitions.

pub mod graph;
pub mod scheduler;
pub mod scheduler_step;
pub mod spec;
pub mod state_manager;
pub mod task_info;

pub use graph::DagGraph;
pub use scheduler::{Scheduler, WriteSets};
pub use scheduler_step::SchedulerStep;
pub use spec::{parallel, sequence, task, GraphSpec, NodeId, NodeSpec};
pub use task_info::{ScheduledTask, TaskRunState};
