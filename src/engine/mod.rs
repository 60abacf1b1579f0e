// src/engine/mod.rs

//! Orchestration engine for sitepipe.
//!
//! This module ties together:
//! - the graph scheduler
//! - the trigger queue (what happens when watch triggers arrive while a run
//!   is active)
//! - the runtime event loop that reacts to:
//!   - seed and file-watch triggers
//!   - task completion events
//!   - shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

/// Canonical task name type used throughout the engine.
pub type TaskName = String;

/// Outcome of a task for the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    /// The task reported an error; the message is the rendered error chain.
    Failed(String),
}

/// Why a node was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    /// Seeded by a one-shot run (graph roots).
    Manual,
    /// Triggered by a debounced filesystem event.
    FileWatch,
}

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// Exit once the graph is idle and no triggers are queued.
    pub exit_when_idle: bool,
    /// Abort the whole run on the first failed task.
    pub fail_fast: bool,
}

impl RuntimeOptions {
    /// One-shot graph execution: stop when done, stop on first failure.
    pub fn one_shot() -> Self {
        Self {
            exit_when_idle: true,
            fail_fast: true,
        }
    }

    /// Watch mode: keep listening, failures only affect their own run.
    pub fn watching() -> Self {
        Self {
            exit_when_idle: false,
            fail_fast: false,
        }
    }
}

/// Events flowing into the runtime from watchers, executors, etc.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A node should be triggered.
    TaskTriggered {
        task: TaskName,
        reason: TriggerReason,
    },
    /// A node's task settled.
    TaskCompleted {
        task: TaskName,
        outcome: TaskOutcome,
    },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod queue;
pub mod runtime;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use queue::TriggerQueue;
pub use crate::types::TriggerWhileRunningBehaviour;
pub use runtime::{run_once, Runtime};
