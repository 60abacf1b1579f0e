// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use std::collections::BTreeSet;

use crate::dag::{NodeId, ScheduledTask, Scheduler, TaskRunState};
use crate::engine::queue::TriggerQueue;
use crate::engine::{RuntimeOptions, TaskName, TaskOutcome, TriggerReason};

/// Command produced by the pure core, executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Send these tasks to the executor.
    DispatchTasks(Vec<ScheduledTask>),
    /// The graph finished successfully and the runtime should exit.
    RequestExit,
    /// A node failed in fail-fast mode; stop and report it.
    Abort { task: NodeId, message: String },
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn running(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }
}

/// Handle a trigger event.
///
/// - Idle scheduler: start a new run seeded with this trigger plus anything
///   queued.
/// - Active run, node not part of it: merge it into the current run
///   immediately (unrelated watch bindings share a run).
/// - Active run, node already part of it: defer through the trigger queue.
pub fn handle_task_trigger(
    scheduler: &mut Scheduler,
    queue: &mut TriggerQueue,
    task: TaskName,
    reason: TriggerReason,
) -> CoreStep {
    let mut commands = Vec::new();

    if scheduler.is_idle() {
        let mut triggers: BTreeSet<TaskName> = queue.drain_pending().into_iter().collect();
        triggers.insert(task);

        let mut step = start_new_run_from_triggers(scheduler, triggers.into_iter().collect());
        commands.append(&mut step.commands);
        return CoreStep::running(commands);
    }

    match scheduler.run_state_of(&task) {
        None => {
            tracing::warn!(node = %task, ?reason, "trigger for unknown node; ignoring");
        }
        Some(TaskRunState::NotInRun) => {
            let newly_ready = scheduler.handle_trigger(&task);
            if !newly_ready.is_empty() {
                commands.push(CoreCommand::DispatchTasks(newly_ready));
            }
        }
        Some(_already_in_run) => {
            queue.record_trigger(&task);
        }
    }

    CoreStep::running(commands)
}

/// Handle a task completion event.
pub fn handle_task_completion(
    scheduler: &mut Scheduler,
    queue: &mut TriggerQueue,
    options: &RuntimeOptions,
    task: TaskName,
    outcome: TaskOutcome,
) -> CoreStep {
    let mut commands = Vec::new();

    let failure = match &outcome {
        TaskOutcome::Failed(message) => Some(message.clone()),
        TaskOutcome::Success => None,
    };

    let newly_ready = scheduler.handle_completion(&task, outcome);

    if let (Some(message), true) = (failure, options.fail_fast) {
        scheduler.abort_run();
        queue.clear();
        commands.push(CoreCommand::Abort { task, message });
        return CoreStep {
            commands,
            keep_running: false,
        };
    }

    if !newly_ready.is_empty() {
        commands.push(CoreCommand::DispatchTasks(newly_ready));
    }

    commands.append(&mut maybe_start_queued_run(scheduler, queue));

    let mut keep_running = true;
    if options.exit_when_idle && scheduler.is_idle() && queue.is_empty() {
        keep_running = false;
        commands.push(CoreCommand::RequestExit);
    }

    CoreStep {
        commands,
        keep_running,
    }
}

/// Start a new run seeded with the given triggers.
pub fn start_new_run_from_triggers(scheduler: &mut Scheduler, triggers: Vec<TaskName>) -> CoreStep {
    let mut commands = Vec::new();

    if triggers.is_empty() {
        return CoreStep::running(commands);
    }

    scheduler.start_new_run();

    let mut all_ready = Vec::new();
    for task in triggers {
        all_ready.extend(scheduler.handle_trigger(&task));
    }

    if !all_ready.is_empty() {
        commands.push(CoreCommand::DispatchTasks(all_ready));
    }

    CoreStep::running(commands)
}

/// If the scheduler is idle and there are queued triggers, start a new run.
fn maybe_start_queued_run(scheduler: &mut Scheduler, queue: &mut TriggerQueue) -> Vec<CoreCommand> {
    if !scheduler.is_idle() {
        return Vec::new();
    }

    let triggers = queue.drain_pending();
    if triggers.is_empty() {
        return Vec::new();
    }

    start_new_run_from_triggers(scheduler, triggers).commands
}
