// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! The core consumes [`RuntimeEvent`]s and produces an updated state plus a
//! list of commands for the IO shell. The async shell
//! (`engine::runtime::Runtime`) reads events from channels, hands
//! `ScheduledTask`s to the executor and reports failures.
//!
//! Nothing here touches Tokio, channels, the filesystem or processes.

use crate::dag::Scheduler;
use crate::engine::event_handlers::{handle_task_completion, handle_task_trigger, CoreStep};
use crate::engine::queue::TriggerQueue;
use crate::engine::{RuntimeEvent, RuntimeOptions};
use crate::types::TriggerWhileRunningBehaviour;

/// Pure core runtime state: the scheduler, the trigger queue and the
/// runtime options.
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
    queue: TriggerQueue,
    options: RuntimeOptions,
}

impl CoreRuntime {
    pub fn new(
        scheduler: Scheduler,
        behaviour: TriggerWhileRunningBehaviour,
        queue_length: usize,
        options: RuntimeOptions,
    ) -> Self {
        let queue = TriggerQueue::new(behaviour, queue_length);
        Self {
            scheduler,
            queue,
            options,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle()
    }

    pub fn queue_is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Handle a single runtime event and return the commands for the shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::TaskTriggered { task, reason } => {
                handle_task_trigger(&mut self.scheduler, &mut self.queue, task, reason)
            }
            RuntimeEvent::TaskCompleted { task, outcome } => handle_task_completion(
                &mut self.scheduler,
                &mut self.queue,
                &self.options,
                task,
                outcome,
            ),
            RuntimeEvent::ShutdownRequested => CoreStep {
                commands: Vec::new(),
                keep_running: false,
            },
        }
    }
}
