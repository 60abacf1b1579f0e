use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use sitepipe::dag::ScheduledTask;
use sitepipe::engine::{RuntimeEvent, TaskOutcome};
use sitepipe::errors::Result;
use sitepipe::exec::ExecutorBackend;

/// A fake executor that:
/// - records which nodes were dispatched, in dispatch order
/// - immediately reports `TaskCompleted` for each of them, failing the
///   nodes listed in `failing`.
pub struct FakeExecutor {
    runtime_tx: tokio::sync::mpsc::Sender<RuntimeEvent>,
    executed: Arc<Mutex<Vec<String>>>,
    failing: HashSet<String>,
}

impl FakeExecutor {
    pub fn new(
        runtime_tx: tokio::sync::mpsc::Sender<RuntimeEvent>,
        executed: Arc<Mutex<Vec<String>>>,
    ) -> Self {
        Self {
            runtime_tx,
            executed,
            failing: HashSet::new(),
        }
    }

    /// Nodes that report a failure instead of success.
    pub fn failing<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing.extend(nodes.into_iter().map(Into::into));
        self
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let executed = Arc::clone(&self.executed);
        let failing = self.failing.clone();

        Box::pin(async move {
            for t in tasks {
                executed.lock().unwrap().push(t.name.clone());

                let outcome = if failing.contains(&t.name) {
                    TaskOutcome::Failed(format!("simulated failure in {}", t.name))
                } else {
                    TaskOutcome::Success
                };

                tx.send(RuntimeEvent::TaskCompleted {
                    task: t.name.clone(),
                    outcome,
                })
                .await
                .map_err(anyhow::Error::from)?;
            }
            Ok(())
        })
    }
}
