// src/engine/queue.rs

use std::collections::{BTreeSet, VecDeque};

use tracing::{debug, warn};

use crate::dag::NodeId;
use crate::types::TriggerWhileRunningBehaviour;

/// Queue of watch triggers that arrive for nodes already taking part in the
/// active run.
///
/// - Each entry is a *batch* of node ids to trigger together in one future
///   run.
/// - `max_runs` bounds the number of batches; the default of 1 means "at most
///   one follow-up run", which coalesces any burst of saves into a single
///   rebuild.
/// - When the runtime goes idle it calls [`TriggerQueue::drain_pending`],
///   which merges all batches into the trigger set of the next run.
#[derive(Debug)]
pub struct TriggerQueue {
    behaviour: TriggerWhileRunningBehaviour,
    max_runs: usize,
    runs: VecDeque<BTreeSet<NodeId>>,
}

impl TriggerQueue {
    /// `max_runs` is clamped to at least 1.
    pub fn new(behaviour: TriggerWhileRunningBehaviour, max_runs: usize) -> Self {
        Self {
            behaviour,
            max_runs: max_runs.max(1),
            runs: VecDeque::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Record a trigger that arrived while its node is already in the run.
    ///
    /// - `Queue`: merge into the newest batch (creating one if needed) and
    ///   drop the oldest batches beyond `max_runs`.
    /// - `Cancel`: replace everything queued with a batch holding only this
    ///   node.
    pub fn record_trigger(&mut self, node: &str) {
        match self.behaviour {
            TriggerWhileRunningBehaviour::Queue => {
                match self.runs.back_mut() {
                    Some(batch) => {
                        let inserted = batch.insert(node.to_string());
                        debug!(node = %node, inserted, "merged trigger into queued batch");
                    }
                    None => {
                        self.runs.push_back(BTreeSet::from([node.to_string()]));
                        debug!(node = %node, "queued follow-up run");
                    }
                }

                if self.runs.len() > self.max_runs {
                    warn!(
                        batches = self.runs.len(),
                        max_runs = self.max_runs,
                        "too many queued runs; dropping the oldest"
                    );
                    while self.runs.len() > self.max_runs {
                        self.runs.pop_front();
                    }
                }
            }
            TriggerWhileRunningBehaviour::Cancel => {
                debug!(node = %node, "replacing queued runs with latest trigger");
                self.runs.clear();
                self.runs.push_back(BTreeSet::from([node.to_string()]));
            }
        }
    }

    /// Drain every queued batch into one sorted list of node ids.
    pub fn drain_pending(&mut self) -> Vec<NodeId> {
        let merged: BTreeSet<NodeId> = self.runs.drain(..).flatten().collect();
        debug!(drained = merged.len(), "drained queued triggers");
        merged.into_iter().collect()
    }

    /// Forget every queued trigger.
    pub fn clear(&mut self) {
        self.runs.clear();
    }
}
