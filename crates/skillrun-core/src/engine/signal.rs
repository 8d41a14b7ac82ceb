//! Per-execution completion signaling.
//!
//! Unit handlers notify the execution's signal after every terminal row
//! write; the orchestrator's level wait listens on it with a store poll as
//! fallback, so completion latency is bounded by the write, not the poll
//! interval, while restarts recover through the poll path.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Notify;
use uuid::Uuid;

/// Registry of completion signals keyed by execution ID.
#[derive(Debug, Default)]
pub struct CompletionSignals {
    notifiers: DashMap<Uuid, Arc<Notify>>,
}

impl CompletionSignals {
    pub fn new() -> Self {
        Self {
            notifiers: DashMap::new(),
        }
    }

    /// Register (or fetch) the signal for an execution.
    pub fn register(&self, execution_id: Uuid) -> Arc<Notify> {
        self.notifiers
            .entry(execution_id)
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone()
    }

    /// Wake the execution's waiter, if any. A permit is stored when nobody
    /// is waiting, so a notify racing the wait is never lost.
    pub fn notify(&self, execution_id: Uuid) {
        if let Some(notify) = self.notifiers.get(&execution_id) {
            notify.notify_one();
        }
    }

    /// Drop the signal once the execution reaches a terminal state.
    pub fn remove(&self, execution_id: Uuid) {
        self.notifiers.remove(&execution_id);
    }
}
