use crate::progress::ProgressStatus;
use chrono::{DateTime, Utc};
use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// One live execution as seen by the tracker.
#[derive(Clone)]
pub struct RunningExecution {
    pub execution_id: String,
    pub mapping_id: String,
    pub started_at: DateTime<Utc>,
    pub cancel: CancellationToken,
    pub progress: watch::Receiver<ProgressStatus>,
}

/// In-process registry of running executions, used for cancellation and
/// status polling. Keyed by execution id.
#[derive(Clone, Default)]
pub struct TaskTracker {
    inner: Arc<RwLock<HashMap<String, RunningExecution>>>,
}

impl TaskTracker {
    pub fn new() -> Self {
        TaskTracker::default()
    }

    pub fn register(&self, execution: RunningExecution) {
        let mut guard = self.inner.write().expect("task tracker poisoned");
        guard.insert(execution.execution_id.clone(), execution);
    }

    pub fn deregister(&self, execution_id: &str) {
        let mut guard = self.inner.write().expect("task tracker poisoned");
        guard.remove(execution_id);
    }

    /// Signal cancellation for a running execution. Returns whether the
    /// execution was found.
    pub fn cancel(&self, execution_id: &str) -> bool {
        let guard = self.inner.read().expect("task tracker poisoned");
        match guard.get(execution_id) {
            Some(execution) => {
                info!(execution_id, "cancellation requested");
                execution.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn status(&self, execution_id: &str) -> Option<ProgressStatus> {
        let guard = self.inner.read().expect("task tracker poisoned");
        guard
            .get(execution_id)
            .map(|execution| execution.progress.borrow().clone())
    }

    pub fn running(&self) -> Vec<(String, String, DateTime<Utc>)> {
        let guard = self.inner.read().expect("task tracker poisoned");
        guard
            .values()
            .map(|e| (e.execution_id.clone(), e.mapping_id.clone(), e.started_at))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressReporter;

    #[tokio::test]
    async fn register_cancel_deregister() {
        let tracker = TaskTracker::new();
        let reporter = ProgressReporter::new("e1", 5);
        let token = CancellationToken::new();
        tracker.register(RunningExecution {
            execution_id: "e1".into(),
            mapping_id: "m1".into(),
            started_at: Utc::now(),
            cancel: token.clone(),
            progress: reporter.subscribe(),
        });

        assert_eq!(tracker.running().len(), 1);
        assert!(tracker.status("e1").is_some());
        assert!(tracker.cancel("e1"));
        assert!(token.is_cancelled());
        assert!(!tracker.cancel("nope"));

        tracker.deregister("e1");
        assert!(tracker.status("e1").is_none());
    }
}
