use serde::Serialize;
use tokio::sync::watch;

/// Snapshot of an execution's progress, published on every document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressStatus {
    pub execution_id: String,
    pub done: u64,
    pub total: u64,
    pub processed: u64,
    pub failed: u64,
    pub skipped: u64,
}

impl ProgressStatus {
    fn initial(execution_id: &str, total: u64) -> Self {
        ProgressStatus {
            execution_id: execution_id.to_string(),
            done: 0,
            total,
            processed: 0,
            failed: 0,
            skipped: 0,
        }
    }
}

/// Publishes progress over a watch channel; pollers keep the receiver.
pub struct ProgressReporter {
    tx: watch::Sender<ProgressStatus>,
}

impl ProgressReporter {
    pub fn new(execution_id: &str, total: u64) -> Self {
        let (tx, _) = watch::channel(ProgressStatus::initial(execution_id, total));
        ProgressReporter { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<ProgressStatus> {
        self.tx.subscribe()
    }

    pub fn report(&self, done: u64, processed: u64, failed: u64, skipped: u64) {
        self.tx.send_modify(|status| {
            status.done = done;
            status.processed = processed;
            status.failed = failed;
            status.skipped = skipped;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn receivers_observe_updates() {
        let reporter = ProgressReporter::new("e1", 10);
        let rx = reporter.subscribe();
        reporter.report(3, 2, 1, 0);
        let status = rx.borrow().clone();
        assert_eq!(status.done, 3);
        assert_eq!(status.processed, 2);
        assert_eq!(status.failed, 1);
        assert_eq!(status.total, 10);
    }
}
