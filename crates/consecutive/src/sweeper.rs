use crate::service::ConsecutiveService;
use chrono::Utc;
use std::{sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Background task that periodically reclaims expired reservations on
/// every known counter.
pub struct ReservationSweeper {
    service: Arc<ConsecutiveService>,
    period: Duration,
}

impl ReservationSweeper {
    pub fn new(service: Arc<ConsecutiveService>) -> Self {
        ReservationSweeper {
            service,
            period: DEFAULT_SWEEP_INTERVAL,
        }
    }

    pub fn with_period(service: Arc<ConsecutiveService>, period: Duration) -> Self {
        ReservationSweeper { service, period }
    }

    /// Run until the token fires. One pass over all counters per tick.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.period);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("reservation sweeper stopped");
                        return;
                    }
                    _ = ticker.tick() => {
                        self.sweep_all().await;
                    }
                }
            }
        })
    }

    pub async fn sweep_all(&self) {
        let names = match self.service.list().await {
            Ok(names) => names,
            Err(err) => {
                warn!(%err, "sweeper could not list counters");
                return;
            }
        };
        let now = Utc::now();
        for name in names {
            match self.service.sweep_expired(&name, now).await {
                Ok(0) => {}
                Ok(count) => debug!(counter = %name, count, "reservations reclaimed"),
                Err(err) => warn!(counter = %name, %err, "sweep failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SledCounterStore;
    use model::counter::ReservationStatus;
    use tempfile::tempdir;

    #[tokio::test]
    async fn sweep_all_reclaims_across_counters() {
        let dir = tempdir().unwrap();
        let store = Arc::new(SledCounterStore::open(dir.path()).unwrap());
        let service = Arc::new(ConsecutiveService::with_ttl(store, Duration::from_secs(0)));
        service.ensure("a", "{VALUE}", 0, 1).await.unwrap();
        service.ensure("b", "{VALUE}", 0, 1).await.unwrap();
        let ra = service.reserve("a", 1, None, None, None).await.unwrap();
        let rb = service.reserve("b", 1, None, None, None).await.unwrap();

        let sweeper = ReservationSweeper::new(service.clone());
        sweeper.sweep_all().await;

        for (counter, reservation) in [("a", ra), ("b", rb)] {
            let doc = service.get(counter).await.unwrap();
            assert_eq!(
                doc.reservation(&reservation.reservation_id).unwrap().status,
                ReservationStatus::Cancelled
            );
        }
    }
}
