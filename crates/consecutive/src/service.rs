use crate::{error::CounterError, format, store::CounterStore};
use chrono::{DateTime, Utc};
use model::counter::{
    Consecutive, CounterAction, CounterMetrics, Reservation, ReservationStatus, ReservedValue,
};
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};
use uuid::Uuid;

const CAS_MAX_ATTEMPTS: usize = 64;
const DEFAULT_RESERVATION_TTL: Duration = Duration::from_secs(300);

/// Linearisable operations over counter documents. Every mutation runs a
/// compare-and-swap loop against the store, so concurrent callers on the
/// same counter serialise; different counters are independent.
pub struct ConsecutiveService {
    store: Arc<dyn CounterStore>,
    reservation_ttl: Duration,
}

impl ConsecutiveService {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        ConsecutiveService {
            store,
            reservation_ttl: DEFAULT_RESERVATION_TTL,
        }
    }

    pub fn with_ttl(store: Arc<dyn CounterStore>, reservation_ttl: Duration) -> Self {
        ConsecutiveService {
            store,
            reservation_ttl,
        }
    }

    pub fn store(&self) -> Arc<dyn CounterStore> {
        self.store.clone()
    }

    /// Create the counter if it does not exist yet; otherwise return it
    /// unchanged.
    pub async fn ensure(
        &self,
        name: &str,
        format_template: &str,
        start_value: i64,
        increment: i64,
    ) -> Result<Consecutive, CounterError> {
        format::validate(format_template)?;
        if let Some((_, doc)) = self.store.load_raw(name).await? {
            return Ok(doc);
        }
        let doc = Consecutive::new(name, format_template, start_value, increment);
        if self.store.cas_raw(name, None, &doc).await? {
            info!(counter = name, "counter created");
            return Ok(doc);
        }
        // Lost the creation race; the winner's document is authoritative.
        self.store
            .load_raw(name)
            .await?
            .map(|(_, doc)| doc)
            .ok_or_else(|| CounterError::Conflict(name.to_string()))
    }

    pub async fn get(&self, name: &str) -> Result<Consecutive, CounterError> {
        self.store
            .load_raw(name)
            .await?
            .map(|(_, doc)| doc)
            .ok_or_else(|| CounterError::NotFound(name.to_string()))
    }

    pub async fn list(&self) -> Result<Vec<String>, CounterError> {
        self.store.list().await
    }

    /// Advance the counter by one increment and return the new value.
    pub async fn next_value(
        &self,
        name: &str,
        segment: Option<&str>,
        prefix: Option<&str>,
    ) -> Result<ReservedValue, CounterError> {
        self.update(name, |doc| {
            if !doc.active {
                return Err(CounterError::Inactive(doc.name.clone()));
            }
            let next = doc.value_for(segment) + doc.increment;
            doc.set_value_for(segment, next);
            doc.record(CounterAction::Incremented, next, segment);
            Ok(ReservedValue {
                numeric: next,
                formatted: format::render(&doc.format, next, prefix, Utc::now()),
            })
        })
        .await
    }

    /// Atomically allocate `count` values under a reservation. The values
    /// become permanent on commit; cancel or expiry leaves a gap.
    pub async fn reserve(
        &self,
        name: &str,
        count: usize,
        segment: Option<&str>,
        reserved_by: Option<&str>,
        prefix: Option<&str>,
    ) -> Result<Reservation, CounterError> {
        let count = count.max(1);
        let ttl = chrono::Duration::from_std(self.reservation_ttl)
            .unwrap_or_else(|_| chrono::Duration::seconds(300));

        self.update(name, |doc| {
            if !doc.active {
                return Err(CounterError::Inactive(doc.name.clone()));
            }
            let now = Utc::now();
            let base = doc.value_for(segment);
            let values: Vec<ReservedValue> = (1..=count as i64)
                .map(|i| {
                    let numeric = base + i * doc.increment;
                    ReservedValue {
                        numeric,
                        formatted: format::render(&doc.format, numeric, prefix, now),
                    }
                })
                .collect();
            doc.set_value_for(segment, base + count as i64 * doc.increment);
            for value in &values {
                doc.record(CounterAction::Incremented, value.numeric, segment);
            }

            let reservation = Reservation {
                reservation_id: Uuid::new_v4().to_string(),
                values,
                created_at: now,
                expires_at: now + ttl,
                status: ReservationStatus::Reserved,
                reserved_by: reserved_by.map(|s| s.to_string()),
                segment: segment.map(|s| s.to_string()),
            };
            doc.reservations.push(reservation.clone());
            Ok(reservation)
        })
        .await
    }

    /// Mark a reservation permanent. Idempotent by reservation id.
    pub async fn commit(&self, name: &str, reservation_id: &str) -> Result<(), CounterError> {
        self.update(name, |doc| {
            let (status, last, segment) = {
                let res = doc.reservation(reservation_id).ok_or_else(|| {
                    CounterError::ReservationNotFound(reservation_id.to_string())
                })?;
                (
                    res.status,
                    res.values.last().map(|v| v.numeric).unwrap_or(0),
                    res.segment.clone(),
                )
            };
            match status {
                ReservationStatus::Committed => Ok(()),
                ReservationStatus::Cancelled => Err(CounterError::ReservationCancelled(
                    reservation_id.to_string(),
                )),
                ReservationStatus::Reserved => {
                    if let Some(res) = doc.reservation_mut(reservation_id) {
                        res.status = ReservationStatus::Committed;
                    }
                    doc.record(CounterAction::Committed, last, segment.as_deref());
                    Ok(())
                }
            }
        })
        .await
    }

    /// Give up a reservation. The allocated range is not reused. Idempotent.
    pub async fn cancel(&self, name: &str, reservation_id: &str) -> Result<(), CounterError> {
        self.update(name, |doc| {
            let (status, last, segment) = {
                let res = doc.reservation(reservation_id).ok_or_else(|| {
                    CounterError::ReservationNotFound(reservation_id.to_string())
                })?;
                (
                    res.status,
                    res.values.last().map(|v| v.numeric).unwrap_or(0),
                    res.segment.clone(),
                )
            };
            match status {
                ReservationStatus::Cancelled => Ok(()),
                ReservationStatus::Committed => Err(CounterError::AlreadyCommitted(
                    reservation_id.to_string(),
                )),
                ReservationStatus::Reserved => {
                    if let Some(res) = doc.reservation_mut(reservation_id) {
                        res.status = ReservationStatus::Cancelled;
                    }
                    doc.record(CounterAction::Cancelled, last, segment.as_deref());
                    Ok(())
                }
            }
        })
        .await
    }

    /// Force the counter to `value`, regardless of its previous value.
    pub async fn reset(
        &self,
        name: &str,
        value: i64,
        segment: Option<&str>,
    ) -> Result<(), CounterError> {
        self.update(name, |doc| {
            doc.set_value_for(segment, value);
            doc.record(CounterAction::Reset, value, segment);
            Ok(())
        })
        .await
    }

    /// Flip expired `reserved` entries to `cancelled`. Returns how many
    /// were reclaimed.
    pub async fn sweep_expired(&self, name: &str, now: DateTime<Utc>) -> Result<usize, CounterError> {
        let doc = self.get(name).await?;
        let has_expired = doc
            .reservations
            .iter()
            .any(|r| r.status == ReservationStatus::Reserved && r.expires_at <= now);
        if !has_expired {
            return Ok(0);
        }

        self.update(name, |doc| {
            let mut swept = Vec::new();
            for res in &mut doc.reservations {
                if res.status == ReservationStatus::Reserved && res.expires_at <= now {
                    res.status = ReservationStatus::Cancelled;
                    swept.push((
                        res.reservation_id.clone(),
                        res.values.last().map(|v| v.numeric).unwrap_or(0),
                        res.segment.clone(),
                    ));
                }
            }
            for (id, last, segment) in &swept {
                warn!(counter = %doc.name, reservation = %id, "expired reservation reclaimed");
                doc.record(CounterAction::Cancelled, *last, segment.as_deref());
            }
            Ok(swept.len())
        })
        .await
    }

    /// Aggregate history and reservation state over a trailing window.
    pub async fn metrics(&self, name: &str, window: Duration) -> Result<CounterMetrics, CounterError> {
        let doc = self.get(name).await?;
        let now = Utc::now();
        let since = now
            - chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::hours(24));

        let mut metrics = CounterMetrics {
            window_start: Some(since),
            window_end: Some(now),
            ..CounterMetrics::default()
        };

        for entry in doc.history.iter().filter(|e| e.date >= since) {
            match entry.action {
                CounterAction::Incremented => metrics.increments += 1,
                CounterAction::Reset => metrics.resets += 1,
                CounterAction::Committed | CounterAction::Cancelled => {}
            }
            metrics.min_value = Some(metrics.min_value.map_or(entry.value, |v| v.min(entry.value)));
            metrics.max_value = Some(metrics.max_value.map_or(entry.value, |v| v.max(entry.value)));
            if let Some(segment) = &entry.segment {
                *metrics.per_segment.entry(segment.clone()).or_default() += 1;
            }
        }

        for res in &doc.reservations {
            match res.status {
                ReservationStatus::Committed if res.created_at >= since => {
                    metrics.committed_reservations += 1;
                }
                ReservationStatus::Cancelled if res.created_at >= since => {
                    metrics.cancelled_reservations += 1;
                }
                ReservationStatus::Reserved => {
                    if res.expires_at <= now {
                        metrics.expired_reservations += 1;
                    } else {
                        metrics.active_reservations += 1;
                    }
                }
                _ => {}
            }
        }
        Ok(metrics)
    }

    async fn update<T, F>(&self, name: &str, mut mutate: F) -> Result<T, CounterError>
    where
        F: FnMut(&mut Consecutive) -> Result<T, CounterError>,
    {
        for _ in 0..CAS_MAX_ATTEMPTS {
            let (bytes, mut doc) = self
                .store
                .load_raw(name)
                .await?
                .ok_or_else(|| CounterError::NotFound(name.to_string()))?;
            let out = mutate(&mut doc)?;
            if self.store.cas_raw(name, Some(&bytes), &doc).await? {
                return Ok(out);
            }
            tokio::task::yield_now().await;
        }
        Err(CounterError::Conflict(name.to_string()))
    }
}
