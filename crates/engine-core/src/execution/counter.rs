use crate::error::EngineError;
use chrono::Utc;
use consecutive::{error::CounterError, format, service::ConsecutiveService};
use engine_config::{error::StoreError, store::mapping::MappingStore};
use model::{counter::ReservedValue, mapping::Mapping};
use std::sync::{
    Arc,
    atomic::{AtomicI64, Ordering},
};
use thiserror::Error;
use tracing::warn;

const LOCAL_ALLOC_ATTEMPTS: usize = 64;

/// Per-document allocation failures; they fail the document, not the
/// execution.
#[derive(Debug, Error)]
pub enum AllocError {
    #[error(transparent)]
    Counter(#[from] CounterError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Local consecutive allocation kept losing the race")]
    Exhausted,
}

/// A consecutive value held for one document.
#[derive(Debug, Clone)]
pub struct Allocation {
    pub value: ReservedValue,
    /// Present in centralised mode only.
    reservation_id: Option<String>,
}

/// Counter binding for one execution: either the centralised service or
/// the mapping-local `lastValue` advanced through conditional updates.
pub enum DocumentCounter {
    Central {
        service: Arc<ConsecutiveService>,
        name: String,
        prefix: Option<String>,
    },
    Local {
        store: Arc<dyn MappingStore>,
        mapping_id: String,
        template: String,
        prefix: Option<String>,
        increment: i64,
        last_seen: AtomicI64,
    },
}

impl DocumentCounter {
    /// Bind the mapping's counter, creating the centralised document on
    /// first use.
    pub async fn resolve(
        mapping: &Mapping,
        service: Option<Arc<ConsecutiveService>>,
        store: Arc<dyn MappingStore>,
    ) -> Result<Option<Self>, EngineError> {
        let Some(config) = &mapping.consecutive_config else {
            return Ok(None);
        };
        if !config.enabled {
            return Ok(None);
        }

        if config.use_centralized_service {
            let Some(service) = service else {
                return Err(EngineError::InvalidMapping(
                    "mapping uses the centralized consecutive service but none is configured"
                        .to_string(),
                ));
            };
            let name = config
                .consecutive_name
                .clone()
                .unwrap_or_else(|| mapping.name.clone());
            service
                .ensure(&name, &config.template(), config.start_value, config.increment)
                .await?;
            return Ok(Some(DocumentCounter::Central {
                service,
                name,
                prefix: config.prefix.clone(),
            }));
        }

        Ok(Some(DocumentCounter::Local {
            store,
            mapping_id: mapping.id.clone(),
            template: config.template(),
            prefix: config.prefix.clone(),
            increment: config.increment.max(1),
            last_seen: AtomicI64::new(config.last_value),
        }))
    }

    pub async fn allocate(&self, reserved_by: &str) -> Result<Allocation, AllocError> {
        match self {
            DocumentCounter::Central {
                service,
                name,
                prefix,
            } => {
                let reservation = service
                    .reserve(name, 1, None, Some(reserved_by), prefix.as_deref())
                    .await?;
                let value = reservation
                    .values
                    .first()
                    .cloned()
                    .ok_or(AllocError::Exhausted)?;
                Ok(Allocation {
                    value,
                    reservation_id: Some(reservation.reservation_id),
                })
            }
            DocumentCounter::Local {
                store,
                mapping_id,
                template,
                prefix,
                increment,
                last_seen,
            } => {
                for _ in 0..LOCAL_ALLOC_ATTEMPTS {
                    let candidate = last_seen.load(Ordering::SeqCst) + increment;
                    if store.update_last_consecutive(mapping_id, candidate).await? {
                        last_seen.store(candidate, Ordering::SeqCst);
                        return Ok(Allocation {
                            value: ReservedValue {
                                numeric: candidate,
                                formatted: format::render(
                                    template,
                                    candidate,
                                    prefix.as_deref(),
                                    Utc::now(),
                                ),
                            },
                            reservation_id: None,
                        });
                    }
                    // Someone advanced the counter; observe and retry.
                    let fresh = store.find_mapping(mapping_id).await?;
                    let current = fresh
                        .consecutive_config
                        .map(|c| c.last_value)
                        .unwrap_or(candidate);
                    last_seen.store(current, Ordering::SeqCst);
                }
                Err(AllocError::Exhausted)
            }
        }
    }

    /// Make the document's value permanent. Local counters already
    /// persisted at allocation and never rewind.
    pub async fn commit(&self, allocation: &Allocation) {
        if let (DocumentCounter::Central { service, name, .. }, Some(reservation_id)) =
            (self, allocation.reservation_id.as_deref())
            && let Err(err) = service.commit(name, reservation_id).await
        {
            warn!(counter = %name, reservation_id, %err, "consecutive commit failed");
        }
    }

    /// Give the value back on failure or skip. Gaps are acceptable.
    pub async fn cancel(&self, allocation: &Allocation) {
        if let (DocumentCounter::Central { service, name, .. }, Some(reservation_id)) =
            (self, allocation.reservation_id.as_deref())
            && let Err(err) = service.cancel(name, reservation_id).await
        {
            warn!(counter = %name, reservation_id, %err, "consecutive cancel failed");
        }
    }
}
