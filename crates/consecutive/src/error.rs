use thiserror::Error;

#[derive(Debug, Error)]
pub enum CounterError {
    #[error("Counter not found: {0}")]
    NotFound(String),

    #[error("Counter is inactive: {0}")]
    Inactive(String),

    #[error("Counter {0} already exists")]
    AlreadyExists(String),

    #[error("Reservation not found: {0}")]
    ReservationNotFound(String),

    #[error("Reservation {0} is already committed")]
    AlreadyCommitted(String),

    #[error("Reservation {0} was cancelled")]
    ReservationCancelled(String),

    #[error("Invalid format template: {0}")]
    InvalidFormat(String),

    #[error("Concurrent update conflict on counter {0}")]
    Conflict(String),

    #[error("Counter storage error: {0}")]
    Storage(String),
}

impl From<sled::Error> for CounterError {
    fn from(err: sled::Error) -> Self {
        CounterError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for CounterError {
    fn from(err: serde_json::Error) -> Self {
        CounterError::Storage(err.to_string())
    }
}
