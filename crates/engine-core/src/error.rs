use connectors::error::{ConnectorError, DbError};
use consecutive::error::CounterError;
use engine_config::error::StoreError;
use model::execution::errors::ErrorCode;
use thiserror::Error;

/// Setup-time failures. Once the per-document loop starts, failures are
/// converted into detail entries and never surface as `Err`.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid mapping: {0}")]
    InvalidMapping(String),

    #[error("Could not acquire connection to '{server}': {source}")]
    Acquire {
        server: String,
        source: ConnectorError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Counter(#[from] CounterError),

    #[error(transparent)]
    Connector(#[from] ConnectorError),
}

/// Classify a database error into the stable per-document error codes.
pub fn db_error_code(err: &DbError) -> ErrorCode {
    match err {
        DbError::Connection(_) | DbError::Timeout(_) => ErrorCode::Connection,
        DbError::Deadlock(_) => ErrorCode::Deadlock,
        DbError::DuplicateKey(_) => ErrorCode::DuplicateKey,
        DbError::Permission(_) => ErrorCode::Permission,
        DbError::Syntax(_) => ErrorCode::SqlSyntax,
        DbError::NullValue(_) => ErrorCode::NullValue,
        DbError::Truncation(_) => ErrorCode::Truncation,
        DbError::DateConversion(_) => ErrorCode::DateConversion,
        _ => ErrorCode::General,
    }
}
