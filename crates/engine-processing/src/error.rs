use connectors::error::DbError;
use model::execution::errors::ErrorCode;
use thiserror::Error;

/// Per-field / per-row evaluation failures. These fail the current
/// document, never the whole execution.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("Required field '{0}' resolved to NULL")]
    RequiredField(String),

    #[error("Lookup for field '{field}' is missing parameter '{param}'")]
    MissingLookupParam { field: String, param: String },

    #[error("Lookup for field '{0}' returned no rows")]
    LookupEmpty(String),

    #[error("Date conversion failed for field '{field}': {value}")]
    DateConversion { field: String, value: String },

    #[error("Invalid mapping configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl EvalError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            EvalError::RequiredField(_) => ErrorCode::NullValue,
            EvalError::MissingLookupParam { .. } | EvalError::LookupEmpty(_) => ErrorCode::General,
            EvalError::DateConversion { .. } => ErrorCode::DateConversion,
            EvalError::InvalidConfig(_) => ErrorCode::General,
            EvalError::Db(db) => match db {
                DbError::Connection(_) => ErrorCode::Connection,
                DbError::Timeout(_) => ErrorCode::Connection,
                DbError::Deadlock(_) => ErrorCode::Deadlock,
                DbError::DuplicateKey(_) => ErrorCode::DuplicateKey,
                DbError::Permission(_) => ErrorCode::Permission,
                DbError::Syntax(_) => ErrorCode::SqlSyntax,
                DbError::NullValue(_) => ErrorCode::NullValue,
                DbError::Truncation(_) => ErrorCode::Truncation,
                DbError::DateConversion(_) => ErrorCode::DateConversion,
                _ => ErrorCode::General,
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum BonificationError {
    #[error("Bonification line {line} in document '{document}' has no parent regular line")]
    OrphanLine { document: String, line: String },

    #[error("Bonification processing requires field '{0}' in the configuration")]
    MissingConfigField(String),
}
