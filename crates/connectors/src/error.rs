use thiserror::Error;

/// Errors raised while executing statements against a backend.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query timed out: {0}")]
    Timeout(String),

    #[error("Deadlock detected: {0}")]
    Deadlock(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("SQL syntax error: {0}")]
    Syntax(String),

    #[error("NULL value for non-nullable column: {0}")]
    NullValue(String),

    #[error("Value exceeds column length for: {0}")]
    Truncation(String),

    #[error("Date conversion failed: {0}")]
    DateConversion(String),

    #[error("Missing query parameter: {0}")]
    MissingParameter(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Database error: {0}")]
    Unknown(String),
}

impl DbError {
    /// Whether a retry on a fresh connection is worth attempting.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DbError::Connection(_) | DbError::Timeout(_) | DbError::Deadlock(_)
        )
    }
}

/// Errors raised while establishing or validating connections.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Invalid connection url: {0}")]
    InvalidUrl(String),

    #[error("Unknown server key: {0}")]
    UnknownServer(String),

    #[error("Unsupported driver for url: {0}")]
    UnsupportedDriver(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl From<native_tls::Error> for ConnectorError {
    fn from(err: native_tls::Error) -> Self {
        ConnectorError::Tls(err.to_string())
    }
}
