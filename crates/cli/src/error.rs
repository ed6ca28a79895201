use connectors::error::ConnectorError;
use consecutive::error::CounterError;
use engine_config::error::StoreError;
use engine_core::error::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Shutdown requested")]
    ShutdownRequested,

    #[error("Invalid arguments: {0}")]
    Usage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Counter(#[from] CounterError),

    #[error(transparent)]
    Connector(#[from] ConnectorError),

    #[error("State directory error: {0}")]
    State(String),
}

impl From<sled::Error> for CliError {
    fn from(err: sled::Error) -> Self {
        CliError::State(err.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Usage(err.to_string())
    }
}
