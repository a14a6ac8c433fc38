use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("invalid subnet '{0}'")]
    InvalidSubnet(String),

    #[error("discovery failed: {0}")]
    Discovery(String),

    #[error("packet feed failed: {0}")]
    Feed(String),

    #[error("failed to write session log: {0}")]
    Record(#[from] csv::Error),

    #[error("failed to encode session event: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read operator input: {0}")]
    Prompt(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MonitorError>;
