use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Connection failure, non-retryable status, or retries exhausted.
    #[error("Transport error: {0}")]
    Transport(String),

    /// An always-present field is missing or has the wrong shape.
    #[error("Schema error: {0}")]
    Schema(String),

    /// The response is well-formed but makes no sense for the request.
    #[error("Endpoint logic error: {0}")]
    EndpointLogic(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Sink error: {0}")]
    Sink(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::Transport(e.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        AppError::Worker(e.to_string())
    }
}
