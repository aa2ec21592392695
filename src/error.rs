use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Expense not found: {0}")]
    NotFound(String),

    #[error("Fetch failed: {0}")]
    TransientFetch(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Session expired: {0}")]
    Unauthorized(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation already in progress: {0}")]
    InFlight(&'static str),
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AppError::Deserialization(err.to_string())
        } else {
            AppError::TransientFetch(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Deserialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
