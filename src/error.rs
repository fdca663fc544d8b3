use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("alert store error: {0}")]
    Store(String),

    #[error("notification failed: {0}")]
    Notify(String),

    #[error("invalid alert: {0}")]
    InvalidAlert(String),

    #[error("invalid id: {0}")]
    InvalidId(String),

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
