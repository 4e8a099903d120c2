//! Application-wide error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FunnelError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown option {value:?} for field `{field}`")]
    UnknownOption { field: &'static str, value: String },

    #[error("Unexpected response from {endpoint}: HTTP {status} ({content_type})")]
    UnexpectedResponse {
        endpoint: String,
        status: u16,
        content_type: String,
    },
}

pub type Result<T> = std::result::Result<T, FunnelError>;
