//! Error type shared by the library.
//!
//! Validation problems are detected locally, before any collaborator is
//! called. Collaborator failures (auth, storage, extraction) carry the
//! message that should be shown to the user.

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("{0}")]
    Validation(String),

    #[error("\"{0}\" is already on your list.")]
    Duplicate(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Auth(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    Extraction(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl TrackerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        TrackerError::Validation(msg.into())
    }

    /// True for errors raised before any collaborator was contacted.
    pub fn is_validation(&self) -> bool {
        matches!(self, TrackerError::Validation(_) | TrackerError::Duplicate(_))
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
