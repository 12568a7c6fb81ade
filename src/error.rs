//! Platform error types
//!
//! One enum per failure family the core can raise. Services return
//! `Result<_, PlatformError>`; the binary boundary converts to `anyhow`.

/// Errors raised by the platform core
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("{0} not found: {1}")]
    NotFound(&'static str, String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("extraction error: {0}")]
    Extraction(String),

    #[error("training error: {0}")]
    Training(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PlatformError {
    /// Short machine-readable code, used when recording failures on job rows
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Conflict(_) => "conflict",
            Self::NotFound(..) => "not_found",
            Self::InsufficientData(_) => "insufficient_data",
            Self::Backend(_) => "backend",
            Self::Extraction(_) => "extraction",
            Self::Training(_) => "training",
            Self::Database(_) => "database",
            Self::Serialization(_) => "serialization",
        }
    }
}

impl From<reqwest::Error> for PlatformError {
    fn from(e: reqwest::Error) -> Self {
        Self::Backend(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PlatformError>;
