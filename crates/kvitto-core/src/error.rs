//! Error types for Kvitto

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    Conflict(String),

    /// Categories or payment methods could not be loaded; nothing was extracted.
    #[error("Reference data unavailable: {0}")]
    ReferenceDataUnavailable(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    /// The classifier call itself failed
    #[error("Classification failed: {0}")]
    ClassificationFailed(String),

    /// The draft still carries unresolved category or payment-method names.
    #[error("Classification ambiguous: {0}")]
    ClassificationAmbiguous(String),

    #[error("Revision failed: {0}")]
    RevisionFailed(String),

    #[error("Persistence failed: {0}")]
    PersistenceFailed(String),

    #[error("Invalid input: {0}")]
    InvalidHumanInput(String),
}

impl Error {
    /// Whether the workflow may offer a retry after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ExtractionFailed(_)
                | Self::ClassificationFailed(_)
                | Self::RevisionFailed(_)
                | Self::PersistenceFailed(_)
                | Self::ClassificationAmbiguous(_)
                | Self::Http(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
