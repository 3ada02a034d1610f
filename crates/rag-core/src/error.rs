use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    #[error("Invalid document: {0}")]
    Validation(String),

    #[error("Scoring exceeded its budget of {}ms", .0.as_millis())]
    ScorerTimeout(Duration),

    #[error("Generation unavailable: {0}")]
    GenerationUnavailable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Wrap any backend failure as a store-open failure.
    pub fn store(e: impl std::fmt::Display) -> Self { Self::StoreUnavailable(e.to_string()) }

    /// Wrap any backend failure as a query failure.
    pub fn retrieval(e: impl std::fmt::Display) -> Self { Self::RetrievalUnavailable(e.to_string()) }

    /// True for the failures a caller should read as "zero context available".
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RetrievalUnavailable(_) | Self::ScorerTimeout(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
