//! Error types for leasegen.

use thiserror::Error;

use crate::llm::ProviderError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("work item not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A non-database store backend failed a read or write.
    #[error("store error: {0}")]
    Store(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Provider output could not be turned into a structured result.
    /// Terminal for the item: re-sending the same request will not fix it.
    #[error("malformed result: {0}")]
    MalformedResult(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Errors raised while reading or writing the shared store.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Error::Database(_) | Error::Store(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
