use nexus_core::NexusError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for NexusError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Serialization(msg) => NexusError::Internal(msg),
            other => NexusError::Database(other.to_string()),
        }
    }
}
