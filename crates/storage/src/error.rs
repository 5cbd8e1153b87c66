use clearbook_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Corrupt row: {0}")]
    Corrupt(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<CoreError> for StoreError {
    fn from(e: CoreError) -> Self {
        StoreError::Corrupt(e.to_string())
    }
}
