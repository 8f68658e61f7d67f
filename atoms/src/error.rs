use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "NotFound",
            ServiceError::InvalidInput(_) => "InvalidInput",
            ServiceError::Store(StoreError::NotFound { .. }) => "NotFound",
            ServiceError::Store(_) => "PersistenceError",
        }
    }
}
