use std::error::Error;
use thiserror::Error;

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Error raised by session store backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    #[error("room write kept conflicting after {attempts} attempts")]
    Contention { attempts: u32 },
}

impl StoreError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StoreError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
