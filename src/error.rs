//! Error types for Synheart PulseLock

use thiserror::Error;

/// Errors that can occur during enrollment or authentication
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Insufficient sample data: {0}")]
    InsufficientData(String),

    #[error("No enrolled baseline for user: {0}")]
    NotEnrolled(String),

    #[error("Secure storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Stored record could not be decrypted: {0}")]
    DecryptionFailure(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid sample window: {0}")]
    InvalidWindow(String),

    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),
}

/// Errors surfaced by a [`SecureStore`](crate::storage::SecureStore) implementation
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => AuthError::StorageUnavailable(msg),
            StoreError::Decryption(msg) => AuthError::DecryptionFailure(msg),
        }
    }
}
