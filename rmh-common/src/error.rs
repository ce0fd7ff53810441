//! Common error types for the raise-hand signal workspace

use thiserror::Error;

/// Common result type for settings, store and wire operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the session crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Settings value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
