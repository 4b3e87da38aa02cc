//! Error types for rota-sync stores and adapters

use thiserror::Error;

/// Result type alias using rota-sync's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the local store, remote store and blob store adapters.
///
/// The sync engine folds these into [`crate::sync::SyncError`] according to
/// where they happened (query, write, asset transfer).
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Blob/object storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Remote document store error
    #[error("Remote store error: {0}")]
    Remote(String),
}
