//! Error types for the document store layer.

use thiserror::Error;

/// Errors surfaced by a [`Datastore`](crate::Datastore) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A multi-key call received a different number of keys and entities.
    #[error("batch mismatch: {keys} keys but {entities} entities")]
    BatchMismatch {
        /// Number of keys supplied.
        keys: usize,
        /// Number of entities supplied.
        entities: usize,
    },

    /// The backend rejected or failed the operation.
    #[error("backend error: {0}")]
    Backend(String),

    /// A snapshot could not be encoded or decoded.
    #[error("snapshot encoding error: {0}")]
    Encoding(String),

    /// A lower-level I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
