//! Error types for all cache operations.

use thiserror::Error;

/// Unified error type surfaced by stores, the codec, and the typed facade.
///
/// Nothing is retried internally; every failure propagates to the caller.
#[derive(Debug, Error)]
pub enum Error {
    /// The operation is not supported by this store (e.g. region-scoped calls
    /// on the SQLite store). Never silently downgraded.
    #[error("operation not supported: {0}")]
    NotSupported(String),

    /// The store was closed and its connection released; further operations
    /// are a caller bug.
    #[error("cache store is closed")]
    StoreClosed,

    /// Underlying SQLite engine failure.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Value or key could not be encoded.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Stored bytes could not be decoded back into the requested type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// A string key id was not valid base64 or did not decode to a key.
    #[error("invalid cache key: {0}")]
    InvalidKey(String),

    /// Filesystem setup failure while creating the database location.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build the canonical not-supported error for a region-scoped call.
    pub(crate) fn region_not_supported(op: &str) -> Self {
        Error::NotSupported(format!("region-scoped {} is not supported", op))
    }
}
