use thiserror::Error;

/// Errors raised while building a container, before any subscription
/// state exists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The configured runtime variant is not supported.
    #[error("unsupported runtime `{0}`: only `tokio` is available")]
    UnsupportedRuntime(String),

    /// Construction happened outside a Tokio runtime.
    #[error("no tokio runtime is running on this thread")]
    NoRuntime,

    /// Store host/port could not be turned into a connection target.
    #[error("invalid store address: {0}")]
    InvalidStoreAddress(String),
}

/// Errors reported by a pointer store operation.
///
/// These only ever reach callers through a `PersistSignal`; they never
/// undo the in-memory registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backing store rejected or failed the operation.
    #[error("pointer store backend error: {0}")]
    Backend(String),

    /// The record could not be encoded for the store.
    #[error("failed to encode pointer record: {0}")]
    Encode(String),

    /// The configured table name is not a plain SQL identifier.
    #[error("invalid pointer table name `{0}`")]
    InvalidTableName(String),

    /// The operation was dropped before reporting completion.
    #[error("pointer store operation was abandoned")]
    Abandoned,
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

#[cfg(feature = "postgres")]
impl From<tokio_postgres::Error> for StoreError {
    fn from(err: tokio_postgres::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Encode(err.to_string())
    }
}
