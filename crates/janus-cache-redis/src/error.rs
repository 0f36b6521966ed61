//! Redis error conversion.

use janus_storage::StorageError;

/// Converts a Redis client error to a storage error.
#[allow(clippy::needless_pass_by_value)]
pub fn from_redis_error(err: fred::error::Error) -> StorageError {
    match err.kind() {
        fred::error::ErrorKind::IO | fred::error::ErrorKind::Timeout => {
            StorageError::Connection(err.to_string())
        }
        _ => StorageError::Query(err.to_string()),
    }
}

/// Converts a serialization error to a storage error.
#[allow(clippy::needless_pass_by_value)]
pub fn from_serde_error(err: serde_json::Error) -> StorageError {
    StorageError::Serialization(err.to_string())
}
