//! SQL storage error types.

use janus_storage::StorageError;
use sqlx::Error as SqlxError;

/// Converts a `SQLx` error to a storage error.
#[allow(clippy::needless_pass_by_value)]
pub fn from_sqlx_error(err: SqlxError) -> StorageError {
    match err {
        SqlxError::RowNotFound => {
            // Callers use fetch_optional for expected misses; reaching this
            // means a query assumed a row that wasn't there.
            StorageError::Internal("Row not found".to_string())
        }
        SqlxError::Database(db_err) => {
            // Unique constraint violation (PostgreSQL error code 23505)
            if db_err.code().is_some_and(|c| c == "23505") {
                StorageError::Query(format!("duplicate entry: {}", db_err.message()))
            } else if db_err.code().is_some_and(|c| c == "23503") {
                // Foreign key violation
                StorageError::Query(format!("reference violation: {}", db_err.message()))
            } else {
                StorageError::Query(db_err.to_string())
            }
        }
        SqlxError::PoolTimedOut => StorageError::Connection("Connection pool timeout".to_string()),
        SqlxError::PoolClosed => StorageError::Connection("Connection pool closed".to_string()),
        _ => StorageError::Internal(err.to_string()),
    }
}

/// Maps a unique-violation sqlx error onto a typed duplicate, leaving other
/// errors to the generic conversion.
pub fn duplicate_or(
    err: SqlxError,
    entity_type: &'static str,
    field: &'static str,
) -> StorageError {
    if let SqlxError::Database(db_err) = &err {
        if db_err.code().is_some_and(|c| c == "23505") {
            return StorageError::duplicate(entity_type, field);
        }
    }
    from_sqlx_error(err)
}
