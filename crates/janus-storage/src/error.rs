//! Storage error types.

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Entity not found by ID.
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound {
        /// Type of entity (e.g. "User", "Session").
        entity_type: &'static str,
        /// Entity ID.
        id: Uuid,
    },

    /// Entity not found by a string key (email, token, client id).
    ///
    /// The key itself is not carried: several of these keys are bearer
    /// credentials and must not end up in logs.
    #[error("Entity not found: {entity_type}")]
    NotFoundByKey {
        /// Type of entity.
        entity_type: &'static str,
    },

    /// Duplicate entity (unique constraint violation).
    #[error("Duplicate {entity_type}: {field} already exists")]
    Duplicate {
        /// Type of entity.
        entity_type: &'static str,
        /// Field that caused the conflict.
        field: &'static str,
    },

    /// Invalid data.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Backend connection error.
    #[error("Storage connection error: {0}")]
    Connection(String),

    /// Backend query error.
    #[error("Storage query error: {0}")]
    Query(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error.
    #[error("Internal storage error: {0}")]
    Internal(String),
}

impl StorageError {
    /// Creates a not found error for an entity.
    #[must_use]
    pub const fn not_found(entity_type: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity_type, id }
    }

    /// Creates a not found error for a string-keyed lookup.
    #[must_use]
    pub const fn not_found_by_key(entity_type: &'static str) -> Self {
        Self::NotFoundByKey { entity_type }
    }

    /// Creates a duplicate error.
    #[must_use]
    pub const fn duplicate(entity_type: &'static str, field: &'static str) -> Self {
        Self::Duplicate { entity_type, field }
    }

    /// Checks if this is a not found error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::NotFoundByKey { .. })
    }

    /// Checks if this is a duplicate error.
    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_error() {
        let id = Uuid::now_v7();
        let err = StorageError::not_found("User", id);

        assert!(err.is_not_found());
        assert!(!err.is_duplicate());
        assert!(err.to_string().contains("User"));
    }

    #[test]
    fn key_lookup_error_does_not_leak_the_key() {
        let err = StorageError::not_found_by_key("Session");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Entity not found: Session");
    }

    #[test]
    fn duplicate_error() {
        let err = StorageError::duplicate("User", "email");
        assert!(err.is_duplicate());
        assert!(!err.is_not_found());
    }
}
