//! Error types for the persistence layer.
//!
//! All store operations return [`DbError`], which wraps the underlying
//! [`sqlx`] error or describes which record an operation expected to find.

use exocore_types::NumericError;

/// Errors that can occur in the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored or computed quantity is not a valid number.
    #[error("Numeric error: {0}")]
    Numeric(#[from] NumericError),

    /// An update targeted a record that does not exist.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Kind of record.
        entity: &'static str,
        /// Natural key that was looked up.
        key: String,
    },

    /// Stored state is inconsistent with the requested operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DbError {
    /// Shorthand for [`DbError::NotFound`].
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }
}
