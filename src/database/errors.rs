//! Error types for repository operations
//!
//! The persistence layer reports what went wrong in storage terms only.
//! Translating these into transport status codes is the adapter's job.

use thiserror::Error;

/// Errors returned by the connection pool and the entity repository
///
/// # Error Categories
///
/// - **Validation Errors**: `Validation`
/// - **Lookup Errors**: `NotFound`
/// - **Cancellation**: `Cancelled`
/// - **Store Errors**: everything else (pool, connection, migration,
///   integrity, diesel, blocking task failures)
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Input rejected before reaching the store
    #[error("Validation error: {0}")]
    Validation(String),

    /// No row matched the requested id
    #[error("Not found: {0}")]
    NotFound(String),

    /// The caller's cancellation token fired before the operation finished
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Connection pool error: {0}")]
    ConnectionPoolError(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration error: {0}")]
    MigrationError(String),

    /// Entity and addition rows disagree with each other
    #[error("Integrity error: {0}")]
    IntegrityError(String),

    /// The blocking task running the statement panicked or was aborted
    #[error("Blocking task failed: {0}")]
    TaskFailed(String),

    #[error("Diesel error: {0}")]
    DieselError(#[from] diesel::result::Error),
}

impl RepositoryError {
    pub fn entity_not_found(id: i32) -> Self {
        RepositoryError::NotFound(format!("entity {} not found", id))
    }

    /// Returns true if the input was rejected before any statement ran
    pub fn is_validation_error(&self) -> bool {
        matches!(self, RepositoryError::Validation(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RepositoryError::NotFound(_) | RepositoryError::DieselError(diesel::result::Error::NotFound)
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RepositoryError::Cancelled)
    }

    /// Returns true for server-side failures (pool, connection, SQL, integrity)
    pub fn is_store_error(&self) -> bool {
        !(self.is_validation_error() || self.is_not_found() || self.is_cancelled())
    }
}
