use thiserror::Error;

/// Errors that can occur when interacting with the order store.
///
/// Every variant is an infrastructure failure: business rule violations are
/// decided by the services on top of the store, never here.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A write would break a storage constraint (negative stock, duplicate
    /// key, missing row).
    #[error("Constraint violated: {0}")]
    Constraint(String),

    /// A stored row could not be mapped back into the domain model.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Result type for order store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
