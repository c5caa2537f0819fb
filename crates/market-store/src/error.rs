use thiserror::Error;

/// Errors that can occur when interacting with the marketplace stores.
///
/// These are infrastructure failures; domain outcomes like "insufficient
/// stock" are reported through the checkout engine's own error type.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored record could not be decoded into its in-memory shape.
    #[error("corrupt record: {0}")]
    Decode(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
