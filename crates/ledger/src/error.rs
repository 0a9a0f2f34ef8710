use thiserror::Error;

use crate::{ProductId, TransactionId, table::Table};

/// Errors that can occur when reading or writing a ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A history entry with the same transaction and product already exists.
    #[error("Duplicate history entry for transaction {transaction_id}, product {product_id}")]
    DuplicateEntry {
        transaction_id: TransactionId,
        product_id: ProductId,
    },

    /// A stored row violates a record invariant.
    #[error("Corrupt row in {table}: {reason}")]
    Corrupt { table: Table, reason: String },

    /// A value does not fit the storage column.
    #[error("Value out of storage range: {0}")]
    OutOfRange(String),

    /// The ledger could not be reached.
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
