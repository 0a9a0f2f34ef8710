//! Workflow error types.

use std::time::Duration;

use common::{IdParseError, ProductId};
use ledger::LedgerError;
use thiserror::Error;

/// The ledger write or read a coordinator was performing when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    UpsertCart,
    DecrementStock,
    AccrueCoupon,
    FindConfirmed,
    WriteHistory,
    DeleteConfirmed,
    ReadCart,
    DeleteLine,
    ReadHistory,
    ReadStock,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::UpsertCart => "upsert_cart",
            Step::DecrementStock => "decrement_stock",
            Step::AccrueCoupon => "accrue_coupon",
            Step::FindConfirmed => "find_confirmed",
            Step::WriteHistory => "write_history",
            Step::DeleteConfirmed => "delete_confirmed",
            Step::ReadCart => "read_cart",
            Step::DeleteLine => "delete_line",
            Step::ReadHistory => "read_history",
            Step::ReadStock => "read_stock",
        }
    }

    /// Message shown to callers when this step fails.
    pub fn public_message(&self) -> &'static str {
        match self {
            Step::UpsertCart => "Error updating cart",
            Step::DecrementStock => "Error updating product stock",
            Step::AccrueCoupon => "Error updating coupon",
            Step::FindConfirmed => "Error finding confirmed cart items",
            Step::WriteHistory => "Error inserting history items",
            Step::DeleteConfirmed => "Error deleting confirmed cart items",
            Step::ReadCart => "Error finding cart items",
            Step::DeleteLine => "Error deleting cart item",
            Step::ReadHistory => "Error finding history items",
            Step::ReadStock => "Error finding product stock",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by the coordinators and the cart service.
///
/// None of these are retried. A failure after the first ledger write leaves
/// the earlier writes committed.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Malformed identifier or payload.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The referenced product has no stock record.
    #[error("Product not found: {product_id}")]
    NotFound { product_id: ProductId },

    /// Decrementing would drive stock negative.
    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// A write collided with an existing record.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A ledger read or write failed.
    #[error("Storage error during {step}: {source}")]
    Storage {
        step: Step,
        #[source]
        source: LedgerError,
    },

    /// The call did not finish within its deadline.
    #[error("{operation} exceeded its deadline of {deadline:?}")]
    DeadlineExceeded {
        operation: &'static str,
        deadline: Duration,
    },
}

impl WorkflowError {
    /// Short machine-stable reason code.
    pub fn reason(&self) -> &'static str {
        match self {
            WorkflowError::InvalidInput(_) => "invalid_input",
            WorkflowError::NotFound { .. } => "not_found",
            WorkflowError::InsufficientStock { .. } => "insufficient_stock",
            WorkflowError::Conflict(_) => "conflict",
            WorkflowError::Storage { .. } => "storage_error",
            WorkflowError::DeadlineExceeded { .. } => "deadline_exceeded",
        }
    }

    /// Caller-facing message. Never includes ledger internals.
    pub fn public_message(&self) -> String {
        match self {
            WorkflowError::InvalidInput(msg) => msg.clone(),
            WorkflowError::NotFound { .. } => "Product not found".to_string(),
            WorkflowError::InsufficientStock { .. } => "Insufficient stock".to_string(),
            WorkflowError::Conflict(_) => "Duplicate history entry".to_string(),
            WorkflowError::Storage { step, .. } => step.public_message().to_string(),
            WorkflowError::DeadlineExceeded { .. } => "Request timed out".to_string(),
        }
    }
}

impl From<IdParseError> for WorkflowError {
    fn from(err: IdParseError) -> Self {
        WorkflowError::InvalidInput(format!("Invalid {}", err.kind))
    }
}

/// Tags ledger failures with the step that produced them.
pub(crate) trait AtStep<T> {
    fn at_step(self, step: Step) -> Result<T>;
}

impl<T> AtStep<T> for std::result::Result<T, LedgerError> {
    fn at_step(self, step: Step) -> Result<T> {
        self.map_err(|source| match source {
            LedgerError::DuplicateEntry { .. } => WorkflowError::Conflict(source.to_string()),
            source => WorkflowError::Storage { step, source },
        })
    }
}

/// Convenience type alias for workflow results.
pub type Result<T> = std::result::Result<T, WorkflowError>;
