//! Cart order workflow.
//!
//! Cart lines move from active to checked out to confirmed, and confirmed
//! lines are migrated into history. Two coordinators drive the transitions:
//!
//! - [`CheckoutCoordinator`] marks lines checked out and decrements stock
//! - [`ConfirmationCoordinator`] marks lines confirmed, accrues coupons and
//!   flushes every confirmed line for the user into history
//!
//! Each ledger write commits on its own. A failed call leaves the writes that
//! ran before the failure in place and reports which step failed.

pub mod cart;
pub mod checkout;
pub mod commands;
pub mod confirm;
pub mod deadline;
pub mod error;

pub use cart::{CartService, CartUpdate, TransactionHistory};
pub use checkout::{CheckedOutItem, CheckoutCoordinator};
pub use commands::{Checkout, Confirm, LineItem, MAX_QUANTITY, UpdateQuantity};
pub use confirm::{ConfirmReceipt, ConfirmationCoordinator};
pub use deadline::DEFAULT_DEADLINE;
pub use error::{Result, Step, WorkflowError};
