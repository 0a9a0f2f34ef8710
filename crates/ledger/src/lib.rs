//! Keyed stores for the cart order workflow.
//!
//! Four ledgers each own one record type:
//! - stock: available quantity per product
//! - cart: per-(user, product) lines with checkout/confirm flags
//! - coupon: accumulated coupon balance per user
//! - history: append-only confirmed lines grouped by transaction
//!
//! Every operation commits on its own. Nothing here spans ledgers; callers
//! sequence the writes.

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod query;
pub mod store;
pub mod table;

pub use common::{EntryId, ProductId, TransactionId, UserId};
pub use error::{LedgerError, Result};
pub use memory::{FailPoint, InMemoryLedger};
pub use model::{CartLine, CouponBalance, HistoryEntry, LineState, StockRecord};
pub use postgres::PostgresLedger;
pub use query::CartFilter;
pub use store::{
    Accrual, CartStore, CouponLedger, DecrementOutcome, HistoryLedger, StockLedger,
};
pub use table::{Record, Table};
