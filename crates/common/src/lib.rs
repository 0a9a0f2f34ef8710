//! Identifier types shared by the ledger, workflow and API crates.

pub mod types;

pub use types::{EntryId, IdParseError, ProductId, TransactionId, UserId};
