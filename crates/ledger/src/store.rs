use async_trait::async_trait;

use crate::{
    CartFilter, ProductId, Result, TransactionId, UserId,
    model::{CartLine, CouponBalance, HistoryEntry, StockRecord},
};

/// Outcome of a conditional stock decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecrementOutcome {
    /// Stock was decremented; `remaining` is the new available quantity.
    Applied { remaining: u32 },
    /// Stock was left untouched because only `available` units remain.
    Insufficient { available: u32 },
    /// No stock record exists for the product.
    Missing,
}

/// Per-product available quantity.
///
/// Implementations must make [`decrement_if_sufficient`](Self::decrement_if_sufficient)
/// atomic per record: concurrent calls never drive stock negative and the
/// total decrement equals the sum of the applied requests.
#[async_trait]
pub trait StockLedger: Send + Sync {
    /// Retrieves the stock record for a product.
    async fn get_stock(&self, product_id: ProductId) -> Result<Option<StockRecord>>;

    /// Subtracts `quantity` if at least that much is available.
    async fn decrement_if_sufficient(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<DecrementOutcome>;
}

/// Cart lines keyed by (user, product).
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Retrieves a single line.
    async fn get_line(&self, user_id: UserId, product_id: ProductId) -> Result<Option<CartLine>>;

    /// Writes the line, replacing any existing line with the same key.
    ///
    /// Returns the line as stored.
    async fn upsert_line(&self, line: CartLine) -> Result<CartLine>;

    /// Deletes a single line. Returns true if a line was removed.
    async fn delete_line(&self, user_id: UserId, product_id: ProductId) -> Result<bool>;

    /// Retrieves all lines matching the filter, oldest first.
    async fn find_lines(&self, filter: CartFilter) -> Result<Vec<CartLine>>;

    /// Deletes all lines matching the filter. Returns the number removed.
    async fn delete_lines(&self, filter: CartFilter) -> Result<u64>;
}

/// Result of a coupon accrual.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accrual {
    /// The balance after the call.
    pub balance: CouponBalance,
    /// False when the idempotency key had already been applied and nothing
    /// was added.
    pub applied: bool,
}

/// Per-user coupon balance.
#[async_trait]
pub trait CouponLedger: Send + Sync {
    /// Retrieves the balance for a user.
    async fn get_balance(&self, user_id: UserId) -> Result<Option<CouponBalance>>;

    /// Adds `amount` to the user's balance, opening it if absent.
    ///
    /// When `idempotency_key` is set and has already been applied, the
    /// current balance is returned unchanged with `applied` set to false.
    async fn accrue(
        &self,
        user_id: UserId,
        amount: u64,
        idempotency_key: Option<&str>,
    ) -> Result<Accrual>;
}

/// Append-only record of confirmed lines.
#[async_trait]
pub trait HistoryLedger: Send + Sync {
    /// Appends all entries or none of them.
    ///
    /// Fails with `DuplicateEntry` if any `(transaction_id, product_id)`
    /// pair is already recorded, or repeats within the batch.
    async fn append_batch(&self, entries: Vec<HistoryEntry>) -> Result<usize>;

    /// Retrieves a user's entries, oldest first.
    async fn entries_for_user(&self, user_id: UserId) -> Result<Vec<HistoryEntry>>;

    /// Retrieves the entries written under one transaction.
    async fn entries_for_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Vec<HistoryEntry>>;
}
