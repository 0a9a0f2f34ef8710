use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    CartFilter, LedgerError, ProductId, Result, TransactionId, UserId,
    model::{CartLine, CouponBalance, HistoryEntry, StockRecord},
    store::{Accrual, CartStore, CouponLedger, DecrementOutcome, HistoryLedger, StockLedger},
};

/// Operations that can be made to fail on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    UpsertLine,
    FindLines,
    DeleteLines,
    Decrement,
    Accrue,
    AppendHistory,
}

#[derive(Default)]
struct LedgerState {
    stock: HashMap<ProductId, StockRecord>,
    carts: HashMap<(UserId, ProductId), CartLine>,
    coupons: HashMap<UserId, CouponBalance>,
    applied_accruals: HashSet<(UserId, String)>,
    history: Vec<HistoryEntry>,
    fail_points: HashSet<FailPoint>,
}

impl LedgerState {
    fn check(&self, point: FailPoint) -> Result<()> {
        if self.fail_points.contains(&point) {
            return Err(LedgerError::Unavailable(format!(
                "injected failure at {point:?}"
            )));
        }
        Ok(())
    }
}

/// In-memory implementation of all four ledgers.
///
/// Each operation holds the write lock for its full read-modify-write, which
/// gives the same per-record atomicity as the PostgreSQL implementation.
/// Clones share state.
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the available stock for a product, creating the record if needed.
    pub async fn insert_stock(&self, product_id: ProductId, available_stock: u32) {
        self.state
            .write()
            .await
            .stock
            .insert(product_id, StockRecord::new(product_id, available_stock));
    }

    /// Makes every call to `point` fail until cleared.
    pub async fn fail_on(&self, point: FailPoint) {
        self.state.write().await.fail_points.insert(point);
    }

    /// Removes all injected failures.
    pub async fn clear_failures(&self) {
        self.state.write().await.fail_points.clear();
    }

    /// Returns the total number of cart lines across all users.
    pub async fn line_count(&self) -> usize {
        self.state.read().await.carts.len()
    }

    /// Returns the total number of history entries.
    pub async fn history_len(&self) -> usize {
        self.state.read().await.history.len()
    }
}

#[async_trait]
impl StockLedger for InMemoryLedger {
    async fn get_stock(&self, product_id: ProductId) -> Result<Option<StockRecord>> {
        Ok(self.state.read().await.stock.get(&product_id).cloned())
    }

    async fn decrement_if_sufficient(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<DecrementOutcome> {
        let mut state = self.state.write().await;
        state.check(FailPoint::Decrement)?;

        let Some(record) = state.stock.get_mut(&product_id) else {
            return Ok(DecrementOutcome::Missing);
        };

        match record.available_stock.checked_sub(quantity) {
            Some(remaining) => {
                record.available_stock = remaining;
                record.updated_at = Utc::now();
                Ok(DecrementOutcome::Applied { remaining })
            }
            None => Ok(DecrementOutcome::Insufficient {
                available: record.available_stock,
            }),
        }
    }
}

#[async_trait]
impl CartStore for InMemoryLedger {
    async fn get_line(&self, user_id: UserId, product_id: ProductId) -> Result<Option<CartLine>> {
        Ok(self
            .state
            .read()
            .await
            .carts
            .get(&(user_id, product_id))
            .cloned())
    }

    async fn upsert_line(&self, line: CartLine) -> Result<CartLine> {
        let mut state = self.state.write().await;
        state.check(FailPoint::UpsertLine)?;
        state.carts.insert(line.key(), line.clone());
        Ok(line)
    }

    async fn delete_line(&self, user_id: UserId, product_id: ProductId) -> Result<bool> {
        let mut state = self.state.write().await;
        Ok(state.carts.remove(&(user_id, product_id)).is_some())
    }

    async fn find_lines(&self, filter: CartFilter) -> Result<Vec<CartLine>> {
        let state = self.state.read().await;
        state.check(FailPoint::FindLines)?;

        let mut lines: Vec<_> = state
            .carts
            .values()
            .filter(|line| filter.matches(line))
            .cloned()
            .collect();
        lines.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then(a.product_id.cmp(&b.product_id))
        });
        Ok(lines)
    }

    async fn delete_lines(&self, filter: CartFilter) -> Result<u64> {
        let mut state = self.state.write().await;
        state.check(FailPoint::DeleteLines)?;

        let before = state.carts.len();
        state.carts.retain(|_, line| !filter.matches(line));
        Ok((before - state.carts.len()) as u64)
    }
}

#[async_trait]
impl CouponLedger for InMemoryLedger {
    async fn get_balance(&self, user_id: UserId) -> Result<Option<CouponBalance>> {
        Ok(self.state.read().await.coupons.get(&user_id).cloned())
    }

    async fn accrue(
        &self,
        user_id: UserId,
        amount: u64,
        idempotency_key: Option<&str>,
    ) -> Result<Accrual> {
        let mut state = self.state.write().await;
        state.check(FailPoint::Accrue)?;
        let now = Utc::now();

        if let Some(key) = idempotency_key
            && !state.applied_accruals.insert((user_id, key.to_string()))
        {
            tracing::debug!(%user_id, key, "accrual already applied, skipping");
            let balance = state
                .coupons
                .get(&user_id)
                .cloned()
                .unwrap_or_else(|| CouponBalance::opened(user_id, 0, now));
            return Ok(Accrual {
                balance,
                applied: false,
            });
        }

        let balance = state
            .coupons
            .entry(user_id)
            .and_modify(|balance| {
                balance.amount = balance.amount.saturating_add(amount);
                balance.last_updated = now;
            })
            .or_insert_with(|| CouponBalance::opened(user_id, amount, now));
        Ok(Accrual {
            balance: balance.clone(),
            applied: true,
        })
    }
}

#[async_trait]
impl HistoryLedger for InMemoryLedger {
    async fn append_batch(&self, entries: Vec<HistoryEntry>) -> Result<usize> {
        let mut state = self.state.write().await;
        state.check(FailPoint::AppendHistory)?;

        let mut seen: HashSet<(TransactionId, ProductId)> = state
            .history
            .iter()
            .map(|e| (e.transaction_id, e.product_id))
            .collect();
        for entry in &entries {
            if !seen.insert((entry.transaction_id, entry.product_id)) {
                return Err(LedgerError::DuplicateEntry {
                    transaction_id: entry.transaction_id,
                    product_id: entry.product_id,
                });
            }
        }

        let count = entries.len();
        state.history.extend(entries);
        Ok(count)
    }

    async fn entries_for_user(&self, user_id: UserId) -> Result<Vec<HistoryEntry>> {
        let state = self.state.read().await;
        let mut entries: Vec<_> = state
            .history
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.created_at);
        Ok(entries)
    }

    async fn entries_for_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Vec<HistoryEntry>> {
        let state = self.state.read().await;
        Ok(state
            .history
            .iter()
            .filter(|e| e.transaction_id == transaction_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LineState;

    #[tokio::test]
    async fn decrement_applies_when_sufficient() {
        let ledger = InMemoryLedger::new();
        let product = ProductId::new();
        ledger.insert_stock(product, 5).await;

        let outcome = ledger.decrement_if_sufficient(product, 3).await.unwrap();
        assert_eq!(outcome, DecrementOutcome::Applied { remaining: 2 });
        assert_eq!(
            ledger.get_stock(product).await.unwrap().unwrap().available_stock,
            2
        );
    }

    #[tokio::test]
    async fn decrement_leaves_stock_when_insufficient() {
        let ledger = InMemoryLedger::new();
        let product = ProductId::new();
        ledger.insert_stock(product, 2).await;

        let outcome = ledger.decrement_if_sufficient(product, 3).await.unwrap();
        assert_eq!(outcome, DecrementOutcome::Insufficient { available: 2 });
        assert_eq!(
            ledger.get_stock(product).await.unwrap().unwrap().available_stock,
            2
        );
    }

    #[tokio::test]
    async fn decrement_to_exactly_zero() {
        let ledger = InMemoryLedger::new();
        let product = ProductId::new();
        ledger.insert_stock(product, 4).await;

        let outcome = ledger.decrement_if_sufficient(product, 4).await.unwrap();
        assert_eq!(outcome, DecrementOutcome::Applied { remaining: 0 });
    }

    #[tokio::test]
    async fn decrement_missing_product() {
        let ledger = InMemoryLedger::new();
        let outcome = ledger
            .decrement_if_sufficient(ProductId::new(), 1)
            .await
            .unwrap();
        assert_eq!(outcome, DecrementOutcome::Missing);
    }

    #[tokio::test]
    async fn concurrent_decrements_never_oversell() {
        let ledger = InMemoryLedger::new();
        let product = ProductId::new();
        ledger.insert_stock(product, 10).await;

        let mut handles = Vec::new();
        for _ in 0..25 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.decrement_if_sufficient(product, 1).await.unwrap()
            }));
        }

        let mut applied = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), DecrementOutcome::Applied { .. }) {
                applied += 1;
            }
        }

        assert_eq!(applied, 10);
        assert_eq!(
            ledger.get_stock(product).await.unwrap().unwrap().available_stock,
            0
        );
    }

    #[tokio::test]
    async fn upsert_replaces_existing_line() {
        let ledger = InMemoryLedger::new();
        let user = UserId::new();
        let product = ProductId::new();

        ledger
            .upsert_line(CartLine::new(user, product, 1, LineState::Active))
            .await
            .unwrap();
        ledger
            .upsert_line(CartLine::new(user, product, 3, LineState::CheckedOut))
            .await
            .unwrap();

        let line = ledger.get_line(user, product).await.unwrap().unwrap();
        assert_eq!(line.quantity, 3);
        assert_eq!(line.state(), LineState::CheckedOut);
        assert_eq!(ledger.line_count().await, 1);
    }

    #[tokio::test]
    async fn delete_lines_only_removes_matches() {
        let ledger = InMemoryLedger::new();
        let user = UserId::new();
        let other = UserId::new();

        for (owner, state) in [
            (user, LineState::Confirmed),
            (user, LineState::Confirmed),
            (user, LineState::CheckedOut),
            (other, LineState::Confirmed),
        ] {
            ledger
                .upsert_line(CartLine::new(owner, ProductId::new(), 1, state))
                .await
                .unwrap();
        }

        let removed = ledger
            .delete_lines(CartFilter::confirmed_for(user))
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(ledger.line_count().await, 2);
    }

    #[tokio::test]
    async fn accrue_opens_then_adds() {
        let ledger = InMemoryLedger::new();
        let user = UserId::new();

        let first = ledger.accrue(user, 10, None).await.unwrap().balance;
        assert_eq!(first.amount, 10);

        let second = ledger.accrue(user, 5, None).await.unwrap().balance;
        assert_eq!(second.amount, 15);
        assert_eq!(second.created_at, first.created_at);
    }

    #[tokio::test]
    async fn accrue_with_repeated_key_is_ignored() {
        let ledger = InMemoryLedger::new();
        let user = UserId::new();

        let first = ledger.accrue(user, 10, Some("req-1")).await.unwrap();
        assert!(first.applied);

        let again = ledger.accrue(user, 10, Some("req-1")).await.unwrap();
        assert!(!again.applied);
        assert_eq!(again.balance.amount, 10);

        let next = ledger.accrue(user, 10, Some("req-2")).await.unwrap();
        assert!(next.applied);
        assert_eq!(next.balance.amount, 20);
    }

    #[tokio::test]
    async fn append_batch_rejects_duplicates_atomically() {
        let ledger = InMemoryLedger::new();
        let tx = TransactionId::new();
        let line = CartLine::new(UserId::new(), ProductId::new(), 1, LineState::Confirmed);

        ledger
            .append_batch(vec![HistoryEntry::from_line(tx, &line)])
            .await
            .unwrap();

        let other = CartLine::new(line.user_id, ProductId::new(), 2, LineState::Confirmed);
        let result = ledger
            .append_batch(vec![
                HistoryEntry::from_line(tx, &other),
                HistoryEntry::from_line(tx, &line),
            ])
            .await;

        assert!(matches!(result, Err(LedgerError::DuplicateEntry { .. })));
        assert_eq!(ledger.history_len().await, 1);
    }

    #[tokio::test]
    async fn fail_point_surfaces_unavailable() {
        let ledger = InMemoryLedger::new();
        ledger.fail_on(FailPoint::Accrue).await;

        let result = ledger.accrue(UserId::new(), 1, None).await;
        assert!(matches!(result, Err(LedgerError::Unavailable(_))));

        ledger.clear_failures().await;
        assert!(ledger.accrue(UserId::new(), 1, None).await.is_ok());
    }
}
