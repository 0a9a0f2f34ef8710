//! Single-line cart edits and read views.

use chrono::{DateTime, Utc};
use common::{ProductId, TransactionId, UserId};
use ledger::{
    CartFilter, CartLine, CartStore, HistoryEntry, HistoryLedger, LineState, StockLedger,
    StockRecord,
};

use crate::commands::{self, UpdateQuantity};
use crate::error::{AtStep, Result, Step, WorkflowError};

/// Outcome of [`CartService::update_quantity`].
#[derive(Debug, Clone, PartialEq)]
pub enum CartUpdate {
    /// The line as stored after the update.
    Saved(CartLine),
    /// The line was removed.
    Deleted,
}

/// History entries that share one transaction ID.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionHistory {
    pub transaction_id: TransactionId,
    /// Earliest `created_at` among the entries.
    pub created_at: DateTime<Utc>,
    pub entries: Vec<HistoryEntry>,
}

impl TransactionHistory {
    /// Groups entries by transaction, preserving the order in which each
    /// transaction first appears.
    pub fn group(entries: Vec<HistoryEntry>) -> Vec<TransactionHistory> {
        let mut groups: Vec<TransactionHistory> = Vec::new();
        for entry in entries {
            match groups
                .iter_mut()
                .find(|g| g.transaction_id == entry.transaction_id)
            {
                Some(group) => {
                    group.created_at = group.created_at.min(entry.created_at);
                    group.entries.push(entry);
                }
                None => groups.push(TransactionHistory {
                    transaction_id: entry.transaction_id,
                    created_at: entry.created_at,
                    entries: vec![entry],
                }),
            }
        }
        groups
    }

    pub fn total_quantity(&self) -> u64 {
        self.entries.iter().map(|e| u64::from(e.quantity)).sum()
    }
}

/// Cart edits that touch one line, plus the cart, history and stock views.
#[derive(Clone)]
pub struct CartService<L>
where
    L: CartStore + HistoryLedger + StockLedger,
{
    ledger: L,
}

impl<L> CartService<L>
where
    L: CartStore + HistoryLedger + StockLedger,
{
    pub fn new(ledger: L) -> Self {
        Self { ledger }
    }

    /// Sets the quantity of one cart line.
    ///
    /// An existing line keeps its checkout and confirm flags. A missing line
    /// is created active. A quantity of zero or less removes the line whether
    /// or not it existed.
    #[tracing::instrument(skip(self), fields(user_id = %cmd.user_id, product_id = %cmd.product_id))]
    pub async fn update_quantity(&self, cmd: UpdateQuantity) -> Result<CartUpdate> {
        let UpdateQuantity {
            user_id,
            product_id,
            quantity,
        } = cmd;

        if quantity <= 0 {
            let existed = self
                .ledger
                .delete_line(user_id, product_id)
                .await
                .at_step(Step::DeleteLine)?;
            tracing::debug!(existed, "cart line removed");
            return Ok(CartUpdate::Deleted);
        }

        let quantity = commands::check_quantity(quantity)?;

        let state = self
            .ledger
            .get_line(user_id, product_id)
            .await
            .at_step(Step::ReadCart)?
            .map_or(LineState::Active, |line| line.state());

        let saved = self
            .ledger
            .upsert_line(CartLine::new(user_id, product_id, quantity, state))
            .await
            .at_step(Step::UpsertCart)?;
        Ok(CartUpdate::Saved(saved))
    }

    /// Lines for `user_id` whose checked-out flag equals `checked_out`.
    #[tracing::instrument(skip(self))]
    pub async fn cart_lines(&self, user_id: UserId, checked_out: bool) -> Result<Vec<CartLine>> {
        self.ledger
            .find_lines(CartFilter::for_user(user_id).checked_out(checked_out))
            .await
            .at_step(Step::ReadCart)
    }

    /// History entries for `user_id`, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn history(&self, user_id: UserId) -> Result<Vec<HistoryEntry>> {
        self.ledger
            .entries_for_user(user_id)
            .await
            .at_step(Step::ReadHistory)
    }

    /// History for `user_id` grouped by transaction, oldest transaction first.
    pub async fn history_by_transaction(
        &self,
        user_id: UserId,
    ) -> Result<Vec<TransactionHistory>> {
        let entries = self.history(user_id).await?;
        Ok(TransactionHistory::group(entries))
    }

    pub async fn stock(&self, product_id: ProductId) -> Result<StockRecord> {
        self.ledger
            .get_stock(product_id)
            .await
            .at_step(Step::ReadStock)?
            .ok_or(WorkflowError::NotFound { product_id })
    }
}
