//! Confirmation coordinator.
//!
//! Confirming a cart runs five ledger steps in order, each committing on its
//! own:
//!
//! 1. upsert every requested line as confirmed
//! 2. accrue the coupon amount for the user
//! 3. read all confirmed lines for the user
//! 4. append them to history under a fresh transaction ID
//! 5. delete every confirmed line for the user
//!
//! A failure at any step leaves the earlier steps applied. Step 3 also picks
//! up lines confirmed by earlier requests that never reached step 5, so a
//! retry after a partial failure flushes them too.

use std::time::Duration;

use common::{TransactionId, UserId};
use ledger::{
    CartFilter, CartLine, CartStore, CouponLedger, HistoryEntry, HistoryLedger, LineState,
};

use crate::commands::{self, Confirm};
use crate::deadline::{self, DEFAULT_DEADLINE};
use crate::error::{AtStep, Result, Step};

/// Result of a successful confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmReceipt {
    /// Groups the history entries written by this confirmation.
    pub transaction_id: TransactionId,
    /// Number of cart lines moved to history.
    pub migrated: usize,
    /// The user's coupon balance after accrual.
    pub coupon_balance: u64,
    /// Coupons added by this call; zero when the request ID was a repeat.
    pub coupons_accrued: u64,
}

pub struct ConfirmationCoordinator<L>
where
    L: CartStore + CouponLedger + HistoryLedger,
{
    ledger: L,
    deadline: Duration,
}

impl<L> ConfirmationCoordinator<L>
where
    L: CartStore + CouponLedger + HistoryLedger,
{
    pub fn new(ledger: L) -> Self {
        Self::with_deadline(ledger, DEFAULT_DEADLINE)
    }

    pub fn with_deadline(ledger: L, deadline: Duration) -> Self {
        Self { ledger, deadline }
    }

    /// Confirms the requested lines and moves all confirmed lines to history.
    #[tracing::instrument(
        skip(self, cmd),
        fields(user_id = %cmd.user_id, items = cmd.items.len(), total_coupons = cmd.total_coupons)
    )]
    pub async fn confirm(&self, cmd: Confirm) -> Result<ConfirmReceipt> {
        metrics::counter!("confirm_total").increment(1);
        let start = std::time::Instant::now();

        let result = deadline::within("confirm", self.deadline, self.run(cmd)).await;

        metrics::histogram!("confirm_duration_seconds").record(start.elapsed().as_secs_f64());
        match &result {
            Ok(receipt) => {
                metrics::counter!("history_entries_written_total")
                    .increment(receipt.migrated as u64);
                tracing::info!(
                    transaction_id = %receipt.transaction_id,
                    migrated = receipt.migrated,
                    "confirmation completed"
                );
            }
            Err(e) => {
                metrics::counter!("confirm_failed_total", "reason" => e.reason()).increment(1);
                tracing::warn!(error = %e, "confirmation failed");
            }
        }
        result
    }

    async fn run(&self, cmd: Confirm) -> Result<ConfirmReceipt> {
        let Confirm {
            user_id,
            items,
            total_coupons,
            request_id,
        } = cmd;
        commands::check_items(&items)?;

        for item in &items {
            self.ledger
                .upsert_line(CartLine::new(
                    user_id,
                    item.product_id,
                    item.quantity,
                    LineState::Confirmed,
                ))
                .await
                .at_step(Step::UpsertCart)?;
        }

        let accrual = self
            .ledger
            .accrue(user_id, u64::from(total_coupons), request_id.as_deref())
            .await
            .at_step(Step::AccrueCoupon)?;
        let coupons_accrued = if accrual.applied {
            u64::from(total_coupons)
        } else {
            tracing::debug!(request_id = ?request_id, "coupon accrual already applied");
            0
        };
        metrics::counter!("coupon_accrued_total").increment(coupons_accrued);

        let (transaction_id, migrated) = self.flush_confirmed(user_id).await?;

        Ok(ConfirmReceipt {
            transaction_id,
            migrated,
            coupon_balance: accrual.balance.amount,
            coupons_accrued,
        })
    }

    /// Moves every confirmed line for `user_id` into history and clears them
    /// from the cart.
    async fn flush_confirmed(&self, user_id: UserId) -> Result<(TransactionId, usize)> {
        let confirmed = self
            .ledger
            .find_lines(CartFilter::confirmed_for(user_id))
            .await
            .at_step(Step::FindConfirmed)?;

        let transaction_id = TransactionId::new();
        let entries: Vec<HistoryEntry> = confirmed
            .iter()
            .map(|line| HistoryEntry::from_line(transaction_id, line))
            .collect();

        let migrated = if entries.is_empty() {
            0
        } else {
            self.ledger
                .append_batch(entries)
                .await
                .at_step(Step::WriteHistory)?
        };

        let deleted = self
            .ledger
            .delete_lines(CartFilter::confirmed_for(user_id))
            .await
            .at_step(Step::DeleteConfirmed)?;

        // Lines confirmed concurrently between the read and the delete are
        // removed without a history entry.
        if deleted != migrated as u64 {
            tracing::warn!(
                %transaction_id,
                migrated,
                deleted,
                "deleted confirmed lines differ from migrated count"
            );
        }

        Ok((transaction_id, migrated))
    }
}
