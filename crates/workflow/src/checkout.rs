//! Checkout coordinator.

use std::time::Duration;

use common::ProductId;
use ledger::{CartLine, CartStore, DecrementOutcome, LineState, StockLedger};

use crate::commands::{self, Checkout, LineItem};
use crate::deadline::{self, DEFAULT_DEADLINE};
use crate::error::{AtStep, Result, Step, WorkflowError};

/// One item that was checked out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedOutItem {
    pub product_id: ProductId,
    pub quantity: u32,
    /// Stock left after this item's decrement.
    pub remaining_stock: u32,
}

/// Marks cart lines as checked out and decrements stock, item by item.
///
/// Each item's cart upsert and stock decrement commit independently. When an
/// item fails, items before it stay applied and the failing item's cart line
/// keeps the upsert that ran before the stock check.
pub struct CheckoutCoordinator<L>
where
    L: CartStore + StockLedger,
{
    ledger: L,
    deadline: Duration,
}

impl<L> CheckoutCoordinator<L>
where
    L: CartStore + StockLedger,
{
    /// Creates a coordinator with the default deadline.
    pub fn new(ledger: L) -> Self {
        Self::with_deadline(ledger, DEFAULT_DEADLINE)
    }

    /// Creates a coordinator whose calls are bounded by `deadline`.
    pub fn with_deadline(ledger: L, deadline: Duration) -> Self {
        Self { ledger, deadline }
    }

    /// Checks out every item in order, stopping at the first failure.
    #[tracing::instrument(
        skip(self, cmd),
        fields(user_id = %cmd.user_id, items = cmd.items.len())
    )]
    pub async fn checkout(&self, cmd: Checkout) -> Result<Vec<CheckedOutItem>> {
        metrics::counter!("checkout_total").increment(1);
        let start = std::time::Instant::now();

        let result = deadline::within("checkout", self.deadline, self.run(cmd)).await;

        metrics::histogram!("checkout_duration_seconds").record(start.elapsed().as_secs_f64());
        match &result {
            Ok(items) => tracing::info!(checked_out = items.len(), "checkout succeeded"),
            Err(e) => {
                metrics::counter!("checkout_failed_total", "reason" => e.reason()).increment(1);
                tracing::warn!(error = %e, "checkout failed");
            }
        }
        result
    }

    async fn run(&self, cmd: Checkout) -> Result<Vec<CheckedOutItem>> {
        if cmd.items.is_empty() {
            return Err(WorkflowError::InvalidInput("No items to check out".to_string()));
        }
        commands::check_items(&cmd.items)?;

        let mut checked_out = Vec::with_capacity(cmd.items.len());
        for item in cmd.items {
            checked_out.push(self.checkout_item(cmd.user_id, item).await?);
        }
        Ok(checked_out)
    }

    async fn checkout_item(
        &self,
        user_id: common::UserId,
        item: LineItem,
    ) -> Result<CheckedOutItem> {
        let LineItem {
            product_id,
            quantity,
        } = item;

        self.ledger
            .upsert_line(CartLine::new(
                user_id,
                product_id,
                quantity,
                LineState::CheckedOut,
            ))
            .await
            .at_step(Step::UpsertCart)?;

        match self
            .ledger
            .decrement_if_sufficient(product_id, quantity)
            .await
            .at_step(Step::DecrementStock)?
        {
            DecrementOutcome::Applied { remaining } => {
                tracing::debug!(%product_id, quantity, remaining, "stock decremented");
                Ok(CheckedOutItem {
                    product_id,
                    quantity,
                    remaining_stock: remaining,
                })
            }
            DecrementOutcome::Insufficient { available } => {
                Err(WorkflowError::InsufficientStock {
                    product_id,
                    requested: quantity,
                    available,
                })
            }
            DecrementOutcome::Missing => Err(WorkflowError::NotFound { product_id }),
        }
    }
}
