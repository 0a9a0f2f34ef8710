//! Typed inputs to the coordinators and the cart service.
//!
//! Identifiers are already parsed; the HTTP layer converts raw strings with
//! [`UserId::parse`](common::UserId::parse) and friends, whose failures map
//! to [`WorkflowError::InvalidInput`](crate::WorkflowError::InvalidInput).

use common::{ProductId, UserId};

use crate::error::{Result, WorkflowError};

/// Largest quantity a cart line, stock decrement or history entry accepts.
///
/// Matches the widest value every ledger backend can store.
pub const MAX_QUANTITY: u32 = i32::MAX as u32;

/// Rejects quantities no ledger can store.
pub(crate) fn check_quantity(quantity: i64) -> Result<u32> {
    u32::try_from(quantity)
        .ok()
        .filter(|&q| q <= MAX_QUANTITY)
        .ok_or_else(|| {
            WorkflowError::InvalidInput(format!(
                "Quantity {quantity} exceeds the maximum of {MAX_QUANTITY}"
            ))
        })
}

/// Checks every item before any ledger write runs.
pub(crate) fn check_items(items: &[LineItem]) -> Result<()> {
    for item in items {
        check_quantity(i64::from(item.quantity))?;
    }
    Ok(())
}

/// A product and the quantity requested for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl LineItem {
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Check out items: mark cart lines checked out and decrement stock.
#[derive(Debug, Clone)]
pub struct Checkout {
    pub user_id: UserId,
    /// Processed in order; processing stops at the first failure.
    pub items: Vec<LineItem>,
}

impl Checkout {
    pub fn new(user_id: UserId, items: Vec<LineItem>) -> Self {
        Self { user_id, items }
    }
}

/// Confirm items, accrue coupons and move every confirmed line to history.
#[derive(Debug, Clone)]
pub struct Confirm {
    pub user_id: UserId,
    pub items: Vec<LineItem>,
    pub total_coupons: u32,
    /// Optional client token; a repeated token does not accrue coupons twice.
    pub request_id: Option<String>,
}

impl Confirm {
    pub fn new(user_id: UserId, items: Vec<LineItem>, total_coupons: u32) -> Self {
        Self {
            user_id,
            items,
            total_coupons,
            request_id: None,
        }
    }

    /// Attaches an idempotency token for the coupon accrual.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// Set the quantity of a single cart line.
///
/// A quantity of zero or less removes the line.
#[derive(Debug, Clone, Copy)]
pub struct UpdateQuantity {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: i64,
}

impl UpdateQuantity {
    pub fn new(user_id: UserId, product_id: ProductId, quantity: i64) -> Self {
        Self {
            user_id,
            product_id,
            quantity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_quantity_is_accepted() {
        assert_eq!(check_quantity(i64::from(MAX_QUANTITY)).unwrap(), MAX_QUANTITY);
    }

    #[test]
    fn quantity_past_storage_range_is_invalid() {
        let err = check_quantity(i64::from(MAX_QUANTITY) + 1).unwrap_err();
        assert_eq!(err.reason(), "invalid_input");
        assert!(matches!(
            check_quantity(i64::from(u32::MAX) + 1),
            Err(WorkflowError::InvalidInput(_))
        ));
    }

    #[test]
    fn check_items_rejects_any_oversized_item() {
        let items = [
            LineItem::new(ProductId::new(), 1),
            LineItem::new(ProductId::new(), 2_200_000_000),
        ];
        assert!(check_items(&items).is_err());
        assert!(check_items(&items[..1]).is_ok());
    }
}
