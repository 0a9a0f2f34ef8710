//! Cart endpoints: single-line edits, the cart view, checkout and confirm.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use chrono::{DateTime, Utc};
use common::{ProductId, UserId};
use ledger::CartLine;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use workflow::{CartUpdate, Checkout, Confirm, LineItem, UpdateQuantity};

use crate::error::ApiError;
use crate::{AppState, Ledger};

// -- Request types --

#[derive(Deserialize)]
pub struct TargetItem {
    #[serde(rename = "ProductID")]
    pub product_id: String,
    #[serde(rename = "Quantity")]
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct CheckoutRequest {
    #[serde(rename = "UserID")]
    pub user_id: String,
    #[serde(rename = "Target", default)]
    pub target: Vec<TargetItem>,
}

#[derive(Deserialize)]
pub struct ConfirmRequest {
    #[serde(rename = "UserID")]
    pub user_id: String,
    #[serde(rename = "Target", default)]
    pub target: Vec<TargetItem>,
    #[serde(rename = "TotalCoupons", default)]
    pub total_coupons: u32,
    /// Repeating a request ID does not accrue coupons twice.
    #[serde(rename = "RequestID", default)]
    pub request_id: Option<String>,
}

#[derive(Deserialize)]
pub struct SaveRequest {
    #[serde(rename = "UserID")]
    pub user_id: String,
    #[serde(rename = "ProductID")]
    pub product_id: String,
    #[serde(rename = "Quantity")]
    pub quantity: i64,
}

#[derive(Deserialize)]
pub struct GetCartRequest {
    #[serde(rename = "UserID")]
    pub user_id: String,
    #[serde(rename = "IsCheckout", default)]
    pub is_checkout: bool,
}

// -- Response types --

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CartLineResponse {
    #[serde(rename = "UserID")]
    pub user_id: String,
    #[serde(rename = "ProductID")]
    pub product_id: String,
    pub quantity: u32,
    pub is_checkout: bool,
    pub is_confirm: bool,
    pub created: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum SaveResponse {
    Saved(CartLineResponse),
    Deleted { message: &'static str },
}

impl From<CartLine> for CartLineResponse {
    fn from(line: CartLine) -> Self {
        Self {
            user_id: line.user_id.to_string(),
            product_id: line.product_id.to_string(),
            quantity: line.quantity,
            is_checkout: line.is_checked_out(),
            is_confirm: line.is_confirmed(),
            created: line.created_at,
        }
    }
}

fn line_items(target: Vec<TargetItem>) -> Result<Vec<LineItem>, ApiError> {
    target
        .into_iter()
        .map(|item| -> Result<LineItem, ApiError> {
            Ok(LineItem::new(
                ProductId::parse(&item.product_id)?,
                item.quantity,
            ))
        })
        .collect()
}

// -- Handlers --

/// POST /api/cart/save: set the quantity of one cart line.
#[tracing::instrument(skip(state, payload))]
pub async fn save<L: Ledger>(
    State(state): State<Arc<AppState<L>>>,
    payload: Result<Json<SaveRequest>, JsonRejection>,
) -> Result<Json<SaveResponse>, ApiError> {
    let Json(req) = payload?;
    let product_id = ProductId::parse(&req.product_id)?;
    let user_id = UserId::parse(&req.user_id)?;

    let update = state
        .cart
        .update_quantity(UpdateQuantity::new(user_id, product_id, req.quantity))
        .await?;

    Ok(Json(match update {
        CartUpdate::Saved(line) => SaveResponse::Saved(line.into()),
        CartUpdate::Deleted => SaveResponse::Deleted {
            message: "Transaction deleted",
        },
    }))
}

/// POST /api/cart/get: cart lines filtered by the checked-out flag.
#[tracing::instrument(skip(state, payload))]
pub async fn get<L: Ledger>(
    State(state): State<Arc<AppState<L>>>,
    payload: Result<Json<GetCartRequest>, JsonRejection>,
) -> Result<Json<Vec<CartLineResponse>>, ApiError> {
    let Json(req) = payload?;
    let user_id = UserId::parse(&req.user_id)?;

    let lines = state.cart.cart_lines(user_id, req.is_checkout).await?;
    Ok(Json(lines.into_iter().map(CartLineResponse::from).collect()))
}

/// POST /api/cart/savecheckout: check out every target item in order.
#[tracing::instrument(skip(state, payload))]
pub async fn save_checkout<L: Ledger>(
    State(state): State<Arc<AppState<L>>>,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload?;
    let user_id = UserId::parse(&req.user_id)?;
    let items = line_items(req.target)?;

    state.checkout.checkout(Checkout::new(user_id, items)).await?;

    Ok(Json(json!({ "message": "Checkout successful" })))
}

/// POST /api/cart/saveconfirm: confirm target items and flush confirmed
/// lines into history.
#[tracing::instrument(skip(state, payload))]
pub async fn save_confirm<L: Ledger>(
    State(state): State<Arc<AppState<L>>>,
    payload: Result<Json<ConfirmRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload?;
    let user_id = UserId::parse(&req.user_id)?;
    let items = line_items(req.target)?;

    let mut cmd = Confirm::new(user_id, items, req.total_coupons);
    if let Some(request_id) = req.request_id {
        cmd = cmd.with_request_id(request_id);
    }
    let receipt = state.confirm.confirm(cmd).await?;

    Ok(Json(json!({
        "message": "Confirmation successful",
        "TransactionID": receipt.transaction_id.to_string(),
        "Migrated": receipt.migrated,
        "CouponBalance": receipt.coupon_balance,
        "CouponsAccrued": receipt.coupons_accrued,
    })))
}
