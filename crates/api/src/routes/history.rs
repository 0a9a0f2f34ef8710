//! Purchase history endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use chrono::{DateTime, Utc};
use common::UserId;
use ledger::HistoryEntry;
use serde::{Deserialize, Serialize};
use workflow::TransactionHistory;

use crate::error::ApiError;
use crate::{AppState, Ledger};

#[derive(Deserialize)]
pub struct HistoryRequest {
    #[serde(rename = "userId")]
    pub user_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HistoryEntryResponse {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "IDTrx")]
    pub transaction_id: String,
    #[serde(rename = "ProductID")]
    pub product_id: String,
    #[serde(rename = "UserID")]
    pub user_id: String,
    pub quantity: u32,
    pub is_checkout: bool,
    pub is_confirm: bool,
    pub created: DateTime<Utc>,
}

impl From<HistoryEntry> for HistoryEntryResponse {
    fn from(entry: HistoryEntry) -> Self {
        Self {
            id: entry.entry_id.to_string(),
            transaction_id: entry.transaction_id.to_string(),
            product_id: entry.product_id.to_string(),
            user_id: entry.user_id.to_string(),
            quantity: entry.quantity,
            is_checkout: entry.is_checked_out,
            is_confirm: entry.is_confirmed,
            created: entry.created_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactionResponse {
    #[serde(rename = "IDTrx")]
    pub transaction_id: String,
    pub created: DateTime<Utc>,
    pub total_quantity: u64,
    pub items: Vec<HistoryEntryResponse>,
}

impl From<TransactionHistory> for TransactionResponse {
    fn from(group: TransactionHistory) -> Self {
        Self {
            transaction_id: group.transaction_id.to_string(),
            created: group.created_at,
            total_quantity: group.total_quantity(),
            items: group.entries.into_iter().map(Into::into).collect(),
        }
    }
}

/// POST /api/history/get: a user's history grouped by transaction.
#[tracing::instrument(skip(state, payload))]
pub async fn get<L: Ledger>(
    State(state): State<Arc<AppState<L>>>,
    payload: Result<Json<HistoryRequest>, JsonRejection>,
) -> Result<Json<Vec<TransactionResponse>>, ApiError> {
    let Json(req) = payload?;
    let user_id = UserId::parse(&req.user_id)?;

    let groups = state.cart.history_by_transaction(user_id).await?;
    Ok(Json(groups.into_iter().map(Into::into).collect()))
}
