//! Stock lookup endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use common::ProductId;
use serde::Serialize;

use crate::error::ApiError;
use crate::{AppState, Ledger};

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StockResponse {
    #[serde(rename = "ProductID")]
    pub product_id: String,
    pub available_stock: u32,
    pub updated_at: DateTime<Utc>,
}

/// GET /api/stock/{product_id}: current available stock for a product.
#[tracing::instrument(skip(state, path))]
pub async fn get<L: Ledger>(
    State(state): State<Arc<AppState<L>>>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<StockResponse>, ApiError> {
    let Path(raw) = path?;
    let product_id = ProductId::parse(&raw)?;

    let record = state.cart.stock(product_id).await?;
    Ok(Json(StockResponse {
        product_id: record.product_id.to_string(),
        available_stock: record.available_stock,
        updated_at: record.updated_at,
    }))
}
