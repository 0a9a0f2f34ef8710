//! HTTP API for the cart order workflow.
//!
//! Exposes checkout, confirmation, single-line cart edits and the cart,
//! history and stock views, with structured logging (tracing) and
//! Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use ledger::{CartStore, CouponLedger, HistoryLedger, StockLedger};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use workflow::{CartService, CheckoutCoordinator, ConfirmationCoordinator};

/// A handle implementing every ledger the routes touch.
pub trait Ledger:
    CartStore + StockLedger + CouponLedger + HistoryLedger + Clone + 'static
{
}

impl<L> Ledger for L where
    L: CartStore + StockLedger + CouponLedger + HistoryLedger + Clone + 'static
{
}

/// Shared application state accessible from all handlers.
pub struct AppState<L: Ledger> {
    pub checkout: CheckoutCoordinator<L>,
    pub confirm: ConfirmationCoordinator<L>,
    pub cart: CartService<L>,
}

/// Builds the coordinators around one ledger handle.
pub fn create_state<L: Ledger>(ledger: L, deadline: Duration) -> Arc<AppState<L>> {
    Arc::new(AppState {
        checkout: CheckoutCoordinator::with_deadline(ledger.clone(), deadline),
        confirm: ConfirmationCoordinator::with_deadline(ledger.clone(), deadline),
        cart: CartService::new(ledger),
    })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<L: Ledger>(state: Arc<AppState<L>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/api/cart/save", post(routes::cart::save::<L>))
        .route("/api/cart/get", post(routes::cart::get::<L>))
        .route("/api/cart/savecheckout", post(routes::cart::save_checkout::<L>))
        .route("/api/cart/saveconfirm", post(routes::cart::save_confirm::<L>))
        .route("/api/history/get", post(routes::history::get::<L>))
        .route("/api/stock/{product_id}", get(routes::stock::get::<L>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
