//! Integration tests for the API server.

use std::sync::OnceLock;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use ledger::{CartStore, InMemoryLedger, LineState, ProductId, UserId};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> (axum::Router, InMemoryLedger) {
    let ledger = InMemoryLedger::new();
    let state = api::create_state(ledger.clone(), Duration::from_secs(10));
    (api::create_app(state, get_metrics_handle()), ledger)
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn post_json(app: &axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
    )
    .await
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();

    let (status, json) = get(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_checkout_decrements_stock() {
    let (app, ledger) = setup();
    let user = UserId::new();
    let product = ProductId::new();
    ledger.insert_stock(product, 5).await;

    let (status, json) = post_json(
        &app,
        "/api/cart/savecheckout",
        json!({
            "UserID": user.to_string(),
            "Target": [{ "ProductID": product.to_string(), "Quantity": 3, "Name": "Widget" }]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Checkout successful");

    let (status, json) = get(&app, &format!("/api/stock/{product}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["AvailableStock"], 2);

    let (_, lines) = post_json(
        &app,
        "/api/cart/get",
        json!({ "UserID": user.to_string(), "IsCheckout": true }),
    )
    .await;
    assert_eq!(lines.as_array().unwrap().len(), 1);
    assert_eq!(lines[0]["Quantity"], 3);
    assert_eq!(lines[0]["IsCheckout"], true);
    assert_eq!(lines[0]["IsConfirm"], false);
}

#[tokio::test]
async fn test_checkout_insufficient_stock_is_bad_request() {
    let (app, ledger) = setup();
    let user = UserId::new();
    let product = ProductId::new();
    ledger.insert_stock(product, 2).await;

    let (status, json) = post_json(
        &app,
        "/api/cart/savecheckout",
        json!({
            "UserID": user.to_string(),
            "Target": [{ "ProductID": product.to_string(), "Quantity": 3 }]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "insufficient_stock");
    assert_eq!(json["message"], "Insufficient stock");
}

#[tokio::test]
async fn test_checkout_unknown_product_is_not_found() {
    let (app, _) = setup();

    let (status, json) = post_json(
        &app,
        "/api/cart/savecheckout",
        json!({
            "UserID": UserId::new().to_string(),
            "Target": [{ "ProductID": ProductId::new().to_string(), "Quantity": 1 }]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn test_invalid_user_id_is_bad_request() {
    let (app, _) = setup();

    let (status, json) = post_json(
        &app,
        "/api/cart/savecheckout",
        json!({ "UserID": "nope", "Target": [] }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_input");
    assert_eq!(json["message"], "Invalid user ID");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let (app, _) = setup();

    let (status, json) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/cart/saveconfirm")
            .header("content-type", "application/json")
            .body(Body::from("{\"UserID\": "))
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_input");
    assert_eq!(json["message"], "Invalid request payload");
}

#[tokio::test]
async fn test_confirm_moves_lines_to_history() {
    let (app, ledger) = setup();
    let user = UserId::new();
    let product = ProductId::new();
    ledger.insert_stock(product, 5).await;
    let target = json!([{ "ProductID": product.to_string(), "Quantity": 2 }]);

    post_json(
        &app,
        "/api/cart/savecheckout",
        json!({ "UserID": user.to_string(), "Target": target }),
    )
    .await;

    let (status, json) = post_json(
        &app,
        "/api/cart/saveconfirm",
        json!({ "UserID": user.to_string(), "Target": target, "TotalCoupons": 10 }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Confirmation successful");
    assert_eq!(json["Migrated"], 1);
    assert_eq!(json["CouponBalance"], 10);
    assert_eq!(ledger.line_count().await, 0);

    let (status, history) = post_json(
        &app,
        "/api/history/get",
        json!({ "userId": user.to_string() }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let groups = history.as_array().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["IDTrx"], json["TransactionID"]);
    assert_eq!(groups[0]["TotalQuantity"], 2);
    assert_eq!(groups[0]["Items"][0]["ProductID"], product.to_string());
    assert_eq!(groups[0]["Items"][0]["IsConfirm"], true);
}

#[tokio::test]
async fn test_confirm_with_request_id_accrues_once() {
    let (app, _) = setup();
    let user = UserId::new();
    let body = json!({
        "UserID": user.to_string(),
        "Target": [{ "ProductID": ProductId::new().to_string(), "Quantity": 1 }],
        "TotalCoupons": 4,
        "RequestID": "retry-me"
    });

    let (_, first) = post_json(&app, "/api/cart/saveconfirm", body.clone()).await;
    let (status, json) = post_json(&app, "/api/cart/saveconfirm", body).await;

    assert_eq!(first["CouponsAccrued"], 4);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["CouponBalance"], 4);
    assert_eq!(json["CouponsAccrued"], 0);
}

#[tokio::test]
async fn test_quantity_past_storage_range_is_bad_request() {
    let (app, ledger) = setup();
    let user = UserId::new();
    let product = ProductId::new();
    ledger.insert_stock(product, 5).await;
    let target = json!([{ "ProductID": product.to_string(), "Quantity": 2_147_483_648u64 }]);

    for uri in ["/api/cart/savecheckout", "/api/cart/saveconfirm"] {
        let (status, json) = post_json(
            &app,
            uri,
            json!({ "UserID": user.to_string(), "Target": target, "TotalCoupons": 1 }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(json["error"], "invalid_input", "{uri}");
    }

    let (status, json) = post_json(
        &app,
        "/api/cart/save",
        json!({
            "UserID": user.to_string(),
            "ProductID": product.to_string(),
            "Quantity": 2_147_483_648u64
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_input");
    assert_eq!(ledger.line_count().await, 0);
}

#[tokio::test]
async fn test_save_creates_then_deletes_line() {
    let (app, ledger) = setup();
    let user = UserId::new();
    let product = ProductId::new();

    let (status, json) = post_json(
        &app,
        "/api/cart/save",
        json!({ "UserID": user.to_string(), "ProductID": product.to_string(), "Quantity": 4 }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["Quantity"], 4);
    assert_eq!(json["IsCheckout"], false);
    let line = ledger.get_line(user, product).await.unwrap().unwrap();
    assert_eq!(line.state(), LineState::Active);

    let (status, json) = post_json(
        &app,
        "/api/cart/save",
        json!({ "UserID": user.to_string(), "ProductID": product.to_string(), "Quantity": 0 }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Transaction deleted");
    assert!(ledger.get_line(user, product).await.unwrap().is_none());
}

#[tokio::test]
async fn test_stock_with_invalid_id_is_bad_request() {
    let (app, _) = setup();

    let (status, json) = get(&app, "/api/stock/not-a-product").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Invalid product ID");
}

#[tokio::test]
async fn test_metrics_endpoint_reports_checkouts() {
    let (app, ledger) = setup();
    let product = ProductId::new();
    ledger.insert_stock(product, 1).await;

    post_json(
        &app,
        "/api/cart/savecheckout",
        json!({
            "UserID": UserId::new().to_string(),
            "Target": [{ "ProductID": product.to_string(), "Quantity": 1 }]
        }),
    )
    .await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("checkout_total"));
}
