//! HTTP dispatch client tests against a real in-process aggregation
//! endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use uuid::Uuid;

use ranag_core::config::DispatchConfig;
use ranag_core::dispatch::{Dispatcher, HttpDispatcher};
use ranag_core::error::RanagError;
use ranag_core::strategy::{ResolvedStrategy, Strategy};

fn empty_plan() -> ResolvedStrategy {
    ResolvedStrategy {
        strategy: Strategy {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "test".to_string(),
            created_at: Utc::now(),
        },
        selectors: Vec::new(),
        fields: Vec::new(),
        filters: Vec::new(),
    }
}

fn fast_dispatcher() -> HttpDispatcher {
    HttpDispatcher::new(&DispatchConfig {
        connect_timeout_ms: 500,
        request_timeout_ms: 1_000,
        max_retries: 0,
        retry_delay_ms: 10,
        max_retry_delay_ms: 50,
    })
    .unwrap()
}

/// Serve a router on an ephemeral port, returning its `host:port`.
async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    address
}

#[tokio::test]
async fn successful_aggregation() {
    async fn handler(Json(body): Json<serde_json::Value>) -> Json<serde_json::Value> {
        // The wire contract carries all three plan sections
        assert!(body["selectors"].is_array());
        assert!(body["fields"].is_array());
        assert!(body["filters"].is_array());
        Json(serde_json::json!({
            "status": "success",
            "aggregations": [ { "product_title": "charger" } ]
        }))
    }

    let address = serve(Router::new().route("/aggregation", post(handler))).await;
    let records = fast_dispatcher().send(&address, &empty_plan()).await.unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["product_title"], serde_json::json!("charger"));
}

#[tokio::test]
async fn non_success_status_is_bad_status() {
    async fn handler() -> (StatusCode, Json<serde_json::Value>) {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "status": "error", "message": "boom" })),
        )
    }

    let address = serve(Router::new().route("/aggregation", post(handler))).await;
    let err = fast_dispatcher()
        .send(&address, &empty_plan())
        .await
        .unwrap_err();

    assert!(matches!(err, RanagError::BadStatus { status: 500, .. }));
}

#[tokio::test]
async fn undecodable_body_is_decode_error() {
    async fn handler() -> String {
        "not json at all".to_string()
    }

    let address = serve(Router::new().route("/aggregation", post(handler))).await;
    let err = fast_dispatcher()
        .send(&address, &empty_plan())
        .await
        .unwrap_err();

    assert!(matches!(err, RanagError::Decode { .. }));
}

#[tokio::test]
async fn error_body_with_ok_status_is_rejected() {
    async fn handler() -> Json<serde_json::Value> {
        Json(serde_json::json!({ "status": "error", "message": "shard store offline" }))
    }

    let address = serve(Router::new().route("/aggregation", post(handler))).await;
    let err = fast_dispatcher()
        .send(&address, &empty_plan())
        .await
        .unwrap_err();

    match err {
        RanagError::Decode { message, .. } => assert!(message.contains("shard store offline")),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn unreachable_worker() {
    // Bind then drop a listener so the port is known-closed
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    drop(listener);

    let err = fast_dispatcher()
        .send(&address, &empty_plan())
        .await
        .unwrap_err();

    assert!(matches!(err, RanagError::Unreachable { .. }));
}

#[tokio::test]
async fn transport_failures_are_retried_with_backoff() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    drop(listener);

    let dispatcher = HttpDispatcher::new(&DispatchConfig {
        connect_timeout_ms: 500,
        request_timeout_ms: 1_000,
        max_retries: 2,
        retry_delay_ms: 10,
        max_retry_delay_ms: 50,
    })
    .unwrap();

    let started = std::time::Instant::now();
    let err = dispatcher.send(&address, &empty_plan()).await.unwrap_err();

    assert!(matches!(err, RanagError::Unreachable { .. }));
    // Two backoff sleeps happened before giving up: 10ms + 20ms
    assert!(started.elapsed() >= std::time::Duration::from_millis(30));
}

#[tokio::test]
async fn answered_errors_are_not_retried() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn handler(State(hits): State<Arc<AtomicUsize>>) -> (StatusCode, String) {
        hits.fetch_add(1, Ordering::SeqCst);
        (StatusCode::SERVICE_UNAVAILABLE, String::new())
    }

    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/aggregation", post(handler))
        .with_state(hits.clone());
    let address = serve(app).await;

    let dispatcher = HttpDispatcher::new(&DispatchConfig {
        connect_timeout_ms: 500,
        request_timeout_ms: 1_000,
        max_retries: 3,
        retry_delay_ms: 10,
        max_retry_delay_ms: 50,
    })
    .unwrap();

    let err = dispatcher.send(&address, &empty_plan()).await.unwrap_err();
    assert!(matches!(err, RanagError::BadStatus { status: 503, .. }));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
