mod common;

use std::sync::Arc;

use axum::http::{Request, StatusCode};
use common::{alert, fast_options, usd_snapshot, RecordingNotifier};
use http_body_util::BodyExt;
use mongodb::{bson::oid::ObjectId, Client};
use ratealerts::models::AlertCondition;
use ratealerts::services::{AlertChecker, MemoryAlertStore, SharedRateSnapshot};
use ratealerts::{config, routes, AppState};
use tower::ServiceExt;

struct Harness {
    state: AppState,
    store: Arc<MemoryAlertStore>,
    rates: SharedRateSnapshot,
    notifier: Arc<RecordingNotifier>,
}

async fn harness() -> Harness {
    let settings = config::load().expect("settings");

    // Lazy client: no request in these tests touches the database.
    let client = Client::with_uri_str(&settings.mongodb_uri)
        .await
        .expect("mongodb client");
    let db = client.database(&settings.mongodb_db);

    let store = Arc::new(MemoryAlertStore::new());
    let rates = SharedRateSnapshot::new();
    let notifier = RecordingNotifier::new();
    let checker = Arc::new(AlertChecker::new(
        store.clone(),
        Arc::new(rates.clone()),
        notifier.clone(),
        fast_options(),
    ));
    let (events_tx, _events_rx) = tokio::sync::broadcast::channel::<String>(16);

    Harness {
        state: AppState {
            db,
            settings,
            checker,
            events_tx,
        },
        store,
        rates,
        notifier,
    }
}

async fn call(state: &AppState, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();

    let res = routes::app(state.clone()).oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, body)
}

#[tokio::test]
async fn health_returns_ok() {
    let h = harness().await;
    let req = Request::builder().uri("/health").body(axum::body::Body::empty()).unwrap();

    let res = routes::app(h.state.clone()).oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn status_reports_idle_checker() {
    let h = harness().await;
    let (status, body) = call(&h.state, "GET", "/checker/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_running"], false);
    assert_eq!(body["is_checking"], false);
    assert_eq!(body["passes_completed"], 0);
}

#[tokio::test]
async fn run_fires_due_alert_and_reports_summary() {
    let h = harness().await;
    let a = alert("USD", "EUR", 0.85, AlertCondition::Below);
    h.store.insert(a.clone());
    h.rates.set(usd_snapshot(&[("EUR", 0.84)]));

    let (status, body) = call(&h.state, "POST", "/checker/run").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "completed");
    assert_eq!(body["triggered"], 1);
    assert_eq!(body["persisted"], 1);
    assert_eq!(h.notifier.count(), 1);

    let (_, body) = call(&h.state, "GET", "/alerts").await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["alerts"][0]["id"], a.id.to_hex());
    assert_eq!(body["alerts"][0]["state"], "fired");
    assert_eq!(body["alerts"][0]["notified"], true);
}

#[tokio::test]
async fn explain_reports_rate_unavailable() {
    let h = harness().await;
    let a = alert("USD", "CHF", 0.9, AlertCondition::Above);
    h.store.insert(a.clone());
    h.rates.set(usd_snapshot(&[("EUR", 0.92)]));

    let uri = format!("/alerts/{}/explain", a.id.to_hex());
    let (status, body) = call(&h.state, "GET", &uri).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["skip_reason"], "rate_unavailable");
    assert_eq!(body["reason"], "rate unavailable");
    assert_eq!(body["cross_rate"], serde_json::Value::Null);
    assert_eq!(body["triggered"], false);
}

#[tokio::test]
async fn explain_rejects_bad_and_unknown_ids() {
    let h = harness().await;

    let (status, body) = call(&h.state, "GET", "/alerts/not-an-id/explain").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("invalid id"));

    let uri = format!("/alerts/{}/explain", ObjectId::new().to_hex());
    let (status, _) = call(&h.state, "GET", &uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn start_and_stop_are_idempotent() {
    let h = harness().await;

    let (_, body) = call(&h.state, "POST", "/checker/start?interval_secs=3600").await;
    assert_eq!(body["started"], true);
    assert_eq!(body["interval_secs"], 3600);
    assert_eq!(body["status"]["is_running"], true);

    let (_, body) = call(&h.state, "POST", "/checker/start").await;
    assert_eq!(body["started"], false);

    let (_, body) = call(&h.state, "POST", "/checker/stop").await;
    assert_eq!(body["stopped"], true);
    assert_eq!(body["status"]["is_running"], false);

    let (_, body) = call(&h.state, "POST", "/checker/stop").await;
    assert_eq!(body["stopped"], false);
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let h = harness().await;
    let (status, body) = call(&h.state, "GET", "/nope").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not found");
}
