use std::time::Duration;

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::AppState;

#[derive(Deserialize)]
pub struct StartQuery {
    pub interval_secs: Option<u64>,
}

// GET /checker/status
pub async fn get_status(State(state): State<AppState>) -> Response {
    Json(state.checker.status()).into_response()
}

// POST /checker/run
pub async fn post_run(State(state): State<AppState>) -> Response {
    let outcome = state.checker.run_once().await;
    Json(outcome).into_response()
}

// POST /checker/start?interval_secs=N
pub async fn post_start(
    State(state): State<AppState>,
    Query(q): Query<StartQuery>,
) -> Response {
    let interval = q
        .interval_secs
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or(state.settings.check_interval);

    let started = state.checker.start(interval);

    Json(json!({
        "started": started,
        "interval_secs": interval.as_secs(),
        "status": state.checker.status(),
    }))
    .into_response()
}

// POST /checker/stop
pub async fn post_stop(State(state): State<AppState>) -> Response {
    let stopped = state.checker.stop();

    Json(json!({
        "stopped": stopped,
        "status": state.checker.status(),
    }))
    .into_response()
}
