use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use super::error_response;
use crate::{config, models::Alert, AppState};

fn alert_json(a: &Alert) -> serde_json::Value {
    json!({
        "id": a.id.to_hex(),
        "owner": a.owner.to_hex(),
        "pair": a.pair(),
        "from_currency": a.from_currency,
        "to_currency": a.to_currency,
        "condition": a.condition,
        "target_rate": a.target_rate,
        "is_active": a.is_active,
        "notified": a.notified,
        "state": a.state(),
        "created_at": a.created_at,
        "updated_at": a.updated_at,
    })
}

// GET /alerts
pub async fn get_alerts(State(state): State<AppState>) -> Response {
    match state.checker.list_all_alerts().await {
        Ok(alerts) => {
            let items: Vec<serde_json::Value> = alerts.iter().map(alert_json).collect();
            Json(json!({ "count": items.len(), "alerts": items })).into_response()
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

// GET /alerts/:id/explain
pub async fn get_explain_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let id = match config::parse_object_id(&id) {
        Ok(id) => id,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
    };

    match state.checker.explain_alert(id).await {
        Ok(Some(x)) => Json(json!({
            "alert": alert_json(&x.alert),
            "state": x.state,
            "cross_rate": x.cross_rate,
            "triggered": x.triggered,
            "skip_reason": x.skip_reason,
            "reason": x.skip_reason.map(|r| r.to_string()),
        }))
        .into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "alert not found"),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}
