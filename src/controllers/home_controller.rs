use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use mongodb::bson::doc;

use super::error_response;
use crate::AppState;

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn health_db(State(state): State<AppState>) -> Response {
    match state.db.run_command(doc! { "ping": 1 }, None).await {
        Ok(_) => (StatusCode::OK, "mongo: ok").into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("mongo error: {e}")),
    }
}

pub async fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "not found")
}
