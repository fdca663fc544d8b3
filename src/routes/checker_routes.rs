use axum::{Router, routing::{get, post}};
use crate::{AppState, controllers::checker_controller};

pub fn add_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/checker/status", get(checker_controller::get_status))
        .route("/checker/run", post(checker_controller::post_run))
        .route("/checker/start", post(checker_controller::post_start))
        .route("/checker/stop", post(checker_controller::post_stop))
}
