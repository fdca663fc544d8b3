use axum::{Router, routing::get};
use crate::{AppState, controllers::alerts_controller};

pub fn add_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/alerts", get(alerts_controller::get_alerts))
        .route("/alerts/:id/explain", get(alerts_controller::get_explain_alert))
}
