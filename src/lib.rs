//! Library entrypoint for RateAlerts.
//!
//! Exposes the alert checker and its collaborators so integration tests under
//! `tests/` (and embedding hosts) can wire them without the HTTP server.

pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub mod controllers;
pub mod routes;

use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: mongodb::Database,
    pub settings: config::Settings,
    pub checker: Arc<services::AlertChecker>,
    pub events_tx: tokio::sync::broadcast::Sender<String>,
}
