use std::net::SocketAddr;
use std::sync::Arc;

use mongodb::Client;
use tracing_subscriber::EnvFilter;

use ratealerts::{
    config,
    error::{AppError, Result},
    routes,
    services::{
        self, notifier, AlertChecker, CheckerOptions, MongoAlertStore, MongoRateSnapshots,
        Notifier,
    },
    AppState,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        tracing::error!("fatal: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let settings = config::load()?;

    // Mongo connection
    let client = Client::with_uri_str(&settings.mongodb_uri).await?;
    let db = client.database(&settings.mongodb_db);

    if let Err(e) = services::db_init::ensure_indexes(&db).await {
        tracing::warn!("could not ensure indexes: {}", e);
    }

    let events_tx = notifier::event_bus(settings.events_capacity);
    let notifier = notifier::host_notifier(events_tx.clone(), settings.notify_webhook_url.clone());
    if !notifier.is_available().await {
        tracing::info!("no notification channel available yet; fired alerts will be logged only");
    }

    let checker = Arc::new(AlertChecker::new(
        Arc::new(MongoAlertStore::new(&db)),
        Arc::new(MongoRateSnapshots::new(&db)),
        Arc::new(notifier),
        CheckerOptions::from_settings(&settings),
    ));

    if settings.checker_autostart {
        checker.start(settings.check_interval);
    }

    let state = AppState {
        db,
        settings: settings.clone(),
        checker: checker.clone(),
        events_tx,
    };

    let app = routes::app(state);

    let ip = settings
        .host
        .parse::<std::net::IpAddr>()
        .map_err(|e| AppError::Config(format!("invalid HOST {:?}: {e}", settings.host)))?;
    let addr = SocketAddr::from((ip, settings.port));
    tracing::info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Config(format!("cannot bind {addr}: {e}")))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::Config(format!("server error: {e}")))?;

    checker.stop();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
