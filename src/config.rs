use std::{env, time::Duration};

use mongodb::bson::oid::ObjectId;

use crate::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct Settings {
    pub mongodb_uri: String,
    pub mongodb_db: String,
    pub host: String,
    pub port: u16,

    pub check_interval: Duration,
    pub checker_autostart: bool,
    pub persist_max_attempts: u32,
    pub persist_retry_delay: Duration,
    // None = no watchdog on passes
    pub pass_timeout: Option<Duration>,
    pub owner_scope: Option<ObjectId>,

    pub notify_webhook_url: Option<String>,
    pub events_capacity: usize,
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Fails on settings that would change which alerts the checker touches.
pub fn load() -> Result<Settings> {
    // Loads .env if present (no crash if missing)
    dotenvy::dotenv().ok();

    let mongodb_uri = env::var("MONGODB_URI")
        .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());

    let mongodb_db = env::var("MONGODB_DB")
        .unwrap_or_else(|_| "ratealerts".to_string());

    let host = env::var("HOST")
        .unwrap_or_else(|_| "127.0.0.1".to_string());

    let port = parse_or("PORT", 3000u16);

    let check_interval = Duration::from_secs(parse_or("CHECK_INTERVAL_SECS", 60u64).max(1));
    let checker_autostart = parse_or("CHECKER_AUTOSTART", true);
    let persist_max_attempts = parse_or("PERSIST_MAX_ATTEMPTS", 3u32).max(1);
    let persist_retry_delay = Duration::from_millis(parse_or("PERSIST_RETRY_DELAY_MS", 1000u64));

    let pass_timeout = non_empty("PASS_TIMEOUT_SECS")
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs);

    let owner_scope = parse_owner_scope(non_empty("ALERT_OWNER_SCOPE").as_deref())?;

    let notify_webhook_url = non_empty("NOTIFY_WEBHOOK_URL");
    let events_capacity = parse_or("EVENTS_CAPACITY", 64usize).max(1);

    Ok(Settings {
        mongodb_uri,
        mongodb_db,
        host,
        port,
        check_interval,
        checker_autostart,
        persist_max_attempts,
        persist_retry_delay,
        pass_timeout,
        owner_scope,
        notify_webhook_url,
        events_capacity,
    })
}

/// A malformed scope is an error, never "all owners".
pub fn parse_owner_scope(raw: Option<&str>) -> Result<Option<ObjectId>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => parse_object_id(s)
            .map(Some)
            .map_err(|_| AppError::Config(format!("ALERT_OWNER_SCOPE is not an ObjectId: {s:?}"))),
        None => Ok(None),
    }
}

pub fn parse_object_id(raw: &str) -> Result<ObjectId> {
    ObjectId::parse_str(raw.trim()).map_err(|_| AppError::InvalidId(raw.to_string()))
}
