use chrono::Utc;
use serde::Serialize;
use serde_json::json;

use super::Alert;

/// Human-readable message handed to a notifier channel.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub payload: serde_json::Value,
}

impl Notification {
    pub fn for_alert(alert: &Alert, current_rate: f64) -> Self {
        let pair = alert.pair();

        let title = format!("{pair} rate alert");
        let body = format!(
            "{pair} is now {} {} (current: {})",
            alert.condition,
            format_rate(alert.target_rate),
            format_rate(current_rate),
        );

        let payload = json!({
            "alert_id": alert.id.to_hex(),
            "owner": alert.owner.to_hex(),
            "from": alert.from_currency,
            "to": alert.to_currency,
            "condition": alert.condition,
            "target_rate": alert.target_rate,
            "current_rate": current_rate,
            "fired_at": Utc::now().timestamp(),
        });

        Self { title, body, payload }
    }
}

/// Formats a rate for display: 2 decimals for large rates, 4 for ordinary
/// ones, up to 6 for small ones (never fewer than 4).
pub fn format_rate(rate: f64) -> String {
    let abs = rate.abs();

    if abs >= 100.0 {
        return format!("{rate:.2}");
    }
    if abs >= 1.0 {
        return format!("{rate:.4}");
    }

    // Keep at least three significant digits for tiny rates.
    let decimals = if abs > 0.0 && abs.is_finite() {
        ((-abs.log10().floor()) as usize + 3).clamp(6, 12)
    } else {
        6
    };
    let mut s = format!("{rate:.decimals$}");
    let min_len = s.find('.').map(|dot| dot + 5).unwrap_or(s.len());
    while s.len() > min_len && s.ends_with('0') {
        s.pop();
    }
    s
}
