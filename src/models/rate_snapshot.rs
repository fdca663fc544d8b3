use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Cached mapping of currency code -> rate against `base_currency`.
///
/// Written by an external refresh process; the checker only reads it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateSnapshot {
    #[serde(deserialize_with = "upper_code")]
    pub base_currency: String,
    #[serde(deserialize_with = "upper_codes")]
    pub rates: HashMap<String, f64>,

    #[serde(default)]
    pub fetched_at: Option<i64>,
}

impl RateSnapshot {
    pub fn new(base_currency: &str, rates: impl IntoIterator<Item = (String, f64)>) -> Self {
        Self {
            base_currency: base_currency.trim().to_uppercase(),
            rates: rates
                .into_iter()
                .map(|(code, rate)| (code.trim().to_uppercase(), rate))
                .collect(),
            fetched_at: Some(chrono::Utc::now().timestamp()),
        }
    }

    /// Rate of `code` against the base. The base itself is 1.0 even if the
    /// map leaves it out.
    pub fn rate(&self, code: &str) -> Option<f64> {
        let code = code.trim().to_uppercase();

        if let Some(r) = self.rates.get(&code) {
            return Some(*r);
        }
        if code == self.base_currency.to_uppercase() {
            return Some(1.0);
        }
        None
    }
}

fn upper_code<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(String::deserialize(d)?.trim().to_uppercase())
}

// Stored snapshots may carry lower-case codes.
fn upper_codes<'de, D: Deserializer<'de>>(d: D) -> Result<HashMap<String, f64>, D::Error> {
    let raw = HashMap::<String, f64>::deserialize(d)?;
    Ok(raw
        .into_iter()
        .map(|(code, rate)| (code.trim().to_uppercase(), rate))
        .collect())
}
