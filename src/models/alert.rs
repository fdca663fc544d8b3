use std::fmt;

use chrono::Utc;
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::services::evaluator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertCondition {
    Above,
    Below,
}

impl AlertCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertCondition::Above => "above",
            AlertCondition::Below => "below",
        }
    }
}

impl fmt::Display for AlertCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle position of an alert as the checker sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertState {
    Active,
    Fired,
    Paused,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub owner: ObjectId,
    pub from_currency: String,
    pub to_currency: String,

    pub target_rate: f64,
    pub condition: AlertCondition,

    pub is_active: bool,
    // true => terminal, never evaluated again
    pub notified: bool,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Alert {
    pub fn new(
        owner: ObjectId,
        from_currency: &str,
        to_currency: &str,
        target_rate: f64,
        condition: AlertCondition,
    ) -> Result<Self> {
        let from = from_currency.trim().to_uppercase();
        let to = to_currency.trim().to_uppercase();

        if from.is_empty() || to.is_empty() {
            return Err(AppError::InvalidAlert("currency code is empty".to_string()));
        }
        if !target_rate.is_finite() || target_rate <= 0.0 {
            return Err(AppError::InvalidAlert(format!(
                "target rate must be positive, got {target_rate}"
            )));
        }

        let now = Utc::now().timestamp();

        Ok(Self {
            id: ObjectId::new(),
            owner,
            from_currency: from,
            to_currency: to,
            target_rate,
            condition,
            is_active: true,
            notified: false,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn pair(&self) -> String {
        format!("{}/{}", self.from_currency, self.to_currency)
    }

    pub fn state(&self) -> AlertState {
        if self.notified {
            AlertState::Fired
        } else if self.is_active {
            AlertState::Active
        } else {
            AlertState::Paused
        }
    }

    pub fn is_candidate(&self) -> bool {
        self.state() == AlertState::Active
    }

    pub fn is_triggered_by(&self, current_rate: f64) -> bool {
        evaluator::evaluate(self.condition, self.target_rate, current_rate)
    }

    /// Applies a patch the same way a store does, refreshing `updated_at`.
    pub fn apply(&mut self, patch: &AlertPatch) {
        if let Some(v) = patch.is_active {
            self.is_active = v;
        }
        if let Some(v) = patch.notified {
            self.notified = v;
        }
        self.updated_at = Utc::now().timestamp();
    }
}

/// Partial update of the two flags the checker is allowed to write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlertPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notified: Option<bool>,
}

impl AlertPatch {
    pub fn fired() -> Self {
        Self {
            is_active: Some(false),
            notified: Some(true),
        }
    }

    pub fn paused() -> Self {
        Self {
            is_active: Some(false),
            notified: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.is_active.is_none() && self.notified.is_none()
    }
}
