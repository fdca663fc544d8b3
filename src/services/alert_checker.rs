//! Periodic re-evaluation of active rate alerts.
//!
//! One pass lists every active, un-notified alert, prices all of them against
//! a single rate snapshot and fires the ones whose condition is met. Firing
//! means: notify first, then persist `notified = true, is_active = false`
//! with a bounded retry. If persisting never succeeds the alert stays active
//! and will notify again on a later pass (at-least-once delivery).

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use futures_util::FutureExt;
use mongodb::bson::oid::ObjectId;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::config::Settings;
use crate::error::Result;
use crate::models::{Alert, AlertPatch, AlertState, Notification, RateSnapshot};
use crate::services::alert_store::AlertStore;
use crate::services::notifier::{Delivery, Notifier};
use crate::services::rate_lookup;
use crate::services::rate_snapshots::RateSnapshotSource;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

#[derive(Debug, Clone, Default)]
pub struct CheckerOptions {
    pub retry: RetryPolicy,
    /// Watchdog for a stalled pass. Off unless configured.
    pub pass_timeout: Option<Duration>,
    pub owner_scope: Option<ObjectId>,
}

impl CheckerOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            retry: RetryPolicy::new(settings.persist_max_attempts, settings.persist_retry_delay),
            pass_timeout: settings.pass_timeout,
            owner_scope: settings.owner_scope,
        }
    }
}

/// Counters for one completed pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub candidates: usize,
    pub snapshot_missing: bool,
    pub rate_unavailable: usize,
    pub not_triggered: usize,
    pub triggered: usize,
    pub notify_failures: usize,
    pub persisted: usize,
    pub persist_failures: usize,
    pub panicked: usize,
}

impl PassSummary {
    fn record(&mut self, outcome: AlertOutcome) {
        match outcome {
            AlertOutcome::RateUnavailable => self.rate_unavailable += 1,
            AlertOutcome::NotTriggered => self.not_triggered += 1,
            AlertOutcome::Fired { notified, persisted } => {
                self.triggered += 1;
                if !notified {
                    self.notify_failures += 1;
                }
                if persisted {
                    self.persisted += 1;
                } else {
                    self.persist_failures += 1;
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PassOutcome {
    Completed(PassSummary),
    /// Another pass held the guard.
    Skipped,
    Failed { reason: String },
    TimedOut,
}

impl PassOutcome {
    pub fn summary(&self) -> Option<&PassSummary> {
        match self {
            PassOutcome::Completed(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckerStatus {
    pub is_running: bool,
    pub is_checking: bool,
    pub passes_completed: u64,
    pub passes_skipped: u64,
    pub passes_failed: u64,
    pub last_pass_started_at: Option<i64>,
    pub last_pass_finished_at: Option<i64>,
    pub last_summary: Option<PassSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Inactive,
    AlreadyNotified,
    NoSnapshot,
    RateUnavailable,
    ConditionNotMet,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::Inactive => "alert inactive",
            SkipReason::AlreadyNotified => "already notified",
            SkipReason::NoSnapshot => "no rate snapshot",
            SkipReason::RateUnavailable => "rate unavailable",
            SkipReason::ConditionNotMet => "condition not met",
        };
        f.write_str(s)
    }
}

/// What the next pass would do with one alert, without doing it.
#[derive(Debug, Clone, Serialize)]
pub struct AlertExplanation {
    pub alert: Alert,
    pub state: AlertState,
    pub cross_rate: Option<f64>,
    pub triggered: bool,
    pub skip_reason: Option<SkipReason>,
}

enum AlertOutcome {
    RateUnavailable,
    NotTriggered,
    Fired { notified: bool, persisted: bool },
}

#[derive(Default)]
struct Telemetry {
    passes_completed: u64,
    passes_skipped: u64,
    passes_failed: u64,
    last_pass_started_at: Option<i64>,
    last_pass_finished_at: Option<i64>,
    last_summary: Option<PassSummary>,
}

struct Timer {
    handle: JoinHandle<()>,
    shutdown: oneshot::Sender<()>,
}

/// Clears the in-progress flag on every exit path of a pass.
struct CheckingGuard<'a>(&'a AtomicBool);

impl Drop for CheckingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct AlertChecker {
    store: Arc<dyn AlertStore>,
    rates: Arc<dyn RateSnapshotSource>,
    notifier: Arc<dyn Notifier>,
    options: CheckerOptions,

    is_checking: AtomicBool,
    timer: Mutex<Option<Timer>>,
    telemetry: Mutex<Telemetry>,
}

impl AlertChecker {
    pub fn new(
        store: Arc<dyn AlertStore>,
        rates: Arc<dyn RateSnapshotSource>,
        notifier: Arc<dyn Notifier>,
        options: CheckerOptions,
    ) -> Self {
        Self {
            store,
            rates,
            notifier,
            options,
            is_checking: AtomicBool::new(false),
            timer: Mutex::new(None),
            telemetry: Mutex::new(Telemetry::default()),
        }
    }

    /// Starts the polling timer. The first pass runs immediately.
    ///
    /// Returns false (and does nothing) when a timer is already running.
    pub fn start(self: &Arc<Self>, interval: Duration) -> bool {
        let mut slot = self.timer.lock();

        if slot.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            tracing::info!("alert checker already running; start ignored");
            return false;
        }

        let interval = interval.max(MIN_INTERVAL);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let checker = Arc::clone(self);

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        // Not raced against shutdown: a pass always runs to completion.
                        checker.run_once().await;
                    }
                }
            }

            tracing::debug!("alert checker timer exited");
        });

        *slot = Some(Timer {
            handle,
            shutdown: shutdown_tx,
        });

        tracing::info!(interval_secs = interval.as_secs_f64(), "alert checker started");
        true
    }

    /// Stops scheduling new passes. A pass in flight is left to finish.
    pub fn stop(&self) -> bool {
        match self.timer.lock().take() {
            Some(timer) => {
                let _ = timer.shutdown.send(());
                tracing::info!("alert checker stopped");
                true
            }
            None => {
                tracing::debug!("alert checker not running; stop ignored");
                false
            }
        }
    }

    pub fn status(&self) -> CheckerStatus {
        let is_running = self
            .timer
            .lock()
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished());

        let t = self.telemetry.lock();

        CheckerStatus {
            is_running,
            is_checking: self.is_checking.load(Ordering::Acquire),
            passes_completed: t.passes_completed,
            passes_skipped: t.passes_skipped,
            passes_failed: t.passes_failed,
            last_pass_started_at: t.last_pass_started_at,
            last_pass_finished_at: t.last_pass_finished_at,
            last_summary: t.last_summary.clone(),
        }
    }

    /// Runs one pass now. Skips (does not queue) if a pass is in progress.
    pub async fn run_once(&self) -> PassOutcome {
        if self
            .is_checking
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("alert pass already in progress; skipping");
            self.telemetry.lock().passes_skipped += 1;
            return PassOutcome::Skipped;
        }
        let _guard = CheckingGuard(&self.is_checking);

        self.telemetry.lock().last_pass_started_at = Some(Utc::now().timestamp());

        let outcome = match self.options.pass_timeout {
            Some(limit) => match time::timeout(limit, self.run_pass()).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::error!(
                        timeout_secs = limit.as_secs_f64(),
                        "alert pass exceeded its timeout and was abandoned"
                    );
                    PassOutcome::TimedOut
                }
            },
            None => self.run_pass().await,
        };

        self.record(&outcome);
        outcome
    }

    pub async fn list_all_alerts(&self) -> Result<Vec<Alert>> {
        self.store.list_all(self.options.owner_scope).await
    }

    pub async fn explain_alert(&self, id: ObjectId) -> Result<Option<AlertExplanation>> {
        let Some(alert) = self.store.get(id).await? else {
            return Ok(None);
        };
        if self.options.owner_scope.is_some_and(|o| o != alert.owner) {
            return Ok(None);
        }

        let snapshot = self.rates.get_snapshot().await?;
        let cross_rate = snapshot.as_ref().and_then(|s| {
            rate_lookup::cross_rate(&alert.from_currency, &alert.to_currency, s)
        });
        let triggered = cross_rate.is_some_and(|r| alert.is_triggered_by(r));

        let state = alert.state();
        let skip_reason = match state {
            AlertState::Fired => Some(SkipReason::AlreadyNotified),
            AlertState::Paused => Some(SkipReason::Inactive),
            AlertState::Active if snapshot.is_none() => Some(SkipReason::NoSnapshot),
            AlertState::Active if cross_rate.is_none() => Some(SkipReason::RateUnavailable),
            AlertState::Active if !triggered => Some(SkipReason::ConditionNotMet),
            AlertState::Active => None,
        };

        Ok(Some(AlertExplanation {
            alert,
            state,
            cross_rate,
            triggered,
            skip_reason,
        }))
    }

    fn record(&self, outcome: &PassOutcome) {
        let mut t = self.telemetry.lock();
        t.last_pass_finished_at = Some(Utc::now().timestamp());

        match outcome {
            PassOutcome::Completed(summary) => {
                t.passes_completed += 1;
                t.last_summary = Some(summary.clone());
            }
            PassOutcome::Failed { .. } | PassOutcome::TimedOut => t.passes_failed += 1,
            PassOutcome::Skipped => {}
        }
    }

    async fn run_pass(&self) -> PassOutcome {
        let alerts = match self.store.list_active(self.options.owner_scope).await {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("failed to list active alerts: {}", e);
                return PassOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        let mut summary = PassSummary {
            candidates: alerts.len(),
            ..PassSummary::default()
        };

        if alerts.is_empty() {
            return PassOutcome::Completed(summary);
        }

        // One snapshot for the whole pass.
        let snapshot = match self.rates.get_snapshot().await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("rate snapshot read failed: {}", e);
                None
            }
        };

        let Some(snapshot) = snapshot else {
            tracing::debug!(candidates = alerts.len(), "no rate snapshot; skipping pass");
            summary.snapshot_missing = true;
            summary.rate_unavailable = alerts.len();
            return PassOutcome::Completed(summary);
        };

        for alert in &alerts {
            let res = AssertUnwindSafe(self.check_alert(alert, &snapshot))
                .catch_unwind()
                .await;

            match res {
                Ok(outcome) => summary.record(outcome),
                Err(_) => {
                    tracing::error!(alert_id = %alert.id, pair = %alert.pair(), "alert check panicked");
                    summary.panicked += 1;
                }
            }
        }

        tracing::info!(
            candidates = summary.candidates,
            triggered = summary.triggered,
            persisted = summary.persisted,
            persist_failures = summary.persist_failures,
            rate_unavailable = summary.rate_unavailable,
            "alert pass finished"
        );

        PassOutcome::Completed(summary)
    }

    async fn check_alert(&self, alert: &Alert, snapshot: &RateSnapshot) -> AlertOutcome {
        let Some(rate) =
            rate_lookup::cross_rate(&alert.from_currency, &alert.to_currency, snapshot)
        else {
            tracing::debug!(alert_id = %alert.id, pair = %alert.pair(), "rate unavailable");
            return AlertOutcome::RateUnavailable;
        };

        if !alert.is_triggered_by(rate) {
            return AlertOutcome::NotTriggered;
        }

        tracing::info!(
            alert_id = %alert.id,
            pair = %alert.pair(),
            condition = %alert.condition,
            target = alert.target_rate,
            rate,
            "alert triggered"
        );

        let notified = self.notify(alert, rate).await;
        let persisted = self.mark_fired(alert).await;

        AlertOutcome::Fired {
            notified,
            persisted,
        }
    }

    async fn notify(&self, alert: &Alert, rate: f64) -> bool {
        let notification = Notification::for_alert(alert, rate);

        match self.notifier.send(&notification).await {
            Ok(Delivery::Accepted) => true,
            Ok(Delivery::Unavailable) => {
                tracing::warn!(
                    alert_id = %alert.id,
                    notifier = self.notifier.name(),
                    "notifier unavailable; marking alert fired anyway"
                );
                false
            }
            Err(e) => {
                tracing::warn!(alert_id = %alert.id, "notification failed: {}", e);
                false
            }
        }
    }

    async fn mark_fired(&self, alert: &Alert) -> bool {
        let policy = self.options.retry;

        for attempt in 1..=policy.max_attempts {
            match self.store.update(alert.id, AlertPatch::fired()).await {
                Ok(true) => return true,
                Ok(false) => {
                    tracing::warn!(alert_id = %alert.id, attempt, "store rejected fired update");
                }
                Err(e) => {
                    tracing::warn!(alert_id = %alert.id, attempt, "failed to persist fired alert: {}", e);
                }
            }

            if attempt < policy.max_attempts {
                time::sleep(policy.delay).await;
            }
        }

        tracing::error!(
            alert_id = %alert.id,
            attempts = policy.max_attempts,
            "could not mark alert fired; it stays active and may notify again"
        );
        false
    }
}
