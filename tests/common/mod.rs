#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use parking_lot::Mutex;
use ratealerts::error::{AppError, Result};
use ratealerts::models::{Alert, AlertCondition, AlertPatch, Notification, RateSnapshot};
use ratealerts::services::{
    AlertChecker, AlertStore, CheckerOptions, Delivery, MemoryAlertStore, Notifier,
    RateSnapshotSource, RetryPolicy, SharedRateSnapshot,
};

/// Memory store with injectable update failures and a slow list call.
#[derive(Default)]
pub struct TestStore {
    pub inner: MemoryAlertStore,
    pub failing_updates: AtomicU32,
    pub update_calls: AtomicU32,
    pub list_delay: Mutex<Option<Duration>>,
    pub fail_list: AtomicBool,
}

impl TestStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next_updates(&self, n: u32) {
        self.failing_updates.store(n, Ordering::SeqCst);
    }

    pub fn set_list_delay(&self, d: Duration) {
        *self.list_delay.lock() = Some(d);
    }

    pub fn clear_list_delay(&self) {
        *self.list_delay.lock() = None;
    }

    pub async fn alert(&self, id: ObjectId) -> Alert {
        self.inner.get(id).await.unwrap().expect("alert exists")
    }
}

#[async_trait]
impl AlertStore for TestStore {
    async fn list_active(&self, owner: Option<ObjectId>) -> Result<Vec<Alert>> {
        let delay = *self.list_delay.lock();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(AppError::Store("store offline".to_string()));
        }
        self.inner.list_active(owner).await
    }

    async fn list_all(&self, owner: Option<ObjectId>) -> Result<Vec<Alert>> {
        self.inner.list_all(owner).await
    }

    async fn get(&self, id: ObjectId) -> Result<Option<Alert>> {
        self.inner.get(id).await
    }

    async fn update(&self, id: ObjectId, patch: AlertPatch) -> Result<bool> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);

        let remaining = self.failing_updates.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_updates.store(remaining - 1, Ordering::SeqCst);
            return Err(AppError::Store("write rejected".to_string()));
        }

        self.inner.update(id, patch).await
    }
}

/// Records every notification; optionally refuses or panics on a pair.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Notification>>,
    pub unavailable: bool,
    pub failing: bool,
    pub panic_on_title: Option<String>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn titles(&self) -> Vec<String> {
        self.sent.lock().iter().map(|n| n.title.clone()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<Delivery> {
        if self.panic_on_title.as_deref() == Some(notification.title.as_str()) {
            panic!("notifier blew up");
        }
        self.sent.lock().push(notification.clone());

        if self.failing {
            return Err(AppError::Notify("channel down".to_string()));
        }
        if self.unavailable {
            return Ok(Delivery::Unavailable);
        }
        Ok(Delivery::Accepted)
    }

    async fn is_available(&self) -> bool {
        !self.unavailable
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Snapshot source that counts how often it is read.
#[derive(Default)]
pub struct CountingSnapshots {
    pub inner: SharedRateSnapshot,
    pub reads: AtomicU32,
}

impl CountingSnapshots {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reads(&self) -> u32 {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateSnapshotSource for CountingSnapshots {
    async fn get_snapshot(&self) -> Result<Option<RateSnapshot>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get_snapshot().await
    }
}

pub fn usd_snapshot(pairs: &[(&str, f64)]) -> RateSnapshot {
    RateSnapshot::new(
        "USD",
        pairs.iter().map(|(code, rate)| (code.to_string(), *rate)),
    )
}

pub fn alert(from: &str, to: &str, target: f64, condition: AlertCondition) -> Alert {
    Alert::new(ObjectId::new(), from, to, target, condition).unwrap()
}

pub fn fast_options() -> CheckerOptions {
    CheckerOptions {
        retry: RetryPolicy::new(3, Duration::ZERO),
        ..CheckerOptions::default()
    }
}

pub fn checker(
    store: &Arc<TestStore>,
    rates: &SharedRateSnapshot,
    notifier: &Arc<RecordingNotifier>,
    options: CheckerOptions,
) -> Arc<AlertChecker> {
    Arc::new(AlertChecker::new(
        store.clone(),
        Arc::new(rates.clone()),
        notifier.clone(),
        options,
    ))
}
