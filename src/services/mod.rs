pub mod db_init;

pub mod evaluator;
pub mod rate_lookup;

pub mod alert_store;
pub mod rate_snapshots;
pub mod notifier;
pub mod alert_checker;

pub use alert_checker::{
    AlertChecker, AlertExplanation, CheckerOptions, CheckerStatus, PassOutcome, PassSummary,
    RetryPolicy, SkipReason,
};
pub use alert_store::{AlertStore, MemoryAlertStore, MongoAlertStore};
pub use notifier::{BroadcastNotifier, Delivery, FanoutNotifier, Notifier, WebhookNotifier};
pub use rate_snapshots::{MongoRateSnapshots, RateSnapshotSource, SharedRateSnapshot};
