pub mod alert;
pub mod rate_snapshot;
pub mod notification;

pub use alert::{Alert, AlertCondition, AlertPatch, AlertState};
pub use rate_snapshot::RateSnapshot;
pub use notification::Notification;
