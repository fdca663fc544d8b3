use std::sync::Arc;

use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::options::FindOneOptions;
use mongodb::{Collection, Database};
use parking_lot::RwLock;

use crate::error::Result;
use crate::models::RateSnapshot;

/// Read-only access to the most recently cached rates. `None` means no
/// snapshot has been stored yet.
#[async_trait]
pub trait RateSnapshotSource: Send + Sync {
    async fn get_snapshot(&self) -> Result<Option<RateSnapshot>>;
}

/// Reads the newest document of `rate_snapshots`, which the rate refresher
/// appends to.
#[derive(Clone)]
pub struct MongoRateSnapshots {
    snapshots: Collection<RateSnapshot>,
}

impl MongoRateSnapshots {
    pub fn new(db: &Database) -> Self {
        Self {
            snapshots: db.collection::<RateSnapshot>("rate_snapshots"),
        }
    }
}

#[async_trait]
impl RateSnapshotSource for MongoRateSnapshots {
    async fn get_snapshot(&self) -> Result<Option<RateSnapshot>> {
        let opts = FindOneOptions::builder()
            .sort(doc! { "fetched_at": -1 })
            .build();

        Ok(self.snapshots.find_one(doc! {}, opts).await?)
    }
}

/// In-process snapshot slot that a refresher task can overwrite.
#[derive(Clone, Default)]
pub struct SharedRateSnapshot {
    inner: Arc<RwLock<Option<RateSnapshot>>>,
}

impl SharedRateSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, snapshot: RateSnapshot) {
        *self.inner.write() = Some(snapshot);
    }

    pub fn clear(&self) {
        *self.inner.write() = None;
    }
}

#[async_trait]
impl RateSnapshotSource for SharedRateSnapshot {
    async fn get_snapshot(&self) -> Result<Option<RateSnapshot>> {
        Ok(self.inner.read().clone())
    }
}
