use async_trait::async_trait;
use chrono::Utc;
use futures_util::StreamExt;
use mongodb::bson::{doc, oid::ObjectId, Document};
use mongodb::options::FindOptions;
use mongodb::{Collection, Database};
use parking_lot::Mutex;

use crate::error::{AppError, Result};
use crate::models::{Alert, AlertPatch};

/// Durable alert records. The store is the only writer of alert truth; the
/// checker re-reads it on every pass.
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Alerts with `is_active && !notified`, optionally for a single owner.
    async fn list_active(&self, owner: Option<ObjectId>) -> Result<Vec<Alert>>;

    async fn list_all(&self, owner: Option<ObjectId>) -> Result<Vec<Alert>>;

    async fn get(&self, id: ObjectId) -> Result<Option<Alert>>;

    /// Returns false when no alert matched `id`.
    async fn update(&self, id: ObjectId, patch: AlertPatch) -> Result<bool>;
}

#[derive(Clone)]
pub struct MongoAlertStore {
    alerts: Collection<Alert>,
}

impl MongoAlertStore {
    pub fn new(db: &Database) -> Self {
        Self {
            alerts: db.collection::<Alert>("alerts"),
        }
    }

    async fn find(&self, filter: Document) -> Result<Vec<Alert>> {
        let find_opts = FindOptions::builder()
            .sort(doc! { "created_at": 1 })
            .build();

        let mut cursor = self.alerts.find(filter, find_opts).await?;

        let mut items: Vec<Alert> = Vec::new();
        while let Some(res) = cursor.next().await {
            items.push(res?);
        }

        Ok(items)
    }
}

fn owner_filter(mut filter: Document, owner: Option<ObjectId>) -> Document {
    if let Some(owner) = owner {
        filter.insert("owner", owner);
    }
    filter
}

#[async_trait]
impl AlertStore for MongoAlertStore {
    async fn list_active(&self, owner: Option<ObjectId>) -> Result<Vec<Alert>> {
        self.find(owner_filter(doc! { "is_active": true, "notified": false }, owner))
            .await
    }

    async fn list_all(&self, owner: Option<ObjectId>) -> Result<Vec<Alert>> {
        self.find(owner_filter(doc! {}, owner)).await
    }

    async fn get(&self, id: ObjectId) -> Result<Option<Alert>> {
        Ok(self.alerts.find_one(doc! { "_id": id }, None).await?)
    }

    async fn update(&self, id: ObjectId, patch: AlertPatch) -> Result<bool> {
        if patch.is_empty() {
            return Err(AppError::Store("empty patch".to_string()));
        }

        let mut set = doc! { "updated_at": Utc::now().timestamp() };
        if let Some(v) = patch.is_active {
            set.insert("is_active", v);
        }
        if let Some(v) = patch.notified {
            set.insert("notified", v);
        }

        let res = self
            .alerts
            .update_one(doc! { "_id": id }, doc! { "$set": set }, None)
            .await?;

        Ok(res.matched_count > 0)
    }
}

/// Process-local store, kept in insertion order.
#[derive(Default)]
pub struct MemoryAlertStore {
    alerts: Mutex<Vec<Alert>>,
}

impl MemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, alert: Alert) {
        self.alerts.lock().push(alert);
    }

    pub fn remove(&self, id: ObjectId) -> bool {
        let mut alerts = self.alerts.lock();
        let before = alerts.len();
        alerts.retain(|a| a.id != id);
        alerts.len() != before
    }

    pub fn snapshot(&self) -> Vec<Alert> {
        self.alerts.lock().clone()
    }

    fn filtered(&self, owner: Option<ObjectId>, pred: impl Fn(&Alert) -> bool) -> Vec<Alert> {
        self.alerts
            .lock()
            .iter()
            .filter(|&a| owner.map_or(true, |o| a.owner == o) && pred(a))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AlertStore for MemoryAlertStore {
    async fn list_active(&self, owner: Option<ObjectId>) -> Result<Vec<Alert>> {
        Ok(self.filtered(owner, Alert::is_candidate))
    }

    async fn list_all(&self, owner: Option<ObjectId>) -> Result<Vec<Alert>> {
        Ok(self.filtered(owner, |_| true))
    }

    async fn get(&self, id: ObjectId) -> Result<Option<Alert>> {
        Ok(self.alerts.lock().iter().find(|a| a.id == id).cloned())
    }

    async fn update(&self, id: ObjectId, patch: AlertPatch) -> Result<bool> {
        let mut alerts = self.alerts.lock();
        match alerts.iter_mut().find(|a| a.id == id) {
            Some(a) => {
                a.apply(&patch);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AlertCondition;

    fn alert(owner: ObjectId) -> Alert {
        Alert::new(owner, "USD", "EUR", 0.9, AlertCondition::Above).unwrap()
    }

    #[tokio::test]
    async fn memory_store_filters_candidates_and_owner() {
        let store = MemoryAlertStore::new();
        let me = ObjectId::new();
        let other = ObjectId::new();

        let active = alert(me);
        let mut fired = alert(me);
        fired.apply(&AlertPatch::fired());
        let foreign = alert(other);

        store.insert(active.clone());
        store.insert(fired);
        store.insert(foreign);

        let mine = store.list_active(Some(me)).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, active.id);

        assert_eq!(store.list_active(None).await.unwrap().len(), 2);
        assert_eq!(store.list_all(Some(me)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn memory_store_update_reports_missing_alert() {
        let store = MemoryAlertStore::new();
        let a = alert(ObjectId::new());
        store.insert(a.clone());

        assert!(store.update(a.id, AlertPatch::fired()).await.unwrap());
        assert!(!store.update(ObjectId::new(), AlertPatch::fired()).await.unwrap());

        let stored = store.get(a.id).await.unwrap().unwrap();
        assert!(stored.notified);
        assert!(!stored.is_active);
    }
}
