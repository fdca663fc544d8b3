use mongodb::{
    bson::doc,
    options::IndexOptions,
    Database, IndexModel,
};

use crate::error::Result;

pub async fn ensure_indexes(db: &Database) -> Result<()> {
    // alerts: checker scan (active + not notified, optionally per owner)
    {
        let col = db.collection::<mongodb::bson::Document>("alerts");
        let model = IndexModel::builder()
            .keys(doc! { "is_active": 1, "notified": 1, "owner": 1 })
            .build();

        col.create_index(model, None).await?;
    }

    // rate_snapshots: newest snapshot first
    {
        let col = db.collection::<mongodb::bson::Document>("rate_snapshots");
        let model = IndexModel::builder()
            .keys(doc! { "fetched_at": -1 })
            .options(IndexOptions::builder().name("fetched_at_desc".to_string()).build())
            .build();

        col.create_index(model, None).await?;
    }

    Ok(())
}
