//! # Local Store Adapter
//!
//! The write side of the local cache as the sync units see it.
//! `campus_db::Database` is the production implementation.

use async_trait::async_trait;

use campus_core::{CachedRecord, EntityKind};
use campus_db::Database;

use crate::error::SyncResult;

/// Insert-or-replace writes into per-entity tables.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Inserts `record`, or fully replaces the row with the same id.
    async fn upsert(&self, kind: EntityKind, record: &CachedRecord) -> SyncResult<()>;

    /// Applies [`upsert`](Self::upsert) to each record in order.
    ///
    /// No atomicity across the batch: records before a failure stay written.
    async fn upsert_many(&self, kind: EntityKind, records: &[CachedRecord]) -> SyncResult<usize> {
        for record in records {
            self.upsert(kind, record).await?;
        }
        Ok(records.len())
    }
}

#[async_trait]
impl LocalStore for Database {
    async fn upsert(&self, kind: EntityKind, record: &CachedRecord) -> SyncResult<()> {
        self.cache(kind).upsert(record).await?;
        Ok(())
    }

    async fn upsert_many(&self, kind: EntityKind, records: &[CachedRecord]) -> SyncResult<usize> {
        Ok(self.cache(kind).upsert_many(records).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_db::DbConfig;

    #[tokio::test]
    async fn test_database_is_a_local_store() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let store: &dyn LocalStore = &db;

        let record = CachedRecord {
            id: "c-1".to_string(),
            parent_id: Some("t-1".to_string()),
            payload: r#"{"id":"c-1","code":"MATH101","name":"Algebra"}"#.to_string(),
        };

        store.upsert(EntityKind::Courses, &record).await.unwrap();
        let written = store
            .upsert_many(EntityKind::Courses, &[record.clone()])
            .await
            .unwrap();

        assert_eq!(written, 1);
        assert_eq!(db.cache(EntityKind::Courses).count().await.unwrap(), 1);
    }
}
