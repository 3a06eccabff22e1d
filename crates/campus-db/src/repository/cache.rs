//! # Cache Repositories
//!
//! Insert-or-replace storage for synchronized records, one table per entity.
//!
//! ## Upsert Semantics
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  upsert(record)                                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  INSERT INTO cache_<entity> (id, parent_id, payload)                   │
//! │  VALUES (?1, ?2, ?3)                                                   │
//! │  ON CONFLICT(id) DO UPDATE SET                                          │
//! │      parent_id = excluded.parent_id,                                   │
//! │      payload   = excluded.payload                                      │
//! │                                                                         │
//! │  • id absent  → row inserted                                           │
//! │  • id present → row fully replaced                                     │
//! │  • same record twice → same stored state (idempotent)                  │
//! │                                                                         │
//! │  upsert_many: one upsert per record, no batch transaction. A crash     │
//! │  mid-batch leaves a mix of old and new rows; the next pass re-applies. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::marker::PhantomData;

use sqlx::SqlitePool;
use tracing::debug;

use campus_core::{CachedRecord, EntityKind, SyncRecord};

use crate::error::DbResult;

type CacheRow = (String, Option<String>, String);

fn into_record((id, parent_id, payload): CacheRow) -> CachedRecord {
    CachedRecord {
        id,
        parent_id,
        payload,
    }
}

// =============================================================================
// Cache Repository (untyped)
// =============================================================================

/// Repository over one entity's cache table.
#[derive(Debug, Clone)]
pub struct CacheRepository {
    pool: SqlitePool,
    kind: EntityKind,
}

impl CacheRepository {
    /// Creates a repository for the given entity's table.
    pub fn new(pool: SqlitePool, kind: EntityKind) -> Self {
        CacheRepository { pool, kind }
    }

    /// The entity this repository writes.
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Inserts the record, or fully replaces the row with the same id.
    pub async fn upsert(&self, record: &CachedRecord) -> DbResult<()> {
        let sql = format!(
            "INSERT INTO {} (id, parent_id, payload) VALUES (?1, ?2, ?3) \
             ON CONFLICT(id) DO UPDATE SET \
             parent_id = excluded.parent_id, payload = excluded.payload",
            self.kind.table_name()
        );

        sqlx::query(&sql)
            .bind(&record.id)
            .bind(&record.parent_id)
            .bind(&record.payload)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Upserts each record in order.
    ///
    /// Stops at the first failure; records before it stay written.
    ///
    /// ## Returns
    /// Number of records written.
    pub async fn upsert_many(&self, records: &[CachedRecord]) -> DbResult<usize> {
        for record in records {
            self.upsert(record).await?;
        }

        debug!(entity = %self.kind, count = records.len(), "Upserted batch");
        Ok(records.len())
    }

    /// Gets a record by its primary key.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<CachedRecord>> {
        let sql = format!(
            "SELECT id, parent_id, payload FROM {} WHERE id = ?1",
            self.kind.table_name()
        );

        let row = sqlx::query_as::<_, CacheRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(into_record))
    }

    /// Lists records ordered by id.
    pub async fn list(&self, limit: u32) -> DbResult<Vec<CachedRecord>> {
        let sql = format!(
            "SELECT id, parent_id, payload FROM {} ORDER BY id LIMIT ?1",
            self.kind.table_name()
        );

        let rows = sqlx::query_as::<_, CacheRow>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(into_record).collect())
    }

    /// Lists records whose lookup key matches (indexed).
    pub async fn list_by_parent(&self, parent_id: &str) -> DbResult<Vec<CachedRecord>> {
        let sql = format!(
            "SELECT id, parent_id, payload FROM {} WHERE parent_id = ?1 ORDER BY id",
            self.kind.table_name()
        );

        let rows = sqlx::query_as::<_, CacheRow>(&sql)
            .bind(parent_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(into_record).collect())
    }

    /// All primary keys, sorted.
    pub async fn ids(&self) -> DbResult<Vec<String>> {
        let sql = format!("SELECT id FROM {} ORDER BY id", self.kind.table_name());

        let ids = sqlx::query_scalar::<_, String>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(ids)
    }

    /// Counts rows in the table.
    pub async fn count(&self) -> DbResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.kind.table_name());

        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;

        Ok(count)
    }

    /// Deletes a record. Returns true if a row was removed.
    pub async fn delete(&self, id: &str) -> DbResult<bool> {
        let sql = format!("DELETE FROM {} WHERE id = ?1", self.kind.table_name());

        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;

        Ok(result.rows_affected() > 0)
    }
}

// =============================================================================
// Record Repository (typed)
// =============================================================================

/// Typed view of a cache table.
pub struct RecordRepository<R> {
    cache: CacheRepository,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for RecordRepository<R> {
    fn clone(&self) -> Self {
        RecordRepository {
            cache: self.cache.clone(),
            _record: PhantomData,
        }
    }
}

impl<R: SyncRecord> RecordRepository<R> {
    /// Wraps an untyped repository. The repository must be for `R::ENTITY`.
    pub fn new(cache: CacheRepository) -> Self {
        debug_assert_eq!(cache.kind(), R::ENTITY);
        RecordRepository {
            cache,
            _record: PhantomData,
        }
    }

    /// Inserts or replaces a typed record.
    pub async fn upsert(&self, record: &R) -> DbResult<()> {
        let cached = CachedRecord::from_record(record)?;
        self.cache.upsert(&cached).await
    }

    /// Upserts typed records in order.
    pub async fn upsert_many(&self, records: &[R]) -> DbResult<usize> {
        let cached = records
            .iter()
            .map(CachedRecord::from_record)
            .collect::<Result<Vec<_>, _>>()?;
        self.cache.upsert_many(&cached).await
    }

    /// Gets a record by id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<R>> {
        match self.cache.get_by_id(id).await? {
            Some(cached) => Ok(Some(cached.decode()?)),
            None => Ok(None),
        }
    }

    /// Lists records ordered by id.
    pub async fn list(&self, limit: u32) -> DbResult<Vec<R>> {
        let rows = self.cache.list(limit).await?;
        Ok(rows.iter().map(CachedRecord::decode).collect::<Result<_, _>>()?)
    }

    /// Lists records by lookup key.
    pub async fn list_by_parent(&self, parent_id: &str) -> DbResult<Vec<R>> {
        let rows = self.cache.list_by_parent(parent_id).await?;
        Ok(rows.iter().map(CachedRecord::decode).collect::<Result<_, _>>()?)
    }

    /// Counts cached records.
    pub async fn count(&self) -> DbResult<i64> {
        self.cache.count().await
    }

    /// Deletes a record by id.
    pub async fn delete(&self, id: &str) -> DbResult<bool> {
        self.cache.delete(id).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use campus_core::{Student, Teacher};

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn teacher(id: &str, name: &str) -> Teacher {
        Teacher {
            id: id.to_string(),
            user_id: Some(format!("u-{id}")),
            full_name: name.to_string(),
            subject: "Mathematics".to_string(),
            email: None,
            phone: None,
        }
    }

    fn student(id: &str, class_id: &str) -> Student {
        Student {
            id: id.to_string(),
            user_id: None,
            full_name: format!("Student {id}"),
            class_id: Some(class_id.to_string()),
            roll_number: None,
            guardian_phone: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_replaces() {
        let db = setup().await;
        let repo = db.records::<Teacher>();

        repo.upsert(&teacher("t-1", "Ada")).await.unwrap();
        repo.upsert(&teacher("t-1", "Ada Lovelace")).await.unwrap();

        assert_eq!(repo.count().await.unwrap(), 1);
        let stored = repo.get_by_id("t-1").await.unwrap().unwrap();
        assert_eq!(stored.full_name, "Ada Lovelace");
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let db = setup().await;
        let repo = db.cache(EntityKind::Teachers);
        let record = CachedRecord::from_record(&teacher("t-1", "Ada")).unwrap();

        repo.upsert(&record).await.unwrap();
        let first = repo.get_by_id("t-1").await.unwrap();
        repo.upsert(&record).await.unwrap();
        let second = repo.get_by_id("t-1").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upsert_many_and_ids() {
        let db = setup().await;
        let repo = db.records::<Teacher>();

        let written = repo
            .upsert_many(&[teacher("t-2", "Grace"), teacher("t-1", "Ada")])
            .await
            .unwrap();

        assert_eq!(written, 2);
        assert_eq!(
            db.cache(EntityKind::Teachers).ids().await.unwrap(),
            vec!["t-1".to_string(), "t-2".to_string()]
        );
    }

    #[tokio::test]
    async fn test_upsert_many_empty_writes_nothing() {
        let db = setup().await;
        let written = db.cache(EntityKind::Fees).upsert_many(&[]).await.unwrap();

        assert_eq!(written, 0);
        assert_eq!(db.cache(EntityKind::Fees).count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_by_parent() {
        let db = setup().await;
        let repo = db.records::<Student>();

        repo.upsert_many(&[
            student("s-1", "class-7"),
            student("s-2", "class-8"),
            student("s-3", "class-7"),
        ])
        .await
        .unwrap();

        let roster = repo.list_by_parent("class-7").await.unwrap();
        let ids: Vec<_> = roster.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["s-1", "s-3"]);
    }

    #[tokio::test]
    async fn test_tables_are_isolated() {
        let db = setup().await;
        db.records::<Teacher>()
            .upsert(&teacher("shared-id", "Ada"))
            .await
            .unwrap();

        assert!(db
            .cache(EntityKind::Students)
            .get_by_id("shared-id")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let db = setup().await;
        let repo = db.records::<Teacher>();
        repo.upsert(&teacher("t-1", "Ada")).await.unwrap();

        assert!(repo.delete("t-1").await.unwrap());
        assert!(!repo.delete("t-1").await.unwrap());
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_respects_limit() {
        let db = setup().await;
        let repo = db.records::<Teacher>();
        for i in 0..5 {
            repo.upsert(&teacher(&format!("t-{i}"), "Name")).await.unwrap();
        }

        assert_eq!(repo.list(3).await.unwrap().len(), 3);
    }
}
