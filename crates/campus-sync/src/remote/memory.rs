//! In-process remote store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use campus_core::{EntityKind, SyncRecord};

use super::{RemoteDocument, RemoteError, RemoteStore};

/// [`RemoteStore`] held in memory.
///
/// Collections can be seeded, made to fail, or slowed down per entity,
/// which is what the orchestrator tests need.
///
/// ## Example
/// ```rust,ignore
/// let remote = MemoryRemoteStore::new();
/// remote.insert_record(&teacher).await?;
/// remote.fail_collection(EntityKind::Fees, RemoteError::Network("down".into())).await;
/// ```
#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    collections: RwLock<HashMap<EntityKind, Vec<RemoteDocument>>>,
    failures: RwLock<HashMap<EntityKind, RemoteError>>,
    delays: RwLock<HashMap<EntityKind, Duration>>,
    fetches: AtomicUsize,
}

impl MemoryRemoteStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a document, replacing any document with the same id.
    pub async fn insert_document(&self, kind: EntityKind, document: RemoteDocument) {
        let mut collections = self.collections.write().await;
        let collection = collections.entry(kind).or_default();

        match collection.iter_mut().find(|d| d.id == document.id) {
            Some(existing) => *existing = document,
            None => collection.push(document),
        }
    }

    /// Adds a typed record to its entity's collection.
    pub async fn insert_record<R: SyncRecord>(&self, record: &R) -> Result<(), RemoteError> {
        let document = RemoteDocument::from_record(record)?;
        self.insert_document(R::ENTITY, document).await;
        Ok(())
    }

    /// Removes a document. Returns true if it existed.
    pub async fn remove(&self, kind: EntityKind, id: &str) -> bool {
        let mut collections = self.collections.write().await;
        match collections.get_mut(&kind) {
            Some(collection) => {
                let before = collection.len();
                collection.retain(|d| d.id != id);
                collection.len() != before
            }
            None => false,
        }
    }

    /// Makes every read of `kind` fail with `error`.
    pub async fn fail_collection(&self, kind: EntityKind, error: RemoteError) {
        self.failures.write().await.insert(kind, error);
    }

    /// Undoes [`fail_collection`](Self::fail_collection).
    pub async fn clear_failure(&self, kind: EntityKind) {
        self.failures.write().await.remove(&kind);
    }

    /// Delays every read of `kind`.
    pub async fn delay_collection(&self, kind: EntityKind, delay: Duration) {
        self.delays.write().await.insert(kind, delay);
    }

    /// Total reads served or attempted.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    async fn before_read(&self, kind: EntityKind) -> Result<(), RemoteError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let delay = self.delays.read().await.get(&kind).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.failures.read().await.get(&kind) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn fetch_collection(&self, kind: EntityKind) -> Result<Vec<RemoteDocument>, RemoteError> {
        self.before_read(kind).await?;

        Ok(self
            .collections
            .read()
            .await
            .get(&kind)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_document(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> Result<Option<RemoteDocument>, RemoteError> {
        self.before_read(kind).await?;

        Ok(self
            .collections
            .read()
            .await
            .get(&kind)
            .and_then(|c| c.iter().find(|d| d.id == id).cloned()))
    }
}
