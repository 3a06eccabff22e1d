//! # Entity Sync Units
//!
//! One unit per entity: pull the remote collection, upsert each record
//! into the local cache.
//!
//! ## Unit Algorithm
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      EntitySyncUnit<Teacher>                            │
//! │                                                                         │
//! │  1. PULL     timeout(fetch_timeout, remote.fetch_records::<Teacher>())  │
//! │              ├─ Err(remote)  → Failure { written: 0 }                   │
//! │              └─ elapsed      → Failure { written: 0 }                   │
//! │                                                                         │
//! │  2. UPSERT   for record in records:                                     │
//! │                  local.upsert("teachers", record)                       │
//! │              └─ Err(db)      → Failure { written: <rows so far> }       │
//! │                                                                         │
//! │  3. DONE     Success { count: records.len() }                           │
//! │                                                                         │
//! │  Errors never escape `sync()`; sibling units are unaffected.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, warn};

use campus_core::{CachedRecord, EntityKind, SyncRecord};

use crate::error::{SyncError, SyncResult};
use crate::local::LocalStore;
use crate::remote::{RemoteStore, RemoteStoreExt};

/// Default bound on one unit's remote fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// Unit Outcome
// =============================================================================

/// Result of one unit's run inside a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UnitOutcome {
    /// Every fetched record was written.
    Success { count: usize },

    /// The unit stopped early. `written` rows were upserted before it did.
    Failure { error: String, written: usize },
}

impl UnitOutcome {
    pub fn success(count: usize) -> Self {
        UnitOutcome::Success { count }
    }

    pub fn failure(error: impl fmt::Display, written: usize) -> Self {
        UnitOutcome::Failure {
            error: error.to_string(),
            written,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, UnitOutcome::Success { .. })
    }

    /// Rows written, whether or not the unit succeeded.
    pub fn written(&self) -> usize {
        match self {
            UnitOutcome::Success { count } => *count,
            UnitOutcome::Failure { written, .. } => *written,
        }
    }
}

impl fmt::Display for UnitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitOutcome::Success { count } => write!(f, "Success({})", count),
            UnitOutcome::Failure { error, written } => {
                write!(f, "Failure({}; {} written)", error, written)
            }
        }
    }
}

// =============================================================================
// Unit Context
// =============================================================================

/// Everything a unit needs for one run. Built once at startup and shared
/// by every unit in every pass.
#[derive(Clone)]
pub struct UnitContext {
    pub remote: Arc<dyn RemoteStore>,
    pub local: Arc<dyn LocalStore>,
    pub fetch_timeout: Duration,
}

impl UnitContext {
    pub fn new(remote: Arc<dyn RemoteStore>, local: Arc<dyn LocalStore>) -> Self {
        UnitContext {
            remote,
            local,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }
}

impl fmt::Debug for UnitContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitContext")
            .field("fetch_timeout", &self.fetch_timeout)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Sync Unit Trait
// =============================================================================

/// Moves one entity from the remote store into the local cache.
#[async_trait]
pub trait SyncUnit: Send + Sync {
    /// The entity this unit owns.
    fn entity(&self) -> EntityKind;

    /// Runs the unit. Never fails: every error becomes a `Failure` outcome.
    async fn sync(&self, ctx: &UnitContext) -> UnitOutcome;
}

// =============================================================================
// Entity Sync Unit
// =============================================================================

/// The standard unit for any [`SyncRecord`].
pub struct EntitySyncUnit<R> {
    _record: PhantomData<fn() -> R>,
}

impl<R: SyncRecord> EntitySyncUnit<R> {
    pub fn new() -> Self {
        EntitySyncUnit {
            _record: PhantomData,
        }
    }

    async fn pull(&self, ctx: &UnitContext) -> SyncResult<Vec<R>> {
        let records = timeout(ctx.fetch_timeout, ctx.remote.fetch_records::<R>())
            .await
            .map_err(|_| SyncError::Timeout(ctx.fetch_timeout))??;
        Ok(records)
    }

    async fn upsert_all(&self, ctx: &UnitContext, records: &[R], written: &mut usize) -> SyncResult<()> {
        for record in records {
            let cached = CachedRecord::from_record(record)?;
            ctx.local.upsert(R::ENTITY, &cached).await?;
            *written += 1;
        }
        Ok(())
    }
}

impl<R: SyncRecord> Default for EntitySyncUnit<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: SyncRecord> SyncUnit for EntitySyncUnit<R> {
    fn entity(&self) -> EntityKind {
        R::ENTITY
    }

    async fn sync(&self, ctx: &UnitContext) -> UnitOutcome {
        let entity = R::ENTITY;

        let records = match self.pull(ctx).await {
            Ok(records) => records,
            Err(e) => {
                warn!(%entity, error = %e, retryable = e.is_retryable(), "Pull failed");
                return UnitOutcome::failure(e, 0);
            }
        };
        debug!(%entity, count = records.len(), "Pulled records");

        let mut written = 0;
        match self.upsert_all(ctx, &records, &mut written).await {
            Ok(()) => UnitOutcome::success(written),
            Err(e) => {
                warn!(%entity, error = %e, written, "Upsert failed");
                UnitOutcome::failure(e, written)
            }
        }
    }
}
