//! # Entities and the Cache Envelope
//!
//! Sync metadata shared by the remote client, the sync units and the local
//! cache. The engine never looks inside a record beyond what this module
//! exposes: its entity, its primary key and its lookup key.
//!
//! ## Record Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Remote document (JSON)                                                │
//! │       │  decode into R: SyncRecord   (schema check happens here)       │
//! │       ▼                                                                 │
//! │  Teacher / Student / Fee ...                                           │
//! │       │  CachedRecord::from_record(&r)                                 │
//! │       ▼                                                                 │
//! │  CachedRecord { id, parent_id, payload }                               │
//! │       │  INSERT .. ON CONFLICT(id) DO UPDATE                           │
//! │       ▼                                                                 │
//! │  Local table named by EntityKind::table_name()                         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Entity Kind
// =============================================================================

/// Every entity the sync engine moves from the remote store into the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Users,
    Teachers,
    Students,
    Courses,
    Classes,
    Attendance,
    Exams,
    Fees,
}

impl EntityKind {
    /// All entities, in registration order.
    pub const ALL: [EntityKind; 8] = [
        EntityKind::Users,
        EntityKind::Teachers,
        EntityKind::Students,
        EntityKind::Courses,
        EntityKind::Classes,
        EntityKind::Attendance,
        EntityKind::Exams,
        EntityKind::Fees,
    ];

    /// Name of the remote collection (also the entity name in pass results).
    pub const fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Users => "users",
            EntityKind::Teachers => "teachers",
            EntityKind::Students => "students",
            EntityKind::Courses => "courses",
            EntityKind::Classes => "classes",
            EntityKind::Attendance => "attendance",
            EntityKind::Exams => "exams",
            EntityKind::Fees => "fees",
        }
    }

    /// Name of the local cache table.
    ///
    /// Always a static identifier, so it is safe to splice into SQL.
    pub const fn table_name(&self) -> &'static str {
        match self {
            EntityKind::Users => "cache_users",
            EntityKind::Teachers => "cache_teachers",
            EntityKind::Students => "cache_students",
            EntityKind::Courses => "cache_courses",
            EntityKind::Classes => "cache_classes",
            EntityKind::Attendance => "cache_attendance",
            EntityKind::Exams => "cache_exams",
            EntityKind::Fees => "cache_fees",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| CoreError::UnknownEntity(s.to_string()))
    }
}

// =============================================================================
// Role
// =============================================================================

/// Application role. Used as the optional filter on one-shot sync requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Teacher => write!(f, "teacher"),
            Role::Student => write!(f, "student"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" | "administrator" => Ok(Role::Admin),
            "teacher" => Ok(Role::Teacher),
            "student" => Ok(Role::Student),
            other => Err(CoreError::UnknownRole(other.to_string())),
        }
    }
}

// =============================================================================
// Sync Record
// =============================================================================

/// A typed record that can be pulled from the remote store and cached.
pub trait SyncRecord: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The entity this record type belongs to.
    const ENTITY: EntityKind;

    /// Primary key. Upserts are keyed on it.
    fn id(&self) -> &str;

    /// Indexed lookup key in the local table (e.g. a fee's student).
    fn parent_id(&self) -> Option<&str> {
        None
    }
}

// =============================================================================
// Cached Record
// =============================================================================

/// Storage envelope for one record in the local cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedRecord {
    /// Primary key.
    pub id: String,

    /// Indexed lookup key, if the entity has one.
    pub parent_id: Option<String>,

    /// The full record as JSON.
    pub payload: String,
}

impl CachedRecord {
    /// Wraps a typed record for storage.
    ///
    /// ## Returns
    /// * `Err(CoreError::EmptyId)` - the record has a blank primary key
    /// * `Err(CoreError::Payload)` - the record could not be serialized
    pub fn from_record<R: SyncRecord>(record: &R) -> CoreResult<Self> {
        let id = record.id();
        if id.trim().is_empty() {
            return Err(CoreError::EmptyId {
                entity: R::ENTITY.to_string(),
            });
        }

        let payload = serde_json::to_string(record)
            .map_err(|e| CoreError::payload(R::ENTITY.as_str(), e))?;

        Ok(CachedRecord {
            id: id.to_string(),
            parent_id: record.parent_id().map(str::to_string),
            payload,
        })
    }

    /// Decodes the payload back into its typed record.
    pub fn decode<R: SyncRecord>(&self) -> CoreResult<R> {
        serde_json::from_str(&self.payload).map_err(|e| CoreError::payload(R::ENTITY.as_str(), e))
    }
}
