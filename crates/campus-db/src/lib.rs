//! # campus-db: Local Cache Store for Campus
//!
//! The on-device persistent cache the app reads from. Synchronized records
//! land here through insert-or-replace upserts keyed by primary id.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Campus Data Flow                                 │
//! │                                                                         │
//! │  Entity Sync Unit (campus-sync)          App screens                   │
//! │       │  upsert                               │  get / list / count     │
//! │       ▼                                       ▼                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     campus-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │◄───│  (cache.rs)    │    │  (embedded)  │  │   │
//! │  │   │  SqlitePool   │    │ CacheRepository│    │ 001_cache... │  │   │
//! │  │   │               │    │ RecordRepo<R>  │    │              │  │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database (campus.db)                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use campus_db::{Database, DbConfig};
//! use campus_core::Student;
//!
//! let db = Database::new(DbConfig::new("campus.db")).await?;
//! let roster = db.records::<Student>().list_by_parent("class-7").await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use migrations::MigrationStatus;
pub use pool::{Database, DbConfig};
pub use repository::cache::{CacheRepository, RecordRepository};
