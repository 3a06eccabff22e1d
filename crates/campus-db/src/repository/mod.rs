//! # Repository Module
//!
//! Cache repositories for the synchronized entities.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Sync unit / app screen                                                │
//! │       │                                                                 │
//! │       │  db.records::<Student>().list_by_parent("class-7")             │
//! │       ▼                                                                 │
//! │  RecordRepository<Student>   (typed: encode / decode payloads)         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CacheRepository(Students)   (untyped: SQL against cache_students)     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
