//! # campus-core: Pure Domain Types for Campus
//!
//! The types shared by every other crate in the workspace: the entities that
//! get synchronized, their typed records, and the envelope those records are
//! cached in. Nothing in here touches a database or the network.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Campus Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Scheduler / campus-syncd (binary)                  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                campus-sync (Orchestrator + Units)               │   │
//! │  └──────────────┬──────────────────────────────────┬───────────────┘   │
//! │                 │                                  │                    │
//! │  ┌──────────────▼──────────────┐   ┌───────────────▼───────────────┐   │
//! │  │  campus-db (Local Cache)    │   │  Remote document store        │   │
//! │  └──────────────┬──────────────┘   └───────────────────────────────┘   │
//! │                 │                                                       │
//! │  ┌──────────────▼──────────────────────────────────────────────────┐   │
//! │  │               ★ campus-core (THIS CRATE) ★                       │   │
//! │  │   EntityKind • SyncRecord • CachedRecord • User/Teacher/...     │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`entity`] - `EntityKind`, `Role`, the `SyncRecord` trait and `CachedRecord`
//! - [`types`] - Typed school records (User, Teacher, Student, ...)
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use campus_core::{CachedRecord, EntityKind, SyncRecord, Teacher};
//!
//! let teacher = Teacher {
//!     id: "t-1".into(),
//!     user_id: Some("u-1".into()),
//!     full_name: "Ada Lovelace".into(),
//!     subject: "Mathematics".into(),
//!     email: None,
//!     phone: None,
//! };
//!
//! let cached = CachedRecord::from_record(&teacher).unwrap();
//! assert_eq!(Teacher::ENTITY, EntityKind::Teachers);
//! assert_eq!(cached.id, "t-1");
//! ```

pub mod entity;
pub mod error;
pub mod types;

pub use entity::{CachedRecord, EntityKind, Role, SyncRecord};
pub use error::{CoreError, CoreResult};
pub use types::*;
