//! # campus-sync: Offline-First Sync Engine
//!
//! Pulls every school entity from the remote document store and upserts it
//! into the on-device cache, so the app keeps working without a connection.
//!
//! ## Sync Pass
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            Sync Pass                                    │
//! │                                                                         │
//! │  SyncScheduler ── periodic tick / run_once ──┐                          │
//! │                                              ▼                          │
//! │  SyncOrchestrator                                                       │
//! │    1. probe.is_reachable()?  no ──► PassStatus::Retry (nothing runs)    │
//! │    2. spawn every registered unit concurrently                          │
//! │         users ─┐ teachers ─┐ students ─┐ ... fees ─┐                    │
//! │                ▼           ▼           ▼           ▼                    │
//! │         RemoteStore::fetch_collection ─► LocalStore::upsert             │
//! │    3. join all, map entity → UnitOutcome                                │
//! │    4. all Success → Success, else PartialFailure                        │
//! │                                                                         │
//! │  Retry / Failure ──► RetryPolicy backoff ──► next attempt               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`remote`] - Remote document store client (HTTP and in-memory)
//! - [`local`] - Local cache write seam
//! - [`unit`] - Per-entity sync units
//! - [`registry`] - The declarative list of units
//! - [`orchestrator`] - Pass state machine and fan-out
//! - [`scheduler`] - Periodic and one-shot triggers with retry
//! - [`network`] - Connectivity probes
//! - [`retry`] - Linear and exponential backoff
//! - [`config`] - TOML configuration with env overrides
//! - [`events`] - Pass observers
//! - [`error`] - Sync error types

pub mod config;
pub mod error;
pub mod events;
pub mod local;
pub mod network;
pub mod orchestrator;
pub mod registry;
pub mod remote;
pub mod retry;
pub mod scheduler;
pub mod unit;

pub use config::{SyncConfig, SyncMode};
pub use error::{SyncError, SyncResult};
pub use events::{NoOpEmitter, SyncEventEmitter, TracingEmitter};
pub use local::LocalStore;
pub use network::{ConnectivityProbe, StaticProbe, TcpProbe};
pub use orchestrator::{OrchestratorState, PassStatus, SyncOrchestrator, SyncPassResult};
pub use registry::UnitRegistry;
pub use remote::{
    HttpRemoteStore, MemoryRemoteStore, RemoteDocument, RemoteError, RemoteStore, RemoteStoreExt,
};
pub use retry::{BackoffKind, RetryPolicy};
pub use scheduler::{Registration, SyncConstraints, SyncScheduler};
pub use unit::{EntitySyncUnit, SyncUnit, UnitContext, UnitOutcome};
