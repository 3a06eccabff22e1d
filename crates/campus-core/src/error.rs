//! # Error Types
//!
//! Domain-specific error types for campus-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  campus-core errors (this file)                                        │
//! │  └── CoreError        - Record envelope / name parsing failures        │
//! │                                                                         │
//! │  campus-db errors (separate crate)                                     │
//! │  └── DbError          - Local cache failures                           │
//! │                                                                         │
//! │  campus-sync errors (separate crate)                                   │
//! │  ├── RemoteError      - Remote store failures                          │
//! │  └── SyncError        - Everything the sync engine can hit             │
//! │                                                                         │
//! │  Flow: CoreError → DbError → SyncError → UnitOutcome::Failure          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A record payload could not be serialized or deserialized.
    ///
    /// ## When This Occurs
    /// - Remote document is missing a required field
    /// - A cached payload was written by an older schema
    #[error("Payload error for {entity}: {reason}")]
    Payload { entity: String, reason: String },

    /// A record has no usable primary key.
    #[error("{entity} record has an empty id")]
    EmptyId { entity: String },

    /// Entity name does not match any synchronized entity.
    #[error("Unknown entity: '{0}'")]
    UnknownEntity(String),

    /// Role name does not match any known role.
    #[error("Unknown role: '{0}'. Valid options: admin, teacher, student")]
    UnknownRole(String),
}

impl CoreError {
    /// Creates a payload error for the given entity name.
    pub fn payload(entity: impl Into<String>, reason: impl ToString) -> Self {
        CoreError::Payload {
            entity: entity.into(),
            reason: reason.to_string(),
        }
    }
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
