//! # Sync Error Types
//!
//! Error types for sync operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │     Remote      │  │      Local Cache        │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Network        │  │  DatabaseError          │ │
//! │  │  InvalidUrl     │  │  Auth / Status  │  │  InvalidRecord          │ │
//! │  │  ConfigLoad/Save│  │  Malformed      │  │                         │ │
//! │  │                 │  │  Timeout        │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Inside a pass these never escape a sync unit: the unit turns them     │
//! │  into a `Failure` outcome for its own entity.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use thiserror::Error;

use crate::remote::RemoteError;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering all possible sync failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Invalid remote base URL.
    #[error("Invalid remote URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Remote Errors
    // =========================================================================
    /// The remote store could not serve the request.
    #[error("Remote store error: {0}")]
    Remote(#[from] RemoteError),

    /// A remote fetch did not finish in time.
    #[error("Remote fetch timed out after {0:?}")]
    Timeout(Duration),

    // =========================================================================
    // Local Cache Errors
    // =========================================================================
    /// Local cache write failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// A record could not be prepared for the cache.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal sync engine error.
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<campus_db::DbError> for SyncError {
    fn from(err: campus_db::DbError) -> Self {
        SyncError::DatabaseError(err.to_string())
    }
}

impl From<campus_core::CoreError> for SyncError {
    fn from(err: campus_core::CoreError) -> Self {
        SyncError::InvalidRecord(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl SyncError {
    /// Returns true if a later attempt could succeed.
    ///
    /// ## Retryable Errors
    /// - Network failures and timeouts
    /// - Remote 5xx / 429 responses
    /// - Local database errors (locked, busy)
    ///
    /// ## Non-Retryable Errors
    /// - Configuration errors
    /// - Authorization failures
    /// - Malformed remote documents
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Remote(err) => err.is_retryable(),
            SyncError::Timeout(_) | SyncError::DatabaseError(_) => true,
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::Timeout(Duration::from_secs(30)).is_retryable());
        assert!(SyncError::Remote(RemoteError::Network("reset".into())).is_retryable());
        assert!(SyncError::Remote(RemoteError::Status {
            status: 503,
            message: "Service Unavailable".into()
        })
        .is_retryable());

        assert!(!SyncError::Remote(RemoteError::Auth("expired token".into())).is_retryable());
        assert!(!SyncError::Remote(RemoteError::Malformed("bad json".into())).is_retryable());
        assert!(!SyncError::InvalidConfig("bad config".into()).is_retryable());
    }

    #[test]
    fn test_config_errors() {
        assert!(SyncError::InvalidUrl("nope".into()).is_config_error());
        assert!(!SyncError::Timeout(Duration::from_secs(1)).is_config_error());
    }

    #[test]
    fn test_error_display() {
        let err = SyncError::Timeout(Duration::from_millis(1500));
        assert!(err.to_string().contains("1.5s"));

        let err: SyncError = RemoteError::Auth("token rejected".into()).into();
        assert!(err.to_string().contains("token rejected"));
    }
}
