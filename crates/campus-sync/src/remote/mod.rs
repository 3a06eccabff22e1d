//! # Remote Store Client
//!
//! Read-only access to the authoritative document store.
//!
//! ## Tagged Results
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      fetch_collection("fees")                           │
//! │                                                                         │
//! │   Ok(vec![])          collection exists and is empty                   │
//! │   Ok(vec![doc, ..])   documents, in remote order                       │
//! │   Err(Network)        remote unreachable / connection dropped          │
//! │   Err(Auth)           credentials rejected (401 / 403)                 │
//! │   Err(Status)         any other non-success response                   │
//! │   Err(Malformed)      response or document does not parse              │
//! │                                                                         │
//! │  "No data" and "could not fetch" are different outcomes; the sync      │
//! │  unit reports the second as a Failure for its entity.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The client has no retry logic of its own. Retrying is the scheduler's job.

mod http;
mod memory;

pub use http::HttpRemoteStore;
pub use memory::MemoryRemoteStore;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use campus_core::{EntityKind, SyncRecord};

// =============================================================================
// Remote Errors
// =============================================================================

/// Why a remote read failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Transport-level failure: DNS, connect, reset, timeout.
    #[error("Network error: {0}")]
    Network(String),

    /// The remote rejected our credentials.
    #[error("Not authorized: {0}")]
    Auth(String),

    /// Non-success HTTP status other than auth failures.
    #[error("Remote returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Response body or a document payload did not parse.
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl RemoteError {
    /// Returns true for failures a later attempt could get past.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Network(_) => true,
            RemoteError::Status { status, .. } => *status >= 500 || *status == 429,
            RemoteError::Auth(_) | RemoteError::Malformed(_) => false,
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RemoteError::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            RemoteError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            RemoteError::Network(err.to_string())
        }
    }
}

// =============================================================================
// Remote Document
// =============================================================================

/// One document as the remote store returns it.
///
/// The document id travels beside the data, as in most document stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteDocument {
    /// Document id, used as the local primary key.
    pub id: String,

    /// Document fields.
    pub data: Value,
}

impl RemoteDocument {
    /// Creates a document from raw JSON.
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        RemoteDocument {
            id: id.into(),
            data,
        }
    }

    /// Builds a document from a typed record (seeding, tests).
    pub fn from_record<R: SyncRecord>(record: &R) -> Result<Self, RemoteError> {
        let data = serde_json::to_value(record)
            .map_err(|e| RemoteError::Malformed(format!("{} {}: {}", R::ENTITY, record.id(), e)))?;

        Ok(RemoteDocument {
            id: record.id().to_string(),
            data,
        })
    }

    /// Deserializes the document into a record shape.
    ///
    /// The document id is copied into the `id` field when the data does not
    /// carry one.
    pub fn decode<R: DeserializeOwned>(&self) -> Result<R, RemoteError> {
        let mut data = self.data.clone();
        if let Value::Object(fields) = &mut data {
            fields
                .entry("id")
                .or_insert_with(|| Value::String(self.id.clone()));
        }

        serde_json::from_value(data)
            .map_err(|e| RemoteError::Malformed(format!("document '{}': {}", self.id, e)))
    }
}

// =============================================================================
// Remote Store Trait
// =============================================================================

/// Read access to named collections in the remote store.
///
/// Implementations: [`HttpRemoteStore`] for the real document API,
/// [`MemoryRemoteStore`] for tests and offline demos.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Returns every document in the entity's collection.
    async fn fetch_collection(&self, kind: EntityKind) -> Result<Vec<RemoteDocument>, RemoteError>;

    /// Returns one document, or `None` if it does not exist.
    async fn fetch_document(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> Result<Option<RemoteDocument>, RemoteError>;
}

/// Typed reads on top of any [`RemoteStore`].
#[async_trait]
pub trait RemoteStoreExt: RemoteStore {
    /// Fetches and decodes a whole collection. Any undecodable document
    /// fails the whole fetch.
    async fn fetch_records<R: SyncRecord>(&self) -> Result<Vec<R>, RemoteError> {
        let documents = self.fetch_collection(R::ENTITY).await?;
        documents.iter().map(RemoteDocument::decode::<R>).collect()
    }

    /// Fetches and decodes one record.
    async fn fetch_record<R: SyncRecord>(&self, id: &str) -> Result<Option<R>, RemoteError> {
        match self.fetch_document(R::ENTITY, id).await? {
            Some(document) => document.decode().map(Some),
            None => Ok(None),
        }
    }
}

impl<T: RemoteStore + ?Sized> RemoteStoreExt for T {}
