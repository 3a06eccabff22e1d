//! HTTP client for the remote document API.
//!
//! ```text
//! GET {base}/collections/{entity}        → {"documents": [{"id": .., "data": {..}}, ..]}
//! GET {base}/collections/{entity}/{id}   → {"id": .., "data": {..}}   or 404
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use campus_core::EntityKind;

use super::{RemoteDocument, RemoteError, RemoteStore};
use crate::config::RemoteSettings;
use crate::error::{SyncError, SyncResult};

#[derive(Debug, Deserialize)]
struct CollectionResponse {
    documents: Vec<RemoteDocument>,
}

/// [`RemoteStore`] backed by the remote document API over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    client: Client,
    base_url: Url,
    api_token: Option<String>,
}

impl HttpRemoteStore {
    /// Creates a client for the API rooted at `base_url`.
    ///
    /// ## Arguments
    /// * `base_url` - http(s) URL; a path prefix such as `/api/v1` is kept
    /// * `timeout` - per-request timeout
    pub fn new(base_url: &str, timeout: Duration) -> SyncResult<Self> {
        let base_url = Url::parse(base_url)?;
        if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
            return Err(SyncError::InvalidUrl(format!(
                "Remote URL must be http:// or https://, got: {}",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(HttpRemoteStore {
            client,
            base_url,
            api_token: None,
        })
    }

    /// Sends `Authorization: Bearer <token>` on every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Builds the client from the `[remote]` config section.
    pub fn from_settings(settings: &RemoteSettings) -> SyncResult<Self> {
        let base_url = settings
            .base_url
            .as_deref()
            .ok_or_else(|| SyncError::InvalidConfig("remote.base_url is not set".into()))?;

        let store = Self::new(base_url, Duration::from_secs(settings.request_timeout_secs))?;

        Ok(match &settings.api_token {
            Some(token) => store.with_token(token.clone()),
            None => store,
        })
    }

    /// The API root this client talks to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::Network(format!("Unusable base URL: {}", self.base_url)))?
            .pop_if_empty()
            .push("collections")
            .extend(segments);
        Ok(url)
    }

    async fn get(&self, url: Url) -> Result<Response, RemoteError> {
        debug!(%url, "GET");

        let mut request = self.client.get(url);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        Ok(request.send().await?)
    }
}

fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = status.canonical_reason().unwrap_or("unknown status").to_string();
    warn!(status = status.as_u16(), url = %response.url(), "Remote request rejected");

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(RemoteError::Auth(message)),
        _ => Err(RemoteError::Status {
            status: status.as_u16(),
            message,
        }),
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn fetch_collection(&self, kind: EntityKind) -> Result<Vec<RemoteDocument>, RemoteError> {
        let url = self.endpoint(&[kind.as_str()])?;
        let response = check_status(self.get(url).await?)?;
        let body: CollectionResponse = response.json().await?;

        debug!(entity = %kind, count = body.documents.len(), "Fetched collection");
        Ok(body.documents)
    }

    async fn fetch_document(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> Result<Option<RemoteDocument>, RemoteError> {
        let url = self.endpoint(&[kind.as_str(), id])?;
        let response = self.get(url).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let document: RemoteDocument = check_status(response)?.json().await?;
        Ok(Some(document))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_keeps_path_prefix() {
        let store = HttpRemoteStore::new("https://school.example/api/v1/", Duration::from_secs(5))
            .unwrap();

        let url = store.endpoint(&["teachers"]).unwrap();
        assert_eq!(url.as_str(), "https://school.example/api/v1/collections/teachers");
    }

    #[test]
    fn test_endpoint_escapes_document_id() {
        let store = HttpRemoteStore::new("http://localhost:8080", Duration::from_secs(5)).unwrap();

        let url = store.endpoint(&["fees", "a/b c"]).unwrap();
        assert_eq!(url.path(), "/collections/fees/a%2Fb%20c");
    }

    #[test]
    fn test_rejects_non_http_urls() {
        assert!(HttpRemoteStore::new("ftp://school.example", Duration::from_secs(5)).is_err());
        assert!(HttpRemoteStore::new("not a url", Duration::from_secs(5)).is_err());
    }

    #[test]
    fn test_from_settings_requires_base_url() {
        let settings = RemoteSettings::default();
        let err = HttpRemoteStore::from_settings(&settings).unwrap_err();
        assert!(err.is_config_error());
    }
}
