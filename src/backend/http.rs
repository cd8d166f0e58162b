//! [`HistoryBackend`] over the backend's HTTP/JSON gateway.

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use tokio_util::sync::CancellationToken;

use super::wire::{WireHistoryResponse, WireStatus};
use crate::config::BackendConfig;
use crate::error::{ConfigError, HistoryError};
use crate::history::{HistoryBackend, HistoryPage, HistoryPageRequest};

/// Fetches history pages with
/// `GET {base}/api/v1/namespaces/{namespace}/workflows/{workflow_id}/history`.
#[derive(Debug, Clone)]
pub struct HttpHistoryBackend {
    client: reqwest::Client,
    config: BackendConfig,
}

impl HttpHistoryBackend {
    pub fn new(config: BackendConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|source| ConfigError::HttpClient { source })?;
        Ok(Self { client, config })
    }

    fn history_url(&self, request: &HistoryPageRequest) -> String {
        format!(
            "{}/api/v1/namespaces/{}/workflows/{}/history",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(request.identity.namespace()),
            urlencoding::encode(request.identity.workflow_id()),
        )
    }

    async fn fetch(&self, request: &HistoryPageRequest) -> Result<HistoryPage, HistoryError> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if !request.identity.run_id().is_empty() {
            query.push(("execution.runId", request.identity.run_id().to_string()));
        }
        if !request.next_page_token.is_empty() {
            query.push((
                "nextPageToken",
                String::from_utf8_lossy(request.next_page_token.as_bytes()).into_owned(),
            ));
        }
        if let Some(size) = request.maximum_page_size.or(self.config.maximum_page_size) {
            query.push(("maximumPageSize", size.to_string()));
        }

        let mut builder = self.client.get(self.history_url(request)).query(&query);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder
            .send()
            .await
            .map_err(|source| HistoryError::Transport { source })?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|source| HistoryError::Transport { source })?;

        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        let wire: WireHistoryResponse = serde_json::from_slice(&body)
            .map_err(|source| HistoryError::InvalidResponse { source })?;
        Ok(wire.into_page())
    }
}

fn status_error(status: StatusCode, body: &[u8]) -> HistoryError {
    let message = serde_json::from_slice::<WireStatus>(body)
        .ok()
        .map(|s| s.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("backend returned status {status}"));
    HistoryError::backend_status(status.as_u16(), message)
}

#[async_trait]
impl HistoryBackend for HttpHistoryBackend {
    async fn fetch_history_page(
        &self,
        request: &HistoryPageRequest,
        cancel: &CancellationToken,
    ) -> Result<HistoryPage, HistoryError> {
        tracing::debug!(
            namespace = request.identity.namespace(),
            workflow_id = request.identity.workflow_id(),
            first_page = request.next_page_token.is_empty(),
            "fetching history page"
        );
        // The engine drops this future once the token fires mid-flight.
        if cancel.is_cancelled() {
            return Err(HistoryError::Cancelled);
        }
        self.fetch(request).await
    }
}
