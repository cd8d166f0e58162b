//! HTTP surface: axum router and the raw-history handler.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rawhistory::{backend::HttpHistoryBackend, config::BackendConfig, server};
//!
//! let backend = Arc::new(HttpHistoryBackend::new(BackendConfig::default())?);
//! let app = server::router(backend);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! ```

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{MatchedPath, OriginalUri, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::config::ServerConfig;
use crate::decode::{DecodeError, decode_path_segment};
use crate::history::{HistoryBackend, RawHistory, WorkflowIdentity};

/// Route serving a workflow execution's raw history as a JSON array.
pub const RAW_HISTORY_ROUTE: &str =
    "/api/v1/namespaces/{namespace}/workflows/{workflow}/run/{runid}/history.json";

/// Liveness probe.
pub const HEALTH_ROUTE: &str = "/healthz";

/// Errors surfaced to the client as HTTP statuses.
///
/// Backend failures never show up here; they are embedded in the body.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum ApiError {
    #[error("Invalid workflow ID: {source}")]
    InvalidWorkflowId {
        #[source]
        source: DecodeError,
    },
    #[error("Missing path parameter: {0}")]
    MissingPathParam(&'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidWorkflowId { .. } | ApiError::MissingPathParam(_) => {
                StatusCode::BAD_REQUEST
            }
        };
        error!("raw history request rejected: {}", self);
        (status, Json(serde_json::json!({ "message": self.to_string() }))).into_response()
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    backend: Arc<dyn HistoryBackend>,
    page_size: Option<u32>,
}

impl AppState {
    pub fn new(backend: Arc<dyn HistoryBackend>) -> Self {
        Self {
            backend,
            page_size: None,
        }
    }

    /// Maximum events per backend page.
    pub fn with_page_size(mut self, page_size: Option<u32>) -> Self {
        self.page_size = page_size;
        self
    }
}

/// Router with the raw-history and health routes.
pub fn router(backend: Arc<dyn HistoryBackend>) -> Router {
    router_with_state(AppState::new(backend))
}

pub fn router_with_state(state: AppState) -> Router {
    Router::new()
        .route(RAW_HISTORY_ROUTE, get(raw_history_handler))
        .route(HEALTH_ROUTE, get(|| async { "ok" }))
        .with_state(state)
}

/// Path parameters are read from the request path as sent: only the workflow
/// id is percent-decoded, namespace and run id are used literally.
async fn raw_history_handler(
    State(state): State<AppState>,
    matched: MatchedPath,
    OriginalUri(uri): OriginalUri,
) -> Result<Response, ApiError> {
    let identity = identity_from_path(matched.as_str(), uri.path())?;

    let history = RawHistory::new(identity, state.backend.clone(), CancellationToken::new())
        .with_page_size(state.page_size);
    tracing::debug!(
        namespace = history.identity().namespace(),
        workflow_id = history.identity().workflow_id(),
        run_id = history.identity().run_id(),
        "streaming raw history"
    );

    let mut response = Response::new(Body::from_stream(history.into_stream()));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    Ok(response)
}

/// Pair each `{name}` segment of the route template with the raw path segment
/// at the same position.
fn raw_params<'a>(template: &'a str, path: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> {
    template
        .split('/')
        .zip(path.split('/'))
        .filter_map(|(pattern, value)| {
            pattern
                .strip_prefix('{')
                .and_then(|p| p.strip_suffix('}'))
                .map(|name| (name, value))
        })
}

fn identity_from_path(template: &str, path: &str) -> Result<WorkflowIdentity, ApiError> {
    let mut namespace = None;
    let mut workflow = None;
    let mut run_id = None;
    for (name, value) in raw_params(template, path) {
        match name {
            "namespace" => namespace = Some(value),
            "workflow" => workflow = Some(value),
            "runid" => run_id = Some(value),
            _ => {}
        }
    }

    let namespace = namespace.ok_or(ApiError::MissingPathParam("namespace"))?;
    let workflow = workflow.ok_or(ApiError::MissingPathParam("workflow"))?;
    let run_id = run_id.ok_or(ApiError::MissingPathParam("runid"))?;

    let workflow_id =
        decode_path_segment(workflow).map_err(|source| ApiError::InvalidWorkflowId { source })?;

    Ok(WorkflowIdentity::new(namespace, workflow_id, run_id))
}

/// Bind and serve until Ctrl-C.
pub async fn serve(config: &ServerConfig, backend: Arc<dyn HistoryBackend>) -> std::io::Result<()> {
    let app = router_with_state(
        AppState::new(backend).with_page_size(config.backend.maximum_page_size),
    );
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Starting history server on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {e}");
        return;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_workflow_id_is_a_bad_request() {
        let err = ApiError::InvalidWorkflowId {
            source: DecodeError::InvalidEscape {
                escape: "%2".to_string(),
            },
        };
        assert_eq!(
            err.to_string(),
            r#"Invalid workflow ID: invalid URL escape "%2""#
        );
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn identity_comes_from_raw_segments() {
        let identity = identity_from_path(
            RAW_HISTORY_ROUTE,
            "/api/v1/namespaces/my%20ns/workflows/test%2Fworkflow%2Bid/run/run-1/history.json",
        )
        .unwrap();
        assert_eq!(identity.namespace(), "my%20ns");
        assert_eq!(identity.workflow_id(), "test/workflow+id");
        assert_eq!(identity.run_id(), "run-1");
    }

    #[test]
    fn workflow_id_is_decoded_exactly_once() {
        let identity = identity_from_path(
            RAW_HISTORY_ROUTE,
            "/api/v1/namespaces/ns/workflows/a%2525b/run/r/history.json",
        )
        .unwrap();
        assert_eq!(identity.workflow_id(), "a%25b");
    }

    #[test]
    fn malformed_workflow_id_is_rejected() {
        let err = identity_from_path(
            RAW_HISTORY_ROUTE,
            "/api/v1/namespaces/ns/workflows/invalid%2/run/r/history.json",
        )
        .unwrap_err();
        assert!(matches!(err, ApiError::InvalidWorkflowId { .. }));
    }

    #[test]
    fn missing_param_is_a_bad_request() {
        assert!(matches!(
            identity_from_path("/ns/{namespace}/wf/{workflow}", "/ns/a/wf/b"),
            Err(ApiError::MissingPathParam("runid"))
        ));

        let response = ApiError::MissingPathParam("runid").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
