//! Streaming engine: paginate through a workflow's history and emit it as one JSON array.
//!
//! ## Output contract
//!
//! - The body is always a single, syntactically valid JSON array.
//! - Events appear in backend order across pages, each exactly once.
//! - If a fetch fails (or the request is cancelled) after M pages, the array holds
//!   the events of those M pages followed by exactly one `{"error": "<message>"}`
//!   element, and then closes. No further fetches are made.
//! - A fetch failure is a normal outcome: [`RawHistory::stream_to`] still returns
//!   `Ok(())`, since by the time it happens the HTTP status has usually been sent.
//!
//! ## Memory and cancellation
//!
//! Output is produced page by page: the stream yields `[`, then one chunk per
//! page, then the tail. Only one page is ever held. Each fetch races the
//! request's cancellation token; dropping the stream (client disconnect) drops
//! the in-flight fetch and cancels the token handed to the backend.
//!
//! ## Example
//!
//! ```rust,ignore
//! let body = RawHistory::builder()
//!     .ids("default", "order-42", "7f2c...")
//!     .backend(backend)
//!     .build()?
//!     .into_stream();
//! let response = axum::response::Response::new(axum::body::Body::from_stream(body));
//! ```

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use super::backend::HistoryBackend;
use super::encoder::{Element, JsonArrayWriter};
use super::types::{ContinuationToken, HistoryPage, HistoryPageRequest, WorkflowIdentity};
use crate::error::{BuildError, HistoryError};

/// Byte stream suitable for an HTTP response body.
pub type HistoryByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, Infallible>> + Send>>;

/// One request's worth of history streaming.
pub struct RawHistory {
    identity: WorkflowIdentity,
    backend: Arc<dyn HistoryBackend>,
    cancel: CancellationToken,
    page_size: Option<u32>,
}

impl std::fmt::Debug for RawHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawHistory")
            .field("identity", &self.identity)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl RawHistory {
    pub fn new(
        identity: WorkflowIdentity,
        backend: Arc<dyn HistoryBackend>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            identity,
            backend,
            cancel,
            page_size: None,
        }
    }

    pub fn builder() -> RawHistoryBuilder {
        RawHistoryBuilder::default()
    }

    /// Maximum events per backend page; `None` leaves it to the backend.
    pub fn with_page_size(mut self, page_size: Option<u32>) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn identity(&self) -> &WorkflowIdentity {
        &self.identity
    }

    /// Turn the engine into a pull-based byte stream.
    ///
    /// Nothing is fetched until the stream is polled.
    pub fn into_stream(self) -> HistoryByteStream {
        let RawHistory {
            identity,
            backend,
            cancel,
            page_size,
        } = self;

        // Scoped to this stream: dropping it cancels the backend call without
        // touching the caller's token.
        let cancel = cancel.child_token();
        let guard = cancel.clone().drop_guard();

        let s = async_stream::stream! {
            let _guard = guard;
            let mut writer = JsonArrayWriter::new();
            let mut buf = BytesMut::new();

            writer.open(&mut buf);
            yield Ok::<Bytes, Infallible>(buf.split().freeze());

            let mut token = ContinuationToken::empty();
            let mut pages = 0usize;
            let outcome: Result<(), HistoryError> = loop {
                let request = HistoryPageRequest {
                    identity: identity.clone(),
                    next_page_token: token.clone(),
                    maximum_page_size: page_size,
                };

                let page = match fetch_page(backend.as_ref(), &request, &cancel).await {
                    Ok(page) => page,
                    Err(e) => break Err(e),
                };
                pages += 1;
                tracing::debug!(
                    namespace = identity.namespace(),
                    workflow_id = identity.workflow_id(),
                    page = pages,
                    events = page.events.len(),
                    more = !page.next_page_token.is_empty(),
                    "fetched history page"
                );

                let HistoryPage { events, next_page_token } = page;
                // Events built from these types always serialize; the rollback
                // in `JsonArrayWriter` keeps the array valid if one ever does not.
                if let Some(source) = events
                    .iter()
                    .find_map(|event| writer.write(&mut buf, Element::Event(event)).err())
                {
                    break Err(HistoryError::Encode { source });
                }

                token = next_page_token;
                if token.is_empty() {
                    break Ok(());
                }
                yield Ok(buf.split().freeze());
            };

            if let Err(error) = outcome {
                tracing::warn!(
                    namespace = identity.namespace(),
                    workflow_id = identity.workflow_id(),
                    run_id = identity.run_id(),
                    pages,
                    cancelled = error.is_cancelled(),
                    "history stream stopped early: {error}"
                );
                let message = error.to_string();
                if let Err(e) = writer.write(&mut buf, Element::Error(&message)) {
                    tracing::error!("failed to encode error element: {e}");
                }
            }

            writer.close(&mut buf);
            yield Ok(buf.split().freeze());
        };

        Box::pin(s)
    }

    /// Stream the whole history into `writer`, flushing after every chunk.
    ///
    /// Backend failures are embedded in the output and still yield `Ok(())`;
    /// only a failure of `writer` itself is an error.
    pub async fn stream_to<W>(self, writer: &mut W) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut stream = self.into_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(never) => match never {},
            };
            writer.write_all(&chunk).await?;
            writer.flush().await?;
        }
        Ok(())
    }
}

async fn fetch_page(
    backend: &dyn HistoryBackend,
    request: &HistoryPageRequest,
    cancel: &CancellationToken,
) -> Result<HistoryPage, HistoryError> {
    if cancel.is_cancelled() {
        return Err(HistoryError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(HistoryError::Cancelled),
        result = backend.fetch_history_page(request, cancel) => result,
    }
}

/// Builder for [`RawHistory`].
#[derive(Default)]
pub struct RawHistoryBuilder {
    identity: Option<WorkflowIdentity>,
    backend: Option<Arc<dyn HistoryBackend>>,
    cancel: Option<CancellationToken>,
    page_size: Option<u32>,
}

impl RawHistoryBuilder {
    /// Set the execution to stream. `workflow_id` must already be decoded.
    pub fn ids(
        mut self,
        namespace: impl Into<String>,
        workflow_id: impl Into<String>,
        run_id: impl Into<String>,
    ) -> Self {
        self.identity = Some(WorkflowIdentity::new(namespace, workflow_id, run_id));
        self
    }

    pub fn identity(mut self, identity: WorkflowIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn backend(mut self, backend: Arc<dyn HistoryBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Cancellation for the request; defaults to a fresh, never-cancelled token.
    pub fn cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn page_size(mut self, page_size: Option<u32>) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn build(self) -> Result<RawHistory, BuildError> {
        let identity = self
            .identity
            .ok_or(BuildError::MissingAttribute("identity"))?;
        let backend = self.backend.ok_or(BuildError::MissingAttribute("backend"))?;
        Ok(RawHistory::new(identity, backend, self.cancel.unwrap_or_default())
            .with_page_size(self.page_size))
    }
}
