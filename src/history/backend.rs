//! The backend capability the streaming engine pulls pages from.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::types::{HistoryPage, HistoryPageRequest};
use crate::error::HistoryError;

/// Source of paginated workflow history.
///
/// Production wires this to [`crate::backend::HttpHistoryBackend`]; tests supply
/// a programmable double. The engine races every call against `cancel` and
/// drops the future when it fires; implementations may check it to skip work
/// up front.
#[async_trait]
pub trait HistoryBackend: Send + Sync {
    /// Fetch the page identified by `request.next_page_token`.
    async fn fetch_history_page(
        &self,
        request: &HistoryPageRequest,
        cancel: &CancellationToken,
    ) -> Result<HistoryPage, HistoryError>;
}

