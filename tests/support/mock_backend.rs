//! Programmable history backend for integration tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use rawhistory::prelude::*;
use tokio_util::sync::CancellationToken;

/// Replays scripted responses in order and records every request.
#[derive(Default)]
pub struct MockHistoryBackend {
    responses: Mutex<VecDeque<Result<HistoryPage, HistoryError>>>,
    requests: Mutex<Vec<HistoryPageRequest>>,
    calls: AtomicUsize,
}

#[allow(dead_code)]
impl MockHistoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, response: Result<HistoryPage, HistoryError>) -> Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<HistoryPageRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HistoryBackend for MockHistoryBackend {
    async fn fetch_history_page(
        &self,
        request: &HistoryPageRequest,
        _cancel: &CancellationToken,
    ) -> Result<HistoryPage, HistoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(HistoryError::backend("unexpected fetch")))
    }
}
