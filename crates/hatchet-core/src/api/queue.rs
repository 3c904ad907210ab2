//! In-memory retry queue for submissions that hit a transport fault.

use std::collections::VecDeque;

use serde_json::Value;
use tokio::sync::Mutex;

/// A submission waiting for a retry. Two requests are the same request when
/// both endpoint and payload match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedRequest {
    pub endpoint: String,
    pub payload: Value,
}

impl QueuedRequest {
    pub fn new(endpoint: impl Into<String>, payload: Value) -> Self {
        Self {
            endpoint: endpoint.into(),
            payload,
        }
    }
}

/// FIFO of pending submissions without duplicates.
///
/// Only the submission client mutates it; callers get read-only access.
/// The lock is never held across a network call.
#[derive(Debug, Default)]
pub struct SubmissionQueue {
    entries: Mutex<VecDeque<QueuedRequest>>,
}

impl SubmissionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    pub async fn contains(&self, request: &QueuedRequest) -> bool {
        self.entries.lock().await.contains(request)
    }

    /// Copy of the current entries in replay order
    pub async fn snapshot(&self) -> Vec<QueuedRequest> {
        self.entries.lock().await.iter().cloned().collect()
    }

    /// Append unless an equal request is already queued. Returns whether it was added.
    pub(crate) async fn push_unique(&self, request: QueuedRequest) -> bool {
        let mut entries = self.entries.lock().await;
        if entries.contains(&request) {
            return false;
        }
        entries.push_back(request);
        true
    }

    /// Remove one equal request. Returns whether one was found.
    pub(crate) async fn remove(&self, request: &QueuedRequest) -> bool {
        let mut entries = self.entries.lock().await;
        match entries.iter().position(|queued| queued == request) {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }
}
