//! Request correlation.
//!
//! Each outgoing request gets a pending entry keyed by its id. The entry is
//! removed by exactly one of: the matching response, the caller's timeout, or
//! a connection drop failing every entry at once.

use crate::error::BridgeError;
use editorlink_core::CommandResponse;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

type Completion = oneshot::Sender<Result<CommandResponse, BridgeError>>;

struct PendingRequest {
    label: String,
    created_at: Instant,
    completion: Completion,
}

#[derive(Default)]
pub struct RequestCorrelator {
    pending: Mutex<HashMap<String, PendingRequest>>,
}

impl RequestCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, PendingRequest>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a request. The returned handle removes the entry when dropped.
    pub fn register(&self, id: impl Into<String>, label: impl Into<String>) -> PendingHandle<'_> {
        let id = id.into();
        let label = label.into();
        let (completion, receiver) = oneshot::channel();
        self.table().insert(
            id.clone(),
            PendingRequest {
                label: label.clone(),
                created_at: Instant::now(),
                completion,
            },
        );
        PendingHandle {
            correlator: self,
            id,
            label,
            receiver,
        }
    }

    /// Complete the entry for `id`. Returns false if nothing was waiting on it.
    pub fn resolve(&self, id: &str, response: CommandResponse) -> bool {
        let Some(entry) = self.table().remove(id) else {
            return false;
        };
        tracing::trace!(
            id,
            command = %entry.label,
            elapsed_ms = entry.created_at.elapsed().as_millis() as u64,
            "response matched"
        );
        // The caller may have given up between removal and send.
        entry.completion.send(Ok(response)).is_ok()
    }

    /// Fail every pending entry with [`BridgeError::ConnectionClosed`].
    pub fn fail_all(&self) -> usize {
        let drained: Vec<_> = self.table().drain().collect();
        let count = drained.len();
        for (_, entry) in drained {
            let _ = entry.completion.send(Err(BridgeError::ConnectionClosed));
        }
        if count > 0 {
            tracing::debug!(count, "failed pending requests on connection loss");
        }
        count
    }

    pub fn pending_count(&self) -> usize {
        self.table().len()
    }

    fn forget(&self, id: &str) {
        self.table().remove(id);
    }
}

/// A registered request awaiting its outcome.
pub struct PendingHandle<'a> {
    correlator: &'a RequestCorrelator,
    id: String,
    label: String,
    receiver: oneshot::Receiver<Result<CommandResponse, BridgeError>>,
}

impl PendingHandle<'_> {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the response, a connection drop, or `timeout`.
    pub async fn wait(mut self, timeout: Duration) -> Result<CommandResponse, BridgeError> {
        match tokio::time::timeout(timeout, &mut self.receiver).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(BridgeError::ConnectionClosed),
            Err(_) => {
                tracing::debug!(id = %self.id, command = %self.label, "command timed out");
                Err(BridgeError::CommandTimeout {
                    command: std::mem::take(&mut self.label),
                })
            }
        }
    }
}

impl Drop for PendingHandle<'_> {
    fn drop(&mut self) {
        self.correlator.forget(&self.id);
    }
}
