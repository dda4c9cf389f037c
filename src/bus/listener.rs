//! Handles to running topic/queue listeners.

use tracing::info;

use crate::broker::{ReceiveLoopHandle, ReceiveStats};

/// Statistics from a stopped listener.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ListenerStats {
    /// Messages dispatched successfully.
    pub handled: usize,
    /// Messages whose dispatch failed and were left for redelivery.
    pub failed: usize,
    /// Poll cycles completed across all workers.
    pub polls: usize,
}

impl From<ReceiveStats> for ListenerStats {
    fn from(stats: ReceiveStats) -> Self {
        Self {
            handled: stats.handled,
            failed: stats.failed,
            polls: stats.polls,
        }
    }
}

/// Handle to a background listener. Drop or call `stop()` to shut down.
///
/// A handler that never returns keeps its worker busy forever; `stop()`
/// waits for it. There is no per-message timeout.
pub struct ListenerHandle {
    entity_path: String,
    inner: ReceiveLoopHandle,
}

impl ListenerHandle {
    pub(crate) fn new(entity_path: impl Into<String>, inner: ReceiveLoopHandle) -> Self {
        Self {
            entity_path: entity_path.into(),
            inner,
        }
    }

    pub fn entity_path(&self) -> &str {
        &self.entity_path
    }

    /// Number of messages the listener processes concurrently.
    pub fn concurrency(&self) -> usize {
        self.inner.concurrency()
    }

    /// Signal stop without waiting.
    pub fn signal_stop(&self) {
        self.inner.signal_stop();
    }

    /// Stop the listener and wait for in-flight messages. Returns stats.
    pub fn stop(self) -> ListenerStats {
        let stats = ListenerStats::from(self.inner.stop());
        info!(
            entity_path = %self.entity_path,
            handled = stats.handled,
            failed = stats.failed,
            "listener stopped"
        );
        stats
    }
}
