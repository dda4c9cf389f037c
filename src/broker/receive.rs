//! Push-style receive loop contracts.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use super::signal::CancellationSignal;
use crate::error::BusError;
use crate::message::Message;

/// Callback invoked for every received message.
pub type MessageCallback =
    Arc<dyn Fn(&Message, &CancellationSignal) -> Result<(), BusError> + Send + Sync>;

/// Receives errors the receive loop could not hand back to anyone.
pub type ExceptionSink = Arc<dyn Fn(&ExceptionReceivedContext<'_>) + Send + Sync>;

/// What the receive loop was doing when an error surfaced.
#[derive(Debug)]
pub struct ExceptionReceivedContext<'a> {
    pub error: &'a BusError,
    /// Stage of the loop: `Receive`, `UserCallback`, `Abandon`.
    pub action: &'a str,
    pub endpoint: &'a str,
    pub entity_path: &'a str,
}

/// Knobs for a receive loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceiveOptions {
    /// Messages processed concurrently (worker count).
    pub max_concurrent_calls: usize,
    /// Complete the message automatically when the callback succeeds.
    pub auto_complete: bool,
    /// How long a worker waits for a message before checking for shutdown.
    pub poll_interval: Duration,
    /// Endpoint name reported to the exception sink.
    pub endpoint: String,
}

impl Default for ReceiveOptions {
    fn default() -> Self {
        Self {
            max_concurrent_calls: 1,
            auto_complete: false,
            poll_interval: Duration::from_millis(50),
            endpoint: String::new(),
        }
    }
}

/// Statistics from a receive loop.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReceiveStats {
    /// Messages whose callback succeeded.
    pub handled: usize,
    /// Messages whose callback failed.
    pub failed: usize,
    /// Poll cycles completed.
    pub polls: usize,
}

impl ReceiveStats {
    fn merge(mut self, other: ReceiveStats) -> Self {
        self.handled += other.handled;
        self.failed += other.failed;
        self.polls += other.polls;
        self
    }
}

/// Handle to a running receive loop. Drop or call `stop()` to shut down.
pub struct ReceiveLoopHandle {
    signal: CancellationSignal,
    workers: Vec<JoinHandle<ReceiveStats>>,
}

impl ReceiveLoopHandle {
    pub fn new(signal: CancellationSignal, workers: Vec<JoinHandle<ReceiveStats>>) -> Self {
        Self { signal, workers }
    }

    /// Number of worker threads serving the loop.
    pub fn concurrency(&self) -> usize {
        self.workers.len()
    }

    /// Signal stop without waiting.
    pub fn signal_stop(&self) {
        self.signal.cancel();
    }

    /// Stop the loop and wait for every worker. Returns combined stats.
    pub fn stop(mut self) -> ReceiveStats {
        self.signal.cancel();
        self.workers
            .drain(..)
            .map(|worker| worker.join().unwrap_or_default())
            .fold(ReceiveStats::default(), ReceiveStats::merge)
    }
}

impl Drop for ReceiveLoopHandle {
    fn drop(&mut self) {
        self.signal.cancel();
    }
}
