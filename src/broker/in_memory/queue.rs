//! In-memory queue entity.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, trace};
use uuid::Uuid;

use super::pump;
use crate::broker::{
    BrokerError, ExceptionSink, MessageCallback, MessageReceiver, MessageSender,
    ReceiveLoopHandle, ReceiveOptions,
};
use crate::message::Message;

/// Deliveries after which an abandoned message is dead-lettered.
pub const DEFAULT_MAX_DELIVERY_COUNT: u32 = 10;

/// Thread-safe in-memory queue with peek-lock semantics.
///
/// Features:
/// - Cheap to clone; clones share the same entity
/// - Received messages are locked until completed or abandoned
/// - Abandoned messages are redelivered until `max_delivery_count`,
///   then moved to the dead-letter list
/// - Scheduled delivery and TTL expiry
/// - Completed messages are counted; their bodies are kept only when the
///   queue is built `with_retention`
///
/// ## Example
///
/// ```
/// use busline::broker::in_memory::InMemoryQueue;
/// use busline::broker::MessageSender;
/// use busline::Message;
///
/// let queue = InMemoryQueue::new("orders").with_retention();
/// queue.send(Message::with_string_body("m-1", "OrderPlaced", r#"{"id":"1"}"#)).unwrap();
///
/// let received = queue.receive(std::time::Duration::from_millis(10)).unwrap().unwrap();
/// assert_eq!(received.delivery_count, 1);
/// queue.complete_message(received.lock_token().unwrap()).unwrap();
/// assert_eq!(queue.completed_count(), 1);
/// assert_eq!(queue.completed()[0].message_id, "m-1");
/// ```
#[derive(Clone)]
pub struct InMemoryQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    path: String,
    max_delivery_count: u32,
    retain_completed: AtomicBool,
    state: Mutex<QueueState>,
    available: Condvar,
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<Message>,
    scheduled: Vec<(i64, DateTime<Utc>, Message)>,
    in_flight: HashMap<String, Message>,
    completed: Vec<Message>,
    completed_count: usize,
    dead_letters: Vec<Message>,
    expired: usize,
    next_sequence: i64,
}

impl QueueState {
    fn promote_due(&mut self, now: DateTime<Utc>) {
        if self.scheduled.is_empty() {
            return;
        }
        let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.scheduled)
            .into_iter()
            .partition(|(_, at, _)| *at <= now);
        self.scheduled = pending;
        for (_, _, mut message) in due {
            message.enqueued_at = Some(now);
            self.ready.push_back(message);
        }
    }

    fn next_due(&self) -> Option<DateTime<Utc>> {
        self.scheduled.iter().map(|(_, at, _)| *at).min()
    }
}

impl InMemoryQueue {
    /// Create a new in-memory queue.
    pub fn new(path: impl Into<String>) -> Self {
        Self::with_max_delivery_count(path, DEFAULT_MAX_DELIVERY_COUNT)
    }

    pub fn with_max_delivery_count(path: impl Into<String>, max_delivery_count: u32) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                path: path.into(),
                max_delivery_count: max_delivery_count.max(1),
                retain_completed: AtomicBool::new(false),
                state: Mutex::new(QueueState::default()),
                available: Condvar::new(),
            }),
        }
    }

    /// Keep a copy of every completed message for inspection.
    pub fn with_retention(self) -> Self {
        self.inner.retain_completed.store(true, Ordering::Relaxed);
        self
    }

    pub fn path(&self) -> &str {
        &self.inner.path
    }

    fn state(&self) -> Result<MutexGuard<'_, QueueState>, BrokerError> {
        self.inner
            .state
            .lock()
            .map_err(|_| BrokerError::Transport(format!("{} lock poisoned", self.inner.path)))
    }

    /// Lock the queue for adding messages. Nothing is added until the
    /// returned guard is used, so a caller can stage several queues first.
    pub(crate) fn stage(&self) -> Result<Staged<'_>, BrokerError> {
        Ok(Staged {
            inner: &self.inner,
            state: self.state()?,
        })
    }

    pub(crate) fn enqueue(&self, message: Message) -> Result<(), BrokerError> {
        self.stage()?.enqueue(message);
        Ok(())
    }

    pub(crate) fn schedule(&self, message: Message, at: DateTime<Utc>) -> Result<i64, BrokerError> {
        Ok(self.stage()?.schedule(message, at))
    }

    /// Receive the next message, waiting up to `timeout`.
    ///
    /// The returned message carries a lock token; complete or abandon it.
    pub fn receive(&self, timeout: Duration) -> Result<Option<Message>, BrokerError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state()?;

        loop {
            let now = Utc::now();
            state.promote_due(now);

            while let Some(mut message) = state.ready.pop_front() {
                if message.is_expired(now) {
                    state.expired += 1;
                    debug!(entity_path = %self.inner.path, message_id = %message.message_id, "message expired");
                    continue;
                }

                let lock_token = Uuid::new_v4().to_string();
                message.lock_token = Some(lock_token.clone());
                message.delivery_count += 1;
                state.in_flight.insert(lock_token, message.clone());
                return Ok(Some(message));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            let wait = match state.next_due() {
                Some(at) => (at - now).to_std().unwrap_or(Duration::ZERO).min(remaining),
                None => remaining,
            };

            state = self
                .inner
                .available
                .wait_timeout(state, wait.max(Duration::from_millis(1)))
                .map_err(|_| BrokerError::Transport(format!("{} lock poisoned", self.inner.path)))?
                .0;
        }
    }

    /// Remove a locked message from the queue.
    pub fn complete_message(&self, lock_token: &str) -> Result<(), BrokerError> {
        let mut state = self.state()?;
        let message = state
            .in_flight
            .remove(lock_token)
            .ok_or_else(|| BrokerError::MessageLockLost(lock_token.to_string()))?;
        trace!(entity_path = %self.inner.path, message_id = %message.message_id, "message completed");
        state.completed_count += 1;
        if self.inner.retain_completed.load(Ordering::Relaxed) {
            state.completed.push(message);
        }
        Ok(())
    }

    /// Release a locked message for redelivery, or dead-letter it once it
    /// reached the max delivery count.
    pub fn abandon(&self, lock_token: &str) -> Result<(), BrokerError> {
        let mut state = self.state()?;
        let mut message = state
            .in_flight
            .remove(lock_token)
            .ok_or_else(|| BrokerError::MessageLockLost(lock_token.to_string()))?;
        message.lock_token = None;

        if message.delivery_count >= self.inner.max_delivery_count {
            debug!(
                entity_path = %self.inner.path,
                message_id = %message.message_id,
                delivery_count = message.delivery_count,
                "message dead-lettered"
            );
            state.dead_letters.push(message);
        } else {
            state.ready.push_front(message);
            self.inner.available.notify_one();
        }
        Ok(())
    }

    /// Whether the lock token still refers to an in-flight message.
    pub fn is_locked(&self, lock_token: &str) -> bool {
        self.state()
            .map(|state| state.in_flight.contains_key(lock_token))
            .unwrap_or(false)
    }

    /// Messages waiting for delivery (excluding scheduled ones).
    pub fn len(&self) -> usize {
        self.state().map(|state| state.ready.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn scheduled_count(&self) -> usize {
        self.state().map(|state| state.scheduled.len()).unwrap_or(0)
    }

    pub fn in_flight_count(&self) -> usize {
        self.state().map(|state| state.in_flight.len()).unwrap_or(0)
    }

    pub fn expired_count(&self) -> usize {
        self.state().map(|state| state.expired).unwrap_or(0)
    }

    /// Number of messages removed through completion.
    pub fn completed_count(&self) -> usize {
        self.state().map(|state| state.completed_count).unwrap_or(0)
    }

    /// Messages removed through completion, oldest first. Always empty
    /// unless the queue was built `with_retention`.
    pub fn completed(&self) -> Vec<Message> {
        self.state()
            .map(|state| state.completed.clone())
            .unwrap_or_default()
    }

    /// Messages that exhausted their deliveries.
    pub fn dead_letters(&self) -> Vec<Message> {
        self.state()
            .map(|state| state.dead_letters.clone())
            .unwrap_or_default()
    }

    /// Messages sitting in the queue right now, in delivery order.
    pub fn pending(&self) -> Vec<Message> {
        self.state()
            .map(|state| state.ready.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Poison the state lock the way a panicking holder would.
    #[cfg(test)]
    pub(crate) fn poison(&self) {
        let inner = Arc::clone(&self.inner);
        let _ = std::thread::spawn(move || {
            let _state = inner.state.lock().unwrap();
            panic!("poisoning {}", inner.path);
        })
        .join();
    }

    /// Drop every message (useful for test cleanup).
    pub fn clear(&self) {
        if let Ok(mut state) = self.state() {
            *state = QueueState::default();
        }
    }
}

/// A locked queue ready to take messages.
pub(crate) struct Staged<'a> {
    inner: &'a QueueInner,
    state: MutexGuard<'a, QueueState>,
}

impl Staged<'_> {
    pub(crate) fn enqueue(&mut self, mut message: Message) {
        message.enqueued_at = Some(Utc::now());
        message.lock_token = None;
        trace!(entity_path = %self.inner.path, message_id = %message.message_id, "message enqueued");
        self.state.ready.push_back(message);
        self.inner.available.notify_one();
    }

    pub(crate) fn schedule(&mut self, mut message: Message, at: DateTime<Utc>) -> i64 {
        message.scheduled_enqueue_time = Some(at);
        message.lock_token = None;
        self.state.next_sequence += 1;
        let sequence = self.state.next_sequence;
        self.state.scheduled.push((sequence, at, message));
        self.inner.available.notify_all();
        sequence
    }
}

impl MessageSender for InMemoryQueue {
    fn entity_path(&self) -> &str {
        &self.inner.path
    }

    fn send(&self, message: Message) -> Result<(), BrokerError> {
        self.enqueue(message)
    }

    fn schedule_send(&self, message: Message, at: DateTime<Utc>) -> Result<i64, BrokerError> {
        self.schedule(message, at)
    }
}

impl MessageReceiver for InMemoryQueue {
    fn entity_path(&self) -> &str {
        &self.inner.path
    }

    fn register_handler(
        &self,
        callback: MessageCallback,
        options: ReceiveOptions,
        exception_sink: ExceptionSink,
    ) -> Result<ReceiveLoopHandle, BrokerError> {
        Ok(pump::start(self.clone(), callback, options, exception_sink))
    }

    fn complete(&self, lock_token: &str) -> Result<(), BrokerError> {
        self.complete_message(lock_token)
    }
}
