//! The broker wire unit.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// A message as exchanged with the broker.
///
/// The publisher fills in the first five fields. The broker owns the
/// receive-side properties (`lock_token`, `delivery_count`, `enqueued_at`)
/// and sets them when it hands the message to a receiver.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    /// Unique identifier for this message.
    pub message_id: String,
    /// Event name; the routing and filter key.
    pub label: String,
    /// UTF-8 JSON payload.
    pub body: Vec<u8>,
    /// How long the broker keeps the message before it expires.
    pub time_to_live: Option<Duration>,
    /// Requested delivery time for scheduled messages.
    pub scheduled_enqueue_time: Option<DateTime<Utc>>,
    /// Token used to complete the message; present on received messages.
    pub lock_token: Option<String>,
    /// Number of times the broker has delivered this message.
    pub delivery_count: u32,
    /// When the broker accepted the message.
    pub enqueued_at: Option<DateTime<Utc>>,
}

impl Message {
    /// Create a new outbound message.
    pub fn new(message_id: impl Into<String>, label: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            message_id: message_id.into(),
            label: label.into(),
            body,
            time_to_live: None,
            scheduled_enqueue_time: None,
            lock_token: None,
            delivery_count: 0,
            enqueued_at: None,
        }
    }

    /// Create a message with a string body.
    pub fn with_string_body(
        message_id: impl Into<String>,
        label: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self::new(message_id, label, body.into().into_bytes())
    }

    /// Set the time-to-live.
    pub fn with_time_to_live(mut self, ttl: Duration) -> Self {
        self.time_to_live = Some(ttl);
        self
    }

    /// Get the body as a string (if valid UTF-8).
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// The lock token, if the message came from a receiver.
    pub fn lock_token(&self) -> Option<&str> {
        self.lock_token.as_deref()
    }

    /// When the message stops being deliverable, if it has a TTL and has
    /// been enqueued.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let enqueued_at = self.enqueued_at?;
        let ttl = chrono::Duration::from_std(self.time_to_live?).ok()?;
        enqueued_at.checked_add_signed(ttl)
    }

    /// Check whether the message has expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|at| at <= now)
    }
}
