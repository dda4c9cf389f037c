//! Broker client traits consumed by the bus.

use chrono::{DateTime, Utc};

use super::error::BrokerError;
use super::receive::{ExceptionSink, MessageCallback, ReceiveLoopHandle, ReceiveOptions};
use super::rules::RuleDescription;
use crate::message::Message;

/// Sends messages to a topic or queue.
pub trait MessageSender: Send + Sync {
    /// Path of the entity messages are sent to.
    fn entity_path(&self) -> &str;

    /// Enqueue a message for immediate delivery.
    fn send(&self, message: Message) -> Result<(), BrokerError>;

    /// Enqueue a message that becomes visible at `at`. Returns the
    /// broker's sequence number for the scheduled message.
    fn schedule_send(&self, message: Message, at: DateTime<Utc>) -> Result<i64, BrokerError>;
}

/// Receives messages from a queue or a topic subscription.
pub trait MessageReceiver: Send + Sync {
    /// Path of the entity messages are received from.
    fn entity_path(&self) -> &str;

    /// Start a receive loop that calls `callback` for every message.
    ///
    /// A message whose callback fails, or that is not completed when the
    /// callback returns, goes back to the broker for redelivery.
    fn register_handler(
        &self,
        callback: MessageCallback,
        options: ReceiveOptions,
        exception_sink: ExceptionSink,
    ) -> Result<ReceiveLoopHandle, BrokerError>;

    /// Remove a received message from the broker.
    fn complete(&self, lock_token: &str) -> Result<(), BrokerError>;
}

/// Manages the filter rules of a topic subscription.
pub trait RuleManager: Send + Sync {
    fn add_rule(&self, rule: RuleDescription) -> Result<(), BrokerError>;

    fn remove_rule(&self, name: &str) -> Result<(), BrokerError>;
}

/// A topic subscription: receives messages and owns filter rules.
pub trait SubscriptionClient: MessageReceiver + RuleManager {}

impl<T: MessageReceiver + RuleManager> SubscriptionClient for T {}

/// A queue: sends and receives on the same entity.
pub trait QueueClient: MessageSender + MessageReceiver {}

impl<T: MessageSender + MessageReceiver> QueueClient for T {}
