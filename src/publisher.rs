//! Publishing integration events to the topic and the queue.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use crate::broker::{BrokerError, MessageSender};
use crate::error::BusError;
use crate::event::IntegrationEvent;
use crate::message::{Message, MessageCodec};

/// Encodes events and hands them to the configured senders.
///
/// Either connection may be absent. Publishing to a missing connection
/// fails with `BusError::Configuration` before anything is encoded or sent.
#[derive(Clone)]
pub struct EventPublisher {
    codec: MessageCodec,
    topic: Option<Arc<dyn MessageSender>>,
    queue: Option<Arc<dyn MessageSender>>,
}

impl EventPublisher {
    pub fn new(
        codec: MessageCodec,
        topic: Option<Arc<dyn MessageSender>>,
        queue: Option<Arc<dyn MessageSender>>,
    ) -> Self {
        Self { codec, topic, queue }
    }

    pub fn codec(&self) -> &MessageCodec {
        &self.codec
    }

    /// Publish `event` on the topic, optionally delayed.
    pub fn publish_to_topic<E: IntegrationEvent>(
        &self,
        event: &E,
        delay: Option<Duration>,
    ) -> Result<(), BusError> {
        let sender = self.topic.as_deref().ok_or_else(BusError::topic_not_configured)?;
        self.publish(sender, event, delay)
    }

    /// Send `event` to the queue, optionally delayed.
    pub fn publish_to_queue<E: IntegrationEvent>(
        &self,
        event: &E,
        delay: Option<Duration>,
    ) -> Result<(), BusError> {
        let sender = self.queue.as_deref().ok_or_else(BusError::queue_not_configured)?;
        self.publish(sender, event, delay)
    }

    fn publish<E: IntegrationEvent>(
        &self,
        sender: &dyn MessageSender,
        event: &E,
        delay: Option<Duration>,
    ) -> Result<(), BusError> {
        let message = self.codec.encode(event)?;
        let message_id = message.message_id.clone();

        send(sender, message, delay).map_err(|source| BusError::Publish {
            event_name: E::NAME.to_string(),
            entity_path: sender.entity_path().to_string(),
            source,
        })?;

        debug!(
            event_name = E::NAME,
            message_id = %message_id,
            entity_path = sender.entity_path(),
            delayed = delay.is_some(),
            "event published"
        );
        Ok(())
    }
}

fn send(sender: &dyn MessageSender, message: Message, delay: Option<Duration>) -> Result<(), BrokerError> {
    match delay {
        None => sender.send(message),
        Some(delay) => {
            let delay = chrono::Duration::from_std(delay)
                .map_err(|e| BrokerError::Transport(format!("invalid delay: {}", e)))?;
            let at = Utc::now()
                .checked_add_signed(delay)
                .ok_or_else(|| BrokerError::Transport("delay out of range".into()))?;
            sender.schedule_send(message, at).map(|_| ())
        }
    }
}
