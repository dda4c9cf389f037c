//! The event bus facade.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::{error, info};

use super::builder::{QueueConnection, TopicConnection};
use super::{EventBusBuilder, ListenerHandle};
use crate::broker::{ExceptionReceivedContext, MessageReceiver, ReceiveOptions};
use crate::config::BusOptions;
use crate::dispatch::{DispatchEngine, MessageOrigin};
use crate::error::BusError;
use crate::event::IntegrationEvent;
use crate::handler::{DynamicEventHandler, IntegrationEventHandler};
use crate::publisher::EventPublisher;
use crate::registry::SubscriptionRegistry;
use crate::subscription::SubscriptionController;

/// Publish/subscribe facade over a topic and a queue.
///
/// Each `EventBus` owns its own subscription registry. Producers publish
/// typed events; consumers subscribe handler types and start listeners,
/// which dispatch every received message to the handlers registered for
/// its label.
///
/// ## Example
///
/// ```ignore
/// let bus = EventBus::builder()
///     .topic(topic.clone(), topic.subscription("billing"))
///     .resolver(HandlerContainer::new().scoped(|| SendReceipt::new()))
///     .build()?;
///
/// bus.subscribe::<OrderPlaced, SendReceipt>()?;
/// let listener = bus.register_topic_listener()?;
///
/// bus.publish_to_topic(&OrderPlaced { id: "abc".into() }, None)?;
/// // ... SendReceipt runs, the message is completed and
/// // CompletedEvent { id: "abc" } is published to the topic.
/// listener.stop();
/// ```
pub struct EventBus {
    pub(crate) options: BusOptions,
    pub(crate) registry: Arc<RwLock<SubscriptionRegistry>>,
    pub(crate) publisher: EventPublisher,
    pub(crate) controller: SubscriptionController,
    pub(crate) engine: Arc<DispatchEngine>,
    pub(crate) topic: Option<TopicConnection>,
    pub(crate) queue: Option<QueueConnection>,
}

impl EventBus {
    pub fn builder() -> EventBusBuilder {
        EventBusBuilder::new()
    }

    pub fn options(&self) -> &BusOptions {
        &self.options
    }

    /// Publish an event to the topic. With a delay the broker holds the
    /// message until `now + delay`.
    pub fn publish_to_topic<E: IntegrationEvent>(&self, event: &E, delay: Option<Duration>) -> Result<(), BusError> {
        self.publisher.publish_to_topic(event, delay)
    }

    /// Send an event to the queue, optionally delayed.
    pub fn publish_to_queue<E: IntegrationEvent>(&self, event: &E, delay: Option<Duration>) -> Result<(), BusError> {
        self.publisher.publish_to_queue(event, delay)
    }

    /// Subscribe handler `H` to event `E`.
    pub fn subscribe<E, H>(&self) -> Result<(), BusError>
    where
        E: IntegrationEvent,
        H: IntegrationEventHandler<E>,
    {
        self.controller.subscribe::<E, H>()
    }

    pub fn unsubscribe<E, H>(&self) -> Result<(), BusError>
    where
        E: IntegrationEvent,
        H: IntegrationEventHandler<E>,
    {
        self.controller.unsubscribe::<E, H>().map(|_| ())
    }

    /// Subscribe a dynamic handler to an event name.
    pub fn subscribe_dynamic<H: DynamicEventHandler>(&self, event_name: &str) -> Result<(), BusError> {
        self.controller.subscribe_dynamic::<H>(event_name)
    }

    pub fn unsubscribe_dynamic<H: DynamicEventHandler>(&self, event_name: &str) -> Result<(), BusError> {
        self.controller.unsubscribe_dynamic::<H>(event_name).map(|_| ())
    }

    /// Start dispatching messages from the topic subscription.
    pub fn register_topic_listener(&self) -> Result<ListenerHandle, BusError> {
        let topic = self.topic.as_ref().ok_or_else(BusError::topic_not_configured)?;
        self.register_listener(
            &topic.receiver,
            MessageOrigin::Topic,
            self.options.topic_max_concurrent_calls,
        )
    }

    /// Start dispatching messages from the queue.
    pub fn register_queue_listener(&self) -> Result<ListenerHandle, BusError> {
        let queue = self.queue.as_ref().ok_or_else(BusError::queue_not_configured)?;
        self.register_listener(
            &queue.receiver,
            MessageOrigin::Queue,
            self.options.queue_max_concurrent_calls,
        )
    }

    fn register_listener(
        &self,
        receiver: &Arc<dyn MessageReceiver>,
        origin: MessageOrigin,
        max_concurrent_calls: usize,
    ) -> Result<ListenerHandle, BusError> {
        let options = ReceiveOptions {
            max_concurrent_calls,
            auto_complete: false,
            poll_interval: self.options.receive_poll_interval(),
            endpoint: self.options.endpoint.clone(),
        };
        let callback = self.engine.callback(receiver.clone(), origin);
        let handle = receiver.register_handler(callback, options, Arc::new(log_exception))?;

        info!(
            entity_path = receiver.entity_path(),
            max_concurrent_calls,
            "listener registered"
        );
        Ok(ListenerHandle::new(receiver.entity_path(), handle))
    }

    pub fn has_subscriptions_for<E: IntegrationEvent>(&self) -> bool {
        self.has_subscriptions_for_event(E::NAME)
    }

    pub fn has_subscriptions_for_event(&self, event_name: &str) -> bool {
        self.registry
            .read()
            .map(|registry| registry.has_subscriptions_for_event(event_name))
            .unwrap_or(false)
    }

    /// Register a callback for event names that lose their last handler.
    #[cfg(feature = "emitter")]
    pub fn on_event_removed<F>(&self, callback: F) -> Result<(), BusError>
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.registry
            .write()
            .map_err(|_| BusError::LockPoisoned("on_event_removed"))?
            .on_event_removed(callback);
        Ok(())
    }

    /// Shared handle to the registry, for inspection.
    pub fn registry(&self) -> Arc<RwLock<SubscriptionRegistry>> {
        self.registry.clone()
    }
}

fn log_exception(ctx: &ExceptionReceivedContext<'_>) {
    error!(
        endpoint = ctx.endpoint,
        entity_path = ctx.entity_path,
        action = ctx.action,
        error = %ctx.error,
        "message handler encountered an exception"
    );
}
