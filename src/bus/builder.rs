//! Assembling an `EventBus` from its connections.

use std::sync::{Arc, RwLock};

use tracing::info;

use super::EventBus;
use crate::broker::{MessageReceiver, MessageSender, QueueClient, RuleManager, SubscriptionClient};
use crate::config::BusOptions;
use crate::dispatch::DispatchEngine;
use crate::error::BusError;
use crate::handler::HandlerResolver;
use crate::message::MessageCodec;
use crate::publisher::EventPublisher;
use crate::registry::SubscriptionRegistry;
use crate::subscription::SubscriptionController;

/// Topic side: the sender publishes to the topic, the subscription receives
/// from it and owns its filter rules.
#[derive(Clone)]
pub(crate) struct TopicConnection {
    pub sender: Arc<dyn MessageSender>,
    pub receiver: Arc<dyn MessageReceiver>,
    pub rules: Arc<dyn RuleManager>,
}

#[derive(Clone)]
pub(crate) struct QueueConnection {
    pub sender: Arc<dyn MessageSender>,
    pub receiver: Arc<dyn MessageReceiver>,
}

/// Builder for `EventBus`.
///
/// ## Example
///
/// ```
/// use busline::broker::in_memory::{InMemoryQueue, InMemoryTopic};
/// use busline::{EventBus, HandlerContainer};
///
/// let topic = InMemoryTopic::new("events");
/// let bus = EventBus::builder()
///     .topic(topic.clone(), topic.subscription("billing"))
///     .queue(InMemoryQueue::new("billing-commands"))
///     .resolver(HandlerContainer::new())
///     .build()
///     .unwrap();
///
/// assert!(topic.subscription("billing").rule_names().is_empty());
/// # drop(bus);
/// ```
#[derive(Default)]
pub struct EventBusBuilder {
    options: BusOptions,
    resolver: Option<Arc<dyn HandlerResolver>>,
    topic: Option<TopicConnection>,
    queue: Option<QueueConnection>,
}

impl EventBusBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn options(mut self, options: BusOptions) -> Self {
        self.options = options;
        self
    }

    /// Configure the topic: `sender` publishes, `subscription` receives and
    /// carries the filter rules.
    pub fn topic<T, S>(mut self, sender: T, subscription: S) -> Self
    where
        T: MessageSender + 'static,
        S: SubscriptionClient + 'static,
    {
        let subscription = Arc::new(subscription);
        self.topic = Some(TopicConnection {
            sender: Arc::new(sender),
            receiver: subscription.clone(),
            rules: subscription,
        });
        self
    }

    /// Configure the queue, used for both sending and receiving.
    pub fn queue<Q>(mut self, queue: Q) -> Self
    where
        Q: QueueClient + 'static,
    {
        let queue = Arc::new(queue);
        self.queue = Some(QueueConnection {
            sender: queue.clone(),
            receiver: queue,
        });
        self
    }

    /// Where handler instances come from.
    pub fn resolver<R>(mut self, resolver: R) -> Self
    where
        R: HandlerResolver + 'static,
    {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Wire up the bus. With a topic configured, the subscription's default
    /// catch-all rule is removed here.
    pub fn build(self) -> Result<EventBus, BusError> {
        let resolver = self
            .resolver
            .ok_or_else(|| BusError::Configuration("handler resolver not configured".into()))?;

        let registry = Arc::new(RwLock::new(SubscriptionRegistry::new()));
        let publisher = EventPublisher::new(
            MessageCodec::from_options(&self.options),
            self.topic.as_ref().map(|t| t.sender.clone()),
            self.queue.as_ref().map(|q| q.sender.clone()),
        );
        let controller = SubscriptionController::new(
            registry.clone(),
            self.topic.as_ref().map(|t| t.rules.clone()),
        );
        let engine = DispatchEngine::new(
            registry.clone(),
            resolver,
            publisher.clone(),
            self.options.missing_handler,
        );

        controller.remove_default_rule()?;
        info!(
            endpoint = %self.options.endpoint,
            topic = self.topic.as_ref().map(|t| t.sender.entity_path()),
            queue = self.queue.as_ref().map(|q| q.sender.entity_path()),
            "event bus ready"
        );

        Ok(EventBus {
            options: self.options,
            registry,
            publisher,
            controller,
            engine: Arc::new(engine),
            topic: self.topic,
            queue: self.queue,
        })
    }
}
