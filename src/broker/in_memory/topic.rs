//! In-memory topic with filtered subscriptions.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::queue::{InMemoryQueue, DEFAULT_MAX_DELIVERY_COUNT};
use crate::broker::{
    BrokerError, ExceptionSink, MessageCallback, MessageReceiver, MessageSender,
    ReceiveLoopHandle, ReceiveOptions, RuleDescription, RuleFilter, RuleManager,
};
use crate::message::Message;

/// Fan-out topic. Every message sent to the topic is copied into each
/// subscription whose rules accept the message label.
///
/// Fan-out is all or nothing: every target subscription is locked before
/// the first copy is added, so a failed send leaves no subscription with
/// the message.
///
/// ## Example
///
/// ```
/// use busline::broker::in_memory::InMemoryTopic;
/// use busline::broker::{MessageSender, RuleManager, RuleDescription, DEFAULT_RULE_NAME};
/// use busline::Message;
///
/// let topic = InMemoryTopic::new("events");
/// let billing = topic.subscription("billing");
/// billing.remove_rule(DEFAULT_RULE_NAME).unwrap();
/// billing.add_rule(RuleDescription::for_event("OrderPlaced")).unwrap();
///
/// topic.send(Message::with_string_body("m-1", "OrderPlaced", "{}")).unwrap();
/// topic.send(Message::with_string_body("m-2", "OrderShipped", "{}")).unwrap();
/// assert_eq!(billing.queue().len(), 1);
/// ```
#[derive(Clone)]
pub struct InMemoryTopic {
    inner: Arc<TopicInner>,
}

struct TopicInner {
    path: String,
    max_delivery_count: u32,
    retain_completed: AtomicBool,
    subscriptions: RwLock<BTreeMap<String, InMemorySubscription>>,
}

impl InMemoryTopic {
    pub fn new(path: impl Into<String>) -> Self {
        Self::with_max_delivery_count(path, DEFAULT_MAX_DELIVERY_COUNT)
    }

    /// Create a topic whose subscriptions dead-letter after `max_delivery_count`.
    pub fn with_max_delivery_count(path: impl Into<String>, max_delivery_count: u32) -> Self {
        Self {
            inner: Arc::new(TopicInner {
                path: path.into(),
                max_delivery_count,
                retain_completed: AtomicBool::new(false),
                subscriptions: RwLock::new(BTreeMap::new()),
            }),
        }
    }

    /// Subscriptions created from now on keep their completed messages.
    pub fn with_retention(self) -> Self {
        self.inner.retain_completed.store(true, Ordering::Relaxed);
        self
    }

    pub fn path(&self) -> &str {
        &self.inner.path
    }

    /// Get or create a subscription. New subscriptions start with the
    /// catch-all default rule.
    pub fn subscription(&self, name: &str) -> InMemorySubscription {
        let mut subscriptions = self
            .inner
            .subscriptions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        subscriptions
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(topic = %self.inner.path, subscription = name, "subscription created");
                InMemorySubscription::new(
                    &self.inner.path,
                    name,
                    self.inner.max_delivery_count,
                    self.inner.retain_completed.load(Ordering::Relaxed),
                )
            })
            .clone()
    }

    /// Names of all subscriptions.
    pub fn subscription_names(&self) -> Vec<String> {
        self.inner
            .subscriptions
            .read()
            .map(|subs| subs.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn matching_subscriptions(&self, label: &str) -> Result<Vec<InMemorySubscription>, BrokerError> {
        let subscriptions = self
            .inner
            .subscriptions
            .read()
            .map_err(|_| BrokerError::Transport(format!("{} lock poisoned", self.inner.path)))?;
        Ok(subscriptions
            .values()
            .filter(|sub| sub.accepts(label))
            .cloned()
            .collect())
    }
}

impl MessageSender for InMemoryTopic {
    fn entity_path(&self) -> &str {
        &self.inner.path
    }

    fn send(&self, message: Message) -> Result<(), BrokerError> {
        let targets = self.matching_subscriptions(&message.label)?;
        debug!(
            topic = %self.inner.path,
            label = %message.label,
            subscriptions = targets.len(),
            "topic message routed"
        );
        let mut staged = targets
            .iter()
            .map(|subscription| subscription.queue.stage())
            .collect::<Result<Vec<_>, _>>()?;
        for queue in &mut staged {
            queue.enqueue(message.clone());
        }
        Ok(())
    }

    fn schedule_send(&self, message: Message, at: DateTime<Utc>) -> Result<i64, BrokerError> {
        let targets = self.matching_subscriptions(&message.label)?;
        let mut staged = targets
            .iter()
            .map(|subscription| subscription.queue.stage())
            .collect::<Result<Vec<_>, _>>()?;
        let mut sequence = 0;
        for queue in &mut staged {
            sequence = queue.schedule(message.clone(), at);
        }
        Ok(sequence)
    }
}

/// A named subscription on an `InMemoryTopic`.
#[derive(Clone)]
pub struct InMemorySubscription {
    name: String,
    path: String,
    queue: InMemoryQueue,
    rules: Arc<RwLock<BTreeMap<String, RuleFilter>>>,
}

impl InMemorySubscription {
    fn new(topic: &str, name: &str, max_delivery_count: u32, retain_completed: bool) -> Self {
        let path = format!("{}/subscriptions/{}", topic, name);
        let default_rule = RuleDescription::default_rule();
        let mut rules = BTreeMap::new();
        rules.insert(default_rule.name, default_rule.filter);

        let mut queue = InMemoryQueue::with_max_delivery_count(path.clone(), max_delivery_count);
        if retain_completed {
            queue = queue.with_retention();
        }

        Self {
            name: name.to_string(),
            queue,
            path,
            rules: Arc::new(RwLock::new(rules)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The subscription's backing queue, for inspection.
    pub fn queue(&self) -> &InMemoryQueue {
        &self.queue
    }

    /// Names of the rules currently installed.
    pub fn rule_names(&self) -> Vec<String> {
        self.rules
            .read()
            .map(|rules| rules.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_rule(&self, name: &str) -> bool {
        self.rules
            .read()
            .map(|rules| rules.contains_key(name))
            .unwrap_or(false)
    }

    /// Whether any rule accepts a message with this label.
    pub fn accepts(&self, label: &str) -> bool {
        self.rules
            .read()
            .map(|rules| rules.values().any(|filter| filter.matches(label)))
            .unwrap_or(false)
    }

    fn rules_poisoned(&self) -> BrokerError {
        BrokerError::Transport(format!("{} rules lock poisoned", self.path))
    }
}

impl RuleManager for InMemorySubscription {
    fn add_rule(&self, rule: RuleDescription) -> Result<(), BrokerError> {
        let mut rules = self.rules.write().map_err(|_| self.rules_poisoned())?;
        if rules.contains_key(&rule.name) {
            return Err(BrokerError::RuleAlreadyExists(rule.name));
        }
        info!(subscription = %self.path, rule = %rule.name, "rule added");
        rules.insert(rule.name, rule.filter);
        Ok(())
    }

    fn remove_rule(&self, name: &str) -> Result<(), BrokerError> {
        let mut rules = self.rules.write().map_err(|_| self.rules_poisoned())?;
        if rules.remove(name).is_none() {
            return Err(BrokerError::RuleNotFound(name.to_string()));
        }
        info!(subscription = %self.path, rule = name, "rule removed");
        Ok(())
    }
}

impl MessageReceiver for InMemorySubscription {
    fn entity_path(&self) -> &str {
        &self.path
    }

    fn register_handler(
        &self,
        callback: MessageCallback,
        options: ReceiveOptions,
        exception_sink: ExceptionSink,
    ) -> Result<ReceiveLoopHandle, BrokerError> {
        self.queue.register_handler(callback, options, exception_sink)
    }

    fn complete(&self, lock_token: &str) -> Result<(), BrokerError> {
        self.queue.complete_message(lock_token)
    }
}
