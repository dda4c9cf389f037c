//! The CompletedEvent acknowledgement protocol.

use std::time::Duration;

use busline::broker::in_memory::InMemoryQueue;
use busline::broker::{
    BrokerError, ExceptionSink, MessageCallback, MessageReceiver, MessageSender, ReceiveLoopHandle,
    ReceiveOptions,
};
use busline::{CompletedEvent, EventBus, HandlerContainer, Message};
use chrono::{DateTime, Utc};

use crate::support::{
    completed_name, fast_options, queue_bus, wait_until, CompletionWatcher, Journal, OrderPlaced,
    PriceChanged, Reprice, SendReceipt, TopicFixture,
};

const WAIT: Duration = Duration::from_secs(2);

fn labels(messages: Vec<Message>) -> Vec<String> {
    messages.into_iter().map(|m| m.label).collect()
}

#[test]
fn completion_is_announced_once_on_the_queue() {
    let queue = InMemoryQueue::new("billing-commands").with_retention();
    let journal = Journal::default();
    let bus = queue_bus(&queue, HandlerContainer::new().singleton(SendReceipt(journal.clone())));

    bus.subscribe::<OrderPlaced, SendReceipt>().unwrap();
    let listener = bus.register_queue_listener().unwrap();
    bus.publish_to_queue(&OrderPlaced { id: "abc".into() }, None)
        .unwrap();

    assert!(wait_until(WAIT, || queue.completed_count() == 2));
    listener.stop();

    let completed = queue.completed();
    assert_eq!(labels(completed.clone()), vec!["OrderPlaced", completed_name()]);
    assert_eq!(completed[1].body_str(), Some(r#"{"id":"abc"}"#));
    assert!(queue.is_empty());
}

#[test]
fn completed_events_never_cascade() {
    let queue = InMemoryQueue::new("billing-commands").with_retention();
    let journal = Journal::default();
    let container = HandlerContainer::new()
        .singleton(SendReceipt(journal.clone()))
        .singleton(CompletionWatcher(journal.clone()));
    let bus = queue_bus(&queue, container);

    bus.subscribe::<OrderPlaced, SendReceipt>().unwrap();
    bus.subscribe::<CompletedEvent, CompletionWatcher>().unwrap();
    let listener = bus.register_queue_listener().unwrap();
    bus.publish_to_queue(&OrderPlaced { id: "abc".into() }, None)
        .unwrap();

    assert!(wait_until(WAIT, || journal.count("completed") == 1));
    // Give a cascading announcement time to show up.
    std::thread::sleep(Duration::from_millis(100));
    listener.stop();

    assert_eq!(journal.count("completed"), 1);
    assert_eq!(
        labels(queue.completed())
            .iter()
            .filter(|label| label.as_str() == completed_name())
            .count(),
        1
    );
    assert!(queue.is_empty());
}

#[test]
fn events_without_identifier_are_not_announced() {
    let queue = InMemoryQueue::new("billing-commands").with_retention();
    let journal = Journal::default();
    let bus = queue_bus(&queue, HandlerContainer::new().singleton(Reprice(journal.clone())));

    bus.subscribe::<PriceChanged, Reprice>().unwrap();
    let listener = bus.register_queue_listener().unwrap();
    bus.publish_to_queue(
        &PriceChanged {
            sku: "sku-1".into(),
            cents: 999,
        },
        None,
    )
    .unwrap();

    assert!(wait_until(WAIT, || queue.completed_count() == 1));
    std::thread::sleep(Duration::from_millis(50));
    listener.stop();

    assert_eq!(labels(queue.completed()), vec!["PriceChanged"]);
    assert_eq!(journal.count("reprice"), 1);
}

#[test]
fn topic_completions_go_back_to_the_topic() {
    let fx = TopicFixture::new();
    let journal = Journal::default();
    let container = HandlerContainer::new()
        .singleton(SendReceipt(journal.clone()))
        .singleton(CompletionWatcher(journal.clone()));
    let bus = fx.bus(container);

    bus.subscribe::<OrderPlaced, SendReceipt>().unwrap();
    bus.subscribe::<CompletedEvent, CompletionWatcher>().unwrap();
    let listener = bus.register_topic_listener().unwrap();
    bus.publish_to_topic(&OrderPlaced { id: "abc".into() }, None)
        .unwrap();

    assert!(wait_until(WAIT, || journal.count("completed") == 1));
    std::thread::sleep(Duration::from_millis(50));
    listener.stop();

    assert_eq!(
        journal.entries(),
        vec![
            ("receipt".to_string(), "abc".to_string()),
            ("completed".to_string(), "abc".to_string()),
        ]
    );
    assert_eq!(fx.subscription.queue().completed_count(), 2);
}

/// A queue whose sender refuses `CompletedEvent` messages.
#[derive(Clone)]
struct RefusesCompletions {
    inner: InMemoryQueue,
}

impl MessageSender for RefusesCompletions {
    fn entity_path(&self) -> &str {
        self.inner.path()
    }

    fn send(&self, message: Message) -> Result<(), BrokerError> {
        if message.label == completed_name() {
            return Err(BrokerError::Transport("quota exceeded".into()));
        }
        MessageSender::send(&self.inner, message)
    }

    fn schedule_send(&self, message: Message, at: DateTime<Utc>) -> Result<i64, BrokerError> {
        self.inner.schedule_send(message, at)
    }
}

impl MessageReceiver for RefusesCompletions {
    fn entity_path(&self) -> &str {
        self.inner.path()
    }

    fn register_handler(
        &self,
        callback: MessageCallback,
        options: ReceiveOptions,
        exception_sink: ExceptionSink,
    ) -> Result<ReceiveLoopHandle, BrokerError> {
        self.inner.register_handler(callback, options, exception_sink)
    }

    fn complete(&self, lock_token: &str) -> Result<(), BrokerError> {
        self.inner.complete(lock_token)
    }
}

#[test]
fn failed_announcement_does_not_fail_the_message() {
    let queue = InMemoryQueue::new("billing-commands");
    let journal = Journal::default();
    let bus = EventBus::builder()
        .options(fast_options())
        .queue(RefusesCompletions { inner: queue.clone() })
        .resolver(HandlerContainer::new().singleton(SendReceipt(journal.clone())))
        .build()
        .unwrap();

    bus.subscribe::<OrderPlaced, SendReceipt>().unwrap();
    let listener = bus.register_queue_listener().unwrap();
    bus.publish_to_queue(&OrderPlaced { id: "abc".into() }, None)
        .unwrap();

    assert!(wait_until(WAIT, || queue.completed_count() == 1));
    let stats = listener.stop();

    assert_eq!(stats.handled, 1);
    assert_eq!(stats.failed, 0);
    assert_eq!(journal.count("receipt"), 1);
    assert!(queue.dead_letters().is_empty());
}
