//! Listener registration, concurrency and ordering.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use busline::broker::in_memory::InMemoryQueue;
use busline::{BusError, EventBus, HandlerContainer, HandlerError, IntegrationEventHandler};

use crate::support::{queue_bus, wait_until, Journal, OrderPlaced, Sequential, TopicFixture};

const WAIT: Duration = Duration::from_secs(3);

#[test]
fn listeners_require_their_connection() {
    let bus = EventBus::builder().resolver(HandlerContainer::new()).build().unwrap();

    assert!(matches!(
        bus.register_topic_listener(),
        Err(BusError::Configuration(_))
    ));
    assert!(matches!(
        bus.register_queue_listener(),
        Err(BusError::Configuration(_))
    ));
}

#[test]
fn concurrency_follows_options() {
    let fx = TopicFixture::new();
    let queue = InMemoryQueue::new("billing-commands");
    let bus = EventBus::builder()
        .topic(fx.topic.clone(), fx.subscription.clone())
        .queue(queue)
        .resolver(HandlerContainer::new())
        .build()
        .unwrap();

    let topic_listener = bus.register_topic_listener().unwrap();
    let queue_listener = bus.register_queue_listener().unwrap();

    assert_eq!(topic_listener.concurrency(), 10);
    assert_eq!(queue_listener.concurrency(), 1);
    assert_eq!(topic_listener.entity_path(), "events/subscriptions/billing");
    assert_eq!(queue_listener.entity_path(), "billing-commands");

    topic_listener.stop();
    queue_listener.stop();
}

#[test]
fn queue_listener_preserves_order() {
    let queue = InMemoryQueue::new("billing-commands");
    let journal = Journal::default();
    let max_in_flight = Arc::new(AtomicUsize::new(0));
    let handler = Sequential {
        journal: journal.clone(),
        in_flight: Arc::new(AtomicUsize::new(0)),
        max_in_flight: max_in_flight.clone(),
    };
    let bus = queue_bus(&queue, HandlerContainer::new().singleton(handler));
    bus.subscribe::<OrderPlaced, Sequential>().unwrap();

    let ids: Vec<String> = (0..10).map(|i| format!("o-{}", i)).collect();
    for id in &ids {
        bus.publish_to_queue(&OrderPlaced { id: id.clone() }, None)
            .unwrap();
    }

    let listener = bus.register_queue_listener().unwrap();
    assert!(wait_until(WAIT, || journal.len() == ids.len()));
    listener.stop();

    let seen: Vec<String> = journal.entries().into_iter().map(|(_, id)| id).collect();
    assert_eq!(seen, ids);
    assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
}

#[test]
fn stopped_listener_leaves_messages_for_the_next_one() {
    let queue = InMemoryQueue::new("billing-commands");
    let bus = queue_bus(&queue, HandlerContainer::new());

    let listener = bus.register_queue_listener().unwrap();
    let stats = listener.stop();
    assert_eq!(stats.handled, 0);
    assert!(stats.polls >= 1);

    bus.publish_to_queue(&OrderPlaced { id: "o-1".into() }, None)
        .unwrap();
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(queue.len(), 1);

    let listener = bus.register_queue_listener().unwrap();
    assert!(wait_until(WAIT, || queue.completed_count() == 1));
    listener.stop();
}

/// Blocks until the test releases it.
struct Gate {
    started: Mutex<Sender<String>>,
    release: Mutex<Receiver<()>>,
}

impl IntegrationEventHandler<OrderPlaced> for Gate {
    fn handle(&self, event: OrderPlaced) -> Result<(), HandlerError> {
        self.started
            .lock()
            .map_err(|_| HandlerError::other("gate poisoned"))?
            .send(event.id)
            .map_err(HandlerError::other)?;
        self.release
            .lock()
            .map_err(|_| HandlerError::other("gate poisoned"))?
            .recv()
            .map_err(HandlerError::other)?;
        Ok(())
    }
}

/// Handlers are not timed out: a handler that does not return holds its
/// worker slot, and with one slot the queue stalls behind it.
#[test]
fn blocked_handler_holds_its_worker_slot() {
    let queue = InMemoryQueue::new("billing-commands");
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let gate = Gate {
        started: Mutex::new(started_tx),
        release: Mutex::new(release_rx),
    };
    let bus = queue_bus(&queue, HandlerContainer::new().singleton(gate));
    bus.subscribe::<OrderPlaced, Gate>().unwrap();

    bus.publish_to_queue(&OrderPlaced { id: "first".into() }, None)
        .unwrap();
    bus.publish_to_queue(&OrderPlaced { id: "second".into() }, None)
        .unwrap();
    let listener = bus.register_queue_listener().unwrap();

    assert_eq!(started_rx.recv_timeout(WAIT).unwrap(), "first");
    std::thread::sleep(Duration::from_millis(100));
    assert!(started_rx.try_recv().is_err(), "second message must wait");
    assert_eq!(queue.in_flight_count(), 1);

    release_tx.send(()).unwrap();
    assert_eq!(started_rx.recv_timeout(WAIT).unwrap(), "second");
    release_tx.send(()).unwrap();

    assert!(wait_until(WAIT, || queue.completed_count() >= 2));
    listener.stop();
}

/// Panics on the `boom` order, journals every other one.
struct Volatile(Journal);

impl IntegrationEventHandler<OrderPlaced> for Volatile {
    fn handle(&self, event: OrderPlaced) -> Result<(), HandlerError> {
        if event.id == "boom" {
            panic!("handler blew up on {}", event.id);
        }
        self.0.record("volatile", event.id);
        Ok(())
    }
}

#[test]
fn panicking_handler_does_not_stop_the_queue_listener() {
    let queue = InMemoryQueue::with_max_delivery_count("billing-commands", 2);
    let journal = Journal::default();
    let bus = queue_bus(&queue, HandlerContainer::new().singleton(Volatile(journal.clone())));
    bus.subscribe::<OrderPlaced, Volatile>().unwrap();

    let listener = bus.register_queue_listener().unwrap();
    bus.publish_to_queue(&OrderPlaced { id: "boom".into() }, None)
        .unwrap();
    bus.publish_to_queue(&OrderPlaced { id: "fine".into() }, None)
        .unwrap();

    assert!(wait_until(WAIT, || journal.count("volatile") == 1
        && queue.dead_letters().len() == 1));
    let stats = listener.stop();

    assert_eq!(journal.entries(), vec![("volatile".to_string(), "fine".to_string())]);
    assert_eq!(queue.dead_letters()[0].body_str(), Some(r#"{"id":"boom"}"#));
    assert_eq!(queue.in_flight_count(), 0);
    assert_eq!(stats.failed, 2);
    assert!(stats.handled >= 1);
}
