//! Subscribe/unsubscribe and broker filter-rule synchronization.

#[cfg(feature = "emitter")]
use std::sync::{Arc, Mutex};

use busline::broker::in_memory::InMemoryQueue;
use busline::broker::{RuleDescription, RuleManager, DEFAULT_RULE_NAME};
use busline::{BusError, HandlerContainer};

use crate::support::{
    queue_bus, AuditTrail, NotifyCustomer, OrderPlaced, OrderShipped, ReserveStock, SendReceipt,
    TopicFixture,
};

#[test]
fn building_the_bus_removes_the_default_rule() {
    let fx = TopicFixture::new();
    assert!(fx.subscription.has_rule(DEFAULT_RULE_NAME));

    let _bus = fx.bus(HandlerContainer::new());
    assert!(fx.subscription.rule_names().is_empty());

    // A second start finds the default rule already gone.
    let _again = fx.bus(HandlerContainer::new());
    assert!(fx.subscription.rule_names().is_empty());
}

#[test]
fn subscribe_installs_rule_named_after_the_event() {
    let fx = TopicFixture::new();
    let bus = fx.bus(HandlerContainer::new());

    bus.subscribe::<OrderPlaced, SendReceipt>().unwrap();
    bus.subscribe::<OrderShipped, NotifyCustomer>().unwrap();

    assert_eq!(
        fx.subscription.rule_names(),
        vec!["OrderPlaced".to_string(), "order.shipped".to_string()]
    );
    assert!(fx.subscription.accepts("OrderPlaced"));
    assert!(!fx.subscription.accepts("OrderCancelled"));
}

#[test]
fn has_subscriptions_tracks_first_and_last_handler() {
    let fx = TopicFixture::new();
    let bus = fx.bus(HandlerContainer::new());
    assert!(!bus.has_subscriptions_for::<OrderPlaced>());

    bus.subscribe::<OrderPlaced, SendReceipt>().unwrap();
    assert!(bus.has_subscriptions_for::<OrderPlaced>());

    bus.subscribe::<OrderPlaced, ReserveStock>().unwrap();
    bus.unsubscribe::<OrderPlaced, SendReceipt>().unwrap();
    assert!(bus.has_subscriptions_for_event("OrderPlaced"));

    bus.unsubscribe::<OrderPlaced, ReserveStock>().unwrap();
    assert!(!bus.has_subscriptions_for_event("OrderPlaced"));
}

#[test]
fn rule_is_removed_only_with_the_last_handler() {
    let fx = TopicFixture::new();
    let bus = fx.bus(HandlerContainer::new());
    bus.subscribe::<OrderPlaced, SendReceipt>().unwrap();
    bus.subscribe::<OrderPlaced, ReserveStock>().unwrap();

    bus.unsubscribe::<OrderPlaced, SendReceipt>().unwrap();
    assert!(
        fx.subscription.has_rule("OrderPlaced"),
        "the remaining handler must keep its broker route"
    );

    bus.unsubscribe::<OrderPlaced, ReserveStock>().unwrap();
    assert!(!fx.subscription.has_rule("OrderPlaced"));
}

#[test]
fn duplicate_subscription_is_rejected_without_side_effects() {
    let fx = TopicFixture::new();
    let bus = fx.bus(HandlerContainer::new());
    bus.subscribe::<OrderPlaced, SendReceipt>().unwrap();

    let err = bus.subscribe::<OrderPlaced, SendReceipt>().unwrap_err();
    assert!(matches!(err, BusError::AlreadyRegistered { .. }));
    assert_eq!(fx.subscription.rule_names(), vec!["OrderPlaced".to_string()]);
    assert_eq!(bus.registry().read().unwrap().handler_count("OrderPlaced"), 1);
}

#[test]
fn existing_rule_surfaces_as_broker_state_error() {
    let fx = TopicFixture::new();
    let bus = fx.bus(HandlerContainer::new());
    fx.subscription
        .add_rule(RuleDescription::for_event("OrderPlaced"))
        .unwrap();

    let err = bus.subscribe::<OrderPlaced, SendReceipt>().unwrap_err();
    assert!(err.is_broker_state());
    assert!(!bus.has_subscriptions_for::<OrderPlaced>());
}

#[test]
fn missing_rule_on_unsubscribe_keeps_registry_in_sync() {
    let fx = TopicFixture::new();
    let bus = fx.bus(HandlerContainer::new());
    bus.subscribe::<OrderPlaced, SendReceipt>().unwrap();
    fx.subscription.remove_rule("OrderPlaced").unwrap();

    let err = bus.unsubscribe::<OrderPlaced, SendReceipt>().unwrap_err();
    assert!(err.is_broker_state());
    assert!(bus.has_subscriptions_for::<OrderPlaced>());
}

#[test]
fn unsubscribing_an_unknown_handler_fails() {
    let fx = TopicFixture::new();
    let bus = fx.bus(HandlerContainer::new());
    bus.subscribe::<OrderPlaced, SendReceipt>().unwrap();

    let err = bus.unsubscribe::<OrderPlaced, ReserveStock>().unwrap_err();
    assert!(matches!(err, BusError::NotSubscribed { .. }));
    assert!(fx.subscription.has_rule("OrderPlaced"));
}

#[test]
fn dynamic_subscriptions_leave_rules_alone() {
    let fx = TopicFixture::new();
    let bus = fx.bus(HandlerContainer::new());

    bus.subscribe_dynamic::<AuditTrail>("OrderPlaced").unwrap();
    assert!(bus.has_subscriptions_for_event("OrderPlaced"));
    assert!(fx.subscription.rule_names().is_empty());

    assert!(matches!(
        bus.subscribe_dynamic::<AuditTrail>("OrderPlaced"),
        Err(BusError::AlreadyRegistered { .. })
    ));

    bus.unsubscribe_dynamic::<AuditTrail>("OrderPlaced").unwrap();
    assert!(!bus.has_subscriptions_for_event("OrderPlaced"));
    assert!(matches!(
        bus.unsubscribe_dynamic::<AuditTrail>("OrderPlaced"),
        Err(BusError::NotSubscribed { .. })
    ));
}

#[test]
fn queue_only_bus_subscribes_without_rules() {
    let queue = InMemoryQueue::new("billing-commands");
    let bus = queue_bus(&queue, HandlerContainer::new());

    bus.subscribe::<OrderPlaced, SendReceipt>().unwrap();
    assert!(bus.has_subscriptions_for::<OrderPlaced>());
    bus.unsubscribe::<OrderPlaced, SendReceipt>().unwrap();
    assert!(!bus.has_subscriptions_for::<OrderPlaced>());
}

#[cfg(feature = "emitter")]
#[test]
fn event_removed_notifications_fire_once_per_emptied_event() {
    let fx = TopicFixture::new();
    let bus = fx.bus(HandlerContainer::new());
    let removed = Arc::new(Mutex::new(Vec::new()));
    let sink = removed.clone();
    bus.on_event_removed(move |name| sink.lock().unwrap().push(name))
        .unwrap();

    bus.subscribe::<OrderPlaced, SendReceipt>().unwrap();
    bus.subscribe::<OrderPlaced, ReserveStock>().unwrap();
    bus.subscribe_dynamic::<AuditTrail>("order.shipped").unwrap();

    bus.unsubscribe::<OrderPlaced, SendReceipt>().unwrap();
    bus.unsubscribe::<OrderPlaced, ReserveStock>().unwrap();
    bus.unsubscribe_dynamic::<AuditTrail>("order.shipped").unwrap();

    assert_eq!(
        *removed.lock().unwrap(),
        vec!["OrderPlaced".to_string(), "order.shipped".to_string()]
    );
}

#[test]
fn transport_failure_removing_the_default_rule_fails_the_build() {
    use busline::broker::{
        BrokerError, ExceptionSink, MessageCallback, MessageReceiver, ReceiveLoopHandle, ReceiveOptions,
    };

    struct BrokenRules;

    impl RuleManager for BrokenRules {
        fn add_rule(&self, _rule: RuleDescription) -> Result<(), BrokerError> {
            Ok(())
        }

        fn remove_rule(&self, _name: &str) -> Result<(), BrokerError> {
            Err(BrokerError::Transport("unreachable".into()))
        }
    }

    impl MessageReceiver for BrokenRules {
        fn entity_path(&self) -> &str {
            "events/subscriptions/broken"
        }

        fn register_handler(
            &self,
            _callback: MessageCallback,
            _options: ReceiveOptions,
            _sink: ExceptionSink,
        ) -> Result<ReceiveLoopHandle, BrokerError> {
            Err(BrokerError::EntityClosed(self.entity_path().to_string()))
        }

        fn complete(&self, _lock_token: &str) -> Result<(), BrokerError> {
            Ok(())
        }
    }

    let fx = TopicFixture::new();
    let result = busline::EventBus::builder()
        .topic(fx.topic.clone(), BrokenRules)
        .resolver(HandlerContainer::new())
        .build();

    assert!(matches!(
        result,
        Err(BusError::Broker(BrokerError::Transport(_)))
    ));
}
