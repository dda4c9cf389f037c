//! Property tests for the registry and the codec.

use std::collections::BTreeSet;

use busline::{
    BusError, DynamicEventHandler, HandlerError, IntegrationEvent, MessageCodec,
    SubscriptionRegistry,
};
use proptest::prelude::*;
use serde_json::Value;

use crate::support::{OrderShipped, PriceChanged};

struct First;
struct Second;
struct Third;

impl DynamicEventHandler for First {
    fn handle(&self, _event: Value) -> Result<(), HandlerError> {
        Ok(())
    }
}

impl DynamicEventHandler for Second {
    fn handle(&self, _event: Value) -> Result<(), HandlerError> {
        Ok(())
    }
}

impl DynamicEventHandler for Third {
    fn handle(&self, _event: Value) -> Result<(), HandlerError> {
        Ok(())
    }
}

const NAMES: [&str; 3] = ["OrderPlaced", "order.shipped", "PriceChanged"];

#[derive(Clone, Debug)]
enum Op {
    Add(usize, usize),
    Remove(usize, usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..3usize, 0..3usize).prop_map(|(h, n)| Op::Add(h, n)),
        (0..3usize, 0..3usize).prop_map(|(h, n)| Op::Remove(h, n)),
    ]
}

fn add(registry: &mut SubscriptionRegistry, handler: usize, name: &str) -> Result<(), BusError> {
    match handler {
        0 => registry.add_dynamic_subscription::<First>(name),
        1 => registry.add_dynamic_subscription::<Second>(name),
        _ => registry.add_dynamic_subscription::<Third>(name),
    }
}

fn remove(registry: &mut SubscriptionRegistry, handler: usize, name: &str) -> Result<(), BusError> {
    match handler {
        0 => registry.remove_dynamic_subscription::<First>(name),
        1 => registry.remove_dynamic_subscription::<Second>(name),
        _ => registry.remove_dynamic_subscription::<Third>(name),
    }
    .map(|_| ())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        ..ProptestConfig::default()
    })]

    /// Property: the registry agrees with a set-of-pairs model after every
    /// operation, duplicates and unknown removals fail without changing it.
    #[test]
    fn registry_matches_set_model(ops in prop::collection::vec(op(), 1..40)) {
        let mut registry = SubscriptionRegistry::new();
        let mut model: BTreeSet<(usize, usize)> = BTreeSet::new();

        for op in ops {
            match op {
                Op::Add(h, n) => {
                    let result = add(&mut registry, h, NAMES[n]);
                    if model.insert((h, n)) {
                        prop_assert!(result.is_ok());
                    } else {
                        let is_duplicate = matches!(result, Err(BusError::AlreadyRegistered { .. }));
                        prop_assert!(is_duplicate);
                    }
                }
                Op::Remove(h, n) => {
                    let result = remove(&mut registry, h, NAMES[n]);
                    if model.remove(&(h, n)) {
                        prop_assert!(result.is_ok());
                    } else {
                        let is_unknown = matches!(result, Err(BusError::NotSubscribed { .. }));
                        prop_assert!(is_unknown);
                    }
                }
            }

            for (n, name) in NAMES.iter().enumerate() {
                let expected = model.iter().filter(|(_, m)| *m == n).count();
                prop_assert_eq!(registry.handler_count(name), expected);
                prop_assert_eq!(registry.has_subscriptions_for_event(name), expected > 0);
            }
            prop_assert_eq!(registry.is_empty(), model.is_empty());
        }
    }

    /// Property: decode(encode(event)) == event.
    #[test]
    fn codec_round_trips_shipments(id in ".{0,40}", carrier in "[a-z]{0,12}") {
        let codec = MessageCodec::default();
        let event = OrderShipped { id, carrier };

        let message = codec.encode(&event).unwrap();
        prop_assert_eq!(message.label.as_str(), OrderShipped::NAME);
        let decoded: OrderShipped = codec.decode(&message).unwrap();
        prop_assert_eq!(decoded, event);
    }

    #[test]
    fn codec_round_trips_numbers(sku in "[A-Z0-9-]{1,16}", cents in any::<u64>()) {
        let codec = MessageCodec::default();
        let event = PriceChanged { sku, cents };

        let decoded: PriceChanged = codec.decode(&codec.encode(&event).unwrap()).unwrap();
        prop_assert_eq!(decoded, event);
    }
}
