//! `#[derive(IntegrationEvent)]` naming.

use busline::{CompletedEvent, IntegrationEvent, MessageCodec};

use crate::support::{OrderPlaced, OrderShipped, PriceChanged};

#[test]
fn name_defaults_to_the_type_identifier() {
    assert_eq!(OrderPlaced::NAME, "OrderPlaced");
    assert_eq!(PriceChanged::event_name(), "PriceChanged");
}

#[test]
fn name_attribute_overrides_it() {
    assert_eq!(OrderShipped::NAME, "order.shipped");

    let message = MessageCodec::default()
        .encode(&OrderShipped {
            id: "o-1".into(),
            carrier: "dhl".into(),
        })
        .unwrap();
    assert_eq!(message.label, "order.shipped");
}

#[test]
fn completed_event_has_a_fixed_name() {
    assert_eq!(CompletedEvent::NAME, "CompletedEvent");
    assert_eq!(CompletedEvent::new("abc").id, "abc");
}
