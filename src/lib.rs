//! Event bus over topic and queue message brokers.
//!
//! Producers publish typed integration events without knowing who consumes
//! them. Consumers subscribe handler types to event names, either statically
//! typed (`IntegrationEventHandler<E>`) or by name (`DynamicEventHandler`),
//! and start listeners that dispatch every received message to the
//! registered handlers. Topic subscriptions are kept in step with broker
//! filter rules, and after a message is fully processed a `CompletedEvent`
//! carrying its identifier is published back.
//!
//! ```ignore
//! use busline::broker::in_memory::InMemoryTopic;
//! use busline::{EventBus, HandlerContainer, HandlerError, IntegrationEvent, IntegrationEventHandler};
//!
//! #[derive(Serialize, Deserialize, IntegrationEvent)]
//! struct OrderPlaced {
//!     id: String,
//! }
//!
//! struct SendReceipt;
//!
//! impl IntegrationEventHandler<OrderPlaced> for SendReceipt {
//!     fn handle(&self, event: OrderPlaced) -> Result<(), HandlerError> {
//!         println!("receipt for {}", event.id);
//!         Ok(())
//!     }
//! }
//!
//! let topic = InMemoryTopic::new("events");
//! let bus = EventBus::builder()
//!     .topic(topic.clone(), topic.subscription("billing"))
//!     .resolver(HandlerContainer::new().singleton(SendReceipt))
//!     .build()?;
//!
//! bus.subscribe::<OrderPlaced, SendReceipt>()?;
//! let listener = bus.register_topic_listener()?;
//! bus.publish_to_topic(&OrderPlaced { id: "abc".into() }, None)?;
//! ```

extern crate self as busline;

pub mod broker;
mod bus;
mod config;
pub mod dispatch;
mod error;
mod event;
pub mod handler;
mod message;
mod publisher;
pub mod registry;
pub mod subscription;

pub use bus::{EventBus, EventBusBuilder, ListenerHandle, ListenerStats};
pub use config::{BusOptions, MissingHandlerPolicy};
pub use dispatch::{DispatchEngine, DispatchOutcome, MessageOrigin};
pub use error::BusError;
pub use event::{CompletedEvent, IntegrationEvent};
pub use handler::{
    DynamicEventHandler, HandlerContainer, HandlerError, HandlerKey, HandlerResolver,
    IntegrationEventHandler, ResolutionScope,
};
pub use message::{Message, MessageCodec};
pub use publisher::EventPublisher;
pub use registry::{Removal, SubscriptionRegistry};
pub use subscription::SubscriptionController;

// Derive macro for IntegrationEvent
pub use busline_macros::IntegrationEvent;

// Re-export the EventEmitter used for registry notifications
#[cfg(feature = "emitter")]
pub use event_emitter_rs::EventEmitter;
