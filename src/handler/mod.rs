//! Handler contracts and handler resolution.
//!
//! Application code implements `IntegrationEventHandler<E>` for typed
//! subscriptions and `DynamicEventHandler` for subscriptions keyed only by
//! event name. Handler instances are not owned by the bus: for every
//! dispatched message the bus opens a `ResolutionScope` on the configured
//! `HandlerResolver` and asks it for each registered handler type.
//!
//! ```text
//! message ──► DispatchEngine ──► resolver.create_scope()
//!                                   │
//!                                   ├─ scope.resolve(HandlerA) ─► handle(event)
//!                                   └─ scope.resolve(HandlerB) ─► handle(event)
//!                                (scope dropped here, on every path)
//! ```

mod container;
mod error;
mod resolver;

use serde_json::Value;

use crate::event::IntegrationEvent;

pub use container::HandlerContainer;
pub use error::HandlerError;
pub use resolver::{HandlerKey, HandlerResolver, ResolutionScope};

pub(crate) use resolver::resolve_as;

/// Handles a statically typed integration event.
pub trait IntegrationEventHandler<E: IntegrationEvent>: Send + Sync + 'static {
    fn handle(&self, event: E) -> Result<(), HandlerError>;
}

/// Handles an event by name, receiving the decoded JSON body.
pub trait DynamicEventHandler: Send + Sync + 'static {
    fn handle(&self, event: Value) -> Result<(), HandlerError>;
}
