//! In-memory subscription registry.

use std::collections::HashMap;

#[cfg(feature = "emitter")]
use event_emitter_rs::EventEmitter;
use tracing::debug;

use super::subscription::{EventTypeInfo, SubscriptionInfo};
use crate::error::BusError;
use crate::event::IntegrationEvent;
use crate::handler::{DynamicEventHandler, HandlerKey, IntegrationEventHandler};

#[cfg(feature = "emitter")]
const EVENT_REMOVED: &str = "event_removed";

/// Result of removing a registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Removal {
    /// That was the last handler; the event name is gone from the registry.
    EventRemoved,
    /// Other handlers are still registered for the event name.
    HandlersRemain(usize),
}

impl Removal {
    pub fn is_event_removed(&self) -> bool {
        matches!(self, Removal::EventRemoved)
    }
}

/// Maps event names to the handlers interested in them.
///
/// Typed and dynamic registrations share one namespace of event names.
/// The registry does no I/O and no locking of its own; the bus owns it
/// behind a `RwLock` so dispatch reads are linearized with
/// subscribe/unsubscribe writes.
///
/// ## Example
///
/// ```ignore
/// let mut registry = SubscriptionRegistry::new();
/// registry.add_subscription::<OrderPlaced, SendReceipt>()?;
/// assert!(registry.has_subscriptions_for_event("OrderPlaced"));
/// ```
pub struct SubscriptionRegistry {
    handlers: HashMap<String, Vec<SubscriptionInfo>>,
    event_types: HashMap<String, EventTypeInfo>,
    #[cfg(feature = "emitter")]
    emitter: EventEmitter,
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            event_types: HashMap::new(),
            #[cfg(feature = "emitter")]
            emitter: EventEmitter::new(),
        }
    }

    /// The registry name of a typed event.
    pub fn event_key<E: IntegrationEvent>() -> &'static str {
        E::NAME
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Remove every registration. No removal notifications are raised.
    pub fn clear(&mut self) {
        self.handlers.clear();
        self.event_types.clear();
    }

    /// Register a typed handler for `E`.
    pub fn add_subscription<E, H>(&mut self) -> Result<(), BusError>
    where
        E: IntegrationEvent,
        H: IntegrationEventHandler<E>,
    {
        let name = Self::event_key::<E>();
        if let Some(existing) = self.event_types.get(name) {
            if !existing.is::<E>() {
                return Err(BusError::Configuration(format!(
                    "event name `{}` is already bound to {}",
                    name, existing.type_name
                )));
            }
        }

        self.add_handler(name, SubscriptionInfo::typed::<E, H>())?;
        self.event_types
            .insert(name.to_string(), EventTypeInfo::of::<E>());
        Ok(())
    }

    /// Register a dynamic handler for an event name.
    pub fn add_dynamic_subscription<H>(&mut self, event_name: &str) -> Result<(), BusError>
    where
        H: DynamicEventHandler,
    {
        self.add_handler(event_name, SubscriptionInfo::dynamic::<H>())
    }

    fn add_handler(&mut self, event_name: &str, info: SubscriptionInfo) -> Result<(), BusError> {
        let registrations = self.handlers.get(event_name);
        if registrations.is_some_and(|subs| subs.iter().any(|s| s.handler() == info.handler())) {
            return Err(BusError::AlreadyRegistered {
                event_name: event_name.to_string(),
                handler: info.handler().name(),
            });
        }

        debug!(
            event_name,
            handler = info.handler().name(),
            dynamic = info.is_dynamic(),
            "subscription added"
        );
        self.handlers
            .entry(event_name.to_string())
            .or_default()
            .push(info);
        Ok(())
    }

    /// Remove a typed registration.
    pub fn remove_subscription<E, H>(&mut self) -> Result<Removal, BusError>
    where
        E: IntegrationEvent,
        H: IntegrationEventHandler<E>,
    {
        self.remove_handler(Self::event_key::<E>(), &HandlerKey::of::<H>(), false)
    }

    /// Remove a dynamic registration.
    pub fn remove_dynamic_subscription<H>(&mut self, event_name: &str) -> Result<Removal, BusError>
    where
        H: DynamicEventHandler,
    {
        self.remove_handler(event_name, &HandlerKey::of::<H>(), true)
    }

    fn remove_handler(
        &mut self,
        event_name: &str,
        handler: &HandlerKey,
        dynamic: bool,
    ) -> Result<Removal, BusError> {
        let not_subscribed = || BusError::NotSubscribed {
            event_name: event_name.to_string(),
            handler: handler.name(),
        };

        let registrations = self.handlers.get_mut(event_name).ok_or_else(not_subscribed)?;
        let position = registrations
            .iter()
            .position(|s| s.handler() == handler && s.is_dynamic() == dynamic)
            .ok_or_else(not_subscribed)?;
        registrations.remove(position);

        let remaining = registrations.len();
        let typed_remaining = registrations.iter().any(|s| !s.is_dynamic());
        debug!(event_name, handler = handler.name(), remaining, "subscription removed");

        if !typed_remaining {
            self.event_types.remove(event_name);
        }
        if remaining > 0 {
            return Ok(Removal::HandlersRemain(remaining));
        }

        self.handlers.remove(event_name);
        self.raise_event_removed(event_name);
        Ok(Removal::EventRemoved)
    }

    /// Register a callback for event names that lose their last handler.
    ///
    /// **Requires the `emitter` feature to be enabled.**
    ///
    /// Callbacks run on their own threads and are awaited before the
    /// removing call returns; they must not call back into the bus.
    #[cfg(feature = "emitter")]
    pub fn on_event_removed<F>(&mut self, callback: F)
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.emitter.on(EVENT_REMOVED, callback);
    }

    #[cfg(feature = "emitter")]
    fn raise_event_removed(&mut self, event_name: &str) {
        for listener in self.emitter.emit(EVENT_REMOVED, event_name.to_string()) {
            let _ = listener.join();
        }
    }

    #[cfg(not(feature = "emitter"))]
    fn raise_event_removed(&mut self, _event_name: &str) {}

    pub fn has_subscriptions_for_event(&self, event_name: &str) -> bool {
        self.handlers.contains_key(event_name)
    }

    pub fn has_subscriptions_for<E: IntegrationEvent>(&self) -> bool {
        self.has_subscriptions_for_event(Self::event_key::<E>())
    }

    /// Whether `H` is registered as a typed handler for `E`.
    pub fn contains_subscription<E, H>(&self) -> bool
    where
        E: IntegrationEvent,
        H: IntegrationEventHandler<E>,
    {
        self.find(Self::event_key::<E>(), &HandlerKey::of::<H>(), false)
    }

    /// Whether `H` is registered as a dynamic handler for the event name.
    pub fn contains_dynamic_subscription<H: DynamicEventHandler>(&self, event_name: &str) -> bool {
        self.find(event_name, &HandlerKey::of::<H>(), true)
    }

    fn find(&self, event_name: &str, handler: &HandlerKey, dynamic: bool) -> bool {
        self.handlers.get(event_name).is_some_and(|subs| {
            subs.iter()
                .any(|s| s.handler() == handler && s.is_dynamic() == dynamic)
        })
    }

    /// Number of typed registrations for an event name. Broker filter
    /// rules exist exactly while this is non-zero.
    pub fn typed_handler_count(&self, event_name: &str) -> usize {
        self.handlers
            .get(event_name)
            .map_or(0, |subs| subs.iter().filter(|s| !s.is_dynamic()).count())
    }

    /// All registrations (typed and dynamic) for an event name.
    pub fn handlers_for_event(&self, event_name: &str) -> Vec<SubscriptionInfo> {
        self.handlers.get(event_name).cloned().unwrap_or_default()
    }

    /// Number of registrations for an event name.
    pub fn handler_count(&self, event_name: &str) -> usize {
        self.handlers.get(event_name).map_or(0, Vec::len)
    }

    /// The payload type bound to a typed event name.
    pub fn event_type_by_name(&self, event_name: &str) -> Option<EventTypeInfo> {
        self.event_types.get(event_name).copied()
    }

    /// All event names with at least one registration.
    pub fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }
}
