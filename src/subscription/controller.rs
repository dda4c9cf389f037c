//! Keeps broker filter rules in step with the subscription registry.

use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, info, warn};

use crate::broker::{BrokerError, RuleDescription, RuleManager, DEFAULT_RULE_NAME};
use crate::error::BusError;
use crate::event::IntegrationEvent;
use crate::handler::{DynamicEventHandler, IntegrationEventHandler};
use crate::registry::{Removal, SubscriptionRegistry};

/// Applies subscribe/unsubscribe requests to the registry and, for typed
/// topic subscriptions, to the broker's filter rules.
///
/// A rule named after the event exists while at least one typed handler is
/// registered for it. The rule is created before the first registration
/// and removed together with the last one. A broker failure leaves the
/// registry untouched.
///
/// Writes are serialized by an internal mutex. The registry lock is only
/// held for the mutation itself, so dispatch keeps reading while a rule
/// call is in flight.
pub struct SubscriptionController {
    registry: Arc<RwLock<SubscriptionRegistry>>,
    rules: Option<Arc<dyn RuleManager>>,
    writes: Mutex<()>,
}

impl SubscriptionController {
    pub fn new(registry: Arc<RwLock<SubscriptionRegistry>>, rules: Option<Arc<dyn RuleManager>>) -> Self {
        Self {
            registry,
            rules,
            writes: Mutex::new(()),
        }
    }

    /// Register `H` for `E`, adding the broker rule for `E` first if this
    /// is the first typed handler.
    pub fn subscribe<E, H>(&self) -> Result<(), BusError>
    where
        E: IntegrationEvent,
        H: IntegrationEventHandler<E>,
    {
        let _writes = self.writes.lock().map_err(|_| BusError::LockPoisoned("subscribe"))?;
        let name = E::NAME;

        let needs_rule = {
            let registry = self.read("subscribe")?;
            if registry.contains_subscription::<E, H>() {
                return Err(BusError::AlreadyRegistered {
                    event_name: name.to_string(),
                    handler: std::any::type_name::<H>(),
                });
            }
            registry.typed_handler_count(name) == 0
        };

        let rule_added = match (&self.rules, needs_rule) {
            (Some(rules), true) => {
                rules
                    .add_rule(RuleDescription::for_event(name))
                    .map_err(|source| broker_state(name, source))?;
                info!(event_name = name, "filter rule added");
                Some(rules)
            }
            _ => None,
        };

        let added = self.write("subscribe")?.add_subscription::<E, H>();
        if let (Err(err), Some(rules)) = (&added, rule_added) {
            warn!(event_name = name, error = %err, "registration failed, removing filter rule");
            if let Err(rollback) = rules.remove_rule(name) {
                warn!(event_name = name, error = %rollback, "filter rule rollback failed");
            }
        }
        added
    }

    /// Remove `H` from `E`. The broker rule goes away with the last typed
    /// handler; if that fails the registration is kept.
    pub fn unsubscribe<E, H>(&self) -> Result<Removal, BusError>
    where
        E: IntegrationEvent,
        H: IntegrationEventHandler<E>,
    {
        let _writes = self.writes.lock().map_err(|_| BusError::LockPoisoned("unsubscribe"))?;
        let name = E::NAME;

        let last_typed = {
            let registry = self.read("unsubscribe")?;
            if !registry.contains_subscription::<E, H>() {
                return Err(BusError::NotSubscribed {
                    event_name: name.to_string(),
                    handler: std::any::type_name::<H>(),
                });
            }
            registry.typed_handler_count(name) == 1
        };

        if let (Some(rules), true) = (&self.rules, last_typed) {
            rules
                .remove_rule(name)
                .map_err(|source| broker_state(name, source))?;
            info!(event_name = name, "filter rule removed");
        }

        self.write("unsubscribe")?.remove_subscription::<E, H>()
    }

    /// Register a dynamic handler. Broker rules are not involved.
    pub fn subscribe_dynamic<H: DynamicEventHandler>(&self, event_name: &str) -> Result<(), BusError> {
        let _writes = self.writes.lock().map_err(|_| BusError::LockPoisoned("subscribe_dynamic"))?;
        self.write("subscribe_dynamic")?.add_dynamic_subscription::<H>(event_name)
    }

    pub fn unsubscribe_dynamic<H: DynamicEventHandler>(&self, event_name: &str) -> Result<Removal, BusError> {
        let _writes = self.writes.lock().map_err(|_| BusError::LockPoisoned("unsubscribe_dynamic"))?;
        self.write("unsubscribe_dynamic")?.remove_dynamic_subscription::<H>(event_name)
    }

    /// Remove the broker's catch-all rule so the subscription only receives
    /// events somebody subscribed to. A missing default rule is expected
    /// after the first start and is not an error.
    pub fn remove_default_rule(&self) -> Result<(), BusError> {
        let Some(rules) = &self.rules else {
            return Ok(());
        };

        match rules.remove_rule(DEFAULT_RULE_NAME) {
            Ok(()) => {
                info!(rule = DEFAULT_RULE_NAME, "default filter rule removed");
                Ok(())
            }
            Err(BrokerError::RuleNotFound(_)) => {
                debug!(rule = DEFAULT_RULE_NAME, "default filter rule already absent");
                Ok(())
            }
            Err(source) => Err(broker_state(DEFAULT_RULE_NAME, source)),
        }
    }

    fn read(
        &self,
        operation: &'static str,
    ) -> Result<std::sync::RwLockReadGuard<'_, SubscriptionRegistry>, BusError> {
        self.registry.read().map_err(|_| BusError::LockPoisoned(operation))
    }

    fn write(
        &self,
        operation: &'static str,
    ) -> Result<std::sync::RwLockWriteGuard<'_, SubscriptionRegistry>, BusError> {
        self.registry.write().map_err(|_| BusError::LockPoisoned(operation))
    }
}

/// Rule conflicts become `BrokerState`; anything else is a plain broker failure.
fn broker_state(name: &str, source: BrokerError) -> BusError {
    if source.is_rule_state() {
        BusError::BrokerState {
            name: name.to_string(),
            source,
        }
    } else {
        BusError::Broker(source)
    }
}
