//! Turns a received message into handler invocations.

use std::sync::{Arc, RwLock};

use tracing::{debug, trace, warn};

use crate::broker::{CancellationSignal, MessageCallback, MessageReceiver};
use crate::config::MissingHandlerPolicy;
use crate::error::BusError;
use crate::event::{CompletedEvent, IntegrationEvent};
use crate::handler::HandlerResolver;
use crate::message::{Message, MessageCodec};
use crate::publisher::EventPublisher;
use crate::registry::{Invocation, InvocationContext, SubscriptionInfo, SubscriptionRegistry};

/// Where a message was received from. A `CompletedEvent` goes back the
/// same way.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageOrigin {
    Topic,
    Queue,
}

/// Result of processing one message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Nobody subscribes to the label. The message is still completed.
    NoSubscribers,
    /// Every registration ran. `skipped` counts handlers the resolver did
    /// not provide under the lenient policy.
    Handled { handlers: usize, skipped: usize },
}

/// Registrations captured under one registry read.
struct Snapshot {
    handlers: Vec<SubscriptionInfo>,
    typed: bool,
}

/// Per-message pipeline: look up registrations, resolve and invoke every
/// handler inside one resolution scope, complete the message, then
/// announce completion.
///
/// A failure anywhere before completion returns the error and leaves the
/// message locked; the receive loop hands it back to the broker.
pub struct DispatchEngine {
    registry: Arc<RwLock<SubscriptionRegistry>>,
    resolver: Arc<dyn HandlerResolver>,
    codec: MessageCodec,
    publisher: EventPublisher,
    policy: MissingHandlerPolicy,
}

impl DispatchEngine {
    pub fn new(
        registry: Arc<RwLock<SubscriptionRegistry>>,
        resolver: Arc<dyn HandlerResolver>,
        publisher: EventPublisher,
        policy: MissingHandlerPolicy,
    ) -> Self {
        Self {
            registry,
            resolver,
            codec: publisher.codec().clone(),
            publisher,
            policy,
        }
    }

    /// Invoke every handler registered for the message label.
    ///
    /// Does not complete the message. The resolution scope opened here is
    /// dropped before returning, whatever the result.
    pub fn process(
        &self,
        message: &Message,
        signal: &CancellationSignal,
    ) -> Result<DispatchOutcome, BusError> {
        let snapshot = self.snapshot(&message.label)?;
        self.invoke_all(message, signal, &snapshot.handlers)
    }

    /// Full pipeline for a received message: process, complete, then
    /// publish a `CompletedEvent` back to `origin` if the message carries an
    /// identifier and its event type is known.
    pub fn handle_message(
        &self,
        receiver: &dyn MessageReceiver,
        origin: MessageOrigin,
        message: &Message,
        signal: &CancellationSignal,
    ) -> Result<DispatchOutcome, BusError> {
        let snapshot = self.snapshot(&message.label)?;
        let outcome = self.invoke_all(message, signal, &snapshot.handlers)?;

        let lock_token = message
            .lock_token()
            .ok_or_else(|| crate::broker::BrokerError::MessageLockLost(message.message_id.clone()))?;
        receiver.complete(lock_token)?;
        debug!(
            message_id = %message.message_id,
            event_name = %message.label,
            entity_path = receiver.entity_path(),
            "message completed"
        );

        if snapshot.typed && message.label != CompletedEvent::NAME {
            self.announce_completion(origin, message);
        }
        Ok(outcome)
    }

    /// Wrap the pipeline as a receive-loop callback.
    pub fn callback(self: &Arc<Self>, receiver: Arc<dyn MessageReceiver>, origin: MessageOrigin) -> MessageCallback {
        let engine = Arc::clone(self);
        Arc::new(move |message: &Message, signal: &CancellationSignal| {
            engine
                .handle_message(receiver.as_ref(), origin, message, signal)
                .map(|_| ())
        })
    }

    fn snapshot(&self, event_name: &str) -> Result<Snapshot, BusError> {
        let registry = self
            .registry
            .read()
            .map_err(|_| BusError::LockPoisoned("dispatch"))?;
        Ok(Snapshot {
            handlers: registry.handlers_for_event(event_name),
            typed: registry.event_type_by_name(event_name).is_some(),
        })
    }

    fn invoke_all(
        &self,
        message: &Message,
        signal: &CancellationSignal,
        handlers: &[SubscriptionInfo],
    ) -> Result<DispatchOutcome, BusError> {
        if handlers.is_empty() {
            debug!(event_name = %message.label, message_id = %message.message_id, "no subscribers");
            return Ok(DispatchOutcome::NoSubscribers);
        }

        let scope = self.resolver.create_scope();
        let ctx = InvocationContext {
            scope: scope.as_ref(),
            message,
            codec: &self.codec,
        };

        let mut skipped = 0;
        for subscription in handlers {
            if signal.is_cancelled() {
                return Err(BusError::Cancelled {
                    message_id: message.message_id.clone(),
                });
            }

            trace!(
                event_name = %message.label,
                handler = subscription.handler().name(),
                "invoking handler"
            );
            match subscription.invoke(&ctx)? {
                Invocation::Invoked => {}
                Invocation::Unresolved => match self.policy {
                    MissingHandlerPolicy::Strict => {
                        return Err(BusError::HandlerResolution {
                            event_name: message.label.clone(),
                            handler: subscription.handler().name(),
                        });
                    }
                    MissingHandlerPolicy::Lenient => {
                        warn!(
                            event_name = %message.label,
                            handler = subscription.handler().name(),
                            "handler not resolved, skipping"
                        );
                        skipped += 1;
                    }
                },
            }
        }

        Ok(DispatchOutcome::Handled {
            handlers: handlers.len() - skipped,
            skipped,
        })
    }

    fn announce_completion(&self, origin: MessageOrigin, message: &Message) {
        let Some(id) = CompletedEvent::identifier_of(&message.body) else {
            trace!(message_id = %message.message_id, "no identifier, completion not announced");
            return;
        };

        let completed = CompletedEvent::new(id);
        let published = match origin {
            MessageOrigin::Topic => self.publisher.publish_to_topic(&completed, None),
            MessageOrigin::Queue => self.publisher.publish_to_queue(&completed, None),
        };
        if let Err(err) = published {
            warn!(
                message_id = %message.message_id,
                event_name = %message.label,
                error = %err,
                "failed to publish CompletedEvent"
            );
        }
    }
}
