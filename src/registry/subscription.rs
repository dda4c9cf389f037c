//! Registered subscriptions and their pre-built invokers.

use std::any::{type_name, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::error::BusError;
use crate::event::IntegrationEvent;
use crate::handler::{
    resolve_as, DynamicEventHandler, HandlerKey, IntegrationEventHandler, ResolutionScope,
};
use crate::message::{Message, MessageCodec};

/// Everything an invoker needs to run one handler for one message.
pub(crate) struct InvocationContext<'a> {
    pub scope: &'a dyn ResolutionScope,
    pub message: &'a Message,
    pub codec: &'a MessageCodec,
}

/// What happened when an invoker ran.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Invocation {
    /// The handler was resolved and returned successfully.
    Invoked,
    /// The resolver had no instance for the handler type.
    Unresolved,
}

type Invoker = Arc<dyn Fn(&InvocationContext<'_>) -> Result<Invocation, BusError> + Send + Sync>;

/// One (event name, handler type) registration.
///
/// The invoker is built when the subscription is made: it already knows the
/// concrete payload type to decode into and the handler type to resolve,
/// so dispatch needs no runtime type lookup.
#[derive(Clone)]
pub struct SubscriptionInfo {
    handler: HandlerKey,
    dynamic: bool,
    invoker: Invoker,
}

impl SubscriptionInfo {
    pub(crate) fn typed<E, H>() -> Self
    where
        E: IntegrationEvent,
        H: IntegrationEventHandler<E>,
    {
        let invoker: Invoker = Arc::new(|ctx: &InvocationContext<'_>| {
            let Some(handler) = resolve_as::<H>(ctx.scope) else {
                return Ok(Invocation::Unresolved);
            };
            let event: E = ctx.codec.decode(ctx.message)?;
            handler
                .handle(event)
                .map_err(|source| BusError::HandlerInvocation {
                    event_name: ctx.message.label.clone(),
                    handler: type_name::<H>(),
                    source,
                })?;
            Ok(Invocation::Invoked)
        });

        Self {
            handler: HandlerKey::of::<H>(),
            dynamic: false,
            invoker,
        }
    }

    pub(crate) fn dynamic<H>() -> Self
    where
        H: DynamicEventHandler,
    {
        let invoker: Invoker = Arc::new(|ctx: &InvocationContext<'_>| {
            let Some(handler) = resolve_as::<H>(ctx.scope) else {
                return Ok(Invocation::Unresolved);
            };
            let event = ctx.codec.decode_value(ctx.message)?;
            handler
                .handle(event)
                .map_err(|source| BusError::HandlerInvocation {
                    event_name: ctx.message.label.clone(),
                    handler: type_name::<H>(),
                    source,
                })?;
            Ok(Invocation::Invoked)
        });

        Self {
            handler: HandlerKey::of::<H>(),
            dynamic: true,
            invoker,
        }
    }

    /// The handler type this registration resolves.
    pub fn handler(&self) -> &HandlerKey {
        &self.handler
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    pub(crate) fn invoke(&self, ctx: &InvocationContext<'_>) -> Result<Invocation, BusError> {
        (self.invoker)(ctx)
    }
}

impl fmt::Debug for SubscriptionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionInfo")
            .field("handler", &self.handler)
            .field("dynamic", &self.dynamic)
            .finish()
    }
}

/// The concrete payload type bound to a typed event name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventTypeInfo {
    pub name: &'static str,
    pub type_id: TypeId,
    pub type_name: &'static str,
}

impl EventTypeInfo {
    pub fn of<E: IntegrationEvent>() -> Self {
        Self {
            name: E::NAME,
            type_id: TypeId::of::<E>(),
            type_name: type_name::<E>(),
        }
    }

    pub fn is<E: IntegrationEvent>(&self) -> bool {
        self.type_id == TypeId::of::<E>()
    }
}
