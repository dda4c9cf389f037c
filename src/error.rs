use thiserror::Error;

use crate::broker::BrokerError;
use crate::handler::HandlerError;

/// Error type for every bus operation.
///
/// Configuration, broker-state and publish errors are returned synchronously
/// to the caller. Decode, resolution and handler errors raised while a
/// message is being dispatched end up in the listener's exception sink and
/// leave the message uncompleted.
#[derive(Debug, Error)]
pub enum BusError {
    /// A required connection (topic or queue) is not configured.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Broker-side routing state disagrees with what the bus expected
    /// (rule already exists / rule not found).
    #[error("broker state error for `{name}`: {source}")]
    BrokerState {
        name: String,
        #[source]
        source: BrokerError,
    },

    /// The message body could not be decoded into the requested type.
    #[error("failed to decode `{event_name}` message: {reason}")]
    Decode { event_name: String, reason: String },

    /// The event could not be serialized into a message body.
    #[error("failed to encode `{event_name}`: {reason}")]
    Encode { event_name: String, reason: String },

    /// Sending or scheduling a message on the broker failed.
    #[error("failed to publish `{event_name}` to {entity_path}: {source}")]
    Publish {
        event_name: String,
        entity_path: String,
        #[source]
        source: BrokerError,
    },

    /// A registered handler could not be resolved and the bus runs in strict mode.
    #[error("no handler instance resolved for {handler} (event `{event_name}`)")]
    HandlerResolution {
        event_name: String,
        handler: &'static str,
    },

    /// A handler body returned an error.
    #[error("handler {handler} failed for `{event_name}`: {source}")]
    HandlerInvocation {
        event_name: String,
        handler: &'static str,
        #[source]
        source: HandlerError,
    },

    /// The (event, handler) pair is already registered.
    #[error("handler {handler} already registered for `{event_name}`")]
    AlreadyRegistered {
        event_name: String,
        handler: &'static str,
    },

    /// The (event, handler) pair is not registered.
    #[error("handler {handler} is not subscribed to `{event_name}`")]
    NotSubscribed {
        event_name: String,
        handler: &'static str,
    },

    /// The receive loop cancelled the message before all handlers ran.
    #[error("processing of message {message_id} was cancelled")]
    Cancelled { message_id: String },

    /// The receive callback panicked while processing a message.
    #[error("callback panicked while processing message {message_id}: {reason}")]
    CallbackPanicked { message_id: String, reason: String },

    /// An internal lock was poisoned by a panicking thread.
    #[error("lock poisoned during {0}")]
    LockPoisoned(&'static str),

    /// Any other broker failure (completion, handler registration).
    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),
}

impl BusError {
    pub(crate) fn topic_not_configured() -> Self {
        BusError::Configuration("topic connection not configured".into())
    }

    pub(crate) fn queue_not_configured() -> Self {
        BusError::Configuration("queue connection not configured".into())
    }

    /// True for errors that mean the broker's rules and the registry disagree.
    pub fn is_broker_state(&self) -> bool {
        matches!(self, BusError::BrokerState { .. })
    }
}
