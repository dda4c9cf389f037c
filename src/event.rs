//! Integration events, the payload types that travel over the bus.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A payload type that can be published and subscribed to by name.
///
/// The name is the routing key: it becomes the message label and the
/// name of the broker filter rule. Derive it to use the type's own
/// identifier, or override it:
///
/// ```ignore
/// #[derive(Serialize, Deserialize, IntegrationEvent)]
/// #[event(name = "order.placed")]
/// struct OrderPlaced {
///     id: String,
/// }
/// ```
pub trait IntegrationEvent: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Unique event name, shared by typed and dynamic subscriptions.
    const NAME: &'static str;

    /// The event name, usable where a value is more convenient than a const.
    fn event_name() -> &'static str {
        Self::NAME
    }
}

/// Sentinel event published after a message has been fully processed.
///
/// Carries the `id` of the originating event so the producer can learn that
/// its message went through. Processing a `CompletedEvent` never produces
/// another one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedEvent {
    pub id: String,
}

impl CompletedEvent {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Read the originating identifier from a raw JSON body.
    ///
    /// Accepts a top-level `id` that is a non-empty string or an integer.
    /// Anything else yields `None`.
    pub fn identifier_of(body: &[u8]) -> Option<String> {
        let value: Value = serde_json::from_slice(body).ok()?;
        match value.get("id")? {
            Value::String(id) if !id.trim().is_empty() => Some(id.clone()),
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
            _ => None,
        }
    }
}

impl IntegrationEvent for CompletedEvent {
    const NAME: &'static str = "CompletedEvent";
}
