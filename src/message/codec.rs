//! JSON codec between integration events and broker messages.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use super::Message;
use crate::config::BusOptions;
use crate::error::BusError;
use crate::event::IntegrationEvent;

/// Encodes events into messages and decodes message bodies back.
///
/// Bodies are UTF-8 JSON. Decoding ignores fields the target type does not
/// declare, so producers may add fields without breaking consumers.
#[derive(Clone, Debug)]
pub struct MessageCodec {
    time_to_live: Duration,
}

impl MessageCodec {
    /// Create a codec stamping every message with the given TTL.
    pub fn new(time_to_live: Duration) -> Self {
        Self { time_to_live }
    }

    pub fn from_options(options: &BusOptions) -> Self {
        Self::new(options.time_to_live())
    }

    pub fn time_to_live(&self) -> Duration {
        self.time_to_live
    }

    /// Build a message for `event`: fresh id, label = event name, JSON body.
    pub fn encode<E: IntegrationEvent>(&self, event: &E) -> Result<Message, BusError> {
        let body = serde_json::to_vec(event).map_err(|e| BusError::Encode {
            event_name: E::NAME.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Message::new(Uuid::new_v4().to_string(), E::NAME, body).with_time_to_live(self.time_to_live))
    }

    /// Decode the message body into `E`.
    pub fn decode<E: DeserializeOwned>(&self, message: &Message) -> Result<E, BusError> {
        serde_json::from_slice(&message.body).map_err(|e| decode_error(message, e))
    }

    /// Decode the message body into an untyped JSON value.
    pub fn decode_value(&self, message: &Message) -> Result<Value, BusError> {
        self.decode::<Value>(message)
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::from_options(&BusOptions::default())
    }
}

fn decode_error(message: &Message, err: serde_json::Error) -> BusError {
    BusError::Decode {
        event_name: message.label.clone(),
        reason: err.to_string(),
    }
}
