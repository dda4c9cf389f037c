//! Bus configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::BusError;

/// What the dispatcher does when the resolver has no instance for a
/// registered handler type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingHandlerPolicy {
    /// Skip the handler and keep going (the message can still complete).
    #[default]
    Lenient,
    /// Fail the message with `BusError::HandlerResolution`.
    Strict,
}

/// Options recognised by the bus.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```ignore
/// let options = BusOptions::from_json(r#"{ "time_to_live_hours": 2 }"#)?;
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusOptions {
    /// TTL applied to every published message, in hours.
    pub time_to_live_hours: u64,
    /// Concurrent in-flight messages on the topic listener.
    pub topic_max_concurrent_calls: usize,
    /// Concurrent in-flight messages on the queue listener. Keep at 1 to
    /// process the queue in order.
    pub queue_max_concurrent_calls: usize,
    /// Behaviour when a registered handler cannot be resolved.
    pub missing_handler: MissingHandlerPolicy,
    /// How long an idle receive loop waits before polling again.
    pub receive_poll_interval_ms: u64,
    /// Name of this endpoint, used in error logs.
    pub endpoint: String,
}

impl Default for BusOptions {
    fn default() -> Self {
        Self {
            time_to_live_hours: 24,
            topic_max_concurrent_calls: 10,
            queue_max_concurrent_calls: 1,
            missing_handler: MissingHandlerPolicy::Lenient,
            receive_poll_interval_ms: 50,
            endpoint: "busline".to_string(),
        }
    }
}

impl BusOptions {
    pub const ENV_PREFIX: &'static str = "BUSLINE_";

    /// Parse options from a JSON document; missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, BusError> {
        serde_json::from_str(json).map_err(|e| BusError::Configuration(format!("invalid bus options: {}", e)))
    }

    /// Read options from `BUSLINE_*` environment variables.
    ///
    /// Unset variables keep their defaults; unparsable values are logged
    /// and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading from an arbitrary lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = Self::default();
        let var = |name: &str| lookup(&format!("{}{}", Self::ENV_PREFIX, name));

        if let Some(v) = parse_var(&var, "TIME_TO_LIVE_HOURS") {
            options.time_to_live_hours = v;
        }
        if let Some(v) = parse_var(&var, "TOPIC_MAX_CONCURRENT_CALLS") {
            options.topic_max_concurrent_calls = v;
        }
        if let Some(v) = parse_var(&var, "QUEUE_MAX_CONCURRENT_CALLS") {
            options.queue_max_concurrent_calls = v;
        }
        if let Some(v) = parse_var(&var, "RECEIVE_POLL_INTERVAL_MS") {
            options.receive_poll_interval_ms = v;
        }
        if let Some(v) = var("MISSING_HANDLER") {
            match v.to_ascii_lowercase().as_str() {
                "lenient" => options.missing_handler = MissingHandlerPolicy::Lenient,
                "strict" => options.missing_handler = MissingHandlerPolicy::Strict,
                other => warn!(value = other, "ignoring unknown BUSLINE_MISSING_HANDLER"),
            }
        }
        if let Some(v) = var("ENDPOINT") {
            options.endpoint = v;
        }

        options
    }

    /// TTL as a duration.
    pub fn time_to_live(&self) -> Duration {
        Duration::from_secs(self.time_to_live_hours.saturating_mul(3600))
    }

    pub fn receive_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receive_poll_interval_ms)
    }
}

fn parse_var<T, F>(var: &F, name: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = var(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = name, value = %raw, "ignoring unparsable bus option");
            None
        }
    }
}
