use thiserror::Error;

/// Errors reported by a broker client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// A rule with this name already exists on the subscription.
    #[error("rule `{0}` already exists")]
    RuleAlreadyExists(String),
    /// No rule with this name exists on the subscription.
    #[error("rule `{0}` not found")]
    RuleNotFound(String),
    /// The lock token is unknown or the lock has already been released.
    #[error("message lock lost for token {0}")]
    MessageLockLost(String),
    /// The entity was closed and accepts no more work.
    #[error("entity {0} is closed")]
    EntityClosed(String),
    /// Any other transport failure.
    #[error("transport error: {0}")]
    Transport(String),
}

impl BrokerError {
    /// True when the broker reported a rule conflict or a missing rule.
    pub fn is_rule_state(&self) -> bool {
        matches!(
            self,
            BrokerError::RuleAlreadyExists(_) | BrokerError::RuleNotFound(_)
        )
    }
}
