//! Subscription filter rules.

/// Name of the catch-all rule a new topic subscription starts with.
pub const DEFAULT_RULE_NAME: &str = "$Default";

/// Predicate deciding which topic messages reach a subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuleFilter {
    /// Matches every message.
    True,
    /// Matches messages whose label equals the value.
    Label(String),
}

impl RuleFilter {
    pub fn matches(&self, label: &str) -> bool {
        match self {
            RuleFilter::True => true,
            RuleFilter::Label(expected) => expected == label,
        }
    }
}

/// A named filter rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleDescription {
    pub name: String,
    pub filter: RuleFilter,
}

impl RuleDescription {
    pub fn new(name: impl Into<String>, filter: RuleFilter) -> Self {
        Self {
            name: name.into(),
            filter,
        }
    }

    /// Rule named after an event, matching messages labelled with it.
    pub fn for_event(event_name: &str) -> Self {
        Self::new(event_name, RuleFilter::Label(event_name.to_string()))
    }

    /// The catch-all rule.
    pub fn default_rule() -> Self {
        Self::new(DEFAULT_RULE_NAME, RuleFilter::True)
    }
}
