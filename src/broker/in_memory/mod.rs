//! In-process broker for tests and single-process deployments.
//!
//! Implements the broker traits with the same observable behaviour the bus
//! relies on from a real broker: label filter rules on topic
//! subscriptions, peek-lock receive with explicit completion, redelivery
//! of abandoned messages and dead-lettering after too many attempts.
//! Completed messages are only counted unless retention is switched on
//! with `with_retention`.
//!
//! ```text
//! InMemoryTopic ──send──► [rules] ─► InMemorySubscription ─► InMemoryQueue
//!                         [rules] ─► InMemorySubscription ─► InMemoryQueue
//! InMemoryQueue ◄──send── (point-to-point)
//! ```

mod pump;
mod queue;
mod topic;

pub use queue::{InMemoryQueue, DEFAULT_MAX_DELIVERY_COUNT};
pub use topic::{InMemorySubscription, InMemoryTopic};
