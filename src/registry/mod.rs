//! Subscription bookkeeping: which handlers want which event names.

mod registry;
mod subscription;

pub use registry::{Removal, SubscriptionRegistry};
pub use subscription::{EventTypeInfo, SubscriptionInfo};
pub(crate) use subscription::{Invocation, InvocationContext};
