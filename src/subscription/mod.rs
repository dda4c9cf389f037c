//! Subscribe/unsubscribe with broker filter-rule synchronization.

mod controller;

pub use controller::SubscriptionController;
