//! Event bus integration tests, driven through the in-memory broker.


mod completion;
mod derive;
mod listeners;
mod properties;
mod subscriptions;
