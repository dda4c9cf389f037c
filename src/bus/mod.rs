//! Event bus facade.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    EventBus (per service)                   │
//! │  publish_to_topic / publish_to_queue                        │
//! │  subscribe / unsubscribe / subscribe_dynamic                │
//! │  register_topic_listener / register_queue_listener          │
//! └─────────────────────────────────────────────────────────────┘
//!          │                  │                     │
//!          ▼                  ▼                     ▼
//! ┌──────────────┐  ┌──────────────────────┐  ┌────────────────┐
//! │EventPublisher│  │SubscriptionController│  │ DispatchEngine │
//! └──────────────┘  └──────────────────────┘  └────────────────┘
//!          │                  │                     │
//!          │                  └──► SubscriptionRegistry ◄──┘
//!          ▼                                        ▲
//! ┌─────────────────────────────────────────────────────────────┐
//! │        MessageSender / RuleManager / MessageReceiver        │
//! │        (InMemoryTopic, InMemoryQueue, or a real broker)     │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod bus;
mod builder;
mod listener;

pub use builder::EventBusBuilder;
pub use bus::EventBus;
pub use listener::{ListenerHandle, ListenerStats};
