//! Broker abstractions.
//!
//! The bus does not talk to a network; it talks to these traits. A broker
//! binding (or the bundled in-memory broker) implements them.
//!
//! ```text
//! ┌──────────────────┐   send / schedule_send    ┌──────────────────┐
//! │  EventPublisher  │ ────────────────────────► │  MessageSender   │
//! └──────────────────┘                           └──────────────────┘
//! ┌──────────────────┐   add_rule / remove_rule  ┌──────────────────┐
//! │ SubscriptionCtrl │ ────────────────────────► │   RuleManager    │
//! └──────────────────┘                           └──────────────────┘
//! ┌──────────────────┐   register_handler /      ┌──────────────────┐
//! │  DispatchEngine  │ ◄──────── complete ─────► │ MessageReceiver  │
//! └──────────────────┘                           └──────────────────┘
//! ```

mod client;
mod error;
pub mod in_memory;
mod receive;
mod rules;
mod signal;

pub use client::{MessageReceiver, MessageSender, QueueClient, RuleManager, SubscriptionClient};
pub use error::BrokerError;
pub use receive::{
    ExceptionReceivedContext, ExceptionSink, MessageCallback, ReceiveLoopHandle, ReceiveOptions,
    ReceiveStats,
};
pub use rules::{RuleDescription, RuleFilter, DEFAULT_RULE_NAME};
pub use signal::CancellationSignal;
