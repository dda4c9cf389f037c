//! Message dispatch and the completion protocol.
//!
//! ```text
//! Received ──► Decoded ──► Dispatched ──► Completed ──► CompletedEvent
//!    │            │             │
//!    │            └─ no subscribers ──► Completed
//!    └────────────┴─────────────┴─► Failed (message stays locked, broker redelivers)
//! ```

mod engine;

pub use engine::{DispatchEngine, DispatchOutcome, MessageOrigin};
