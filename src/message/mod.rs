//! Wire envelope and the codec that maps events onto it.
//!
//! ```text
//! OrderPlaced { id: "abc" }
//!        │ MessageCodec::encode
//!        ▼
//! Message { message_id: <uuid>, label: "OrderPlaced",
//!           body: b"{\"id\":\"abc\"}", time_to_live: 24h }
//! ```

mod codec;
mod message;

pub use codec::MessageCodec;
pub use message::Message;
