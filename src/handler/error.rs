use std::error::Error;

use thiserror::Error;

/// Error returned from a handler body.
///
/// Whatever a handler returns is carried verbatim inside
/// `BusError::HandlerInvocation`; the message stays uncompleted and the
/// broker decides whether to redeliver or dead-letter it.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Business logic rejected the event.
    #[error("rejected: {0}")]
    Rejected(String),
    /// The handler could not interpret the payload it was given.
    #[error("decode failed: {0}")]
    DecodeFailed(String),
    /// A resource the handler needs does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Any other error.
    #[error("handler error: {0}")]
    Other(#[source] Box<dyn Error + Send + Sync>),
}

impl HandlerError {
    /// Wrap an arbitrary error.
    pub fn other(err: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        HandlerError::Other(err.into())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::DecodeFailed(err.to_string())
    }
}
