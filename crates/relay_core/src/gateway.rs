//! Boundary to the chat platform the relay listens on.

use crate::relay::Invocation;
use async_trait::async_trait;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("chat gateway is closed")]
    Closed,

    #[error("chat gateway I/O error: {0}")]
    Io(#[from] io::Error),
}

/// A source of invocations and a sink for replies.
///
/// `next_invocation` is polled inside `tokio::select!` alongside in-flight
/// handlers, so it must be cancel-safe: dropping the future before it
/// completes must not lose a message.
#[async_trait]
pub trait ChatGateway: Send {
    /// The next relay command, or `None` once the platform has gone away.
    async fn next_invocation(&mut self) -> Option<Invocation>;

    /// Sends `text` back to where `reply_to` came from.
    async fn reply(&mut self, reply_to: &Invocation, text: &str) -> Result<(), GatewayError>;
}
