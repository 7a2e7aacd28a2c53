use futures::future::BoxFuture;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::models::{CancelHandle, ConversationId};

/// One event from the completion backend, parsed into a closed variant at
/// the transport boundary — nothing downstream inspects raw payloads.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// One unit of incremental text for the current assistant reply.
    Increment(String),
    /// The server assigned a durable identity to a previously unbound
    /// conversation.
    BoundIdentity(String),
    /// Natural end of the reply.
    Done,
    /// Server-reported failure, delivered in-band.
    Error(String),
}

/// Failures raised by the transport itself.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum CompletionError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Type alias for completion event streams.
pub type EventStream = BoxStream<'static, Result<StreamEvent, CompletionError>>;

/// Abstract completion backend: one call opens one incremental exchange.
///
/// Implementations must stop yielding promptly once `cancel` trips. The
/// engine additionally filters by generation, so a single straggler event is
/// tolerated, but the stream must not keep delivering indefinitely.
pub trait CompletionClient: Send + Sync + 'static {
    fn open(
        &self,
        conversation: ConversationId,
        content: String,
        cancel: CancelHandle,
    ) -> BoxFuture<'static, Result<EventStream, CompletionError>>;
}
