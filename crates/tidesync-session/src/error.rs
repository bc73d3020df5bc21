//! Error types for the session layer.

use tidesync_protocol::{MessageMark, ProtocolError};

use crate::SessionId;

/// Errors a [`Session`](crate::Session) returns instead of replying itself.
///
/// Authorization failures are not errors: the session answers those with
/// a `403` directly. What lands here is reported by the router as a
/// `400` to the sender only.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The message type has no transition in the current state, e.g. a
    /// second join handshake on a bound connection.
    #[error("unexpected message {0}")]
    UnexpectedMessage(MessageMark),

    /// The payload could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The session has finished and accepts no more players.
    #[error("session {0} has finished")]
    Finished(SessionId),
}
