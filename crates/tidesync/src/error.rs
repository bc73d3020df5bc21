//! Unified error types for the Tidesync framework.

use tidesync_router::RouterError;
use tidesync_session::PlayerId;
use tidesync_transport::TransportError;

/// Error returned by the server itself: binding, accepting, and the
/// router going away under a live connection.
///
/// Protocol and session errors never get here; the router turns them
/// into error replies.
#[derive(Debug, thiserror::Error)]
pub enum TidesyncError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A router-level error (already hosted, router gone).
    #[error(transparent)]
    Router(#[from] RouterError),
}

/// Errors returned by the [`ControlPlane`](crate::ControlPlane).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControlError {
    /// The host already runs a live session. Callers are expected to
    /// handle this one specifically.
    #[error("player {0} already hosts a session")]
    AlreadyHosted(PlayerId),

    /// The server is shutting down or has stopped.
    #[error("server is unavailable")]
    Unavailable,
}

impl From<RouterError> for ControlError {
    fn from(err: RouterError) -> Self {
        match err {
            RouterError::AlreadyHosted(host_id) => Self::AlreadyHosted(host_id),
            RouterError::Unavailable => Self::Unavailable,
        }
    }
}
