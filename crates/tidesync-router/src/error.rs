//! Error types for the router layer.

use tidesync_session::PlayerId;

/// Errors that can occur during router operations.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// The player already hosts a live session.
    #[error("player {0} already hosts a session")]
    AlreadyHosted(PlayerId),

    /// The router actor's command channel is closed.
    #[error("router is unavailable")]
    Unavailable,
}
