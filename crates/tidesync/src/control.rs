//! Administrative control plane.
//!
//! Hosting tools do not talk the game protocol. They launch sessions,
//! pre-authorize players, and stop the server through a
//! [`ControlPlane`], which forwards each call to the router actor.
//! Exposing it over RPC or HTTP is left to the embedding binary.

use serde::{Deserialize, Serialize};
use tidesync_router::RouterHandle;
use tidesync_session::{PlayerId, SessionId, SessionSummary};
use tokio::sync::watch;

use crate::ControlError;

/// What a host receives after launching a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: SessionId,
    /// The secret that lets one connection claim the Source-of-Truth role.
    pub source_of_truth_key: String,
}

/// Cloneable handle for administrative operations.
#[derive(Clone)]
pub struct ControlPlane {
    router: RouterHandle,
    shutdown: watch::Sender<bool>,
}

impl ControlPlane {
    pub(crate) fn new(router: RouterHandle, shutdown: watch::Sender<bool>) -> Self {
        Self { router, shutdown }
    }

    /// Creates a session hosted by `host_id`.
    ///
    /// # Errors
    /// [`ControlError::AlreadyHosted`] if the host already runs a live
    /// session; [`ControlError::Unavailable`] after shutdown.
    pub async fn launch(
        &self,
        host_id: impl Into<PlayerId>,
    ) -> Result<SessionInfo, ControlError> {
        let ticket = self.router.create(host_id.into()).await?;
        Ok(SessionInfo {
            session_id: ticket.session_id,
            source_of_truth_key: ticket.sot_key,
        })
    }

    /// Allows `player_id` to join `session_id`. `Ok(false)` if the session
    /// does not exist.
    pub async fn welcome(
        &self,
        session_id: SessionId,
        player_id: impl Into<PlayerId>,
    ) -> Result<bool, ControlError> {
        Ok(self.router.welcome(session_id, player_id.into()).await?)
    }

    /// Lists every live session.
    pub async fn sessions(&self) -> Result<Vec<SessionSummary>, ControlError> {
        Ok(self.router.sessions().await?)
    }

    /// Stops accepting connections, closes open ones and stops the router.
    pub async fn shutdown(&self) {
        tracing::info!("shutdown requested");
        self.shutdown.send_replace(true);
        // Already stopped is fine.
        let _ = self.router.shutdown().await;
    }
}
