//! Identity, configuration and bookkeeping types for sessions.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A player's stable identifier.
///
/// Unlike a [`ConnectionId`](tidesync_transport::ConnectionId), it survives
/// reconnection: a player who drops and comes back under the same id gets
/// their roster entry back.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for PlayerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// The code clients use to address a session in their join handshake.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SessionId(pub i32);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Per-session rules shared by every session a router creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// How long a disconnected player keeps their roster entry.
    ///
    /// Default: 30 seconds.
    pub disconnection_timeout: Duration,

    /// Whether players other than the Source-of-Truth may send updates.
    ///
    /// Default: `false`.
    pub allow_not_sot_updates: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            disconnection_timeout: Duration::from_secs(30),
            allow_not_sot_updates: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Grace-period bookkeeping
// ---------------------------------------------------------------------------

/// A removal to re-check once the grace period runs out.
///
/// Returned by [`Session::disconnect`](crate::Session::disconnect). The
/// owner schedules it and hands it back to
/// [`Session::expire`](crate::Session::expire) after `delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRemoval {
    pub session_id: SessionId,
    pub player_id: PlayerId,
    /// Which disconnect this removal belongs to. A later disconnect of
    /// the same player gets a new value and its own full grace period.
    pub disconnect_seq: u64,
    pub delay: Duration,
}

/// Outcome of a grace-period expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// The player reconnected (or was already gone). Nothing changed.
    Retained,
    /// The player was removed and others remain.
    Removed,
    /// The player was the last one. The session is now finished.
    Finished,
}

/// A read-only view of a session, for operators and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub host_id: PlayerId,
    /// Roster in join order, connected or not.
    pub players: Vec<PlayerId>,
    /// How many roster entries have a live connection.
    pub connected: usize,
    pub running: bool,
}
