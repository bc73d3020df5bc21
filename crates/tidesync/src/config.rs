//! Server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tidesync_session::SessionConfig;

/// Everything [`TidesyncServerBuilder`](crate::TidesyncServerBuilder)
/// needs to start a server. Defaults suit a local development server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    ///
    /// Default: `127.0.0.1:8766`.
    pub bind_addr: String,

    /// Connections beyond this many are closed right after accept.
    ///
    /// Default: 100.
    pub max_connections: usize,

    /// A connection that sends nothing for this long, not even a pong, is
    /// dropped and handled as a disconnect.
    ///
    /// Default: 15 seconds.
    pub idle_timeout: Duration,

    /// How often each connection is pinged. Keep it well under
    /// `idle_timeout` so listen-only clients answer in time.
    ///
    /// Default: 5 seconds.
    pub heartbeat_interval: Duration,

    /// Longest a client may take to finish the WebSocket upgrade.
    ///
    /// Default: 10 seconds.
    pub handshake_timeout: Duration,

    /// Capacity of the router's command queue.
    ///
    /// Default: 256.
    pub channel_size: usize,

    /// Rules applied to every session.
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8766".to_string(),
            max_connections: 100,
            idle_timeout: Duration::from_secs(15),
            heartbeat_interval: Duration::from_secs(5),
            handshake_timeout: Duration::from_secs(10),
            channel_size: 256,
            session: SessionConfig::default(),
        }
    }
}
