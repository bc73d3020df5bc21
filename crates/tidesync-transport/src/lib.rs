//! Transport abstraction layer for Tidesync.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! the underlying network library, the [`Packet`] frame every message
//! travels in, and the [`Peer`] handle the session layer uses to push
//! packets at a connection without awaiting delivery.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
mod packet;
mod peer;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use packet::{Delivery, Packet, FRAME_HEADER_LEN};
pub use peer::{Outbox, Peer};
#[cfg(feature = "websocket")]
pub use websocket::{
    PendingConnection, WebSocketConnection, WebSocketTransport,
};

use std::fmt;

/// Opaque identifier for a connection.
///
/// This is the transport's notion of identity. It is distinct from a
/// player's id, which survives reconnection while a `ConnectionId` does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// Gracefully shuts down the transport, stopping new connections.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// A single connection that exchanges [`Packet`]s.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends a packet over the reliable channel.
    async fn send(&self, packet: &Packet) -> Result<(), Self::Error>;

    /// Receives the next packet from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Packet>, Self::Error>;

    /// Sends a packet over an unreliable channel.
    ///
    /// Defaults to reliable send. Transports that support unreliable delivery
    /// should override this.
    async fn send_unreliable(
        &self,
        packet: &Packet,
    ) -> Result<(), Self::Error> {
        self.send(packet).await
    }

    /// Sends a packet on the channel its [`Delivery`] asks for.
    async fn deliver(&self, packet: &Packet) -> Result<(), Self::Error> {
        match packet.delivery {
            Delivery::Reliable => self.send(packet).await,
            Delivery::Unreliable => self.send_unreliable(packet).await,
        }
    }

    /// Sends a keep-alive probe. Transports with their own heartbeat
    /// leave this as a no-op.
    async fn ping(&self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
