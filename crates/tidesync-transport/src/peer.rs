//! Fire-and-forget handle for pushing packets at a connection.
//!
//! Sessions fan messages out to every connected player while handling a
//! single inbound event, so they must never await a slow socket. A [`Peer`]
//! is the sending half of an unbounded channel. The receiving half, the
//! [`Outbox`], is drained by a writer task owned by whoever holds the
//! actual connection.

use std::hash::{Hash, Hasher};

use tokio::sync::mpsc;

use crate::{ConnectionId, Packet};

/// Receiving half of a peer's packet channel.
pub type Outbox = mpsc::UnboundedReceiver<Packet>;

/// A cloneable handle to one live connection.
///
/// Equality and hashing go by [`ConnectionId`] only, so a `Peer` can be
/// used wherever the connection itself would be used as a key.
#[derive(Debug, Clone)]
pub struct Peer {
    id: ConnectionId,
    sender: mpsc::UnboundedSender<Packet>,
}

impl Peer {
    /// Creates a peer handle and the outbox that receives its packets.
    pub fn channel(id: ConnectionId) -> (Self, Outbox) {
        let (sender, outbox) = mpsc::unbounded_channel();
        (Self { id, sender }, outbox)
    }

    /// Returns the connection this peer writes to.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queues a packet for delivery.
    ///
    /// Returns `false` if the connection's writer is gone. Callers treat
    /// that as a dropped message, not an error: the disconnect event for
    /// that connection is already on its way.
    pub fn send(&self, packet: Packet) -> bool {
        let delivered = self.sender.send(packet).is_ok();
        if !delivered {
            tracing::trace!(connection = %self.id, "dropping packet for closed peer");
        }
        delivered
    }

    /// Returns `true` if the outbox has been dropped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl PartialEq for Peer {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Peer {}

impl Hash for Peer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
