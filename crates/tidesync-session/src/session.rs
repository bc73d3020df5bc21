//! The session state machine.
//!
//! A [`Session`] owns one game room: its roster, its Source-of-Truth and
//! the behaviour-owned state. It has two states:
//!
//! ```text
//!   Active ──(last player's grace period runs out)──→ Finished
//! ```
//!
//! While active it handles three events:
//!
//! - **join**: attach a connection to a roster entry (new or returning),
//!   optionally claim the Source-of-Truth role, then re-send the full
//!   state to everyone.
//! - **consume**: authorize and apply an update, or run a command.
//! - **disconnect**: detach the connection and hand back a
//!   [`PendingRemoval`]. The owner re-checks it with [`Session::expire`]
//!   once the grace period is over.
//!
//! A session never awaits anything. All sends go through [`Peer`]
//! handles and never block, and the grace-period timer belongs to the
//! owner. That keeps every transition a plain `&mut self` call that the
//! owner serializes.

use std::sync::Arc;

use bytes::Bytes;
use rand::Rng;
use tidesync_protocol::{Message, MessageMark, MessageReader, MessageType};
use tidesync_transport::{ConnectionId, Delivery, Packet, Peer};

use crate::{
    Behaviour, CommandOutcome, Expiry, PendingRemoval, PlayerId,
    SessionConfig, SessionError, SessionId, SessionSummary,
};

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// One roster entry.
///
/// The entry outlives its connection: `peer` is `None` between a
/// disconnect and either a reconnect or the end of the grace period.
#[derive(Debug, Clone)]
pub struct Player {
    id: PlayerId,
    peer: Option<Peer>,
    /// Set on disconnect; matches the `disconnect_seq` of the pending
    /// removal that may delete this entry.
    offline_seq: Option<u64>,
}

impl Player {
    pub fn id(&self) -> &PlayerId {
        &self.id
    }

    /// The live connection, if any.
    pub fn connection(&self) -> Option<ConnectionId> {
        self.peer.as_ref().map(Peer::id)
    }

    pub fn is_connected(&self) -> bool {
        self.peer.is_some()
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One game room. See the module docs for the lifecycle.
pub struct Session<B: Behaviour> {
    id: SessionId,
    host_id: PlayerId,
    /// Join order. The host is seeded first, without a connection.
    players: Vec<Player>,
    /// The connection currently recognised as Source-of-Truth.
    sot: Option<ConnectionId>,
    sot_key: String,
    state: B::State,
    behaviour: Arc<B>,
    config: SessionConfig,
    running: bool,
    disconnects: u64,
}

impl<B: Behaviour> Session<B> {
    /// Creates an active session with the host on the roster and a fresh
    /// Source-of-Truth key.
    pub fn new(
        id: SessionId,
        host_id: PlayerId,
        behaviour: Arc<B>,
        config: SessionConfig,
    ) -> Self {
        let state = behaviour.default_state();
        Self {
            id,
            players: vec![Player {
                id: host_id.clone(),
                peer: None,
                offline_seq: None,
            }],
            host_id,
            sot: None,
            sot_key: generate_sot_key(),
            state,
            behaviour,
            config,
            running: true,
            disconnects: 0,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn host_id(&self) -> &PlayerId {
        &self.host_id
    }

    /// The secret a client must present to claim the Source-of-Truth role.
    pub fn sot_key(&self) -> &str {
        &self.sot_key
    }

    pub fn source_of_truth(&self) -> Option<ConnectionId> {
        self.sot
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn state(&self) -> &B::State {
        &self.state
    }

    pub fn connected_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_connected()).count()
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.id,
            host_id: self.host_id.clone(),
            players: self.players.iter().map(|p| p.id.clone()).collect(),
            connected: self.connected_count(),
            running: self.running,
        }
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Attaches `peer` to the roster.
    ///
    /// The payload is the join handshake: `i32` session code, player id
    /// string, and when `mark` has the role bit, the Source-of-Truth key.
    /// A returning player takes over their first disconnected entry;
    /// anyone else is appended. The joiner gets `Accepted` (carrying the
    /// behaviour's side effect) or a bare error, then everyone gets the
    /// full state.
    ///
    /// # Errors
    /// - [`SessionError::Protocol`]: the handshake is malformed. The
    ///   roster is untouched.
    /// - [`SessionError::Finished`]: the session is over.
    pub fn join(
        &mut self,
        peer: Peer,
        mark: MessageMark,
        payload: Bytes,
    ) -> Result<(), SessionError> {
        if !self.running {
            return Err(SessionError::Finished(self.id));
        }

        let mut reader = MessageReader::new(payload);
        reader.get_i32()?;
        let player_id = PlayerId(reader.get_str()?);
        let connection = peer.id();
        let session_id = self.id;

        match self
            .players
            .iter_mut()
            .find(|p| p.id == player_id && p.peer.is_none())
        {
            Some(player) => {
                player.peer = Some(peer.clone());
                player.offline_seq = None;
                tracing::info!(%session_id, %player_id, %connection, "player reconnected");
            }
            None => {
                self.players.push(Player {
                    id: player_id.clone(),
                    peer: Some(peer.clone()),
                    offline_seq: None,
                });
                tracing::info!(%session_id, %player_id, %connection, "player joined");
            }
        }

        if mark.is_source_of_truth() {
            match reader.get_str() {
                Ok(key) if key == self.sot_key => {
                    self.sot = Some(connection);
                    tracing::info!(%session_id, %player_id, %connection, "source of truth claimed");
                }
                _ => {
                    tracing::warn!(%session_id, %player_id, %connection, "source of truth claim rejected");
                }
            }
        }

        let reply = match self
            .behaviour
            .on_new_connection(connection, &mut self.state)
        {
            Some(side_effect) => side_effect
                .into_packet(MessageMark::ACCEPTED.server(), Delivery::Reliable),
            None => Message::new()
                .into_packet(MessageMark::ERROR.server(), Delivery::Reliable),
        };
        peer.send(reply);

        self.reinit();
        Ok(())
    }

    /// Handles an update or command from a joined connection.
    ///
    /// Does nothing once the session has finished. Unauthorized updates
    /// are answered with an unreliable `403` to the sender only.
    ///
    /// # Errors
    /// - [`SessionError::Protocol`]: the behaviour could not decode the
    ///   payload.
    /// - [`SessionError::UnexpectedMessage`]: session-control and error
    ///   messages have no transition here.
    pub fn consume(
        &mut self,
        peer: &Peer,
        mark: MessageMark,
        payload: Bytes,
    ) -> Result<(), SessionError> {
        if !self.running {
            tracing::trace!(session_id = %self.id, "ignoring message for finished session");
            return Ok(());
        }

        let connection = peer.id();
        let mut reader = MessageReader::new(payload);

        match mark.message_type() {
            MessageType::Update => {
                let claims_sot = mark.is_source_of_truth();
                let no_right = !self.config.allow_not_sot_updates && !claims_sot;
                let impersonating = claims_sot && self.sot != Some(connection);
                if no_right || impersonating {
                    tracing::warn!(
                        session_id = %self.id,
                        %connection,
                        impersonating,
                        "update rejected"
                    );
                    peer.send(Message::new().into_packet(
                        MessageMark::ERROR_403.server(),
                        Delivery::Unreliable,
                    ));
                    return Ok(());
                }

                if let Some(snapshot) = self.behaviour.apply_update(
                    &mut reader,
                    connection,
                    &mut self.state,
                )? {
                    let packet = snapshot.into_packet(
                        MessageMark::UPDATE.server(),
                        Delivery::Unreliable,
                    );
                    self.broadcast(&packet, None);
                }
            }
            MessageType::Command => {
                if let Some(CommandOutcome { command, update }) =
                    self.behaviour.extract_command(
                        &mut reader,
                        mark,
                        connection,
                        &mut self.state,
                    )?
                {
                    let command = command.into_packet(
                        MessageMark::COMMAND.server(),
                        Delivery::Reliable,
                    );
                    self.broadcast(&command, Some(connection));
                    let update = update.into_packet(
                        MessageMark::UPDATE.server(),
                        Delivery::Unreliable,
                    );
                    self.broadcast(&update, None);
                }
            }
            MessageType::Session | MessageType::Error => {
                return Err(SessionError::UnexpectedMessage(mark));
            }
        }
        Ok(())
    }

    /// Detaches `connection` from its roster entry.
    ///
    /// The entry stays until the returned removal is expired. Returns
    /// `None` if no entry holds this connection.
    pub fn disconnect(
        &mut self,
        connection: ConnectionId,
    ) -> Option<PendingRemoval> {
        let player = self
            .players
            .iter_mut()
            .find(|p| p.connection() == Some(connection))?;

        self.disconnects += 1;
        player.peer = None;
        player.offline_seq = Some(self.disconnects);
        let player_id = player.id.clone();

        if self.sot == Some(connection) {
            self.sot = None;
        }

        tracing::info!(
            session_id = %self.id,
            %player_id,
            %connection,
            grace = ?self.config.disconnection_timeout,
            "player disconnected, grace period started"
        );

        Some(PendingRemoval {
            session_id: self.id,
            player_id,
            disconnect_seq: self.disconnects,
            delay: self.config.disconnection_timeout,
        })
    }

    /// Re-checks a pending removal once its grace period is over.
    ///
    /// The entry goes only if it is still the one that disconnected: a
    /// reconnect in the meantime clears it, and a newer disconnect gives
    /// it a new sequence number. Removal re-sends the full state; removing
    /// the last entry finishes the session.
    pub fn expire(&mut self, pending: &PendingRemoval) -> Expiry {
        if !self.running {
            return Expiry::Retained;
        }

        let before = self.players.len();
        self.players.retain(|p| {
            !(p.id == pending.player_id
                && p.offline_seq == Some(pending.disconnect_seq))
        });
        if self.players.len() == before {
            tracing::debug!(
                session_id = %self.id,
                player_id = %pending.player_id,
                "grace period over, player still present"
            );
            return Expiry::Retained;
        }

        tracing::info!(
            session_id = %self.id,
            player_id = %pending.player_id,
            "player removed"
        );
        self.reinit();

        if self.players.is_empty() {
            self.running = false;
            tracing::info!(session_id = %self.id, "session finished");
            Expiry::Finished
        } else {
            Expiry::Removed
        }
    }

    // -----------------------------------------------------------------------
    // Fan-out
    // -----------------------------------------------------------------------

    /// Sends the full state, reliably, to every connected player.
    fn reinit(&self) {
        let packet = self
            .behaviour
            .full_message(&self.state)
            .into_packet(MessageMark::UPDATE.server(), Delivery::Reliable);
        self.broadcast(&packet, None);
    }

    fn broadcast(&self, packet: &Packet, except: Option<ConnectionId>) {
        let mut sent = 0usize;
        for peer in self.players.iter().filter_map(|p| p.peer.as_ref()) {
            if Some(peer.id()) == except {
                continue;
            }
            if peer.send(packet.clone()) {
                sent += 1;
            }
        }
        tracing::debug!(
            session_id = %self.id,
            mark = %MessageMark::from_bits(packet.id),
            sent,
            "broadcast"
        );
    }
}

/// Generates a random 32-character hex key (128 bits of entropy).
fn generate_sot_key() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// =========================================================================
// Tests
// =========================================================================
