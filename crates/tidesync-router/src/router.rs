//! The sessions router: creates sessions and routes connections to them.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tidesync_protocol::{
    Message, MessageMark, MessageReader, ProtocolError, SessionSubtype,
    Subtype,
};
use tidesync_session::{
    Behaviour, Expiry, PendingRemoval, PlayerId, Session, SessionConfig,
    SessionId, SessionSummary,
};
use tidesync_transport::{ConnectionId, Delivery, Peer};

use crate::RouterError;

/// What a host needs to run a freshly created session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTicket {
    /// The code players put in their join handshake.
    pub session_id: SessionId,
    /// The secret that lets one connection claim the Source-of-Truth role.
    pub sot_key: String,
}

/// Owns every session and the tables that lead connections to them.
///
/// A connection is unbound until its first message, which must be a
/// `Connected` handshake naming a session and a player on that session's
/// allow-list. After that, every message from the connection goes
/// straight to its session.
///
/// Not thread-safe on its own. It is owned by the router actor
/// ([`spawn_router`](crate::spawn_router)), which serializes every call.
pub struct SessionsRouter<B: Behaviour> {
    behaviour: Arc<B>,
    config: SessionConfig,
    sessions: HashMap<SessionId, Session<B>>,
    /// Bound connections. Every value is a key of `sessions`.
    connections: HashMap<ConnectionId, SessionId>,
    allowed_players: HashMap<SessionId, HashSet<PlayerId>>,
    /// Host of each live session, for the one-session-per-host rule.
    hosted: HashMap<PlayerId, SessionId>,
}

impl<B: Behaviour> SessionsRouter<B> {
    pub fn new(behaviour: B, config: SessionConfig) -> Self {
        Self {
            behaviour: Arc::new(behaviour),
            config,
            sessions: HashMap::new(),
            connections: HashMap::new(),
            allowed_players: HashMap::new(),
            hosted: HashMap::new(),
        }
    }

    /// Creates a session hosted by `host_id`.
    ///
    /// The code is derived from the host id. If another host's session
    /// already has it, the next free code is used. The allow-list starts
    /// with the host.
    ///
    /// # Errors
    /// [`RouterError::AlreadyHosted`] if `host_id` already hosts a live
    /// session. Nothing changes in that case.
    pub fn create(
        &mut self,
        host_id: PlayerId,
    ) -> Result<SessionTicket, RouterError> {
        if self.hosted.contains_key(&host_id) {
            return Err(RouterError::AlreadyHosted(host_id));
        }

        let mut code = session_code(&host_id);
        while self.sessions.contains_key(&SessionId(code)) {
            code = code.wrapping_add(1);
        }
        let session_id = SessionId(code);

        let session = Session::new(
            session_id,
            host_id.clone(),
            Arc::clone(&self.behaviour),
            self.config.clone(),
        );
        let ticket = SessionTicket {
            session_id,
            sot_key: session.sot_key().to_owned(),
        };

        self.sessions.insert(session_id, session);
        self.allowed_players
            .insert(session_id, HashSet::from([host_id.clone()]));
        self.hosted.insert(host_id.clone(), session_id);

        tracing::info!(%session_id, %host_id, "session created");
        Ok(ticket)
    }

    /// Adds `player_id` to a session's allow-list.
    ///
    /// Returns `false` if the session does not exist.
    pub fn welcome(&mut self, session_id: SessionId, player_id: PlayerId) -> bool {
        match self.allowed_players.get_mut(&session_id) {
            Some(players) => {
                tracing::info!(%session_id, %player_id, "player welcomed");
                players.insert(player_id);
                true
            }
            None => false,
        }
    }

    /// Handles one inbound message.
    ///
    /// Bound connections go to their session. An unbound connection's
    /// message must be a valid handshake for an existing session and an
    /// allowed player. Otherwise the sender gets `400` (not a handshake,
    /// or malformed) or `404` (unknown session or player) and stays
    /// unbound.
    pub fn consume(&mut self, peer: &Peer, mark: MessageMark, payload: Bytes) {
        let connection = peer.id();

        if let Some(session_id) = self.connections.get(&connection).copied() {
            if let Some(session) = self.sessions.get_mut(&session_id) {
                if let Err(error) = session.consume(peer, mark, payload) {
                    tracing::warn!(%session_id, %connection, %mark, %error, "bad request");
                    reply(peer, MessageMark::ERROR_400);
                }
            }
            return;
        }

        if mark.subtype() != Subtype::Session(SessionSubtype::Connected) {
            tracing::debug!(%connection, %mark, "first message is not a handshake");
            reply(peer, MessageMark::ERROR_400);
            return;
        }

        let (session_id, player_id) = match parse_handshake(&payload) {
            Ok(handshake) => handshake,
            Err(error) => {
                tracing::debug!(%connection, %error, "malformed handshake");
                reply(peer, MessageMark::ERROR_400);
                return;
            }
        };

        let allowed = self
            .allowed_players
            .get(&session_id)
            .is_some_and(|players| players.contains(&player_id));
        let Some(session) =
            self.sessions.get_mut(&session_id).filter(|_| allowed)
        else {
            tracing::warn!(%session_id, %player_id, %connection, "join refused");
            reply(peer, MessageMark::ERROR_404);
            return;
        };

        match session.join(peer.clone(), mark, payload) {
            Ok(()) => {
                self.connections.insert(connection, session_id);
            }
            Err(error) => {
                tracing::warn!(%session_id, %connection, %error, "join failed");
                reply(peer, MessageMark::ERROR_400);
            }
        }
    }

    /// Unbinds `connection` and detaches it from its session.
    ///
    /// Returns the removal to re-check once the grace period is over, or
    /// `None` if the connection was never bound.
    pub fn disconnect(
        &mut self,
        connection: ConnectionId,
    ) -> Option<PendingRemoval> {
        let session_id = self.connections.remove(&connection)?;
        self.sessions.get_mut(&session_id)?.disconnect(connection)
    }

    /// Re-checks a pending removal. A finished session is torn down in
    /// the same step: its bound connections, allow-list and host entry go
    /// with it.
    pub fn expire(&mut self, pending: &PendingRemoval) -> Expiry {
        let Some(session) = self.sessions.get_mut(&pending.session_id) else {
            return Expiry::Retained;
        };
        let expiry = session.expire(pending);
        if expiry == Expiry::Finished {
            self.remove_session(pending.session_id);
        }
        expiry
    }

    fn remove_session(&mut self, session_id: SessionId) {
        self.sessions.remove(&session_id);
        self.connections.retain(|_, bound| *bound != session_id);
        self.allowed_players.remove(&session_id);
        self.hosted.retain(|_, hosted| *hosted != session_id);
        tracing::info!(%session_id, "session removed");
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    pub fn session(&self, session_id: SessionId) -> Option<&Session<B>> {
        self.sessions.get(&session_id)
    }

    /// The session a connection is bound to.
    pub fn session_of(&self, connection: ConnectionId) -> Option<SessionId> {
        self.connections.get(&connection).copied()
    }

    pub fn is_allowed(&self, session_id: SessionId, player_id: &PlayerId) -> bool {
        self.allowed_players
            .get(&session_id)
            .is_some_and(|players| players.contains(player_id))
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Summaries of every live session, ordered by code.
    pub fn summaries(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<_> =
            self.sessions.values().map(Session::summary).collect();
        summaries.sort_by_key(|s| s.session_id);
        summaries
    }
}

/// Reads the session code and player id from a join handshake.
fn parse_handshake(
    payload: &Bytes,
) -> Result<(SessionId, PlayerId), ProtocolError> {
    let mut reader = MessageReader::new(payload.clone());
    let session_id = SessionId(reader.get_i32()?);
    let player_id = PlayerId(reader.get_str()?);
    Ok((session_id, player_id))
}

/// Sends an empty reliable reply. Router replies carry no role bit.
fn reply(peer: &Peer, mark: MessageMark) {
    peer.send(Message::new().into_packet(mark, Delivery::Reliable));
}

/// Derives a session code from a host id (32-bit FNV-1a).
fn session_code(host_id: &PlayerId) -> i32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    let hash = host_id
        .as_str()
        .bytes()
        .fold(OFFSET_BASIS, |hash, byte| {
            (hash ^ u32::from(byte)).wrapping_mul(PRIME)
        });
    hash as i32
}
