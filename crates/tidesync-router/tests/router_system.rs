//! Integration tests for the router actor using a mock behaviour.
//!
//! Grace-period tests run on paused Tokio time: sleeping in the test
//! auto-advances the clock, so the actor's timers fire deterministically
//! and instantly.

use std::time::Duration;

use bytes::Bytes;
use tidesync_protocol::{Message, MessageMark, MessageReader, ProtocolError};
use tidesync_router::{spawn_router, RouterError, RouterHandle, SessionsRouter};
use tidesync_session::{Behaviour, PlayerId, SessionConfig, SessionId};
use tidesync_transport::{ConnectionId, Delivery, Outbox, Packet, Peer};

// =========================================================================
// Mock behaviour: one i32 that updates overwrite.
// =========================================================================

struct Scoreboard;

impl Behaviour for Scoreboard {
    type State = i32;

    fn default_state(&self) -> i32 {
        0
    }

    fn full_message(&self, state: &i32) -> Message {
        Message::new().add_i32(*state)
    }

    fn apply_update(
        &self,
        reader: &mut MessageReader,
        _sender: ConnectionId,
        state: &mut i32,
    ) -> Result<Option<Message>, ProtocolError> {
        let value = reader.get_i32()?;
        if value == *state {
            return Ok(None);
        }
        *state = value;
        Ok(Some(Message::new().add_i32(value)))
    }

    fn on_new_connection(
        &self,
        _connection: ConnectionId,
        _state: &mut i32,
    ) -> Option<Message> {
        Some(Message::new())
    }
}

// =========================================================================
// Helpers
// =========================================================================

const GRACE: Duration = Duration::from_secs(10);

fn start(allow_not_sot_updates: bool) -> RouterHandle {
    let config = SessionConfig {
        disconnection_timeout: GRACE,
        allow_not_sot_updates,
    };
    spawn_router(SessionsRouter::new(Scoreboard, config), 64)
}

fn peer(id: u64) -> (Peer, Outbox) {
    Peer::channel(ConnectionId::new(id))
}

fn handshake(session_id: SessionId, player: &str) -> Bytes {
    Message::new()
        .add_i32(session_id.0)
        .add_str(player)
        .unwrap()
        .freeze()
}

fn sot_handshake(session_id: SessionId, player: &str, key: &str) -> Bytes {
    Message::new()
        .add_i32(session_id.0)
        .add_str(player)
        .unwrap()
        .add_str(key)
        .unwrap()
        .freeze()
}

fn drain(outbox: &mut Outbox) -> Vec<Packet> {
    let mut packets = Vec::new();
    while let Ok(packet) = outbox.try_recv() {
        packets.push(packet);
    }
    packets
}

fn marks(packets: &[Packet]) -> Vec<MessageMark> {
    packets.iter().map(|p| MessageMark::from_bits(p.id)).collect()
}

/// Waits until every command queued so far has been processed.
async fn settle(handle: &RouterHandle) {
    handle.sessions().await.unwrap();
}

async fn join(
    handle: &RouterHandle,
    id: u64,
    session_id: SessionId,
    player: &str,
) -> (Peer, Outbox) {
    let (p, mut o) = peer(id);
    handle
        .consume(p.clone(), MessageMark::CONNECTED, handshake(session_id, player))
        .await
        .unwrap();
    settle(handle).await;
    assert_eq!(
        marks(&drain(&mut o)),
        vec![MessageMark::ACCEPTED.server(), MessageMark::UPDATE.server()]
    );
    (p, o)
}

// =========================================================================
// Create / Welcome
// =========================================================================

#[tokio::test]
async fn test_create_twice_second_fails_without_mutation() {
    let handle = start(false);

    let first = handle.create(PlayerId::from("host1")).await.unwrap();
    let before = handle.sessions().await.unwrap();

    let second = handle.create(PlayerId::from("host1")).await;
    assert!(matches!(second, Err(RouterError::AlreadyHosted(_))));

    let after = handle.sessions().await.unwrap();
    assert_eq!(before, after);
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].session_id, first.session_id);
}

#[tokio::test]
async fn test_welcome_then_join_is_accepted() {
    let handle = start(false);
    let ticket = handle.create(PlayerId::from("host1")).await.unwrap();

    assert!(handle
        .welcome(ticket.session_id, PlayerId::from("guest"))
        .await
        .unwrap());
    assert!(!handle
        .welcome(SessionId(ticket.session_id.0.wrapping_add(1)), PlayerId::from("guest"))
        .await
        .unwrap());

    join(&handle, 1, ticket.session_id, "guest").await;
    let sessions = handle.sessions().await.unwrap();
    assert_eq!(
        sessions[0].players,
        vec![PlayerId::from("host1"), PlayerId::from("guest")]
    );
}

// =========================================================================
// Handshake routing
// =========================================================================

#[tokio::test]
async fn test_unknown_session_replies_not_found_and_stays_unbound() {
    let handle = start(true);
    let (p, mut o) = peer(1);

    handle
        .consume(p.clone(), MessageMark::CONNECTED, handshake(SessionId(999), "x"))
        .await
        .unwrap();
    settle(&handle).await;
    assert_eq!(marks(&drain(&mut o)), vec![MessageMark::ERROR_404]);

    // Still unbound: an update is treated as a bad first message.
    handle
        .consume(p, MessageMark::UPDATE, Message::new().add_i32(1).freeze())
        .await
        .unwrap();
    settle(&handle).await;
    assert_eq!(marks(&drain(&mut o)), vec![MessageMark::ERROR_400]);
}

#[tokio::test]
async fn test_not_welcomed_player_replies_not_found() {
    let handle = start(false);
    let ticket = handle.create(PlayerId::from("host1")).await.unwrap();
    let (p, mut o) = peer(1);

    handle
        .consume(p, MessageMark::CONNECTED, handshake(ticket.session_id, "stranger"))
        .await
        .unwrap();
    settle(&handle).await;

    assert_eq!(marks(&drain(&mut o)), vec![MessageMark::ERROR_404]);
    assert_eq!(handle.sessions().await.unwrap()[0].connected, 0);
}

// =========================================================================
// Authority
// =========================================================================

async fn two_players(
    allow_not_sot_updates: bool,
) -> (RouterHandle, (Peer, Outbox), (Peer, Outbox)) {
    let handle = start(allow_not_sot_updates);
    let ticket = handle.create(PlayerId::from("a")).await.unwrap();
    handle
        .welcome(ticket.session_id, PlayerId::from("b"))
        .await
        .unwrap();

    let (a, mut oa) = peer(1);
    handle
        .consume(
            a.clone(),
            MessageMark::CONNECTED.server(),
            sot_handshake(ticket.session_id, "a", &ticket.sot_key),
        )
        .await
        .unwrap();
    let b = join(&handle, 2, ticket.session_id, "b").await;
    drain(&mut oa);
    (handle, (a, oa), b)
}

#[tokio::test]
async fn test_update_from_non_sot_forbidden_when_disallowed() {
    let (handle, (_a, mut oa), (b, mut ob)) = two_players(false).await;

    handle
        .consume(b, MessageMark::UPDATE, Message::new().add_i32(5).freeze())
        .await
        .unwrap();
    settle(&handle).await;

    let replies = drain(&mut ob);
    assert_eq!(marks(&replies), vec![MessageMark::ERROR_403.server()]);
    assert_eq!(replies[0].delivery, Delivery::Unreliable);
    assert!(drain(&mut oa).is_empty());
}

#[tokio::test]
async fn test_update_from_non_sot_accepted_when_allowed() {
    let (handle, (_a, mut oa), (b, mut ob)) = two_players(true).await;

    handle
        .consume(b, MessageMark::UPDATE, Message::new().add_i32(5).freeze())
        .await
        .unwrap();
    settle(&handle).await;

    for outbox in [&mut oa, &mut ob] {
        let packets = drain(outbox);
        assert_eq!(marks(&packets), vec![MessageMark::UPDATE.server()]);
        assert_eq!(&packets[0].payload[..], &5i32.to_le_bytes());
    }
}

#[tokio::test]
async fn test_update_from_sot_is_broadcast() {
    let (handle, (a, mut oa), (_b, mut ob)) = two_players(false).await;

    handle
        .consume(a, MessageMark::UPDATE.server(), Message::new().add_i32(9).freeze())
        .await
        .unwrap();
    settle(&handle).await;

    assert_eq!(marks(&drain(&mut oa)), vec![MessageMark::UPDATE.server()]);
    assert_eq!(marks(&drain(&mut ob)), vec![MessageMark::UPDATE.server()]);
}

// =========================================================================
// Grace period
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_reconnect_within_grace_keeps_player_and_session() {
    let handle = start(false);
    let ticket = handle.create(PlayerId::from("host1")).await.unwrap();
    let (p, _o) = join(&handle, 1, ticket.session_id, "host1").await;

    handle.disconnect(p.id()).await.unwrap();
    tokio::time::sleep(GRACE - Duration::from_millis(1)).await;
    join(&handle, 2, ticket.session_id, "host1").await;

    tokio::time::sleep(GRACE * 3).await;

    let sessions = handle.sessions().await.unwrap();
    assert_eq!(sessions.len(), 1, "session must not finish");
    assert_eq!(sessions[0].players, vec![PlayerId::from("host1")]);
    assert_eq!(sessions[0].connected, 1);
}

#[tokio::test(start_paused = true)]
async fn test_no_reconnect_removes_player_and_reinits_others() {
    let handle = start(false);
    let ticket = handle.create(PlayerId::from("host1")).await.unwrap();
    handle
        .welcome(ticket.session_id, PlayerId::from("guest"))
        .await
        .unwrap();
    let (_host, mut oh) = join(&handle, 1, ticket.session_id, "host1").await;
    let (guest, _og) = join(&handle, 2, ticket.session_id, "guest").await;
    drain(&mut oh);

    handle.disconnect(guest.id()).await.unwrap();
    settle(&handle).await;
    assert_eq!(handle.sessions().await.unwrap()[0].players.len(), 2);

    tokio::time::sleep(GRACE + Duration::from_secs(1)).await;

    let sessions = handle.sessions().await.unwrap();
    assert_eq!(sessions[0].players, vec![PlayerId::from("host1")]);
    let packets = drain(&mut oh);
    assert_eq!(marks(&packets), vec![MessageMark::UPDATE.server()]);
    assert_eq!(packets[0].delivery, Delivery::Reliable);
}

#[tokio::test(start_paused = true)]
async fn test_last_player_leaving_finishes_session_once() {
    let handle = start(false);
    let ticket = handle.create(PlayerId::from("host1")).await.unwrap();
    let (p, _o) = join(&handle, 1, ticket.session_id, "host1").await;

    handle.disconnect(p.id()).await.unwrap();
    tokio::time::sleep(GRACE + Duration::from_secs(1)).await;
    assert!(handle.sessions().await.unwrap().is_empty());

    // The host is free to host again, and the new session is unaffected
    // by anything left over from the old one.
    let again = handle.create(PlayerId::from("host1")).await.unwrap();
    assert_eq!(again.session_id, ticket.session_id);
    assert_ne!(again.sot_key, ticket.sot_key);
    tokio::time::sleep(GRACE * 2).await;
    assert_eq!(handle.sessions().await.unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_finished_session_rejects_late_handshake() {
    let handle = start(false);
    let ticket = handle.create(PlayerId::from("host1")).await.unwrap();
    let (p, _o) = join(&handle, 1, ticket.session_id, "host1").await;
    handle.disconnect(p.id()).await.unwrap();
    tokio::time::sleep(GRACE + Duration::from_secs(1)).await;

    let (late, mut ol) = peer(2);
    handle
        .consume(late, MessageMark::CONNECTED, handshake(ticket.session_id, "host1"))
        .await
        .unwrap();
    settle(&handle).await;
    assert_eq!(marks(&drain(&mut ol)), vec![MessageMark::ERROR_404]);
}

// =========================================================================
// Shutdown
// =========================================================================

#[tokio::test]
async fn test_shutdown_makes_handle_unavailable() {
    let handle = start(false);
    handle.shutdown().await.unwrap();

    let result = handle.create(PlayerId::from("host1")).await;
    assert!(matches!(result, Err(RouterError::Unavailable)));
}
