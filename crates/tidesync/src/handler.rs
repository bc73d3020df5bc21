//! Per-connection handler: pumps packets between a socket and the router.
//!
//! Each accepted TCP connection gets its own Tokio task running this
//! handler. The flow is:
//!   1. Finish the WebSocket upgrade within `handshake_timeout`, and close
//!      right away if the server is over its connection limit
//!   2. Create the connection's [`Peer`] and spawn a writer task that
//!      drains its outbox onto the socket
//!   3. Loop: receive packets → forward them to the router as
//!      `(peer, mark, payload)`, pinging on every heartbeat tick
//!   4. On close, idle timeout or shutdown, tell the router the
//!      connection is gone, flush the outbox and close the socket

use std::sync::Arc;
use std::time::Duration;

use tidesync_protocol::MessageMark;
use tidesync_router::RouterHandle;
use tidesync_transport::{
    Connection, Outbox, PendingConnection, Peer, TransportError,
    WebSocketConnection,
};
use tokio::sync::{watch, OwnedSemaphorePermit};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::{ServerConfig, TidesyncError};

/// How long queued packets may take to reach the socket before close.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Upgrades `pending` and serves it until it ends.
///
/// `permit` is `None` when the connection limit was reached; the client
/// then gets a close frame right after the upgrade.
pub(crate) async fn serve(
    pending: PendingConnection,
    permit: Option<OwnedSemaphorePermit>,
    router: RouterHandle,
    config: Arc<ServerConfig>,
    shutdown: watch::Receiver<bool>,
) -> Result<(), TidesyncError> {
    let connection = pending.id();
    let conn = match tokio::time::timeout(config.handshake_timeout, pending.upgrade()).await
    {
        Ok(upgraded) => upgraded?,
        Err(_) => {
            tracing::info!(%connection, "WebSocket handshake timed out");
            return Err(TransportError::AcceptFailed(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "handshake timed out",
            ))
            .into());
        }
    };

    let Some(_permit) = permit else {
        tracing::warn!(%connection, "connection limit reached, closing");
        conn.close().await?;
        return Ok(());
    };

    handle_connection(conn, router, &config, shutdown).await
}

/// Handles a single upgraded connection until it closes.
///
/// # Errors
/// [`RouterError::Unavailable`](tidesync_router::RouterError) if the
/// router stopped while the connection was still sending.
async fn handle_connection(
    conn: WebSocketConnection,
    router: RouterHandle,
    config: &ServerConfig,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), TidesyncError> {
    let conn = Arc::new(conn);
    let connection = conn.id();
    tracing::debug!(%connection, "handling new connection");

    let (peer, outbox) = Peer::channel(connection);
    let writer = spawn_writer(Arc::clone(&conn), outbox);

    // Pinged clients answer with pongs, which count as activity, so a
    // player who only listens is never mistaken for an idle one.
    let period = config
        .heartbeat_interval
        .min(config.idle_timeout / 2)
        .max(Duration::from_millis(1));
    let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut outcome = Ok(());
    let reason = loop {
        let received = tokio::select! {
            _ = async { let _ = shutdown.wait_for(|stop| *stop).await; } => break "shutdown",
            _ = heartbeat.tick() => {
                if conn.last_seen().elapsed() >= config.idle_timeout {
                    break "idle timeout";
                }
                if let Err(e) = conn.ping().await {
                    tracing::debug!(%connection, error = %e, "ping failed");
                    break "ping failed";
                }
                continue;
            }
            received = conn.recv() => received,
        };

        match received {
            Ok(Some(packet)) => {
                let mark = MessageMark::from_bits(packet.id);
                if let Err(e) = router.consume(peer.clone(), mark, packet.payload).await {
                    outcome = Err(e.into());
                    break "router unavailable";
                }
            }
            Ok(None) => break "closed by client",
            Err(TransportError::MalformedFrame { len, .. }) => {
                tracing::debug!(%connection, len, "ignoring malformed frame");
            }
            Err(e) => {
                tracing::debug!(%connection, error = %e, "recv error");
                break "recv error";
            }
        }
    };
    tracing::info!(%connection, reason, "connection ending");

    // Stopped routers have already dropped every peer.
    let _ = router.disconnect(connection).await;
    finish(&conn, peer, writer).await;
    outcome
}

/// Spawns the task that writes everything sent to the connection's
/// [`Peer`] onto the socket. It ends once every `Peer` clone is gone.
fn spawn_writer(conn: Arc<WebSocketConnection>, mut outbox: Outbox) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(packet) = outbox.recv().await {
            if let Err(e) = conn.deliver(&packet).await {
                tracing::debug!(connection = %conn.id(), error = %e, "send failed");
                break;
            }
        }
    })
}

/// Drops the handler's `peer`, gives the writer [`FLUSH_TIMEOUT`] to
/// drain what is queued, then closes the socket.
async fn finish(conn: &WebSocketConnection, peer: Peer, mut writer: JoinHandle<()>) {
    drop(peer);
    if tokio::time::timeout(FLUSH_TIMEOUT, &mut writer).await.is_err() {
        tracing::debug!(connection = %conn.id(), "outbox not drained in time");
        writer.abort();
    }
    let _ = conn.close().await;
}
