//! Router actor: one Tokio task that owns the [`SessionsRouter`].
//!
//! Connection handlers, the control plane and grace-period timers talk to
//! the router only through its command channel, so every mutation runs
//! in queue order on one task. A reconnect that reaches the queue before
//! a grace-period expiry is always applied first.

use bytes::Bytes;
use tidesync_protocol::MessageMark;
use tidesync_session::{
    Behaviour, PendingRemoval, PlayerId, SessionId, SessionSummary,
};
use tidesync_transport::{ConnectionId, Peer};
use tokio::sync::{mpsc, oneshot};

use crate::{RouterError, SessionTicket, SessionsRouter};

/// Commands sent to the router actor through its channel.
pub(crate) enum RouterCommand {
    /// An inbound message from a connection.
    Consume {
        peer: Peer,
        mark: MessageMark,
        payload: Bytes,
    },

    /// A connection closed.
    Disconnect { connection: ConnectionId },

    Create {
        host_id: PlayerId,
        reply: oneshot::Sender<Result<SessionTicket, RouterError>>,
    },

    Welcome {
        session_id: SessionId,
        player_id: PlayerId,
        reply: oneshot::Sender<bool>,
    },

    Sessions {
        reply: oneshot::Sender<Vec<SessionSummary>>,
    },

    /// Posted by a grace-period timer.
    GraceElapsed(PendingRemoval),

    /// Stop the actor.
    Shutdown,
}

/// Handle to the running router actor.
///
/// Cheap to clone: it wraps an `mpsc::Sender`. The actor stops once every
/// handle is dropped or [`RouterHandle::shutdown`] is called.
#[derive(Clone)]
pub struct RouterHandle {
    sender: mpsc::Sender<RouterCommand>,
}

impl RouterHandle {
    /// Forwards an inbound message (fire-and-forget).
    pub async fn consume(
        &self,
        peer: Peer,
        mark: MessageMark,
        payload: Bytes,
    ) -> Result<(), RouterError> {
        self.send(RouterCommand::Consume {
            peer,
            mark,
            payload,
        })
        .await
    }

    /// Reports a closed connection (fire-and-forget).
    pub async fn disconnect(
        &self,
        connection: ConnectionId,
    ) -> Result<(), RouterError> {
        self.send(RouterCommand::Disconnect { connection }).await
    }

    /// Creates a session hosted by `host_id`.
    pub async fn create(
        &self,
        host_id: PlayerId,
    ) -> Result<SessionTicket, RouterError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RouterCommand::Create {
            host_id,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| RouterError::Unavailable)?
    }

    /// Adds a player to a session's allow-list. `Ok(false)` if the
    /// session does not exist.
    pub async fn welcome(
        &self,
        session_id: SessionId,
        player_id: PlayerId,
    ) -> Result<bool, RouterError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RouterCommand::Welcome {
            session_id,
            player_id,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| RouterError::Unavailable)
    }

    /// Lists every live session.
    pub async fn sessions(&self) -> Result<Vec<SessionSummary>, RouterError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RouterCommand::Sessions { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| RouterError::Unavailable)
    }

    /// Tells the actor to stop.
    pub async fn shutdown(&self) -> Result<(), RouterError> {
        self.send(RouterCommand::Shutdown).await
    }

    async fn send(&self, cmd: RouterCommand) -> Result<(), RouterError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| RouterError::Unavailable)
    }
}

/// The internal actor state. Runs inside a Tokio task.
struct RouterActor<B: Behaviour> {
    router: SessionsRouter<B>,
    receiver: mpsc::Receiver<RouterCommand>,
    /// Given to grace-period timers. Weak so that pending timers do not
    /// keep the actor alive after every handle is gone.
    timers: mpsc::WeakSender<RouterCommand>,
}

impl<B: Behaviour> RouterActor<B> {
    /// Runs the actor loop, processing commands until shutdown.
    async fn run(mut self) {
        tracing::info!("router actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                RouterCommand::Consume {
                    peer,
                    mark,
                    payload,
                } => {
                    tracing::debug!(connection = %peer.id(), %mark, "routing message");
                    self.router.consume(&peer, mark, payload);
                }
                RouterCommand::Disconnect { connection } => {
                    if let Some(pending) = self.router.disconnect(connection) {
                        self.schedule(pending);
                    }
                }
                RouterCommand::Create { host_id, reply } => {
                    let _ = reply.send(self.router.create(host_id));
                }
                RouterCommand::Welcome {
                    session_id,
                    player_id,
                    reply,
                } => {
                    let _ = reply.send(self.router.welcome(session_id, player_id));
                }
                RouterCommand::Sessions { reply } => {
                    let _ = reply.send(self.router.summaries());
                }
                RouterCommand::GraceElapsed(pending) => {
                    let expiry = self.router.expire(&pending);
                    tracing::debug!(
                        session_id = %pending.session_id,
                        player_id = %pending.player_id,
                        ?expiry,
                        "grace period elapsed"
                    );
                }
                RouterCommand::Shutdown => {
                    tracing::info!(
                        sessions = self.router.session_count(),
                        "router shutting down"
                    );
                    break;
                }
            }
        }

        tracing::info!("router actor stopped");
    }

    /// Posts `GraceElapsed` back into the queue after the grace period.
    fn schedule(&self, pending: PendingRemoval) {
        let timers = self.timers.clone();
        tokio::spawn(async move {
            tokio::time::sleep(pending.delay).await;
            if let Some(sender) = timers.upgrade() {
                let _ = sender.send(RouterCommand::GraceElapsed(pending)).await;
            }
        });
    }
}

/// Spawns the router actor and returns a handle to it.
///
/// `channel_size` controls backpressure. If the queue is full, senders
/// wait.
pub fn spawn_router<B: Behaviour>(
    router: SessionsRouter<B>,
    channel_size: usize,
) -> RouterHandle {
    let (sender, receiver) = mpsc::channel(channel_size);
    let actor = RouterActor {
        router,
        receiver,
        timers: sender.downgrade(),
    };
    tokio::spawn(actor.run());
    RouterHandle { sender }
}
