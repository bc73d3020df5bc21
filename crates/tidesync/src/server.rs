//! `TidesyncServer` builder and server loop.
//!
//! This is the entry point for running a Tidesync server. It ties
//! together all the layers: transport → router actor → sessions.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tidesync_router::{spawn_router, RouterHandle, SessionsRouter};
use tidesync_session::{Behaviour, SessionConfig};
use tidesync_transport::{Transport, WebSocketTransport};
use tokio::sync::{watch, Semaphore};

use crate::handler::serve;
use crate::{ControlPlane, ServerConfig, TidesyncError};

/// Builder for configuring and starting a Tidesync server.
///
/// # Example
///
/// ```rust,ignore
/// use tidesync::prelude::*;
///
/// let server = TidesyncServer::builder()
///     .bind("0.0.0.0:8766")
///     .build(MyBehaviour)
///     .await?;
/// let control = server.control();
/// control.launch("host-1").await?;
/// server.run().await
/// ```
pub struct TidesyncServerBuilder {
    config: ServerConfig,
}

impl TidesyncServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    pub fn max_connections(mut self, max: usize) -> Self {
        self.config.max_connections = max;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.config.heartbeat_interval = interval;
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Sets the session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.config.session = config;
        self
    }

    /// Binds the listener and starts the router actor for `behaviour`.
    pub async fn build<B: Behaviour>(
        self,
        behaviour: B,
    ) -> Result<TidesyncServer, TidesyncError> {
        let config = self.config;
        let transport = WebSocketTransport::bind(&config.bind_addr).await?;
        let router = spawn_router(
            SessionsRouter::new(behaviour, config.session.clone()),
            config.channel_size,
        );
        let (shutdown, _) = watch::channel(false);

        Ok(TidesyncServer {
            transport,
            router,
            limit: Arc::new(Semaphore::new(config.max_connections)),
            config,
            shutdown,
        })
    }
}

impl Default for TidesyncServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Tidesync server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct TidesyncServer {
    transport: WebSocketTransport,
    router: RouterHandle,
    config: ServerConfig,
    limit: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
}

impl TidesyncServer {
    /// Creates a new builder.
    pub fn builder() -> TidesyncServerBuilder {
        TidesyncServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Returns a control plane for this server. Usable before and while
    /// [`run()`](Self::run) is going.
    pub fn control(&self) -> ControlPlane {
        ControlPlane::new(self.router.clone(), self.shutdown.clone())
    }

    /// Runs the accept loop until [`ControlPlane::shutdown`] is called.
    ///
    /// The loop only accepts TCP; the WebSocket upgrade runs in each
    /// connection's own task, so a client that never finishes it cannot
    /// hold up the others. Connections over the limit are closed right
    /// after the upgrade.
    pub async fn run(self) -> Result<(), TidesyncError> {
        tracing::info!(
            addr = %self.config.bind_addr,
            max_connections = self.config.max_connections,
            "Tidesync server running"
        );
        let config = Arc::new(self.config.clone());
        let mut stop = self.shutdown.subscribe();

        loop {
            let accepted = tokio::select! {
                _ = stop.wait_for(|stop| *stop) => break,
                accepted = self.transport.accept_pending() => accepted,
            };

            let pending = match accepted {
                Ok(pending) => pending,
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                    continue;
                }
            };

            let permit = Arc::clone(&self.limit).try_acquire_owned().ok();
            let router = self.router.clone();
            let config = Arc::clone(&config);
            let shutdown = self.shutdown.subscribe();
            tokio::spawn(async move {
                let connection = pending.id();
                if let Err(e) = serve(pending, permit, router, config, shutdown).await {
                    tracing::debug!(%connection, error = %e, "connection ended with error");
                }
            });
        }

        self.transport.shutdown().await?;
        tracing::info!("Tidesync server stopped");
        Ok(())
    }
}
