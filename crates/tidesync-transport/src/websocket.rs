//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! Each binary WebSocket message carries exactly one [`Packet`] frame.
//! WebSocket has no unreliable channel, so unreliable packets are sent
//! reliably.
//!
//! Accepting is split in two steps. [`WebSocketTransport::accept_pending`]
//! returns as soon as TCP accepts, and [`PendingConnection::upgrade`] runs
//! the WebSocket handshake, so a slow client only stalls its own task.
//!
//! The stream is split into a sink and a stream half, each behind its own
//! lock, so a task parked in [`Connection::recv`] never blocks sends.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;

use crate::{Connection, ConnectionId, Packet, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = tokio_tungstenite::WebSocketStream<TcpStream>;

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self { listener })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts the next TCP connection without running the WebSocket
    /// handshake.
    pub async fn accept_pending(
        &self,
    ) -> Result<PendingConnection, TransportError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        tracing::debug!(%id, %addr, "accepted TCP connection");
        Ok(PendingConnection { id, addr, stream })
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        self.accept_pending().await?.upgrade().await
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// A TCP connection that has not finished the WebSocket handshake.
pub struct PendingConnection {
    id: ConnectionId,
    addr: SocketAddr,
    stream: TcpStream,
}

impl PendingConnection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Runs the WebSocket handshake. Callers bound it with a timeout.
    pub async fn upgrade(self) -> Result<WebSocketConnection, TransportError> {
        let ws = tokio_tungstenite::accept_async(self.stream)
            .await
            .map_err(|e| {
                TransportError::AcceptFailed(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    e,
                ))
            })?;
        tracing::debug!(id = %self.id, addr = %self.addr, "WebSocket handshake complete");

        let (sink, stream) = ws.split();
        Ok(WebSocketConnection {
            id: self.id,
            sink: Arc::new(Mutex::new(sink)),
            stream: Arc::new(Mutex::new(stream)),
            opened: Instant::now(),
            last_seen_ms: AtomicU64::new(0),
        })
    }
}

/// A single WebSocket connection.
pub struct WebSocketConnection {
    id: ConnectionId,
    sink: Arc<Mutex<SplitSink<WsStream, Message>>>,
    stream: Arc<Mutex<SplitStream<WsStream>>>,
    opened: Instant,
    /// Milliseconds after `opened` of the last inbound frame of any kind.
    last_seen_ms: AtomicU64,
}

impl WebSocketConnection {
    /// When the peer last sent anything, control frames included.
    pub fn last_seen(&self) -> Instant {
        self.opened
            + std::time::Duration::from_millis(
                self.last_seen_ms.load(Ordering::Relaxed),
            )
    }

    fn touch(&self) {
        let elapsed = self.opened.elapsed().as_millis();
        self.last_seen_ms
            .store(u64::try_from(elapsed).unwrap_or(u64::MAX), Ordering::Relaxed);
    }

    async fn write(&self, msg: Message) -> Result<(), TransportError> {
        self.sink
            .lock()
            .await
            .send(msg)
            .await
            .map_err(|e| {
                TransportError::SendFailed(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    e,
                ))
            })
    }
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send(&self, packet: &Packet) -> Result<(), Self::Error> {
        self.write(Message::Binary(packet.encode_frame().to_vec().into()))
            .await
    }

    async fn recv(&self) -> Result<Option<Packet>, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            let msg = stream.next().await;
            if let Some(Ok(_)) = msg {
                self.touch();
            }
            let frame: Vec<u8> = match msg {
                Some(Ok(Message::Binary(data))) => data.into(),
                Some(Ok(Message::Text(text))) => text.as_bytes().to_vec(),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                // Ping, pong and raw frames only count as activity.
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            };
            return Packet::decode_frame(Bytes::from(frame)).map(Some);
        }
    }

    async fn ping(&self) -> Result<(), Self::Error> {
        self.write(Message::Ping(Vec::new().into())).await
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink.lock().await.close().await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
