//! Integration tests for the WebSocket transport.
//!
//! These tests spin up a real WebSocket server and client to verify that
//! packet frames cross the network intact.

#[cfg(feature = "websocket")]
mod websocket {
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use tidesync_transport::{
        Connection, Packet, Transport, WebSocketTransport,
    };
    use tokio_tungstenite::tungstenite::Message;

    type ClientStream = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    /// Binds on an OS-assigned port and returns the transport plus its
    /// address.
    async fn bind_any() -> (WebSocketTransport, String) {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("should have addr");
        (transport, addr.to_string())
    }

    async fn connect_client(addr: &str) -> ClientStream {
        let url = format!("ws://{addr}");
        let (ws, _) = tokio_tungstenite::connect_async(&url)
            .await
            .expect("client should connect");
        ws
    }

    #[tokio::test]
    async fn test_websocket_accept_and_send_receive() {
        let (mut transport, addr) = bind_any().await;

        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });
        let mut client_ws = connect_client(&addr).await;
        let server_conn = server_handle.await.expect("task should complete");
        assert!(server_conn.id().into_inner() > 0);

        // --- Server sends, client receives ---
        server_conn
            .send(&Packet::reliable(0x0103, b"hello".to_vec()))
            .await
            .expect("send should succeed");

        let msg = client_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"\x03\x01hello");

        // --- Client sends, server receives ---
        client_ws
            .send(Message::Binary(b"\x05\x00abc".to_vec().into()))
            .await
            .unwrap();

        let received = server_conn
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have a packet");
        assert_eq!(received.id, 5);
        assert_eq!(&received.payload[..], b"abc");

        server_conn.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_websocket_unreliable_packet_still_arrives() {
        let (mut transport, addr) = bind_any().await;
        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });
        let mut client_ws = connect_client(&addr).await;
        let server_conn = server_handle.await.unwrap();

        server_conn
            .deliver(&Packet::unreliable(2, vec![7]))
            .await
            .expect("deliver should succeed");

        let msg = client_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), &[2, 0, 7]);
    }

    #[tokio::test]
    async fn test_websocket_recv_short_frame_returns_error() {
        let (mut transport, addr) = bind_any().await;
        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });
        let mut client_ws = connect_client(&addr).await;
        let server_conn = server_handle.await.unwrap();

        client_ws
            .send(Message::Binary(vec![1u8].into()))
            .await
            .unwrap();

        assert!(server_conn.recv().await.is_err());
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_client_close() {
        let (mut transport, addr) = bind_any().await;
        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });
        let mut client_ws = connect_client(&addr).await;
        let server_conn = server_handle.await.unwrap();

        client_ws.send(Message::Close(None)).await.unwrap();

        let result = server_conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_websocket_accept_pending_returns_before_handshake() {
        let (transport, addr) = bind_any().await;

        // A client that opens TCP and never sends the upgrade request.
        let _silent = tokio::net::TcpStream::connect(&addr).await.unwrap();

        let pending = tokio::time::timeout(
            Duration::from_secs(2),
            transport.accept_pending(),
        )
        .await
        .expect("TCP accept should not wait for the handshake")
        .expect("should accept");
        assert!(pending.id().into_inner() > 0);

        let upgraded =
            tokio::time::timeout(Duration::from_millis(200), pending.upgrade())
                .await;
        assert!(upgraded.is_err(), "handshake should still be waiting");
    }

    #[tokio::test]
    async fn test_websocket_ping_reaches_client() {
        let (mut transport, addr) = bind_any().await;
        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });
        let mut client_ws = connect_client(&addr).await;
        let server_conn = server_handle.await.unwrap();

        server_conn.ping().await.expect("ping should succeed");

        let msg = client_ws.next().await.unwrap().unwrap();
        assert!(matches!(msg, Message::Ping(_)));
    }

    #[tokio::test]
    async fn test_websocket_control_frame_updates_last_seen() {
        let (mut transport, addr) = bind_any().await;
        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });
        let mut client_ws = connect_client(&addr).await;
        let server_conn = server_handle.await.unwrap();
        let before = server_conn.last_seen();

        tokio::time::sleep(Duration::from_millis(50)).await;
        client_ws.send(Message::Ping(vec![1].into())).await.unwrap();

        // recv does not return for a ping, but it records the activity.
        let result =
            tokio::time::timeout(Duration::from_millis(300), server_conn.recv())
                .await;
        assert!(result.is_err());
        assert!(server_conn.last_seen() > before);
    }
}
