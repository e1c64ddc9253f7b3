//! Integration tests for the WebSocket transport.
//!
//! Each test binds its own listener on an OS-assigned port and dials it
//! through the same transport, so the address announcement is exercised
//! end to end.

#[cfg(feature = "websocket")]
mod websocket {
    use fission_transport::{Connection, Listener, Transport, TransportError, WebSocketTransport};

    #[tokio::test]
    async fn test_websocket_listen_none_assigns_loopback_port() {
        let transport = WebSocketTransport::new();
        let listener = transport.listen(None).await.expect("should bind");

        let address = listener.local_address();
        assert!(address.starts_with("127.0.0.1:"));
        assert!(!address.ends_with(":0"), "port should be assigned: {address}");
    }

    #[tokio::test]
    async fn test_websocket_listen_taken_address_returns_address_in_use() {
        let transport = WebSocketTransport::new();
        let first = transport.listen(None).await.expect("should bind");
        let address = first.local_address().to_string();

        let result = transport.listen(Some(&address)).await;

        assert!(matches!(result, Err(TransportError::AddressInUse(a)) if a == address));
    }

    #[tokio::test]
    async fn test_websocket_connect_and_exchange_messages() {
        let transport = WebSocketTransport::new();
        let mut listener = transport.listen(None).await.expect("should bind");
        let address = listener.local_address().to_string();

        let server_task = tokio::spawn(async move { listener.accept().await.expect("should accept") });

        let client = transport
            .connect("127.0.0.1:40001", &address)
            .await
            .expect("should connect");
        let server = server_task.await.expect("task should complete");

        // The accepting side learns the dialer's announced address.
        assert_eq!(server.remote_address(), "127.0.0.1:40001");
        assert_eq!(client.remote_address(), address);

        client.send(b"hello from client").await.unwrap();
        let received = server.recv().await.unwrap().expect("should have data");
        assert_eq!(received, b"hello from client");

        server.send(b"hello from server").await.unwrap();
        let received = client.recv().await.unwrap().expect("should have data");
        assert_eq!(received, b"hello from server");
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_after_remote_close() {
        let transport = WebSocketTransport::new();
        let mut listener = transport.listen(None).await.expect("should bind");
        let address = listener.local_address().to_string();

        let server_task = tokio::spawn(async move { listener.accept().await.expect("should accept") });
        let client = transport.connect("127.0.0.1:40002", &address).await.unwrap();
        let server = server_task.await.unwrap();

        client.close().await.expect("close should succeed");

        let result = server.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_websocket_connect_with_no_listener_returns_unreachable() {
        let transport = WebSocketTransport::new();
        let listener = transport.listen(None).await.unwrap();
        let address = listener.local_address().to_string();
        drop(listener);

        let result = transport.connect("127.0.0.1:40003", &address).await;

        assert!(matches!(result, Err(TransportError::Unreachable(_))));
    }
}
