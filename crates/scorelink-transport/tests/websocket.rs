//! Integration tests for the WebSocket connector.
//!
//! These spin up a real `tokio-tungstenite` server on a random local port
//! and drive a `ConnectionClient` against it.

#[cfg(feature = "websocket")]
mod websocket {
    use std::sync::Arc;
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use scorelink_transport::{
        CloseCode, ConnectionClient, ConnectionEvent, ConnectionState, WebSocketConnector,
    };
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;

    type ServerWs = tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;

    /// Binds a listener on a random port and returns it with its `ws://` URL.
    async fn bind() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("should bind");
        let addr = listener.local_addr().expect("should have addr");
        (listener, format!("ws://{addr}"))
    }

    async fn accept(listener: &TcpListener) -> ServerWs {
        let (stream, _) = listener.accept().await.expect("should accept");
        tokio_tungstenite::accept_async(stream)
            .await
            .expect("server handshake")
    }

    /// Dispatches until at least `count` events arrive or a second passes.
    async fn wait_for_events(
        client: &mut ConnectionClient<WebSocketConnector>,
        count: usize,
    ) -> Vec<ConnectionEvent> {
        let mut events = Vec::new();
        for _ in 0..100 {
            events.extend(client.dispatch_queue());
            if events.len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        events
    }

    #[tokio::test]
    async fn test_websocket_send_and_receive_text() {
        let (listener, url) = bind().await;
        let server = tokio::spawn(async move {
            let mut ws = accept(&listener).await;
            let msg = ws.next().await.unwrap().unwrap();
            assert_eq!(msg.to_text().unwrap(), r#"{"game":"observe","data":[]}"#);
            ws.send(Message::text(r#"{"messageId":"p1","value":42.0}"#))
                .await
                .unwrap();
            // Keep the socket alive until the client hangs up.
            let _ = ws.next().await;
        });

        let mut client = ConnectionClient::new(
            Arc::new(WebSocketConnector),
            url,
            Duration::from_secs(5),
        );
        client.open().await;
        assert_eq!(client.state(), ConnectionState::Open);

        client.send(r#"{"game":"observe","data":[]}"#);

        let events = wait_for_events(&mut client, 2).await;
        assert_eq!(
            events,
            vec![
                ConnectionEvent::Opened,
                ConnectionEvent::Message(r#"{"messageId":"p1","value":42.0}"#.into()),
            ]
        );

        client.close(CloseCode::Normal).await;
        server.await.expect("server task");
    }

    #[tokio::test]
    async fn test_websocket_server_close_code_is_reported() {
        let (listener, url) = bind().await;
        let server = tokio::spawn(async move {
            let mut ws = accept(&listener).await;
            ws.close(Some(CloseFrame {
                code: 1011u16.into(),
                reason: "restarting".into(),
            }))
            .await
            .unwrap();
        });

        let mut client = ConnectionClient::new(
            Arc::new(WebSocketConnector),
            url,
            Duration::from_secs(5),
        );
        client.open().await;

        let events = wait_for_events(&mut client, 2).await;
        assert_eq!(
            events,
            vec![
                ConnectionEvent::Opened,
                ConnectionEvent::Closed(CloseCode::InternalError),
            ]
        );
        assert_eq!(client.state(), ConnectionState::Closed);
        server.await.expect("server task");
    }

    #[tokio::test]
    async fn test_websocket_connect_refused_raises_error() {
        // Bind then drop to get a port nobody is listening on.
        let (listener, url) = bind().await;
        drop(listener);

        let mut client = ConnectionClient::new(
            Arc::new(WebSocketConnector),
            url,
            Duration::from_secs(5),
        );
        client.open().await;

        assert_eq!(client.state(), ConnectionState::Closed);
        assert!(matches!(
            client.dispatch_queue().as_slice(),
            [ConnectionEvent::Error(_)]
        ));
    }
}
