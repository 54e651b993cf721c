//! Integration tests for the WebSocket halves.
//!
//! Each test serves a tiny axum app on a random port, upgrades the
//! connection, and drives the server side through `FrameSink` /
//! `FrameStream` while a tokio-tungstenite client talks to it.

#![cfg(feature = "websocket")]

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::routing::get;
use futures_util::{SinkExt, StreamExt};
use gamehall_transport::{FrameSink, FrameStream, split};
use tokio_tungstenite::tungstenite::Message;

type Client = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Serves `on_socket` for every upgrade on `/` and returns the address.
async fn serve<F, Fut>(on_socket: F) -> SocketAddr
where
    F: Fn(WebSocket) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let app = Router::new().route(
        "/",
        get(move |ws: WebSocketUpgrade| {
            let on_socket = on_socket.clone();
            async move { ws.on_upgrade(on_socket) }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("should bind");
    let addr = listener.local_addr().expect("should have an address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server should run");
    });
    addr
}

async fn echo(socket: WebSocket) {
    let (mut sink, mut stream) = split(socket);
    while let Ok(Some(frame)) = stream.recv().await {
        if sink.send(frame).await.is_err() {
            return;
        }
    }
    let _ = sink.close().await;
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("client should connect");
    ws
}

async fn next(client: &mut Client) -> Option<Message> {
    tokio::time::timeout(Duration::from_secs(5), client.next())
        .await
        .expect("timed out waiting for a frame")
        .map(|r| r.expect("client read should succeed"))
}

#[tokio::test]
async fn test_utf8_frames_go_out_as_text() {
    let addr = serve(echo).await;
    let mut client = connect(addr).await;

    client.send(Message::text(r#"{"type":"X"}"#)).await.unwrap();

    assert_eq!(next(&mut client).await, Some(Message::text(r#"{"type":"X"}"#)));
}

#[tokio::test]
async fn test_non_utf8_frames_go_out_as_binary() {
    let addr = serve(echo).await;
    let mut client = connect(addr).await;

    client
        .send(Message::Binary(vec![0xff, 0xfe, 0x00].into()))
        .await
        .unwrap();

    match next(&mut client).await {
        Some(Message::Binary(data)) => assert_eq!(data.as_ref(), &[0xff, 0xfe, 0x00]),
        other => panic!("expected a binary frame, got {other:?}"),
    }
}

#[tokio::test]
async fn test_client_close_ends_server_stream() {
    let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
    let done_tx = std::sync::Arc::new(std::sync::Mutex::new(Some(done_tx)));

    let addr = serve(move |socket| {
        let done_tx = done_tx.clone();
        async move {
            let (_sink, mut stream) = split(socket);
            let end = stream.recv().await;
            assert!(matches!(end, Ok(None)));
            if let Some(tx) = done_tx.lock().unwrap().take() {
                let _ = tx.send(());
            }
        }
    })
    .await;

    let mut client = connect(addr).await;
    client.close(None).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), done_rx)
        .await
        .expect("server should observe the close")
        .unwrap();
}

#[tokio::test]
async fn test_server_ping_and_close_reach_client() {
    let addr = serve(|socket| async move {
        let (mut sink, _stream) = split(socket);
        sink.ping().await.unwrap();
        sink.close().await.unwrap();
    })
    .await;
    let mut client = connect(addr).await;

    assert!(matches!(next(&mut client).await, Some(Message::Ping(_))));
    assert!(matches!(next(&mut client).await, Some(Message::Close(_)) | None));
}
