//! WebSocket halves over an upgraded `axum` socket.

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};

use crate::{FrameSink, FrameStream, TransportError};

/// Splits an upgraded socket into independently owned halves.
pub fn split(socket: WebSocket) -> (WebSocketSink, WebSocketStream) {
    let (sink, stream) = socket.split();
    (WebSocketSink { inner: sink }, WebSocketStream { inner: stream })
}

/// The write half of a WebSocket connection.
pub struct WebSocketSink {
    inner: SplitSink<WebSocket, Message>,
}

impl FrameSink for WebSocketSink {
    async fn send(&mut self, data: Vec<u8>) -> Result<(), TransportError> {
        // Browsers expect JSON as text frames; anything that isn't UTF-8
        // goes out as binary.
        let msg = match String::from_utf8(data) {
            Ok(text) => Message::Text(text.into()),
            Err(e) => Message::Binary(e.into_bytes().into()),
        };
        self.inner.send(msg).await.map_err(send_failed)
    }

    async fn ping(&mut self) -> Result<(), TransportError> {
        self.inner
            .send(Message::Ping(Default::default()))
            .await
            .map_err(send_failed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.inner.close().await.map_err(send_failed)
    }
}

/// The read half of a WebSocket connection.
pub struct WebSocketStream {
    inner: SplitStream<WebSocket>,
}

impl FrameStream for WebSocketStream {
    async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        loop {
            match self.inner.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_str().as_bytes().to_vec()));
                }
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }
}

fn send_failed(e: axum::Error) -> TransportError {
    TransportError::SendFailed(std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        e,
    ))
}
