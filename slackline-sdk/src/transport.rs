//! The streaming socket.
//!
//! [`Transport`] is one open connection; [`TransportConnector`] opens new
//! ones from a handshake URL. The session only ever talks to these traits,
//! so tests can script frames without a network.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::error::TransportError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one text frame.
    async fn send(&self, frame: String) -> Result<(), TransportError>;

    /// Wait for the next text frame. Closure of any kind is an error.
    async fn recv(&self) -> Result<String, TransportError>;
}

#[async_trait]
pub trait TransportConnector: Send + Sync {
    async fn open(&self, url: &str) -> Result<Arc<dyn Transport>, TransportError>;
}

/// WebSocket connector backed by `tokio-tungstenite`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

#[async_trait]
impl TransportConnector for WsConnector {
    async fn open(&self, url: &str) -> Result<Arc<dyn Transport>, TransportError> {
        let (ws, _resp) = connect_async(url).await?;
        tracing::debug!(%url, "WebSocket open");
        Ok(Arc::new(WsTransport::new(ws)))
    }
}

/// An open WebSocket, split so a send never waits behind a pending receive.
pub struct WsTransport {
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl WsTransport {
    fn new(ws: WsStream) -> Self {
        let (sink, stream) = ws.split();
        Self {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, frame: String) -> Result<(), TransportError> {
        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(frame.into())).await.map_err(closed_or)
    }

    async fn recv(&self) -> Result<String, TransportError> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.to_string()),
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(?frame, "Close frame received");
                    return Err(TransportError::Closed);
                }
                // Pings are answered by tungstenite; nothing else carries events.
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(closed_or(e)),
                None => return Err(TransportError::Closed),
            }
        }
    }
}

fn closed_or(e: tokio_tungstenite::tungstenite::Error) -> TransportError {
    use tokio_tungstenite::tungstenite::Error as WsError;
    match e {
        WsError::ConnectionClosed | WsError::AlreadyClosed => TransportError::Closed,
        other => TransportError::WebSocket(other),
    }
}
