//! Transport seam between the reconnect driver and the socket.
//!
//! The driver only needs "connect", "next text frame", "send text", and
//! "close". Production uses tokio-tungstenite; tests script their own links.

use async_trait::async_trait;
use folio_core::{Error, Result};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::trace;
use url::Url;

/// Inbound event on an open link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    /// Peer closed or the stream ended.
    Closed,
}

/// One open channel.
#[async_trait]
pub trait Link: Send {
    /// Next data frame. Control frames are handled internally.
    async fn next_frame(&mut self) -> Result<Frame>;

    async fn send_text(&mut self, text: String) -> Result<()>;

    async fn close(&mut self);
}

/// Opens links to an endpoint.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, endpoint: &Url) -> Result<Box<dyn Link>>;
}

/// WebSocket connector backed by tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, endpoint: &Url) -> Result<Box<dyn Link>> {
        let (stream, response) = tokio_tungstenite::connect_async(endpoint.as_str())
            .await
            .map_err(|e| Error::Transport(format!("connect {}: {}", endpoint, e)))?;
        trace!(status = %response.status(), "WebSocket handshake complete");
        Ok(Box::new(WsLink { stream }))
    }
}

struct WsLink {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Link for WsLink {
    async fn next_frame(&mut self) -> Result<Frame> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Frame::Text(text)),
                // Binary payloads are decoded as text; garbage fails JSON parsing later
                Some(Ok(Message::Binary(bytes))) => {
                    return Ok(Frame::Text(String::from_utf8_lossy(&bytes).into_owned()))
                }
                Some(Ok(Message::Close(_))) | None => return Ok(Frame::Closed),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(Error::Transport(e.to_string())),
            }
        }
    }

    async fn send_text(&mut self, text: String) -> Result<()> {
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            trace!(error = %e, "WebSocket close did not complete cleanly");
        }
    }
}
