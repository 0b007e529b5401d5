//! Message transport between a live view session and its server.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;
use url::Url;

use live_view_core::error::{LiveViewError, Result};

/// A bidirectional, message-oriented channel carrying JSON text frames.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send one text frame.
    async fn send(&mut self, text: String) -> Result<()>;

    /// Next inbound text frame. `None` once the peer has closed.
    ///
    /// A frame that cannot be read as text is `Err(InvalidFrame)`; the
    /// channel stays usable after it.
    async fn recv(&mut self) -> Option<Result<String>>;

    /// Close the channel from our side.
    async fn close(&mut self) -> Result<()>;
}

/// [`Transport`] over a tokio-tungstenite WebSocket.
pub struct WebSocketTransport {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WebSocketTransport {
    /// Open a WebSocket connection to `endpoint`.
    pub async fn connect(endpoint: &Url) -> Result<Self> {
        let (ws, response) = connect_async(endpoint.as_str())
            .await
            .map_err(|e| LiveViewError::Transport(e.to_string()))?;
        debug!(endpoint = %endpoint, status = %response.status(), "WebSocket connected");
        Ok(Self { ws })
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, text: String) -> Result<()> {
        self.ws
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| LiveViewError::Transport(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String>> {
        while let Some(msg_result) = self.ws.next().await {
            match msg_result {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_string())),
                Ok(Message::Binary(bytes)) => {
                    return Some(
                        String::from_utf8(bytes.to_vec())
                            .map_err(|e| LiveViewError::InvalidFrame(e.to_string())),
                    );
                }
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "Server requested close");
                    return None;
                }
                // tungstenite answers pings itself
                Ok(_) => continue,
                Err(e) => return Some(Err(LiveViewError::Transport(e.to_string()))),
            }
        }
        None
    }

    async fn close(&mut self) -> Result<()> {
        self.ws
            .close(None)
            .await
            .map_err(|e| LiveViewError::Transport(e.to_string()))
    }
}
