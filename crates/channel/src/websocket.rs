// crates/channel/src/websocket.rs
//! WebSocket transport backed by tokio-tungstenite

use crate::error::{ChannelError, ChannelResult};
use crate::transport::{Connector, Transport};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// STOMP sub-protocols offered during the upgrade
const STOMP_SUBPROTOCOLS: &str = "v12.stomp, v11.stomp, v10.stomp";

/// Connects to a STOMP-over-WebSocket endpoint
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
    token: Option<String>,
}

impl WebSocketConnector {
    /// Creates a connector for a `ws://` or `wss://` URL
    pub fn new(url: impl Into<String>) -> ChannelResult<Self> {
        let url = url.into();
        if !url.starts_with("ws://") && !url.starts_with("wss://") {
            return Err(ChannelError::InvalidUrl(url));
        }
        Ok(Self { url, token: None })
    }

    /// Also sends the bearer token on the HTTP upgrade request
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self) -> ChannelResult<Box<dyn Transport>> {
        let mut request = self.url.as_str().into_client_request()?;
        let headers = request.headers_mut();
        headers.insert(
            "Sec-WebSocket-Protocol",
            HeaderValue::from_static(STOMP_SUBPROTOCOLS),
        );
        if let Some(token) = &self.token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ChannelError::Transport(format!("invalid token header: {}", e)))?;
            headers.insert("Authorization", value);
        }

        let (stream, response) = tokio_tungstenite::connect_async(request).await?;
        log::debug!(
            "WebSocket upgrade to {} answered {}",
            self.url,
            response.status()
        );

        Ok(Box::new(WebSocketTransport { stream }))
    }

    fn endpoint(&self) -> String {
        self.url.clone()
    }
}

/// An open WebSocket carrying STOMP text frames
pub struct WebSocketTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, text: String) -> ChannelResult<()> {
        self.stream.send(WsMessage::Text(text)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<ChannelResult<String>> {
        loop {
            match self.stream.next().await? {
                Ok(WsMessage::Text(text)) => return Some(Ok(text)),
                Ok(WsMessage::Binary(bytes)) => {
                    return Some(String::from_utf8(bytes).map_err(|_| {
                        ChannelError::Frame("binary message is not UTF-8".to_string())
                    }))
                }
                Ok(WsMessage::Close(reason)) => {
                    log::debug!("WebSocket closed by broker: {:?}", reason);
                    return None;
                }
                // Pings are answered by tungstenite itself
                Ok(_) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn close(&mut self) -> ChannelResult<()> {
        self.stream.close(None).await?;
        Ok(())
    }
}
