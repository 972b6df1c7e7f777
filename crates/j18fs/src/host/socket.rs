//! Host push socket.
//!
//! The host streams JSON frames over a websocket, one top-level key per frame
//! (`connected`, `current`, `event`, `plugin`, ...). Only `plugin` frames are
//! forwarded to the message router.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;
use tracing::trace;
use tracing::warn;
use url::Url;

use super::router::PluginMessage;
use super::router::PluginMessageSender;

#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[cfg(feature = "push_socket")]
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid push socket URL: {0}")]
    Url(String),

    #[error("push socket is not connected")]
    NotConnected,
}

/// Derive the push socket URL (`ws[s]://<host>/<prefix>/sockjs/websocket`).
pub fn socket_url(base: &Url) -> Result<Url, SocketError> {
    let mut url = base.clone();
    let scheme = match base.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => return Err(SocketError::Url(format!("unsupported scheme '{}'", other))),
    };
    url.set_scheme(scheme)
        .map_err(|_| SocketError::Url(base.to_string()))?;

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.join("sockjs/websocket")
        .map_err(|e| SocketError::Url(e.to_string()))
}

#[derive(Debug, Deserialize)]
struct SocketFrame {
    #[serde(default)]
    plugin: Option<PluginMessage>,
}

/// Extract the plugin message from a socket frame, if it carries one.
pub fn parse_frame(text: &str) -> Option<PluginMessage> {
    match serde_json::from_str::<SocketFrame>(text) {
        Ok(frame) => frame.plugin,
        Err(e) => {
            trace!("Skipping unparseable push frame: {}", e);
            None
        }
    }
}

/// Trait for push socket operations
///
/// This trait allows for mocking the socket for testing purposes
#[async_trait]
pub trait PushClient: Send {
    /// Open the socket
    async fn connect(&mut self) -> Result<(), SocketError>;

    /// Wait for the next text frame
    ///
    /// Returns None once the socket has closed
    async fn next_frame(&mut self) -> Option<String>;
}

/// Forward plugin messages from `client` into `tx`, reopening the socket after
/// `reconnect_delay` whenever it closes. Returns once the router is gone.
pub async fn run_push_socket<C: PushClient>(
    mut client: C,
    tx: PluginMessageSender,
    reconnect_delay: Duration,
) {
    loop {
        match client.connect().await {
            Ok(()) => {
                info!("Push socket connected");
                while let Some(frame) = client.next_frame().await {
                    let Some(msg) = parse_frame(&frame) else {
                        continue;
                    };
                    if tx.send(msg).await.is_err() {
                        info!("Message router gone, closing push socket");
                        return;
                    }
                }
                warn!("Push socket closed");
            }
            Err(e) => warn!("Push socket connection failed: {}", e),
        }

        if tx.is_closed() {
            return;
        }
        tokio::time::sleep(reconnect_delay).await;
    }
}

/// Push client over a raw websocket
#[cfg(feature = "push_socket")]
pub struct WebSocketPushClient {
    url: Url,
    stream: Option<
        tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
    >,
}

#[cfg(feature = "push_socket")]
impl WebSocketPushClient {
    pub fn new(url: Url) -> Self {
        Self { url, stream: None }
    }
}

#[cfg(feature = "push_socket")]
#[async_trait]
impl PushClient for WebSocketPushClient {
    async fn connect(&mut self) -> Result<(), SocketError> {
        info!("Connecting to push socket: {}", self.url);
        let (ws, _) = tokio_tungstenite::connect_async(self.url.as_str()).await?;
        self.stream = Some(ws);
        Ok(())
    }

    async fn next_frame(&mut self) -> Option<String> {
        use futures_util::SinkExt;
        use futures_util::StreamExt;
        use tokio_tungstenite::tungstenite::Message as Msg;

        let ws = self.stream.as_mut()?;
        loop {
            match ws.next().await {
                Some(Ok(Msg::Text(text))) => return Some(text.as_str().to_string()),
                Some(Ok(Msg::Ping(data))) => {
                    let _ = ws.send(Msg::Pong(data)).await;
                }
                Some(Ok(Msg::Close(_))) | None => break,
                Some(Err(e)) => {
                    warn!("Push socket error: {}", e);
                    break;
                }
                Some(Ok(_)) => {}
            }
        }

        self.stream = None;
        None
    }
}

/// Mock push client for testing
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockPushClient {
    /// Frames served on each successful connection, in order
    pub sessions: std::collections::VecDeque<Vec<String>>,
    current: std::collections::VecDeque<String>,
    /// Number of upcoming connect() calls that fail
    pub failing_connects: usize,
    pub connects: std::sync::Arc<std::sync::atomic::AtomicUsize>,
}

#[cfg(test)]
#[async_trait]
impl PushClient for MockPushClient {
    async fn connect(&mut self) -> Result<(), SocketError> {
        self.connects
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if self.failing_connects > 0 {
            self.failing_connects -= 1;
            return Err(SocketError::NotConnected);
        }
        self.current = self.sessions.pop_front().unwrap_or_default().into();
        Ok(())
    }

    async fn next_frame(&mut self) -> Option<String> {
        self.current.pop_front()
    }
}
