//! A single WebSocket connection: open, authenticate, subscribe, receive.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::auth::{AuthPayload, Credentials};
use crate::error::StreamerError;
use crate::ws::config::WsConfig;
use crate::ws::messages::{AuthRequest, StreamKind};
use crate::ws::registry::SubscriptionRegistry;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Logical state of a connection session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No socket yet.
    Unconnected,
    /// Socket open, auth request sent or about to be sent.
    Authenticating,
    /// Subscribe requests sent.
    Subscribed,
    /// Receiving messages.
    Streaming,
    /// Socket released.
    Closed,
}

/// Owns one live socket for the duration of a connect attempt.
///
/// The socket is released by [`ConnectionSession::close`], which is
/// idempotent: the close frame is sent at most once.
pub struct ConnectionSession {
    /// The socket; `None` once closed.
    ws: Option<WsStream>,
    /// URL this session is connected to.
    url: String,
    /// Correlation id for outbound requests.
    request_id: u64,
    /// Connection state.
    state: SessionState,
}

impl std::fmt::Debug for ConnectionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSession")
            .field("url", &self.url)
            .field("state", &self.state)
            .finish()
    }
}

impl ConnectionSession {
    /// Open a transport connection. Failures are reported, not retried.
    pub async fn open(url: &str, request_id: u64) -> Result<Self, StreamerError> {
        let (ws_stream, _) = connect_async(url).await.map_err(|e| {
            StreamerError::WebSocketMsg(format!("Failed to connect to {}: {}", url, e))
        })?;

        tracing::info!(url, "Connected");

        Ok(Self {
            ws: Some(ws_stream),
            url: url.to_string(),
            request_id,
            state: SessionState::Authenticating,
        })
    }

    /// Run the full handshake: open, authenticate, settle, subscribe.
    ///
    /// If any step after `open` fails the socket is closed before the
    /// error is returned.
    pub async fn establish(
        url: &str,
        credentials: &Credentials,
        registry: &SubscriptionRegistry,
        config: &WsConfig,
    ) -> Result<Self, StreamerError> {
        let mut session = Self::open(url, config.request_id).await?;

        let handshake = async {
            session
                .authenticate(credentials, config.auth_expiry_window)
                .await?;
            session.await_auth_settle(config.auth_settle_delay).await;
            session.subscribe(registry).await
        }
        .await;

        match handshake {
            Ok(_) => Ok(session),
            Err(e) => {
                session.close().await;
                Err(e)
            }
        }
    }

    /// Send one `user.auth` request.
    ///
    /// Fire-and-forget: the session does not wait for the server's answer.
    /// A rejected login only shows up later as an error response in the
    /// message stream.
    pub async fn authenticate(
        &mut self,
        credentials: &Credentials,
        expiry_window: Duration,
    ) -> Result<AuthPayload, StreamerError> {
        self.state = SessionState::Authenticating;

        let payload = AuthPayload::new(credentials, expiry_window);
        let request = AuthRequest::new(&payload, self.request_id);
        self.send_json(&request).await?;

        tracing::info!(expiry = payload.expiry, "Sent websocket authentication attempt");
        Ok(payload)
    }

    /// Wait for the auth request to settle in lieu of an acknowledgment.
    pub async fn await_auth_settle(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }

    /// Send one subscribe request per stream kind with registered symbols.
    ///
    /// Returns the number of requests sent; zero when nothing is registered.
    pub async fn subscribe(&mut self, registry: &SubscriptionRegistry) -> Result<usize, StreamerError> {
        let mut sent = 0;
        for kind in StreamKind::ALL {
            if self.subscribe_kind(registry, kind).await? {
                sent += 1;
            }
        }
        self.state = SessionState::Subscribed;
        Ok(sent)
    }

    /// Send the subscribe request for one kind, if it has symbols.
    pub async fn subscribe_kind(
        &mut self,
        registry: &SubscriptionRegistry,
        kind: StreamKind,
    ) -> Result<bool, StreamerError> {
        let Some(request) = registry.subscribe_request(kind, self.request_id) else {
            return Ok(false);
        };

        self.send_json(&request).await?;
        tracing::info!(method = %request.method, symbols = ?request.params, "Sent subscription request");
        Ok(true)
    }

    /// Mark the session as streaming.
    pub fn mark_streaming(&mut self) {
        self.state = SessionState::Streaming;
    }

    /// Receive the next text message.
    ///
    /// Control frames are skipped. A close frame or end of stream is
    /// reported as [`StreamerError::ConnectionClosed`].
    pub async fn recv(&mut self) -> Result<String, StreamerError> {
        let ws = self
            .ws
            .as_mut()
            .ok_or_else(|| StreamerError::WebSocketMsg("Not connected".into()))?;

        loop {
            match ws.next().await {
                Some(Ok(WsMessage::Text(text))) => return Ok(text.as_str().to_owned()),
                Some(Ok(WsMessage::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => return Ok(text),
                    Err(_) => tracing::debug!(len = data.len(), "Ignoring non-UTF-8 binary frame"),
                },
                Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_))) => {
                    // Handled automatically by tungstenite
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    let reason = frame
                        .map(|f| format!("{} {}", u16::from(f.code), f.reason.as_str()))
                        .unwrap_or_else(|| "close frame without reason".to_string());
                    return Err(StreamerError::ConnectionClosed { reason });
                }
                Some(Err(e)) => return Err(StreamerError::WebSocket(e)),
                None => {
                    return Err(StreamerError::ConnectionClosed {
                        reason: "stream ended".into(),
                    });
                }
            }
        }
    }

    /// Close the connection gracefully.
    pub async fn close(&mut self) {
        if let Some(mut ws) = self.ws.take() {
            if let Err(e) = ws.close(None).await {
                tracing::debug!("Error while closing websocket: {}", e);
            }
            tracing::info!(url = %self.url, "Websocket closed");
        }
        self.state = SessionState::Closed;
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Check if the socket is still held.
    pub fn is_open(&self) -> bool {
        self.ws.is_some()
    }

    /// Send a JSON message.
    async fn send_json<T: serde::Serialize>(&mut self, msg: &T) -> Result<(), StreamerError> {
        let ws = self
            .ws
            .as_mut()
            .ok_or_else(|| StreamerError::WebSocketMsg("Not connected".into()))?;

        let json = serde_json::to_string(msg)?;

        ws.send(WsMessage::Text(json.into()))
            .await
            .map_err(|e| StreamerError::WebSocketMsg(format!("Failed to send message: {}", e)))
    }
}
