//! WebSocket connection manager.
//!
//! Opens a single connection per call. There is no reconnection here: a
//! failed handshake is reported to the caller, which decides whether to try
//! again.

use crate::error::{WsError, WsResult};
use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use numis_core::RawPacket;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async_tls_with_config, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Maximum time allowed for TCP connect + TLS + websocket handshake.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Disable Nagle's algorithm on the underlying socket.
    #[serde(default = "default_tcp_nodelay")]
    pub tcp_nodelay: bool,
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_tcp_nodelay() -> bool {
    true
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            tcp_nodelay: default_tcp_nodelay(),
        }
    }
}

/// Hook run right after a successful handshake, before `connect` returns.
///
/// Typical uses are authentication frames or an initial ping.
pub trait ConnectHook: Send + Sync {
    fn on_connect<'a>(&'a self, connection: &'a mut Connection) -> BoxFuture<'a, WsResult<()>>;
}

/// An open websocket connection.
pub struct Connection {
    stream: WsStream,
    endpoint: String,
}

impl Connection {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send a text frame.
    pub async fn send_text(&mut self, text: impl Into<String>) -> WsResult<()> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| WsError::SendFailed(e.to_string()))
    }

    /// Wait for the next data frame.
    ///
    /// Pings are answered and pongs skipped. A close frame or the end of the
    /// stream is reported as `WsError::ConnectionClosed`.
    pub async fn recv(&mut self) -> WsResult<RawPacket> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(RawPacket::Text(text)),
                Some(Ok(Message::Binary(bytes))) => return Ok(RawPacket::Binary(bytes)),
                Some(Ok(Message::Ping(data))) => {
                    debug!("Received ping, sending pong");
                    self.stream.send(Message::Pong(data)).await?;
                }
                Some(Ok(Message::Pong(_))) => {
                    debug!("Received pong");
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|f| (f.code.into(), f.reason.to_string()))
                        .unwrap_or((1000, "Normal close".to_string()));
                    warn!(code, %reason, endpoint = %self.endpoint, "WebSocket closed by server");
                    return Err(WsError::ConnectionClosed { code, reason });
                }
                Some(Ok(Message::Frame(_))) => {}
                Some(Err(e)) => return Err(e.into()),
                None => {
                    warn!(endpoint = %self.endpoint, "WebSocket stream ended");
                    return Err(WsError::ConnectionClosed {
                        code: 1006,
                        reason: "Stream ended".to_string(),
                    });
                }
            }
        }
    }

    /// Send a close frame. Errors are returned but the connection is unusable
    /// afterwards either way.
    pub async fn close(&mut self) -> WsResult<()> {
        self.stream.close(None).await?;
        Ok(())
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

/// WebSocket connection manager.
#[derive(Debug, Clone, Default)]
pub struct ConnectionManager {
    config: ConnectionConfig,
}

impl ConnectionManager {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Open a connection to `endpoint` and run `hook` on it.
    pub async fn connect(
        &self,
        endpoint: &str,
        hook: Option<&dyn ConnectHook>,
    ) -> WsResult<Connection> {
        info!(url = %endpoint, "Connecting to WebSocket");

        let timeout = Duration::from_millis(self.config.connect_timeout_ms);
        let handshake =
            connect_async_tls_with_config(endpoint, None, self.config.tcp_nodelay, None);

        let (stream, _response) = match tokio::time::timeout(timeout, handshake).await {
            Ok(Ok(connected)) => connected,
            Ok(Err(e)) => return Err(WsError::ConnectionFailed(e.to_string())),
            Err(_) => {
                return Err(WsError::HandshakeTimeout {
                    endpoint: endpoint.to_string(),
                    timeout_ms: self.config.connect_timeout_ms,
                })
            }
        };

        let mut connection = Connection {
            stream,
            endpoint: endpoint.to_string(),
        };
        info!(url = %endpoint, "WebSocket connected");

        if let Some(hook) = hook {
            if let Err(e) = hook.on_connect(&mut connection).await {
                warn!(?e, url = %endpoint, "Post-connect hook failed, closing connection");
                if let Err(close_err) = connection.close().await {
                    debug!(?close_err, "Close after hook failure failed");
                }
                return Err(match e {
                    WsError::HookFailed(reason) => WsError::HookFailed(reason),
                    other => WsError::HookFailed(other.to_string()),
                });
            }
            debug!(url = %endpoint, "Post-connect hook completed");
        }

        Ok(connection)
    }
}
