//! Single push connection management.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use mcpanel_proto::{PushEvent, decode_push_frame};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::time::timeout;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{PushError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;

/// One item from the push stream: a typed event, or a frame that failed to
/// decode. Decode failures are delivered, not dropped.
pub type PushItem = std::result::Result<PushEvent, PushError>;

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

/// Delay before reconnect attempt `n`: `first * 2^n`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub first: Duration,
    pub max: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            first: Duration::from_millis(500),
            max: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1_u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.first
            .checked_mul(factor)
            .map_or(self.max, |delay| delay.min(self.max))
    }
}

/// Push connection configuration.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub connect_timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// Push connection.
pub struct PushChannel {
    url: Url,
    config: ChannelConfig,
    state: Arc<RwLock<ConnectionState>>,
    writer: Arc<Mutex<Option<WsWriter>>>,
    incoming_tx: mpsc::UnboundedSender<PushItem>,
    incoming_rx: Arc<Mutex<mpsc::UnboundedReceiver<PushItem>>>,
    recv_task: Arc<Mutex<Option<tokio::task::JoinHandle<()>>>>,
}

impl PushChannel {
    /// Create a new push channel with default config.
    pub fn new(url: &str) -> Result<Self> {
        Self::with_config(url, ChannelConfig::default())
    }

    /// Create a new push channel with custom config.
    pub fn with_config(url: &str, config: ChannelConfig) -> Result<Self> {
        let parsed_url = Url::parse(url)?;
        if parsed_url.scheme() != "ws" && parsed_url.scheme() != "wss" {
            return Err(PushError::InvalidUrl(format!(
                "URL must use ws:// or wss:// scheme, got: {}",
                parsed_url.scheme()
            )));
        }

        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();

        Ok(Self {
            url: parsed_url,
            config,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            writer: Arc::new(Mutex::new(None)),
            incoming_tx,
            incoming_rx: Arc::new(Mutex::new(incoming_rx)),
            recv_task: Arc::new(Mutex::new(None)),
        })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Current connection state.
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Connect and start the background receive loop. `Connected` is queued
    /// ahead of any frame from the new socket.
    pub async fn connect(&self) -> Result<()> {
        let mut state_guard = self.state.write().await;
        if *state_guard == ConnectionState::Connected {
            return Err(PushError::AlreadyConnected);
        }
        *state_guard = ConnectionState::Connecting;
        drop(state_guard);

        let connect_result = match timeout(
            self.config.connect_timeout,
            connect_async(self.url.as_str()),
        )
        .await
        {
            Ok(Ok(connected)) => connected,
            Ok(Err(error)) => {
                *self.state.write().await = ConnectionState::Disconnected;
                return Err(PushError::WebSocket(error.to_string()));
            }
            Err(_) => {
                *self.state.write().await = ConnectionState::Disconnected;
                return Err(PushError::Timeout(format!(
                    "connection timeout after {:?}",
                    self.config.connect_timeout
                )));
            }
        };

        let (stream, _response) = connect_result;
        let (writer, mut reader) = stream.split();
        *self.writer.lock().await = Some(writer);
        *self.state.write().await = ConnectionState::Connected;
        info!(url = %self.url, "push channel connected");
        let _ = self.incoming_tx.send(Ok(PushEvent::Connected));

        let incoming_tx = self.incoming_tx.clone();
        let state = Arc::clone(&self.state);
        let channel_url = self.url.to_string();

        let task = tokio::spawn(async move {
            while let Some(frame) = reader.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        let item = decode_push_frame(text.as_str()).map_err(|error| {
                            warn!("push frame decode error on {}: {}", channel_url, error);
                            PushError::Decode(error)
                        });
                        if incoming_tx.send(item).is_err() {
                            break;
                        }
                    }
                    Ok(Message::Ping(payload)) => {
                        debug!("received ping from {} ({} bytes)", channel_url, payload.len());
                    }
                    Ok(Message::Pong(_)) => {}
                    Ok(Message::Close(_)) => break,
                    Ok(Message::Binary(payload)) => {
                        debug!(
                            "ignoring binary frame from {} ({} bytes)",
                            channel_url,
                            payload.len()
                        );
                    }
                    Ok(Message::Frame(_)) => {}
                    Err(error) => {
                        warn!("websocket read error on {}: {}", channel_url, error);
                        break;
                    }
                }
            }

            *state.write().await = ConnectionState::Disconnected;
            info!(url = %channel_url, "push channel disconnected");
            let _ = incoming_tx.send(Ok(PushEvent::Disconnected));
        });

        *self.recv_task.lock().await = Some(task);
        Ok(())
    }

    /// Connects again after the socket dropped, waiting out the reconnect
    /// policy before each attempt. Returns how many attempts failed. Runs
    /// until a connection is made; callers bound it by dropping or aborting
    /// the task.
    pub async fn reconnect(&self) -> u32 {
        let mut failed = 0_u32;
        loop {
            let delay = self.config.reconnect.delay(failed);
            tokio::time::sleep(delay).await;
            match self.connect().await {
                Ok(()) | Err(PushError::AlreadyConnected) => {
                    info!(url = %self.url, failed, "push channel reconnected");
                    return failed;
                }
                Err(error) => {
                    warn!(url = %self.url, attempt = failed, %error, "push reconnect failed");
                    failed = failed.saturating_add(1);
                }
            }
        }
    }

    /// Close the socket and stop the receive loop. Queues `Disconnected`
    /// when the channel was live.
    pub async fn disconnect(&self) -> Result<()> {
        let was_connected = self.state().await == ConnectionState::Connected;

        if let Some(task) = self.recv_task.lock().await.take() {
            task.abort();
        }

        if let Some(mut writer) = self.writer.lock().await.take() {
            writer
                .send(Message::Close(None))
                .await
                .map_err(|error| PushError::WebSocket(error.to_string()))?;
        }

        *self.state.write().await = ConnectionState::Disconnected;
        if was_connected {
            let _ = self.incoming_tx.send(Ok(PushEvent::Disconnected));
        }
        Ok(())
    }

    /// Receive the next push item. `None` only if the channel is dropped.
    pub async fn recv(&self) -> Option<PushItem> {
        self.incoming_rx.lock().await.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_websocket_urls() {
        let result = PushChannel::new("http://127.0.0.1:5000/events");
        assert!(matches!(result, Err(PushError::InvalidUrl(_))));

        let result = PushChannel::new("not a url");
        assert!(matches!(result, Err(PushError::UrlParse(_))));
    }

    #[tokio::test]
    async fn failed_connect_returns_to_disconnected() -> Result<()> {
        let channel = PushChannel::with_config(
            "ws://127.0.0.1:1/events",
            ChannelConfig {
                connect_timeout: Duration::from_millis(500),
                ..ChannelConfig::default()
            },
        )?;
        assert!(channel.connect().await.is_err());
        assert_eq!(channel.state().await, ConnectionState::Disconnected);
        Ok(())
    }

    #[test]
    fn reconnect_delay_doubles_up_to_the_cap() {
        let policy = ReconnectPolicy {
            first: Duration::from_millis(250),
            max: Duration::from_secs(5),
        };
        assert_eq!(policy.delay(0), Duration::from_millis(250));
        assert_eq!(policy.delay(1), Duration::from_millis(500));
        assert_eq!(policy.delay(4), Duration::from_secs(4));
        assert_eq!(policy.delay(5), Duration::from_secs(5));
        assert_eq!(policy.delay(64), Duration::from_secs(5));
    }
}
