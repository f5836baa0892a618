use brigade_common::LiveMessage;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::app::ViewerEvent;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
    Connecting,
}

/// Parse one text frame from the live channel.
pub fn decode(text: &str) -> Result<LiveMessage, serde_json::Error> {
    serde_json::from_str(text)
}

/// Live channel client with auto-reconnect.
///
/// Every decoded message is forwarded to the viewer as
/// [`ViewerEvent::Live`]; state changes as [`ViewerEvent::Connection`].
pub struct LiveConnection {
    url: String,
    reconnect_interval: Duration,
    state: Arc<RwLock<ConnectionState>>,
}

impl LiveConnection {
    pub fn new(url: impl Into<String>, reconnect_interval: Duration) -> Self {
        Self {
            url: url.into(),
            reconnect_interval,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
        }
    }

    /// Get the current connection state
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    async fn set_state(&self, state: ConnectionState, events: &mpsc::Sender<ViewerEvent>) -> bool {
        *self.state.write().await = state;
        events.send(ViewerEvent::Connection(state)).await.is_ok()
    }

    /// Start the connect/read/reconnect loop.
    ///
    /// The task ends once the event receiver is dropped.
    pub fn start(self: Arc<Self>, events: mpsc::Sender<ViewerEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                if !self.set_state(ConnectionState::Connecting, &events).await {
                    return;
                }
                tracing::info!("Connecting to live channel at {}...", self.url);

                match connect_async(self.url.as_str()).await {
                    Ok((stream, _)) => {
                        tracing::info!("Live channel connected");
                        if !self.set_state(ConnectionState::Connected, &events).await {
                            return;
                        }
                        if !self.read_until_closed(stream, &events).await {
                            return;
                        }
                        tracing::warn!("Live channel lost, relying on polling");
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Failed to connect to live channel: {}. Will retry in {}s",
                            e,
                            self.reconnect_interval.as_secs()
                        );
                    }
                }

                if !self.set_state(ConnectionState::Disconnected, &events).await {
                    return;
                }
                sleep(self.reconnect_interval).await;
            }
        })
    }

    /// Forward messages until the socket ends. Returns false when the
    /// viewer has gone away.
    async fn read_until_closed<S>(&self, mut stream: S, events: &mpsc::Sender<ViewerEvent>) -> bool
    where
        S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        // pings are answered by tungstenite while reading
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Text(text)) => match decode(text.as_str()) {
                    Ok(message) => {
                        tracing::debug!("Live {} received", message.kind());
                        if events.send(ViewerEvent::Live(message)).await.is_err() {
                            return false;
                        }
                    }
                    Err(e) => tracing::warn!("Ignoring malformed live message: {}", e),
                },
                Ok(Message::Close(frame)) => {
                    tracing::info!("Live channel closed by server: {:?}", frame);
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!("Live channel error: {}", e);
                    break;
                }
            }
        }
        true
    }
}
