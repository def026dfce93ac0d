//! Message Channels
//!
//! The session talks to its opponent through a [`MessageChannel`]: an
//! ordered, reliable text pipe. Sending never blocks and receiving is
//! polled, so the tick loop stays synchronous. The WebSocket
//! implementation bridges to the socket with two background tasks.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

/// Channel failures.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The other end is gone.
    #[error("Channel closed")]
    Closed,

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Ordered, reliable text channel to the relay.
pub trait MessageChannel: Send {
    /// Queue a frame for delivery.
    fn send(&mut self, frame: &str) -> Result<(), ChannelError>;

    /// Next inbound frame, if one has arrived.
    ///
    /// Returns `Err(ChannelError::Closed)` once the channel is closed and
    /// drained.
    fn try_recv(&mut self) -> Result<Option<String>, ChannelError>;
}

fn poll(rx: &mut mpsc::UnboundedReceiver<String>) -> Result<Option<String>, ChannelError> {
    match rx.try_recv() {
        Ok(frame) => Ok(Some(frame)),
        Err(TryRecvError::Empty) => Ok(None),
        Err(TryRecvError::Disconnected) => Err(ChannelError::Closed),
    }
}

// =============================================================================
// LOOPBACK
// =============================================================================

/// In-process channel end. Frames sent on one end arrive at its peer.
#[derive(Debug)]
pub struct LoopbackChannel {
    tx: mpsc::UnboundedSender<String>,
    rx: mpsc::UnboundedReceiver<String>,
}

impl LoopbackChannel {
    /// Two connected ends.
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        (Self { tx: a_tx, rx: b_rx }, Self { tx: b_tx, rx: a_rx })
    }
}

impl MessageChannel for LoopbackChannel {
    fn send(&mut self, frame: &str) -> Result<(), ChannelError> {
        self.tx.send(frame.to_owned()).map_err(|_| ChannelError::Closed)
    }

    fn try_recv(&mut self) -> Result<Option<String>, ChannelError> {
        poll(&mut self.rx)
    }
}

// =============================================================================
// WEBSOCKET
// =============================================================================

/// Client connection to the relay.
pub struct WebSocketChannel {
    outbound: mpsc::UnboundedSender<String>,
    inbound: mpsc::UnboundedReceiver<String>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl std::fmt::Debug for WebSocketChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketChannel").finish_non_exhaustive()
    }
}

impl WebSocketChannel {
    /// Connect to a relay lobby URL such as `ws://host:2222/ws?lobby=7`.
    pub async fn connect(url: &str) -> Result<Self, ChannelError> {
        let (ws_stream, _) = connect_async(url).await?;
        debug!("Connected to {}", url);

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (outbound, mut out_rx) = mpsc::unbounded_channel::<String>();
        let (in_tx, inbound) = mpsc::unbounded_channel::<String>();

        let writer = tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if ws_sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            let _ = ws_sender.close().await;
        });

        let reader = tokio::spawn(async move {
            while let Some(msg) = ws_receiver.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        if in_tx.send(text).is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => {
                        debug!("Relay closed the connection");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("WebSocket error: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(Self { outbound, inbound, reader, writer })
    }
}

impl MessageChannel for WebSocketChannel {
    fn send(&mut self, frame: &str) -> Result<(), ChannelError> {
        self.outbound.send(frame.to_owned()).map_err(|_| ChannelError::Closed)
    }

    fn try_recv(&mut self) -> Result<Option<String>, ChannelError> {
        poll(&mut self.inbound)
    }
}

impl Drop for WebSocketChannel {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}
