//! Lobby Relay Server
//!
//! Pairs two peers per lobby and forwards their text frames verbatim. The
//! relay never looks inside a frame; it only speaks the presence (`4`) and
//! error (`9`) messages itself.
//!
//! Connections arrive at `/ws?lobby=<int>`. A lobby holds at most two
//! participants; empty lobbies are swept on a timer.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use serde::{Serialize, Deserialize};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::{interval_at, Instant};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::network::protocol::ProtocolMessage;
use crate::network::session::LobbyId;

/// WebSocket endpoint path.
pub const ENDPOINT_PATH: &str = "/ws";

/// Participants per lobby.
pub const LOBBY_CAPACITY: usize = 2;

/// Unique connection identifier.
pub type ConnectionId = Uuid;

/// Relay configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// How often empty lobbies are removed (milliseconds).
    pub cleanup_interval_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 2222)),
            cleanup_interval_ms: 5000,
        }
    }
}

impl RelayConfig {
    /// Cleanup interval as a duration.
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms.max(1))
    }
}

/// Relay server errors.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// A connected participant.
struct Participant {
    id: ConnectionId,
    sender: mpsc::UnboundedSender<Message>,
}

/// Up to two participants sharing frames.
struct Lobby {
    participants: Vec<Participant>,
    created_at: DateTime<Utc>,
}

impl Lobby {
    fn new() -> Self {
        Self { participants: Vec::with_capacity(LOBBY_CAPACITY), created_at: Utc::now() }
    }

    /// Send to everyone except `from`. Returns how many received it.
    fn send_to_others(&self, from: ConnectionId, msg: &Message) -> usize {
        self.participants
            .iter()
            .filter(|p| p.id != from)
            .filter(|p| p.sender.send(msg.clone()).is_ok())
            .count()
    }
}

type Lobbies = Arc<RwLock<BTreeMap<LobbyId, Lobby>>>;

fn text(msg: ProtocolMessage) -> Message {
    Message::Text(msg.encode())
}

/// Extract the lobby id from a request query string.
pub fn parse_lobby_id(query: Option<&str>) -> Option<LobbyId> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "lobby")
        .and_then(|(_, value)| value.parse().ok())
}

/// The relay server.
pub struct RelayServer {
    /// Server configuration.
    config: RelayConfig,
    /// Active lobbies.
    lobbies: Lobbies,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl RelayServer {
    /// Create a new relay.
    pub fn new(config: RelayConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            lobbies: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Bind the configured address and serve until shutdown.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), RelayError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("Relay listening on {}", self.config.bind_addr);
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), RelayError> {
        let cleanup_lobbies = self.lobbies.clone();
        let cleanup_interval = self.config.cleanup_interval();
        let cleanup_handle = tokio::spawn(async move {
            Self::run_cleanup_loop(cleanup_lobbies, cleanup_interval).await;
        });

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            debug!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        cleanup_handle.abort();
        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let lobbies = self.lobbies.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut query = None;
            let callback = |req: &Request, resp: Response| {
                if req.uri().path() != ENDPOINT_PATH {
                    let mut not_found = ErrorResponse::new(Some("Not Found".to_string()));
                    *not_found.status_mut() = StatusCode::NOT_FOUND;
                    return Err(not_found);
                }
                query = req.uri().query().map(str::to_owned);
                Ok(resp)
            };

            let ws_stream = match accept_hdr_async(stream, callback).await {
                Ok(ws) => ws,
                Err(e) => {
                    warn!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();

            let Some(lobby_id) = parse_lobby_id(query.as_deref()) else {
                debug!("Rejecting {}: bad lobby id {:?}", addr, query);
                let _ = ws_sender.send(text(ProtocolMessage::Error("Invalid Lobby ID".into()))).await;
                let _ = ws_sender.close().await;
                return;
            };

            let id = Uuid::new_v4();
            let (msg_tx, mut msg_rx) = mpsc::unbounded_channel::<Message>();

            // Join lobby
            {
                let mut lobbies = lobbies.write().await;
                let lobby = lobbies.entry(lobby_id).or_insert_with(Lobby::new);

                if lobby.participants.len() >= LOBBY_CAPACITY {
                    drop(lobbies);
                    info!("Lobby {} full, rejecting {}", lobby_id, addr);
                    let _ = ws_sender.send(text(ProtocolMessage::Error("Lobby Full".into()))).await;
                    let _ = ws_sender.close().await;
                    return;
                }

                lobby.participants.push(Participant { id, sender: msg_tx.clone() });
                info!("{} joined lobby {} ({}/{})", addr, lobby_id, lobby.participants.len(), LOBBY_CAPACITY);

                if lobby.participants.len() == LOBBY_CAPACITY {
                    for participant in &lobby.participants {
                        let _ = participant.sender.send(text(ProtocolMessage::Presence(true)));
                    }
                }
            }

            // Spawn message sender task
            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    if ws_sender.send(msg).await.is_err() {
                        break;
                    }
                }
                let _ = ws_sender.close().await;
            });

            // Forward incoming frames
            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(frame))) => {
                                let lobbies = lobbies.read().await;
                                if let Some(lobby) = lobbies.get(&lobby_id) {
                                    if lobby.send_to_others(id, &Message::Text(frame)) > 0 {
                                        let _ = msg_tx.send(text(ProtocolMessage::Presence(true)));
                                    }
                                }
                            }
                            Some(Ok(Message::Binary(_))) => {
                                debug!("Binary frame from {}, dropping connection", addr);
                                let _ = msg_tx.send(text(ProtocolMessage::Error("Packet Error".into())));
                                break;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                warn!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }

            // Leave lobby
            {
                let mut lobbies = lobbies.write().await;
                if let Some(lobby) = lobbies.get_mut(&lobby_id) {
                    lobby.participants.retain(|p| p.id != id);
                    lobby.send_to_others(id, &text(ProtocolMessage::Presence(false)));
                }
            }

            // Flush anything queued, then close
            drop(msg_tx);
            let _ = sender_task.await;

            info!("{} left lobby {}", addr, lobby_id);
        });
    }

    /// Periodically remove empty lobbies. The first sweep waits a full period.
    async fn run_cleanup_loop(lobbies: Lobbies, period: Duration) {
        let mut interval = interval_at(Instant::now() + period, period);

        loop {
            interval.tick().await;
            Self::remove_empty_lobbies(&lobbies).await;
        }
    }

    async fn remove_empty_lobbies(lobbies: &Lobbies) -> usize {
        let now = Utc::now();
        let mut lobbies = lobbies.write().await;
        let before = lobbies.len();

        lobbies.retain(|lobby_id, lobby| {
            let keep = !lobby.participants.is_empty();
            if !keep {
                debug!("Removing empty lobby {} (age {}s)", lobby_id, (now - lobby.created_at).num_seconds());
            }
            keep
        });

        before - lobbies.len()
    }

    /// Remove empty lobbies now. Returns how many were removed.
    pub async fn cleanup(&self) -> usize {
        Self::remove_empty_lobbies(&self.lobbies).await
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Number of lobbies, including empty ones awaiting cleanup.
    pub async fn lobby_count(&self) -> usize {
        self.lobbies.read().await.len()
    }

    /// Participants currently in a lobby.
    pub async fn participant_count(&self, lobby_id: LobbyId) -> usize {
        self.lobbies
            .read()
            .await
            .get(&lobby_id)
            .map_or(0, |lobby| lobby.participants.len())
    }
}
