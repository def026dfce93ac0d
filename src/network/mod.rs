//! Network Layer
//!
//! Relay server, peer-side channels and the session coordinator.
//! This layer is **non-deterministic** - all game logic runs through `game/`.

pub mod protocol;
pub mod channel;
pub mod session;
pub mod peer;
pub mod relay;

pub use protocol::{ProtocolMessage, ProtocolError};
pub use channel::{MessageChannel, LoopbackChannel, WebSocketChannel, ChannelError};
pub use session::{SessionCoordinator, SessionConfig, SessionEvent, SessionLifecycle, LobbyId};
pub use peer::{PeerCommand, TracingSink};
pub use relay::{RelayServer, RelayConfig, RelayError};
