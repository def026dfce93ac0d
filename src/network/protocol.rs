//! Protocol Messages
//!
//! Wire format between peers and the relay. Every frame is a text message
//! of the form `<tag>[|<payload>]`:
//!
//! | Tag | Meaning        | Payload                      |
//! |-----|----------------|------------------------------|
//! | `0` | Start          | none                         |
//! | `1` | Crash          | none                         |
//! | `2` | Input down     | `0` jump, `1` duck           |
//! | `3` | Input up       | `0` jump, `1` duck           |
//! | `4` | Opponent seen  | `1` present, `0` absent      |
//! | `9` | Error          | human-readable text          |

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Deserialize};

use crate::game::simulation::{InputChannel, InputEdge};

/// Separator between tag and payload.
pub const SEPARATOR: char = '|';

// =============================================================================
// ERRORS
// =============================================================================

/// Malformed inbound frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Tag is not a number
    #[error("invalid message tag: {0:?}")]
    InvalidTag(String),

    /// Numeric tag not in the table
    #[error("unknown message tag: {0}")]
    UnknownTag(u8),

    /// Tag requires a payload and none was sent
    #[error("missing payload for tag {0}")]
    MissingPayload(u8),

    /// Payload outside the allowed values
    #[error("invalid payload for tag {tag}: {payload:?}")]
    InvalidPayload {
        /// Message tag
        tag: u8,
        /// Payload as received
        payload: String,
    },
}

// =============================================================================
// MESSAGES
// =============================================================================

/// Every message exchanged through the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ProtocolMessage {
    /// Opponent started a round
    Start,
    /// Opponent crashed
    Crash,
    /// Opponent pressed a button
    InputDown(InputChannel),
    /// Opponent released a button
    InputUp(InputChannel),
    /// Relay's view of whether the opponent is connected
    Presence(bool),
    /// Relay-reported error
    Error(String),
}

impl ProtocolMessage {
    /// Start tag
    pub const TAG_START: u8 = 0;
    /// Crash tag
    pub const TAG_CRASH: u8 = 1;
    /// Input-down tag
    pub const TAG_INPUT_DOWN: u8 = 2;
    /// Input-up tag
    pub const TAG_INPUT_UP: u8 = 3;
    /// Presence tag
    pub const TAG_PRESENCE: u8 = 4;
    /// Error tag
    pub const TAG_ERROR: u8 = 9;

    /// Message for an input edge.
    pub fn from_edge(edge: InputEdge) -> Self {
        if edge.down {
            Self::InputDown(edge.channel)
        } else {
            Self::InputUp(edge.channel)
        }
    }

    /// Input edge carried by this message, if any.
    pub fn as_edge(&self) -> Option<InputEdge> {
        match *self {
            Self::InputDown(channel) => Some(InputEdge::down(channel)),
            Self::InputUp(channel) => Some(InputEdge::up(channel)),
            _ => None,
        }
    }

    /// Numeric tag.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Start => Self::TAG_START,
            Self::Crash => Self::TAG_CRASH,
            Self::InputDown(_) => Self::TAG_INPUT_DOWN,
            Self::InputUp(_) => Self::TAG_INPUT_UP,
            Self::Presence(_) => Self::TAG_PRESENCE,
            Self::Error(_) => Self::TAG_ERROR,
        }
    }

    /// Encode to the text wire form.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Decode a text frame.
    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        frame.parse()
    }
}

fn channel_code(channel: InputChannel) -> u8 {
    match channel {
        InputChannel::Jump => 0,
        InputChannel::Duck => 1,
    }
}

fn require_payload(tag: u8, payload: Option<&str>) -> Result<&str, ProtocolError> {
    payload.ok_or(ProtocolError::MissingPayload(tag))
}

fn parse_channel(tag: u8, payload: Option<&str>) -> Result<InputChannel, ProtocolError> {
    match require_payload(tag, payload)? {
        "0" => Ok(InputChannel::Jump),
        "1" => Ok(InputChannel::Duck),
        other => Err(ProtocolError::InvalidPayload { tag, payload: other.to_owned() }),
    }
}

impl fmt::Display for ProtocolMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.tag();
        match self {
            Self::Start | Self::Crash => write!(f, "{tag}"),
            Self::InputDown(channel) | Self::InputUp(channel) => {
                write!(f, "{tag}{SEPARATOR}{}", channel_code(*channel))
            }
            Self::Presence(present) => write!(f, "{tag}{SEPARATOR}{}", u8::from(*present)),
            Self::Error(text) => write!(f, "{tag}{SEPARATOR}{text}"),
        }
    }
}

impl FromStr for ProtocolMessage {
    type Err = ProtocolError;

    fn from_str(frame: &str) -> Result<Self, Self::Err> {
        let (tag, payload) = match frame.split_once(SEPARATOR) {
            Some((tag, payload)) => (tag, Some(payload)),
            None => (frame, None),
        };

        let tag: u8 = tag
            .parse()
            .map_err(|_| ProtocolError::InvalidTag(tag.to_owned()))?;

        match tag {
            Self::TAG_START => Ok(Self::Start),
            Self::TAG_CRASH => Ok(Self::Crash),
            Self::TAG_INPUT_DOWN => parse_channel(tag, payload).map(Self::InputDown),
            Self::TAG_INPUT_UP => parse_channel(tag, payload).map(Self::InputUp),
            Self::TAG_PRESENCE => match require_payload(tag, payload)? {
                "1" => Ok(Self::Presence(true)),
                "0" => Ok(Self::Presence(false)),
                other => Err(ProtocolError::InvalidPayload { tag, payload: other.to_owned() }),
            },
            Self::TAG_ERROR => Ok(Self::Error(payload.unwrap_or_default().to_owned())),
            other => Err(ProtocolError::UnknownTag(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_table() {
        assert_eq!(ProtocolMessage::Start.encode(), "0");
        assert_eq!(ProtocolMessage::Crash.encode(), "1");
        assert_eq!(ProtocolMessage::InputDown(InputChannel::Jump).encode(), "2|0");
        assert_eq!(ProtocolMessage::InputDown(InputChannel::Duck).encode(), "2|1");
        assert_eq!(ProtocolMessage::InputUp(InputChannel::Jump).encode(), "3|0");
        assert_eq!(ProtocolMessage::InputUp(InputChannel::Duck).encode(), "3|1");
        assert_eq!(ProtocolMessage::Presence(true).encode(), "4|1");
        assert_eq!(ProtocolMessage::Presence(false).encode(), "4|0");
        assert_eq!(ProtocolMessage::Error("Lobby Full".into()).encode(), "9|Lobby Full");
    }

    #[test]
    fn test_decode_relay_frames() {
        assert_eq!(ProtocolMessage::decode("4|1").unwrap(), ProtocolMessage::Presence(true));
        assert_eq!(
            ProtocolMessage::decode("9|Invalid Lobby ID").unwrap(),
            ProtocolMessage::Error("Invalid Lobby ID".into())
        );
        assert_eq!(
            ProtocolMessage::decode("3|1").unwrap(),
            ProtocolMessage::InputUp(InputChannel::Duck)
        );
    }

    #[test]
    fn test_error_text_may_contain_separator() {
        let msg = ProtocolMessage::decode("9|a|b").unwrap();
        assert_eq!(msg, ProtocolMessage::Error("a|b".into()));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(ProtocolMessage::decode(""), Err(ProtocolError::InvalidTag(_))));
        assert!(matches!(ProtocolMessage::decode("x|1"), Err(ProtocolError::InvalidTag(_))));
        assert_eq!(ProtocolMessage::decode("7"), Err(ProtocolError::UnknownTag(7)));
        assert_eq!(ProtocolMessage::decode("2"), Err(ProtocolError::MissingPayload(2)));
        assert!(matches!(
            ProtocolMessage::decode("2|5"),
            Err(ProtocolError::InvalidPayload { tag: 2, .. })
        ));
        assert!(matches!(ProtocolMessage::decode("4|yes"), Err(ProtocolError::InvalidPayload { .. })));
    }

    #[test]
    fn test_edge_mapping() {
        let edge = InputEdge::up(InputChannel::Duck);
        let msg = ProtocolMessage::from_edge(edge);
        assert_eq!(msg.encode(), "3|1");
        assert_eq!(msg.as_edge(), Some(edge));
        assert_eq!(ProtocolMessage::Start.as_edge(), None);
    }

    #[test]
    fn test_json_form_for_logs() {
        let json = serde_json::to_string(&ProtocolMessage::InputDown(InputChannel::Jump)).unwrap();
        assert!(json.contains("input_down"));
        assert!(json.contains("jump"));
    }
}
