//! Core protocol types for the match wire format.
//!
//! Every type here travels "on the wire": it gets serialized, sent over the
//! WebSocket, and deserialized on the other side. Messages are split by
//! direction: [`ServerMessage`] is what the match server sends us,
//! [`ClientMessage`] is what we send back.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Version sent in [`ClientMessage::RegisterPlayer`] unless the caller
/// configures another one. The server uses it to turn away incompatible
/// clients.
pub const PROTOCOL_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A server-assigned player identifier, unique for the lifetime of a
/// connection.
///
/// `#[serde(transparent)]` keeps it a plain number on the wire:
/// `PlayerId(42)` is `42`, not `{"0":42}`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// PlayerStatus
// ---------------------------------------------------------------------------

/// Where a player currently is in the match lifecycle.
///
/// Serialized lowercase (`"lobby"`, `"playing"`, `"dead"`), which is the
/// form the server uses.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    /// Waiting in the lobby, possibly queued for a game.
    #[default]
    Lobby,
    /// In a running match.
    Playing,
    /// Out of the current match but still connected.
    Dead,
}

impl PlayerStatus {
    /// The wire spelling of this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lobby => "lobby",
            Self::Playing => "playing",
            Self::Dead => "dead",
        }
    }
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlayerStatus {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lobby" => Ok(Self::Lobby),
            "playing" => Ok(Self::Playing),
            "dead" => Ok(Self::Dead),
            other => Err(ProtocolError::UnknownStatus(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// Messages the match server sends to this client.
///
/// `#[serde(tag = "type")]` makes the JSON internally tagged:
///   `{ "type": "PlayerScored", "id": 3, "score": 40000 }`
/// so the receiver can tell the kind without any outside context. An
/// unknown `"type"` fails to decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// A player joined. The first one the server reports after
    /// registration is always this client.
    PlayerAdded { id: PlayerId, game: String },

    /// A player left the match.
    PlayerRemoved { id: PlayerId },

    /// A player's absolute score.
    PlayerScored { id: PlayerId, score: i64 },

    /// A player's status changed.
    ///
    /// The status stays a raw string here: an unknown value is still a
    /// well-formed message, and the session decides what to do with it.
    PlayerStatusChanged { id: PlayerId, status: String },

    /// A player went back to the lobby, queued for `game`.
    PlayerReturnedToLobby { id: PlayerId, game: String },

    /// A new match begins for everyone in the roster.
    StartGame,

    /// The server is shutting down on purpose. The disconnect that follows
    /// is expected.
    ServerStopped,
}

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// Messages this client sends to the match server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// First message after connecting. The server answers with
    /// `PlayerAdded` for us and then for everyone else.
    RegisterPlayer { client_version: u32 },

    /// Our own status changed.
    UpdateStatus { status: PlayerStatus },

    /// Our own absolute score, for the server to relay to others.
    UpdateScore { score: i64 },

    /// Ask the server to start a match. The server decides.
    StartGame,

    /// Keeps idle connections from being reaped by proxies.
    Ping,
}

/// Outbound message types that have a keepalive form.
///
/// The transport sends `Self::keepalive()` on a timer without knowing
/// anything else about the message set.
pub trait Keepalive {
    /// The message to send when the connection has been idle.
    fn keepalive() -> Self;
}

impl Keepalive for ClientMessage {
    fn keepalive() -> Self {
        Self::Ping
    }
}
