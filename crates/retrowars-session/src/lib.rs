//! Match state and the client session for Retrowars.
//!
//! This crate turns the raw message stream of a [`Link`](retrowars_transport::Link)
//! into something a game can use:
//!
//! 1. **Match state** ([`MatchState`]): the roster, everyone's score, and
//!    how close each player is to the next breakpoint
//! 2. **Listener** ([`SessionListener`]): callbacks the game registers to
//!    hear about roster changes, scores, breakpoints and the disconnect
//! 3. **Session** ([`ClientSession`]): one connected, registered client
//!    with the outbound operations the game calls from its loop
//! 4. **Slot** ([`SessionSlot`]): keeps at most one session alive
//!
//! # How it fits in the stack
//!
//! ```text
//! Game (above)                ← implements SessionListener, calls update_score
//!     ↕
//! Session Layer (this crate)  ← applies messages, derives events
//!     ↕
//! Transport Layer (below)     ← WebSocket, queue, keepalive
//! ```

mod config;
mod error;
mod listener;
mod roster;
mod session;
mod slot;

pub use config::ClientConfig;
pub use error::SessionError;
pub use listener::{SessionEvent, SessionListener};
pub use roster::{MatchState, Player};
pub use session::ClientSession;
pub use slot::SessionSlot;
