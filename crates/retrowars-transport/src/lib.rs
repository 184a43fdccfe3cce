//! Transport layer for the Retrowars match client.
//!
//! Owns the physical WebSocket connection and everything that keeps it
//! moving: a bounded outbound queue, a receive loop, a send loop, and a
//! periodic keepalive. It is generic over the message types and the
//! [`Codec`](retrowars_protocol::Codec), so it knows nothing about players
//! or scores.
//!
//! - [`Endpoint`]: where to connect, and whether that means `wss`
//! - [`TransportConfig`]: queue size and timings
//! - [`Link`]: a live connection with its background tasks
//!
//! # Feature Flags
//!
//! - `tls` (default): enables `wss://`, used automatically for port 443

mod config;
mod error;
mod link;
mod websocket;

pub use config::{Endpoint, TransportConfig};
pub use error::TransportError;
pub use link::Link;

use std::fmt;

/// Tells links apart in log output. Numbers are handed out in connect
/// order and never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link-{}", self.0)
    }
}
