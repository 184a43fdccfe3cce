//! Wire protocol for the Retrowars match client.
//!
//! This crate defines what the client and the match server say to each
//! other:
//!
//! - **Types** ([`ServerMessage`], [`ClientMessage`], [`PlayerStatus`],
//!   [`PlayerId`]): the messages that travel on the wire, one set per
//!   direction.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (frames) and session (roster
//! and scores). It doesn't know about sockets or listeners; it only knows
//! how to serialize and deserialize messages.
//!
//! ```text
//! Transport (frames) → Protocol (ServerMessage) → Session (roster, scores)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientMessage, Keepalive, PROTOCOL_VERSION, PlayerId, PlayerStatus,
    ServerMessage,
};
