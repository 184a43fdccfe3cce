//! Turning messages into frame payloads and back.
//!
//! The transport only sees bytes. Whatever it hands to [`Codec::decode`]
//! came off one WebSocket frame, and whatever [`Codec::encode`] returns goes
//! into one.
//!
//! The match server speaks JSON, hence [`JsonCodec`].

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Frame payload format shared by both directions.
///
/// `Send + Sync + 'static` because the codec is moved into the transport's
/// background tasks and may run on any thread of the Tokio pool.
pub trait Codec: Send + Sync + 'static {
    /// Produces the payload of one outbound frame.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Reads one inbound frame payload.
    ///
    /// # Errors
    /// `ProtocolError::Decode` for anything that is not a well-formed `T`,
    /// including an unknown message `"type"`.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Every message becomes one JSON object, so a frame is readable in any
/// WebSocket inspector.
///
/// ## Example
///
/// ```rust
/// use retrowars_protocol::{ClientMessage, Codec, JsonCodec};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&ClientMessage::UpdateScore { score: 1200 }).unwrap();
/// assert_eq!(bytes, br#"{"type":"UpdateScore","score":1200}"#);
///
/// let decoded: ClientMessage = codec.decode(&bytes).unwrap();
/// assert_eq!(decoded, ClientMessage::UpdateScore { score: 1200 });
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
