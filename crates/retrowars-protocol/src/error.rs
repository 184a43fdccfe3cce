//! What can go wrong between bytes and messages.

/// Encoding, decoding or interpreting a message failed.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// An outbound message could not be turned into JSON.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// An inbound frame is not a message we understand: broken JSON, an
    /// unknown `"type"`, or missing fields.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A status string that isn't one of the statuses this client knows.
    ///
    /// Usually means the server runs a newer protocol than the client.
    #[error("unknown player status: {0:?}")]
    UnknownStatus(String),
}
