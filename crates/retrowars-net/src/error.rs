//! Unified error type for the Retrowars client.

use retrowars_protocol::ProtocolError;
use retrowars_session::SessionError;
use retrowars_transport::TransportError;

/// Any error the Retrowars client can return.
///
/// Games using the `retrowars-net` crate deal with this one type instead
/// of importing errors from each layer; `?` converts them automatically.
#[derive(Debug, thiserror::Error)]
pub enum RetrowarsError {
    /// Connecting, sending or a full outbound queue.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Encoding or decoding a message.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Session lifecycle, e.g. connecting twice.
    #[error(transparent)]
    Session(#[from] SessionError),
}
