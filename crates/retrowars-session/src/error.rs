//! Error types for the session layer.

use retrowars_transport::TransportError;

/// Errors returned by [`ClientSession`](crate::ClientSession) and
/// [`SessionSlot`](crate::SessionSlot).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The slot already holds a session, or one is being connected.
    /// Disconnect it first.
    #[error("a match session is already connected")]
    AlreadyConnected,

    /// Connecting, queueing or sending failed underneath.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
