//! Errors of the WebSocket link.

/// Why a link could not be opened or a message could not be queued.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection could not be established (DNS, TCP, TLS, or the
    /// WebSocket handshake failed, or it timed out).
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// The socket rejected an outbound frame. Logged by the send task.
    #[error("frame write failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// The socket broke while reading. Ends the receive task.
    #[error("frame read failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// The outbound queue is at capacity; the message was not enqueued.
    #[error("send queue full ({capacity} messages pending)")]
    QueueFull { capacity: usize },

    /// The link is closed and no longer accepts messages.
    #[error("link closed")]
    Closed,
}
