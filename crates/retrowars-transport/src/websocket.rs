//! WebSocket plumbing on top of `tokio-tungstenite`.
//!
//! The stream is split right after the handshake: the send loop owns the
//! sink half, the receive loop owns the stream half, so neither waits on a
//! lock held by the other.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::{Endpoint, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub(crate) type FrameSink = SplitSink<WsStream, Message>;
pub(crate) type FrameStream = SplitStream<WsStream>;

/// Opens a WebSocket to `endpoint` and splits it into its two halves.
pub(crate) async fn connect(
    endpoint: &Endpoint,
) -> Result<(FrameSink, FrameStream), TransportError> {
    open(&endpoint.url()).await
}

async fn open(url: &str) -> Result<(FrameSink, FrameStream), TransportError> {
    let (ws, response) = tokio_tungstenite::connect_async(url).await.map_err(|e| {
        TransportError::ConnectFailed(into_io(e, std::io::ErrorKind::ConnectionRefused))
    })?;
    tracing::debug!(%url, status = %response.status(), "WebSocket handshake complete");
    Ok(ws.split())
}

/// Writes one encoded message.
///
/// UTF-8 payloads (everything `JsonCodec` produces) go out as text frames,
/// anything else as binary.
pub(crate) async fn write_frame(
    sink: &mut FrameSink,
    payload: Vec<u8>,
) -> Result<(), TransportError> {
    let msg = match String::from_utf8(payload) {
        Ok(text) => Message::Text(text.into()),
        Err(e) => Message::Binary(e.into_bytes().into()),
    };
    sink.send(msg).await.map_err(|e| {
        TransportError::SendFailed(into_io(e, std::io::ErrorKind::BrokenPipe))
    })
}

/// Reads the next data frame.
///
/// Returns `Ok(None)` when the connection is cleanly closed.
pub(crate) async fn read_frame(
    stream: &mut FrameStream,
) -> Result<Option<Vec<u8>>, TransportError> {
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                return Ok(Some(text.as_bytes().to_vec()));
            }
            Some(Ok(Message::Binary(data))) => {
                return Ok(Some(data.into()));
            }
            Some(Ok(Message::Close(_))) | None => return Ok(None),
            // Ping and pong are answered by tungstenite itself.
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                return Err(TransportError::ReceiveFailed(into_io(
                    e,
                    std::io::ErrorKind::ConnectionReset,
                )));
            }
        }
    }
}

/// Sends a close frame. Errors are irrelevant at this point: either the
/// close went out or the connection is already gone.
pub(crate) async fn close(sink: &mut FrameSink) {
    if let Err(e) = sink.close().await {
        tracing::debug!(error = %e, "close frame not sent");
    }
}

/// Keeps real I/O errors as they are and wraps protocol errors.
fn into_io(e: tungstenite::Error, kind: std::io::ErrorKind) -> std::io::Error {
    match e {
        tungstenite::Error::Io(io) => io,
        other => std::io::Error::new(kind, other),
    }
}
