//! A live connection to the match server and its background tasks.
//!
//! ```text
//!                      ┌──────────── supervisor ────────────┐
//!   Link::send ──▶ [bounded queue] ──▶ send task ──▶ sink ──▶ server
//!                        ▲
//!                 keepalive task
//!   on_message ◀── decode ◀── receive task ◀── stream ◀──── server
//!                      └──▶ on_closed (exactly once) ◀───────┘
//! ```
//!
//! The receive task is the one that decides when the link is over. When it
//! ends (server closed, read error, or the close handshake after a local
//! disconnect) the supervisor aborts and joins the send and keepalive tasks
//! and only then reports the disconnect.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use retrowars_protocol::{Codec, Keepalive};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::websocket::{self, FrameSink, FrameStream};
use crate::{ConnectionId, Endpoint, TransportConfig, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// A connected WebSocket link carrying outbound messages of type `O`.
///
/// Created by [`Link::connect`]. Dropping the link requests the same
/// shutdown as [`Link::disconnect`] without waiting for it.
pub struct Link<O> {
    id: ConnectionId,
    endpoint: Endpoint,
    outbound: mpsc::Sender<O>,
    capacity: usize,
    connected: Arc<AtomicBool>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl<O> Link<O>
where
    O: Serialize + Keepalive + Send + 'static,
{
    /// Connects to `endpoint` and starts the receive, send and keepalive
    /// tasks.
    ///
    /// Every decoded inbound message is handed to `on_message`, one at a
    /// time, in the order frames arrived. Frames that fail to decode are
    /// logged and skipped. `on_closed` runs exactly once, after the
    /// connection is gone and the send and keepalive tasks have finished.
    ///
    /// # Errors
    /// Returns [`TransportError::ConnectFailed`] if the TCP connection, TLS
    /// or WebSocket handshake fails or takes longer than
    /// `config.connect_timeout`. No task is started in that case.
    pub async fn connect<I, C, M, D>(
        endpoint: Endpoint,
        config: TransportConfig,
        codec: C,
        on_message: M,
        on_closed: D,
    ) -> Result<Self, TransportError>
    where
        I: DeserializeOwned + Send + 'static,
        C: Codec + Clone,
        M: FnMut(I) + Send + 'static,
        D: FnOnce() + Send + 'static,
    {
        let config = config.validated();

        let (sink, stream) =
            match time::timeout(config.connect_timeout, websocket::connect(&endpoint))
                .await
            {
                Ok(result) => result?,
                Err(_) => {
                    return Err(TransportError::ConnectFailed(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        format!("no handshake within {:?}", config.connect_timeout),
                    )));
                }
            };

        let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        tracing::info!(%id, %endpoint, "connected to match server");

        let (outbound_tx, outbound_rx) = mpsc::channel(config.send_queue_capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (close_tx, close_rx) = oneshot::channel();
        let connected = Arc::new(AtomicBool::new(true));

        let tasks = Tasks {
            receive: tokio::spawn(receive_loop(id, stream, codec.clone(), on_message)),
            send: tokio::spawn(send_loop(id, sink, outbound_rx, codec, close_rx)),
            keepalive: tokio::spawn(keepalive_loop(
                id,
                outbound_tx.clone(),
                config.keepalive_interval,
            )),
        };
        let supervisor = tokio::spawn(supervise(
            id,
            tasks,
            shutdown_rx,
            close_tx,
            config.close_grace,
            Arc::clone(&connected),
            on_closed,
        ));

        Ok(Self {
            id,
            endpoint,
            outbound: outbound_tx,
            capacity: config.send_queue_capacity,
            connected,
            shutdown: Mutex::new(Some(shutdown_tx)),
            supervisor: Mutex::new(Some(supervisor)),
        })
    }
}

impl<O> Link<O> {
    /// Queues a message for the send task. Never blocks.
    ///
    /// Messages reach the wire in the order they were queued.
    ///
    /// # Errors
    /// - [`TransportError::QueueFull`]: `send_queue_capacity` messages are
    ///   already waiting; this one was not queued.
    /// - [`TransportError::Closed`]: the link is down.
    pub fn send(&self, msg: O) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Closed);
        }
        self.outbound.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => TransportError::QueueFull {
                capacity: self.capacity,
            },
            TrySendError::Closed(_) => TransportError::Closed,
        })
    }

    /// Closes the connection and waits until every background task has
    /// finished and `on_closed` has run.
    ///
    /// Messages queued before the call are written ahead of the close frame,
    /// within `close_grace`. Sends made after it fail with
    /// [`TransportError::Closed`].
    ///
    /// Calling it again, or after the server already closed the link,
    /// returns immediately.
    pub async fn disconnect(&self) {
        let shutdown = lock(&self.shutdown).take();
        if let Some(shutdown) = shutdown {
            tracing::debug!(id = %self.id, "disconnect requested");
            let _ = shutdown.send(());
        }

        let supervisor = lock(&self.supervisor).take();
        if let Some(supervisor) = supervisor {
            if let Err(e) = supervisor.await {
                tracing::warn!(id = %self.id, error = %e, "link supervisor failed");
            }
        }
    }

    /// Returns `true` until the link has been torn down.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// The identifier used for this link in log output.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Where this link is connected to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

impl<O> std::fmt::Debug for Link<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("connected", &self.is_connected())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Background tasks
// ---------------------------------------------------------------------------

struct Tasks {
    receive: JoinHandle<()>,
    send: JoinHandle<()>,
    keepalive: JoinHandle<()>,
}

/// Waits for the receive task to end, then tears the rest down.
async fn supervise<D>(
    id: ConnectionId,
    mut tasks: Tasks,
    shutdown: oneshot::Receiver<()>,
    close: oneshot::Sender<()>,
    close_grace: Duration,
    connected: Arc<AtomicBool>,
    on_closed: D,
) where
    D: FnOnce() + Send + 'static,
{
    tokio::select! {
        _ = &mut tasks.receive => {
            tracing::debug!(%id, "receive loop finished");
        }
        // Fires on an explicit disconnect and when the `Link` is dropped.
        _ = shutdown => {
            let _ = close.send(());
            if time::timeout(close_grace, &mut tasks.receive).await.is_err() {
                tracing::warn!(%id, "server did not acknowledge close, aborting receive loop");
                tasks.receive.abort();
                let _ = (&mut tasks.receive).await;
            }
        }
    }

    tasks.keepalive.abort();
    let _ = tasks.keepalive.await;
    tasks.send.abort();
    let _ = tasks.send.await;

    connected.store(false, Ordering::Release);
    tracing::info!(%id, "link closed");
    on_closed();
}

/// Reads frames until the connection ends, decoding each one.
async fn receive_loop<I, C, M>(
    id: ConnectionId,
    mut stream: FrameStream,
    codec: C,
    mut on_message: M,
) where
    I: DeserializeOwned + Send + 'static,
    C: Codec,
    M: FnMut(I) + Send + 'static,
{
    loop {
        match websocket::read_frame(&mut stream).await {
            Ok(Some(frame)) => match codec.decode::<I>(&frame) {
                Ok(msg) => on_message(msg),
                Err(e) => {
                    tracing::warn!(
                        %id,
                        error = %e,
                        frame = %String::from_utf8_lossy(&frame),
                        "dropping undecodable frame"
                    );
                }
            },
            Ok(None) => {
                tracing::info!(%id, "server closed the connection");
                return;
            }
            Err(e) => {
                tracing::warn!(%id, error = %e, "receive failed");
                return;
            }
        }
    }
}

/// Drains the outbound queue in FIFO order.
///
/// On close the queue stops accepting messages, whatever is already in it
/// goes out, and only then is the close frame written.
async fn send_loop<O, C>(
    id: ConnectionId,
    mut sink: FrameSink,
    mut outbound: mpsc::Receiver<O>,
    codec: C,
    mut close: oneshot::Receiver<()>,
) where
    O: Serialize + Send + 'static,
    C: Codec,
{
    loop {
        tokio::select! {
            biased;
            _ = &mut close => {
                outbound.close();
                let mut flushed = 0usize;
                while let Ok(msg) = outbound.try_recv() {
                    if !write_message(id, &mut sink, &codec, msg).await {
                        return;
                    }
                    flushed += 1;
                }
                if flushed > 0 {
                    tracing::debug!(%id, flushed, "flushed queued messages before close");
                }
                websocket::close(&mut sink).await;
                return;
            }
            msg = outbound.recv() => {
                let Some(msg) = msg else { return };
                if !write_message(id, &mut sink, &codec, msg).await {
                    return;
                }
            }
        }
    }
}

/// Encodes and writes one message. Returns `false` once the sink is
/// unusable.
async fn write_message<O, C>(
    id: ConnectionId,
    sink: &mut FrameSink,
    codec: &C,
    msg: O,
) -> bool
where
    O: Serialize,
    C: Codec,
{
    let payload = match codec.encode(&msg) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(%id, error = %e, "dropping unencodable message");
            return true;
        }
    };
    if let Err(e) = websocket::write_frame(sink, payload).await {
        tracing::warn!(%id, error = %e, "send failed, stopping send loop");
        return false;
    }
    true
}

/// Queues a keepalive every `every`, starting one interval after connect.
async fn keepalive_loop<O>(id: ConnectionId, outbound: mpsc::Sender<O>, every: Duration)
where
    O: Keepalive + Send + 'static,
{
    let mut ticker = time::interval_at(time::Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match outbound.try_send(O::keepalive()) {
            Ok(()) => tracing::trace!(%id, "keepalive queued"),
            Err(TrySendError::Full(_)) => {
                tracing::warn!(%id, "send queue full, skipping keepalive");
            }
            Err(TrySendError::Closed(_)) => return,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrowars_protocol::ClientMessage;

    /// A link with no network behind it: the receiver stands in for the
    /// send task.
    fn detached_link(
        capacity: usize,
    ) -> (Link<ClientMessage>, mpsc::Receiver<ClientMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        let link = Link {
            id: ConnectionId::new(0),
            endpoint: Endpoint::new("localhost", 8080),
            outbound: tx,
            capacity,
            connected: Arc::new(AtomicBool::new(true)),
            shutdown: Mutex::new(None),
            supervisor: Mutex::new(None),
        };
        (link, rx)
    }

    #[test]
    fn test_send_queues_in_fifo_order() {
        let (link, mut rx) = detached_link(4);
        link.send(ClientMessage::StartGame).unwrap();
        link.send(ClientMessage::UpdateScore { score: 10 }).unwrap();

        assert_eq!(rx.try_recv().unwrap(), ClientMessage::StartGame);
        assert_eq!(
            rx.try_recv().unwrap(),
            ClientMessage::UpdateScore { score: 10 }
        );
    }

    #[test]
    fn test_send_full_queue_returns_queue_full() {
        let (link, _rx) = detached_link(1);
        link.send(ClientMessage::Ping).unwrap();

        let result = link.send(ClientMessage::UpdateScore { score: 1 });

        assert!(
            matches!(result, Err(TransportError::QueueFull { capacity: 1 })),
            "expected QueueFull, got {result:?}"
        );
    }

    #[test]
    fn test_send_after_receiver_dropped_returns_closed() {
        let (link, rx) = detached_link(1);
        drop(rx);

        let result = link.send(ClientMessage::Ping);

        assert!(matches!(result, Err(TransportError::Closed)));
    }

    #[test]
    fn test_send_when_disconnected_returns_closed() {
        let (link, _rx) = detached_link(4);
        link.connected.store(false, Ordering::Release);

        let result = link.send(ClientMessage::Ping);

        assert!(matches!(result, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_disconnect_without_tasks_returns_immediately() {
        let (link, _rx) = detached_link(1);
        link.disconnect().await;
        link.disconnect().await;
    }
}
