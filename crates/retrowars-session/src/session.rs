//! The client's one connection to a match server.
//!
//! ```text
//!   game loop ── update_score / change_status / start_game ──▶ Link ──▶ server
//!       ▲                     │
//!       │               MatchState (mutex)
//!       │                     ▲
//!   SessionListener ◀── events ◀── receive task ◀──────────────────── server
//! ```
//!
//! Inbound messages and local score updates go through the same
//! [`MatchState`] transitions, so a score reported by the game itself and
//! the same score relayed by the server leave identical tables behind.
//! Both queue their events while the state is still locked, which keeps the
//! listener's view in step with the order the state actually changed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use retrowars_protocol::{ClientMessage, JsonCodec, PlayerId, PlayerStatus, ServerMessage};
use retrowars_transport::{ConnectionId, Link};

use crate::listener::ListenerSlot;
use crate::roster::{MatchState, Player};
use crate::{ClientConfig, SessionError, SessionListener};

/// State shared between the foreground and the link's receive task.
#[derive(Debug)]
struct Shared {
    state: Mutex<MatchState>,
    listener: ListenerSlot,
    graceful: AtomicBool,
}

impl Shared {
    fn new(breakpoint_unit: i64, listener: Arc<dyn SessionListener>) -> Self {
        let slot = ListenerSlot::default();
        slot.replace(Some(listener));
        Self {
            state: Mutex::new(MatchState::new(breakpoint_unit)),
            listener: slot,
            graceful: AtomicBool::new(false),
        }
    }

    fn state(&self) -> MutexGuard<'_, MatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs on the receive task for every decoded message.
    fn handle(&self, msg: ServerMessage) {
        tracing::debug!(?msg, "dispatching server message");
        match msg {
            ServerMessage::ServerStopped => {
                tracing::info!("server announced shutdown");
                self.graceful.store(true, Ordering::Release);
                return;
            }
            other => {
                let mut state = self.state();
                let events = state.apply(other);
                self.listener.push(events);
            }
        }
        self.listener.drain();
    }

    /// Applies a score the local player just made.
    fn local_score(&self, score: i64) {
        {
            let mut state = self.state();
            match state.me().map(|me| me.id) {
                Some(id) => {
                    let events = state.record_score(id, score);
                    self.listener.push(events);
                }
                None => {
                    tracing::debug!(score, "local player not known yet, score only sent");
                }
            }
        }
        self.listener.drain();
    }

    /// Runs once, after the link is gone.
    fn closed(&self) {
        let graceful = self.graceful.load(Ordering::Acquire);
        tracing::info!(graceful, "match session ended");
        self.listener.push_closed(graceful);
        self.listener.drain();
    }
}

/// A connected, registered match client.
///
/// The foreground methods never await and never block on the network:
/// outbound messages go into a bounded queue that a background task drains.
pub struct ClientSession {
    shared: Arc<Shared>,
    link: Link<ClientMessage>,
}

impl ClientSession {
    /// Connects to the server described by `config` and registers this
    /// client.
    ///
    /// `listener` is in place before the first frame is read, so it hears
    /// every event of the session, including a close that happens before
    /// this returns.
    ///
    /// # Errors
    /// Returns [`SessionError::Transport`] if the connection fails or the
    /// registration cannot be queued. The connection is closed again before
    /// the error is returned.
    pub async fn connect(
        config: ClientConfig,
        listener: Arc<dyn SessionListener>,
    ) -> Result<Self, SessionError> {
        let config = config.validated();
        let shared = Arc::new(Shared::new(config.breakpoint_unit, listener));

        let on_message = {
            let shared = Arc::clone(&shared);
            move |msg: ServerMessage| shared.handle(msg)
        };
        let on_closed = {
            let shared = Arc::clone(&shared);
            move || shared.closed()
        };
        let link = Link::connect(
            config.endpoint(),
            config.transport.clone(),
            JsonCodec,
            on_message,
            on_closed,
        )
        .await?;

        let register = ClientMessage::RegisterPlayer {
            client_version: config.client_version,
        };
        if let Err(e) = link.send(register) {
            tracing::warn!(id = %link.id(), error = %e, "registration failed, closing link");
            // The caller gets the error instead of a close callback.
            shared.listener.replace(None);
            link.disconnect().await;
            return Err(e.into());
        }
        tracing::info!(
            id = %link.id(),
            client_version = config.client_version,
            "registered with match server"
        );

        Ok(Self { shared, link })
    }

    /// Registers `listener`, replacing whatever was registered before.
    ///
    /// If the connection closed while no listener was registered, `listener`
    /// is told right away.
    pub fn listen(&self, listener: Arc<dyn SessionListener>) {
        self.shared.listener.replace(Some(listener));
    }

    /// Removes the registered listener. Events are dropped until the next
    /// [`listen`](Self::listen), except the close, which is kept for it.
    pub fn unlisten(&self) {
        self.shared.listener.replace(None);
    }

    /// Reports a new absolute score for the local player.
    ///
    /// The local tables and listener see it right away, exactly as if the
    /// server had relayed it; then it is queued for the server.
    ///
    /// # Errors
    /// [`TransportError::QueueFull`](retrowars_transport::TransportError::QueueFull)
    /// or [`TransportError::Closed`](retrowars_transport::TransportError::Closed)
    /// if it could not be queued. The local update has happened regardless.
    pub fn update_score(&self, score: i64) -> Result<(), SessionError> {
        self.shared.local_score(score);
        self.link.send(ClientMessage::UpdateScore { score })?;
        Ok(())
    }

    /// Sets the local player's status and tells the server. No listener
    /// callback fires for our own status.
    ///
    /// # Errors
    /// Same as [`update_score`](Self::update_score).
    pub fn change_status(&self, status: PlayerStatus) -> Result<(), SessionError> {
        if !self.shared.state().set_local_status(status) {
            tracing::debug!(%status, "local player not known yet, status only sent");
        }
        self.link.send(ClientMessage::UpdateStatus { status })?;
        Ok(())
    }

    /// Asks the server to start a match. Nothing changes locally until the
    /// server answers with `StartGame`.
    ///
    /// # Errors
    /// Same as [`update_score`](Self::update_score).
    pub fn start_game(&self) -> Result<(), SessionError> {
        self.link.send(ClientMessage::StartGame)?;
        Ok(())
    }

    /// The local player, once the server has described it.
    pub fn me(&self) -> Option<Player> {
        self.shared.state().me().cloned()
    }

    /// Everyone except the local player.
    pub fn other_players(&self) -> Vec<Player> {
        self.shared.state().other_players().to_vec()
    }

    /// The full roster, local player first.
    pub fn players(&self) -> Vec<Player> {
        self.shared.state().players().to_vec()
    }

    /// Last known score of `id`, 0 if none was reported.
    pub fn score_for(&self, id: PlayerId) -> i64 {
        self.shared.state().score_for(id)
    }

    /// `true` once the server has announced its shutdown.
    pub fn was_graceful(&self) -> bool {
        self.shared.graceful.load(Ordering::Acquire)
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// The link identifier used in log output.
    pub fn connection_id(&self) -> ConnectionId {
        self.link.id()
    }

    /// Closes the connection. Returns after the listener has been told.
    /// Calling it again does nothing.
    pub async fn disconnect(&self) {
        self.link.disconnect().await;
    }
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("link", &self.link)
            .field("graceful", &self.was_graceful())
            .finish()
    }
}
