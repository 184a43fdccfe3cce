//! At most one match session at a time.
//!
//! ```text
//!   Empty ──connect()──▶ Connecting ──ok──▶ Active ──disconnect()──▶ Empty
//!                            │
//!                            └──error or cancelled──▶ Empty
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{ClientConfig, ClientSession, SessionError, SessionListener};

/// The process-wide slot returned by [`SessionSlot::global`].
static GLOBAL: SessionSlot = SessionSlot::new();

enum SlotState {
    Empty,
    /// A connect is in flight. Further connects are refused until it
    /// settles.
    Connecting,
    Active(Arc<ClientSession>),
}

/// Holds the one live [`ClientSession`].
///
/// Games that want a single shared session use [`SessionSlot::global`];
/// anything else (tests, tools running several clients) can own a slot of
/// its own.
pub struct SessionSlot {
    state: Mutex<SlotState>,
}

impl SessionSlot {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(SlotState::Empty),
        }
    }

    /// The slot shared by the whole process.
    pub fn global() -> &'static SessionSlot {
        &GLOBAL
    }

    /// Connects a new session with `listener` registered and installs it.
    ///
    /// # Errors
    /// - [`SessionError::AlreadyConnected`]: a session is installed or
    ///   another connect is in progress.
    /// - [`SessionError::Transport`]: connecting or registering failed. The
    ///   slot stays empty.
    pub async fn connect(
        &self,
        config: ClientConfig,
        listener: Arc<dyn SessionListener>,
    ) -> Result<Arc<ClientSession>, SessionError> {
        {
            let mut state = self.lock();
            if !matches!(*state, SlotState::Empty) {
                return Err(SessionError::AlreadyConnected);
            }
            *state = SlotState::Connecting;
        }

        let reservation = Reservation {
            slot: self,
            filled: false,
        };
        let session = Arc::new(ClientSession::connect(config, listener).await?);
        reservation.fill(Arc::clone(&session));
        Ok(session)
    }

    /// The installed session, if any.
    pub fn get(&self) -> Option<Arc<ClientSession>> {
        match &*self.lock() {
            SlotState::Active(session) => Some(Arc::clone(session)),
            SlotState::Empty | SlotState::Connecting => None,
        }
    }

    /// Disconnects the installed session and empties the slot.
    ///
    /// Does nothing if the slot is empty or a connect is still in flight.
    pub async fn disconnect(&self) {
        let session = {
            let mut state = self.lock();
            match std::mem::replace(&mut *state, SlotState::Empty) {
                SlotState::Active(session) => Some(session),
                other => {
                    *state = other;
                    None
                }
            }
        };
        if let Some(session) = session {
            session.disconnect().await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SessionSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &*self.lock() {
            SlotState::Empty => "empty",
            SlotState::Connecting => "connecting",
            SlotState::Active(_) => "active",
        };
        f.debug_struct("SessionSlot").field("state", &state).finish()
    }
}

/// Holds a slot in `Connecting` and empties it again unless filled.
///
/// Dropping it covers a failed connect as well as a cancelled one.
struct Reservation<'a> {
    slot: &'a SessionSlot,
    filled: bool,
}

impl Reservation<'_> {
    fn fill(mut self, session: Arc<ClientSession>) {
        *self.slot.lock() = SlotState::Active(session);
        self.filled = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.filled {
            *self.slot.lock() = SlotState::Empty;
        }
    }
}
