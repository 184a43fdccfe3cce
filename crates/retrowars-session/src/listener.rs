//! How the game hears about what happens in the match.
//!
//! The game implements [`SessionListener`] and hands it to
//! [`ClientSession::connect`](crate::ClientSession::connect); later screens
//! swap it with [`ClientSession::listen`](crate::ClientSession::listen). Only
//! [`on_connection_closed`](SessionListener::on_connection_closed) is
//! required: a game that ignores the disconnect would sit on a dead screen.
//!
//! Callbacks run one at a time, in the order the match state changed, with
//! no session lock held. Usually that is on the connection's receive task;
//! events caused by the game's own calls may be delivered on the calling
//! thread instead. Callbacks may call back into the session
//! (`update_score`, `change_status`, even `listen`); whatever that causes
//! is delivered after the current callback returns. They should not do
//! heavy work, because the next inbound message waits for them.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use retrowars_protocol::PlayerStatus;

use crate::roster::Player;

/// Receives match events. All methods except
/// [`on_connection_closed`](Self::on_connection_closed) default to doing
/// nothing.
pub trait SessionListener: Send + Sync + 'static {
    /// The roster changed. `players` is the full roster, local player first.
    fn on_roster_changed(&self, players: &[Player]) {
        let _ = players;
    }

    /// A new match started. Every score is back to 0.
    fn on_game_started(&self) {}

    /// `player` now has `score`.
    fn on_score_changed(&self, player: &Player, score: i64) {
        let _ = (player, score);
    }

    /// `player`'s score passed `strength` breakpoints in one update.
    fn on_breakpoint_crossed(&self, player: &Player, strength: u32) {
        let _ = (player, strength);
    }

    /// A remote player's status changed.
    fn on_status_changed(&self, player: &Player, status: PlayerStatus) {
        let _ = (player, status);
    }

    /// The connection is gone. `graceful` is `true` when the server
    /// announced its shutdown first. Called exactly once per session; if
    /// no listener was registered at the time, the next one registered
    /// hears it.
    fn on_connection_closed(&self, graceful: bool);
}

/// Something the session wants the listener to hear about.
///
/// Computed while the match state is locked and delivered after the lock
/// is released, so each event carries its own snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    RosterChanged(Vec<Player>),
    GameStarted,
    ScoreChanged { player: Player, score: i64 },
    BreakpointCrossed { player: Player, strength: u32 },
    StatusChanged { player: Player, status: PlayerStatus },
}

/// Queues events and hands them to the registered listener one at a time.
///
/// Whoever pushes events also drains the queue, unless another thread (or
/// an outer frame of the same thread) is already draining it; then that
/// drainer delivers them. Events therefore reach the listener in the order
/// they were pushed and never from two threads at once.
#[derive(Default)]
pub(crate) struct ListenerSlot {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    current: Option<Arc<dyn SessionListener>>,
    queue: VecDeque<Notice>,
    draining: bool,
    /// Set once the close notice is queued; nothing is queued after it.
    closed: bool,
    /// A close that found no listener, kept for the next one.
    unreported_close: Option<bool>,
}

enum Notice {
    Event(SessionEvent),
    Closed(bool),
}

impl ListenerSlot {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the registered listener, dropping the previous one.
    ///
    /// A new listener is told about a close that nobody has heard yet.
    pub(crate) fn replace(&self, listener: Option<Arc<dyn SessionListener>>) {
        {
            let mut inner = self.lock();
            let registering = listener.is_some();
            inner.current = listener;
            if registering {
                if let Some(graceful) = inner.unreported_close.take() {
                    inner.queue.push_back(Notice::Closed(graceful));
                }
            }
        }
        self.drain();
    }

    /// Queues `events` behind everything queued so far. Does not deliver;
    /// call [`drain`](Self::drain) once no other lock is held.
    pub(crate) fn push(&self, events: Vec<SessionEvent>) {
        let mut inner = self.lock();
        if inner.closed {
            if !events.is_empty() {
                tracing::trace!(?events, "connection closed, events dropped");
            }
            return;
        }
        inner.queue.extend(events.into_iter().map(Notice::Event));
    }

    /// Queues the close notice. Later pushes are ignored.
    pub(crate) fn push_closed(&self, graceful: bool) {
        let mut inner = self.lock();
        if !inner.closed {
            inner.closed = true;
            inner.queue.push_back(Notice::Closed(graceful));
        }
    }

    /// Delivers queued notices in order.
    ///
    /// The listener is looked up again for every notice: if a callback
    /// registers a new listener, the rest of the queue goes to the new one.
    pub(crate) fn drain(&self) {
        {
            let mut inner = self.lock();
            if inner.draining {
                return;
            }
            inner.draining = true;
        }
        let mut guard = DrainGuard {
            slot: self,
            armed: true,
        };

        loop {
            let (notice, listener) = {
                let mut inner = self.lock();
                let Some(notice) = inner.queue.pop_front() else {
                    // Cleared under the same lock that saw the queue empty,
                    // so a concurrent push either lands before this or
                    // drains by itself.
                    inner.draining = false;
                    guard.armed = false;
                    return;
                };
                let listener = inner.current.clone();
                if let (Notice::Closed(graceful), None) = (&notice, &listener) {
                    inner.unreported_close = Some(*graceful);
                    continue;
                }
                (notice, listener)
            };
            match (notice, listener) {
                (Notice::Event(event), Some(listener)) => deliver(listener.as_ref(), &event),
                (Notice::Event(event), None) => {
                    tracing::trace!(?event, "no listener registered, event dropped");
                }
                (Notice::Closed(graceful), Some(listener)) => {
                    listener.on_connection_closed(graceful);
                }
                (Notice::Closed(_), None) => {}
            }
        }
    }
}

/// Clears the draining flag if a callback panics.
struct DrainGuard<'a> {
    slot: &'a ListenerSlot,
    armed: bool,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.slot.lock().draining = false;
        }
    }
}

impl std::fmt::Debug for ListenerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("ListenerSlot")
            .field("registered", &inner.current.is_some())
            .field("queued", &inner.queue.len())
            .field("closed", &inner.closed)
            .finish()
    }
}

fn deliver(listener: &dyn SessionListener, event: &SessionEvent) {
    match event {
        SessionEvent::RosterChanged(players) => listener.on_roster_changed(players),
        SessionEvent::GameStarted => listener.on_game_started(),
        SessionEvent::ScoreChanged { player, score } => listener.on_score_changed(player, *score),
        SessionEvent::BreakpointCrossed { player, strength } => {
            listener.on_breakpoint_crossed(player, *strength);
        }
        SessionEvent::StatusChanged { player, status } => {
            listener.on_status_changed(player, *status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrowars_protocol::PlayerId;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn push(&self, entry: String) {
            self.seen.lock().unwrap().push(entry);
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl SessionListener for Recorder {
        fn on_roster_changed(&self, players: &[Player]) {
            self.push(format!("roster:{}", players.len()));
        }

        fn on_game_started(&self) {
            self.push("started".into());
        }

        fn on_score_changed(&self, player: &Player, score: i64) {
            self.push(format!("score:{}:{score}", player.id));
        }

        fn on_connection_closed(&self, graceful: bool) {
            self.push(format!("closed:{graceful}"));
        }
    }

    /// Only implements the required method.
    struct ClosedOnly;

    impl SessionListener for ClosedOnly {
        fn on_connection_closed(&self, _graceful: bool) {}
    }

    fn dispatch(slot: &ListenerSlot, events: Vec<SessionEvent>) {
        slot.push(events);
        slot.drain();
    }

    fn close(slot: &ListenerSlot, graceful: bool) {
        slot.push_closed(graceful);
        slot.drain();
    }

    fn player(id: u64) -> Player {
        Player::new(PlayerId(id), "snake")
    }

    #[test]
    fn test_dispatch_delivers_events_in_order() {
        let slot = ListenerSlot::default();
        let recorder = Arc::new(Recorder::default());
        slot.replace(Some(recorder.clone()));

        dispatch(&slot, vec![
            SessionEvent::RosterChanged(vec![player(1), player(2)]),
            SessionEvent::GameStarted,
            SessionEvent::ScoreChanged {
                player: player(2),
                score: 500,
            },
        ]);
        close(&slot, true);

        assert_eq!(
            recorder.seen(),
            vec!["roster:2", "started", "score:P-2:500", "closed:true"]
        );
    }

    #[test]
    fn test_replace_discards_previous_listener() {
        let slot = ListenerSlot::default();
        let old = Arc::new(Recorder::default());
        let new = Arc::new(Recorder::default());

        slot.replace(Some(old.clone()));
        slot.replace(Some(new.clone()));
        dispatch(&slot, vec![SessionEvent::GameStarted]);
        close(&slot, false);

        assert!(old.seen().is_empty());
        assert_eq!(new.seen(), vec!["started", "closed:false"]);
    }

    #[test]
    fn test_replace_with_none_silences_dispatch() {
        let slot = ListenerSlot::default();
        let recorder = Arc::new(Recorder::default());
        slot.replace(Some(recorder.clone()));
        slot.replace(None);

        dispatch(&slot, vec![SessionEvent::GameStarted]);
        close(&slot, false);

        assert!(recorder.seen().is_empty());
    }

    #[test]
    fn test_default_methods_ignore_events() {
        let slot = ListenerSlot::default();
        slot.replace(Some(Arc::new(ClosedOnly)));

        dispatch(&slot, vec![
            SessionEvent::RosterChanged(vec![player(1)]),
            SessionEvent::BreakpointCrossed {
                player: player(1),
                strength: 2,
            },
            SessionEvent::StatusChanged {
                player: player(1),
                status: PlayerStatus::Dead,
            },
        ]);
    }

    /// Registers `next` from inside its first callback.
    struct Handover {
        slot: Arc<ListenerSlot>,
        next: Arc<Recorder>,
        calls: Mutex<u32>,
    }

    impl SessionListener for Handover {
        fn on_game_started(&self) {
            *self.calls.lock().unwrap() += 1;
            self.slot.replace(Some(self.next.clone()));
        }

        fn on_connection_closed(&self, _graceful: bool) {}
    }

    #[test]
    fn test_reregistering_mid_dispatch_reroutes_remaining_events() {
        let slot = Arc::new(ListenerSlot::default());
        let next = Arc::new(Recorder::default());
        let handover = Arc::new(Handover {
            slot: Arc::clone(&slot),
            next: next.clone(),
            calls: Mutex::new(0),
        });
        slot.replace(Some(handover.clone()));

        dispatch(&slot, vec![SessionEvent::GameStarted, SessionEvent::GameStarted]);

        assert_eq!(*handover.calls.lock().unwrap(), 1);
        assert_eq!(next.seen(), vec!["started"]);
    }

    #[test]
    fn test_close_without_listener_reaches_next_listener_once() {
        let slot = ListenerSlot::default();
        close(&slot, false);

        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        slot.replace(Some(first.clone()));
        slot.replace(Some(second.clone()));

        assert_eq!(first.seen(), vec!["closed:false"]);
        assert!(second.seen().is_empty());
    }

    #[test]
    fn test_nothing_is_delivered_after_close() {
        let slot = ListenerSlot::default();
        let recorder = Arc::new(Recorder::default());
        slot.replace(Some(recorder.clone()));

        close(&slot, true);
        close(&slot, false);
        dispatch(&slot, vec![SessionEvent::GameStarted]);

        assert_eq!(recorder.seen(), vec!["closed:true"]);
    }

    /// Pushes a score event from inside `on_game_started`.
    struct Nested {
        slot: Arc<ListenerSlot>,
        seen: Recorder,
    }

    impl SessionListener for Nested {
        fn on_game_started(&self) {
            self.seen.push("started:begin".into());
            dispatch(
                &self.slot,
                vec![SessionEvent::ScoreChanged {
                    player: player(1),
                    score: 7,
                }],
            );
            self.seen.push("started:end".into());
        }

        fn on_score_changed(&self, player: &Player, score: i64) {
            self.seen.push(format!("score:{}:{score}", player.id));
        }

        fn on_connection_closed(&self, _graceful: bool) {}
    }

    #[test]
    fn test_events_pushed_from_a_callback_wait_for_it_to_return() {
        let slot = Arc::new(ListenerSlot::default());
        let nested = Arc::new(Nested {
            slot: Arc::clone(&slot),
            seen: Recorder::default(),
        });
        slot.replace(Some(nested.clone()));

        dispatch(&slot, vec![SessionEvent::GameStarted]);

        assert_eq!(
            nested.seen.seen(),
            vec!["started:begin", "started:end", "score:P-1:7"]
        );
    }

    /// Fails the test if two callbacks ever overlap.
    #[derive(Default)]
    struct Exclusive {
        inside: std::sync::atomic::AtomicBool,
        calls: std::sync::atomic::AtomicUsize,
    }

    impl SessionListener for Exclusive {
        fn on_game_started(&self) {
            use std::sync::atomic::Ordering;
            assert!(!self.inside.swap(true, Ordering::SeqCst), "overlapping callbacks");
            std::thread::yield_now();
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inside.store(false, Ordering::SeqCst);
        }

        fn on_connection_closed(&self, _graceful: bool) {}
    }

    #[test]
    fn test_concurrent_pushers_never_overlap_callbacks() {
        let slot = Arc::new(ListenerSlot::default());
        let exclusive = Arc::new(Exclusive::default());
        slot.replace(Some(exclusive.clone()));

        let threads: Vec<_> = (0..4)
            .map(|_| {
                let slot = Arc::clone(&slot);
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        dispatch(&slot, vec![SessionEvent::GameStarted]);
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        assert_eq!(
            exclusive.calls.load(std::sync::atomic::Ordering::SeqCst),
            800
        );
    }
}
