//! The client's picture of the match: who is in it, their scores, and how
//! close each of them is to the next breakpoint.
//!
//! [`MatchState`] is plain data with no I/O. Every transition returns the
//! [`SessionEvent`]s it caused so the caller can deliver them after letting
//! go of whatever lock guards the state.

use std::collections::HashMap;

use retrowars_protocol::{PlayerId, PlayerStatus, ServerMessage};

use crate::listener::SessionEvent;

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// One participant as this client knows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    /// Which mini-game this player is queued for or playing.
    pub game: String,
    pub status: PlayerStatus,
}

impl Player {
    /// A player fresh in the lobby.
    pub fn new(id: PlayerId, game: impl Into<String>) -> Self {
        Self {
            id,
            game: game.into(),
            status: PlayerStatus::Lobby,
        }
    }
}

// ---------------------------------------------------------------------------
// MatchState
// ---------------------------------------------------------------------------

/// Roster, score table and breakpoint table.
///
/// The first player in the roster is the local one: the server always
/// describes the registering client before anyone else.
#[derive(Debug)]
pub struct MatchState {
    players: Vec<Player>,
    scores: HashMap<PlayerId, i64>,
    /// Next score at which a player crosses a breakpoint. Missing entries
    /// mean one unit.
    breakpoints: HashMap<PlayerId, i64>,
    breakpoint_unit: i64,
}

impl MatchState {
    /// Creates an empty state. A `breakpoint_unit` below 1 is raised to 1.
    pub fn new(breakpoint_unit: i64) -> Self {
        Self {
            players: Vec::new(),
            scores: HashMap::new(),
            breakpoints: HashMap::new(),
            breakpoint_unit: breakpoint_unit.max(1),
        }
    }

    /// The full roster, local player first.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// The local player, once the server has described it.
    pub fn me(&self) -> Option<&Player> {
        self.players.first()
    }

    /// Everyone except the local player, in roster order.
    pub fn other_players(&self) -> &[Player] {
        self.players.get(1..).unwrap_or_default()
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Last known score of `id`, 0 if none was reported.
    pub fn score_for(&self, id: PlayerId) -> i64 {
        self.scores.get(&id).copied().unwrap_or(0)
    }

    /// The score at which `id` crosses its next breakpoint.
    pub fn next_breakpoint_for(&self, id: PlayerId) -> i64 {
        self.breakpoints
            .get(&id)
            .copied()
            .unwrap_or(self.breakpoint_unit)
    }

    pub fn breakpoint_unit(&self) -> i64 {
        self.breakpoint_unit
    }

    /// Applies one inbound message.
    ///
    /// `ServerStopped` changes nothing here; the session tracks it.
    pub fn apply(&mut self, msg: ServerMessage) -> Vec<SessionEvent> {
        match msg {
            ServerMessage::PlayerAdded { id, game } => self.add_player(id, game),
            ServerMessage::PlayerRemoved { id } => self.remove_player(id),
            ServerMessage::PlayerScored { id, score } => self.record_score(id, score),
            ServerMessage::PlayerStatusChanged { id, status } => self.change_status(id, &status),
            ServerMessage::PlayerReturnedToLobby { id, game } => self.return_to_lobby(id, game),
            ServerMessage::StartGame => self.start_game(),
            ServerMessage::ServerStopped => Vec::new(),
        }
    }

    /// Appends a player, or updates the game of one already known.
    pub fn add_player(&mut self, id: PlayerId, game: String) -> Vec<SessionEvent> {
        match self.players.iter_mut().find(|p| p.id == id) {
            Some(existing) => {
                tracing::debug!(player_id = %id, %game, "player re-announced, updating game");
                existing.game = game;
            }
            None => {
                tracing::debug!(player_id = %id, %game, "player added");
                self.players.push(Player::new(id, game));
            }
        }
        vec![SessionEvent::RosterChanged(self.players.clone())]
    }

    /// Removes a player together with its score and breakpoint progress.
    pub fn remove_player(&mut self, id: PlayerId) -> Vec<SessionEvent> {
        let before = self.players.len();
        self.players.retain(|p| p.id != id);
        if self.players.len() == before {
            tracing::debug!(player_id = %id, "removal of unknown player ignored");
            return Vec::new();
        }
        self.scores.remove(&id);
        self.breakpoints.remove(&id);
        tracing::debug!(player_id = %id, "player removed");
        vec![SessionEvent::RosterChanged(self.players.clone())]
    }

    /// Stores `score` as `id`'s absolute score and checks breakpoints.
    pub fn record_score(&mut self, id: PlayerId, score: i64) -> Vec<SessionEvent> {
        let Some(player) = self.player(id).cloned() else {
            tracing::debug!(player_id = %id, score, "score for unknown player ignored");
            return Vec::new();
        };
        self.scores.insert(id, score);

        let mut events = vec![SessionEvent::ScoreChanged {
            player: player.clone(),
            score,
        }];
        let strength = self.advance_breakpoint(id, score);
        if strength > 0 {
            tracing::debug!(player_id = %id, score, strength, "breakpoint crossed");
            events.push(SessionEvent::BreakpointCrossed { player, strength });
        }
        events
    }

    /// Sets a player's status from its wire spelling.
    ///
    /// A status this client does not know means client and server are out
    /// of step. It is logged and otherwise ignored.
    pub fn change_status(&mut self, id: PlayerId, status: &str) -> Vec<SessionEvent> {
        let Some(player) = self.players.iter_mut().find(|p| p.id == id) else {
            tracing::debug!(player_id = %id, status, "status for unknown player ignored");
            return Vec::new();
        };
        let status = match status.parse::<PlayerStatus>() {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(
                    player_id = %id,
                    error = %e,
                    "ignoring status change, client and server may be on different versions"
                );
                return Vec::new();
            }
        };
        player.status = status;
        vec![SessionEvent::StatusChanged {
            player: player.clone(),
            status,
        }]
    }

    /// Puts a player back in the lobby, queued for `game`.
    pub fn return_to_lobby(&mut self, id: PlayerId, game: String) -> Vec<SessionEvent> {
        let Some(player) = self.players.iter_mut().find(|p| p.id == id) else {
            tracing::debug!(player_id = %id, "lobby return of unknown player ignored");
            return Vec::new();
        };
        player.status = PlayerStatus::Lobby;
        player.game = game;
        vec![SessionEvent::StatusChanged {
            player: player.clone(),
            status: PlayerStatus::Lobby,
        }]
    }

    /// Starts a new match: everyone is playing, every score is 0 and
    /// breakpoint progress starts over.
    pub fn start_game(&mut self) -> Vec<SessionEvent> {
        self.scores.clear();
        self.breakpoints.clear();
        for player in &mut self.players {
            player.status = PlayerStatus::Playing;
            self.scores.insert(player.id, 0);
        }
        tracing::debug!(players = self.players.len(), "game started");
        vec![SessionEvent::GameStarted]
    }

    /// Sets the local player's status without producing an event. Returns
    /// `false` if the local player is not known yet.
    pub fn set_local_status(&mut self, status: PlayerStatus) -> bool {
        match self.players.first_mut() {
            Some(me) => {
                me.status = status;
                true
            }
            None => false,
        }
    }

    /// Moves `id`'s next breakpoint past `score` one unit at a time and
    /// returns how many units that took.
    fn advance_breakpoint(&mut self, id: PlayerId, score: i64) -> u32 {
        let unit = self.breakpoint_unit;
        let next = self.breakpoints.entry(id).or_insert(unit);
        // A saturated threshold has nothing left to cross.
        if score < *next || *next == i64::MAX {
            return 0;
        }
        // Same result as stepping one unit per iteration, without looping
        // a few billion times on absurd scores.
        let crossed = (score - *next) / unit + 1;
        *next = next.saturating_add(crossed.saturating_mul(unit));
        u32::try_from(crossed).unwrap_or(u32::MAX)
    }
}

impl Default for MatchState {
    fn default() -> Self {
        Self::new(crate::ClientConfig::DEFAULT_BREAKPOINT_UNIT)
    }
}
