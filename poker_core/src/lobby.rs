//! Admission: the pre-tournament phase where connections become seated
//! players or spectators, and the triggers that decide when the tournament
//! starts (§4.3).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};

use crate::config::TournamentConfig;
use crate::protocol::{ErrorCode, ServerMessage};
use crate::session::PlayerSession;

/// A permanent, tournament-scoped seat. Survives for the life of the
/// tournament; only `stack` and `is_eliminated` change after creation, and
/// only between hands.
pub struct Player {
    pub seat_index: usize,
    pub name: String,
    pub stack: i64,
    pub is_eliminated: bool,
    pub session: Arc<PlayerSession>,
}

struct Roster {
    players: Vec<Player>,
    spectators: Vec<Arc<PlayerSession>>,
    started: bool,
}

/// Owns the roster and the start-trigger bookkeeping. Shared between every
/// connection handler (to admit joins) and the tournament driver (to read
/// the seated players once play starts). The only cross-task synchronization
/// primitive in the admission phase; nothing else here is shared mutable
/// state.
pub struct Lobby {
    config: TournamentConfig,
    roster: Mutex<Roster>,
    start_notify: Notify,
    /// Mirrors `roster.started` but checkable without locking, so the grace
    /// timer and force-start race each other cheaply and harmlessly.
    started_flag: AtomicBool,
}

pub enum JoinOutcome {
    Seated(usize),
    Rejected(ErrorCode),
}

impl Lobby {
    pub fn new(config: TournamentConfig) -> Self {
        Lobby {
            config,
            roster: Mutex::new(Roster {
                players: Vec::new(),
                spectators: Vec::new(),
                started: false,
            }),
            start_notify: Notify::new(),
            started_flag: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &TournamentConfig {
        &self.config
    }

    /// Validate and, on success, seat a new player. Broadcasts `waiting` to
    /// everyone already seated plus the new arrival on success.
    pub async fn join(self: &Arc<Self>, name: &str, session: Arc<PlayerSession>) -> JoinOutcome {
        let trimmed = name.trim();
        if trimmed.is_empty() || trimmed.chars().count() > 32 {
            return JoinOutcome::Rejected(ErrorCode::BadName);
        }

        let mut roster = self.roster.lock().await;
        if roster.started {
            return JoinOutcome::Rejected(ErrorCode::TournamentStarted);
        }
        if roster.players.len() >= self.config.max_players {
            return JoinOutcome::Rejected(ErrorCode::TournamentFull);
        }
        if roster.players.iter().any(|p| p.name == trimmed) {
            return JoinOutcome::Rejected(ErrorCode::BadName);
        }

        let seat_index = roster.players.len();
        roster.players.push(Player {
            seat_index,
            name: trimmed.to_string(),
            stack: self.config.starting_stack,
            is_eliminated: false,
            session,
        });

        let current_players = roster.players.len();
        let reached_max = current_players >= self.config.max_players;
        let reached_min = current_players >= self.config.min_players;

        self.broadcast_waiting(&roster, current_players).await;

        if reached_max {
            self.try_trigger_start(&mut roster);
        } else if reached_min {
            self.arm_grace_timer(self.clone());
        }
        drop(roster);

        JoinOutcome::Seated(seat_index)
    }

    pub async fn add_spectator(&self, session: Arc<PlayerSession>) {
        let mut roster = self.roster.lock().await;
        roster.spectators.push(session);
    }

    /// Spectator-initiated force-start: fires iff at least `min_players`
    /// are seated and the tournament hasn't already started.
    pub async fn force_start(&self) {
        let mut roster = self.roster.lock().await;
        if roster.players.len() >= self.config.min_players {
            self.try_trigger_start(&mut roster);
        }
    }

    fn arm_grace_timer(&self, lobby: Arc<Lobby>) {
        let wait = std::time::Duration::from_secs(self.config.lobby_wait_seconds);
        tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            let mut roster = lobby.roster.lock().await;
            if roster.players.len() >= lobby.config.min_players {
                lobby.try_trigger_start(&mut roster);
            }
        });
    }

    /// Only the first caller to observe `!started` flips it; every other
    /// trigger (simultaneous max-reach, force-start, or a stale grace timer)
    /// becomes a no-op. This is what makes tournament start idempotent.
    fn try_trigger_start(&self, roster: &mut Roster) {
        if roster.started {
            return;
        }
        roster.started = true;
        self.started_flag.store(true, Ordering::SeqCst);
        self.start_notify.notify_one();
    }

    /// Resolves once the tournament has started (immediately, if it already
    /// has).
    pub async fn wait_for_start(&self) {
        if self.started_flag.load(Ordering::SeqCst) {
            return;
        }
        let notified = self.start_notify.notified();
        if self.started_flag.load(Ordering::SeqCst) {
            return;
        }
        notified.await;
    }

    async fn broadcast_waiting(&self, roster: &Roster, current_players: usize) {
        let message = ServerMessage::Waiting {
            current_players,
            min_players: self.config.min_players,
            max_players: self.config.max_players,
        };
        for player in &roster.players {
            player.session.send(&message).await;
        }
        for spectator in &roster.spectators {
            spectator.send(&message).await;
        }
    }

    /// Hands ownership of the seated players to the tournament driver once
    /// play starts. Called exactly once, after `wait_for_start` resolves.
    pub async fn take_players(&self) -> Vec<Player> {
        let mut roster = self.roster.lock().await;
        std::mem::take(&mut roster.players)
    }

    pub async fn spectators(&self) -> Vec<Arc<PlayerSession>> {
        self.roster.lock().await.spectators.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn new_session() -> Arc<PlayerSession> {
        let (tx, _rx) = mpsc::channel(8);
        PlayerSession::new(tx)
    }

    #[tokio::test]
    async fn seats_are_assigned_in_arrival_order() {
        let lobby = Arc::new(Lobby::new(TournamentConfig::default()));
        let a = lobby.join("Alice", new_session()).await;
        let b = lobby.join("Bob", new_session()).await;
        assert!(matches!(a, JoinOutcome::Seated(0)));
        assert!(matches!(b, JoinOutcome::Seated(1)));
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected() {
        let lobby = Arc::new(Lobby::new(TournamentConfig::default()));
        lobby.join("Alice", new_session()).await;
        let second = lobby.join("Alice", new_session()).await;
        assert!(matches!(second, JoinOutcome::Rejected(ErrorCode::BadName)));
    }

    #[tokio::test]
    async fn join_after_max_capacity_is_rejected() {
        let mut config = TournamentConfig::default();
        config.max_players = 2;
        config.min_players = 2;
        let lobby = Arc::new(Lobby::new(config));
        lobby.join("Alice", new_session()).await;
        lobby.join("Bob", new_session()).await;
        let third = lobby.join("Carol", new_session()).await;
        assert!(matches!(
            third,
            JoinOutcome::Rejected(ErrorCode::TournamentFull)
        ));
    }

    #[tokio::test]
    async fn reaching_max_players_starts_immediately() {
        let mut config = TournamentConfig::default();
        config.max_players = 2;
        config.min_players = 2;
        let lobby = Arc::new(Lobby::new(config));
        lobby.join("Alice", new_session()).await;
        lobby.join("Bob", new_session()).await;
        tokio::time::timeout(std::time::Duration::from_millis(100), lobby.wait_for_start())
            .await
            .expect("start should have fired");
    }

    #[tokio::test]
    async fn start_trigger_is_idempotent_across_redundant_triggers() {
        let mut config = TournamentConfig::default();
        config.max_players = 2;
        config.min_players = 2;
        let lobby = Arc::new(Lobby::new(config));
        lobby.join("Alice", new_session()).await;
        lobby.join("Bob", new_session()).await; // reaches max, triggers start once
        lobby.force_start().await; // redundant trigger, must be a no-op
        lobby.force_start().await; // again
        tokio::time::timeout(std::time::Duration::from_millis(100), lobby.wait_for_start())
            .await
            .expect("start should already have fired exactly once");
    }

    #[tokio::test]
    async fn join_after_start_is_rejected() {
        let mut config = TournamentConfig::default();
        config.max_players = 2;
        config.min_players = 2;
        let lobby = Arc::new(Lobby::new(config));
        lobby.join("Alice", new_session()).await;
        lobby.join("Bob", new_session()).await;
        lobby.wait_for_start().await;
        let third = lobby.join("Carol", new_session()).await;
        assert!(matches!(
            third,
            JoinOutcome::Rejected(ErrorCode::TournamentStarted)
        ));
    }
}
