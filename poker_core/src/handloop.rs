//! The per-hand state machine (§4.5): seats the button, drives the betting
//! loop against a [`RulesEngine`], and reveals results at the end.

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use crate::config::TournamentConfig;
use crate::lobby::Player;
use crate::protocol::{
    Action, ErrorCode, GameState, PlayerView, PotView, PotsView, RevealedHand, ServerMessage,
    ValidAction, WinnerEntry,
};
use crate::rules::{NlheEngine, RulesEngine};
use crate::session::{PlayerSession, TurnOutcome};

/// Button/blind context for a hand, threaded through every view build so the
/// engine itself doesn't need to remember seats it has no other use for.
#[derive(Clone, Copy)]
struct ButtonContext {
    dealer_pk: usize,
    sb_pk: usize,
    bb_pk: usize,
    sb_amount: i64,
    bb_amount: i64,
}

/// Outcome of playing one hand: the set of seats newly eliminated (stack
/// reached zero), for the tournament manager to record.
pub struct HandOutcome {
    pub newly_eliminated: Vec<usize>,
}

/// Runs one complete hand: blinds through showdown (or last-player-standing),
/// mutating each player's `stack` in place and broadcasting every record the
/// protocol requires along the way.
pub async fn play_hand(
    hand_number: u64,
    active_players: &mut [Player],
    dealer_pk: usize,
    config: &TournamentConfig,
    spectators: &[Arc<PlayerSession>],
) -> HandOutcome {
    let n = active_players.len();
    let (sb_amount, bb_amount) = config.blinds_for_hand(hand_number);

    let (sb_pk, bb_pk) = if n == 2 {
        // Heads-up: dealer posts the small blind.
        (dealer_pk, 1 - dealer_pk)
    } else {
        ((dealer_pk + 1) % n, (dealer_pk + 2) % n)
    };
    let ctx = ButtonContext {
        dealer_pk,
        sb_pk,
        bb_pk,
        sb_amount,
        bb_amount,
    };

    let starting_stacks: Vec<i64> = active_players.iter().map(|p| p.stack).collect();
    let mut engine = NlheEngine::new(dealer_pk, sb_pk, bb_pk, sb_amount, bb_amount, starting_stacks);

    let dealt_hole_cards: Vec<Vec<String>> = (0..n)
        .map(|pk| {
            engine
                .hole_cards(pk)
                .iter()
                .map(|c| c.to_string())
                .collect()
        })
        .collect();

    broadcast_hand_start(hand_number, active_players, ctx, &dealt_hole_cards, spectators).await;

    // The seats active immediately before the most recent action; used to
    // decide whose cards to reveal at showdown (folded-before-last-action
    // seats never get revealed, even on an eventual showdown by others).
    let mut active_before_last_action: Vec<bool> = vec![true; n];

    while !engine.is_terminal() {
        let Some(actor_pk) = engine.actor_pk() else {
            break;
        };
        let valid_actions = engine.legal_actions();

        // Drain before prompting: avoids losing a fast responder's answer to
        // a race with the broadcast below.
        active_players[actor_pk].session.drain_stale();

        active_before_last_action = (0..n).map(|pk| !engine.folded(pk)).collect();

        broadcast_action_request(
            hand_number,
            active_players,
            &engine,
            ctx,
            actor_pk,
            &valid_actions,
            config.action_timeout_seconds,
            spectators,
        )
        .await;

        let timeout = Duration::from_secs(config.action_timeout_seconds);
        let outcome = active_players[actor_pk].session.await_turn(timeout).await;

        let (applied_action, timed_out) =
            resolve_action(outcome, &valid_actions, &active_players[actor_pk].session).await;

        engine
            .apply(&applied_action)
            .expect("rules engine rejected an action the hand loop already validated");

        let player_name = active_players[actor_pk].name.clone();
        broadcast_action_result(
            hand_number,
            active_players,
            &engine,
            ctx,
            actor_pk,
            &player_name,
            &applied_action,
            timed_out,
            spectators,
        )
        .await;
    }

    let results = engine.results();
    let hole_cards_revealed = if results.showdown_occurred {
        (0..n)
            .filter(|&pk| active_before_last_action[pk])
            .map(|pk| RevealedHand {
                seat: active_players[pk].seat_index,
                hole_cards: dealt_hole_cards[pk].clone(),
            })
            .collect()
    } else {
        Vec::new()
    };

    let winners: Vec<WinnerEntry> = results
        .payoffs
        .iter()
        .enumerate()
        .filter(|(_, &payoff)| payoff > 0)
        .map(|(pk, &payoff)| WinnerEntry {
            seat: active_players[pk].seat_index,
            amount_won: payoff,
        })
        .collect();

    let mut newly_eliminated = Vec::new();
    for (pk, player) in active_players.iter_mut().enumerate() {
        player.stack = results.final_stacks[pk];
        if player.stack == 0 && !player.is_eliminated {
            player.is_eliminated = true;
            newly_eliminated.push(player.seat_index);
        }
    }

    let final_stacks: Vec<i64> = active_players.iter().map(|p| p.stack).collect();
    let player_names: Vec<String> = active_players.iter().map(|p| p.name.clone()).collect();
    let community_cards: Vec<String> = results
        .community_cards
        .iter()
        .map(|c| c.to_string())
        .collect();

    let hand_end = ServerMessage::HandEnd {
        hand_number,
        winners,
        hole_cards_revealed,
        community_cards,
        final_stacks,
        player_names,
        eliminated_seats: newly_eliminated.clone(),
    };
    broadcast(active_players, spectators, &hand_end).await;

    info!(
        "hand {hand_number} complete, {} newly eliminated",
        newly_eliminated.len()
    );
    HandOutcome { newly_eliminated }
}

/// Resolves a raw mailbox outcome into the action actually applied,
/// performing §4.6 validation (timeout/disconnect/shape/range) and sending
/// any `BAD_ACTION` error along the way.
async fn resolve_action(
    outcome: TurnOutcome,
    valid_actions: &[ValidAction],
    session: &PlayerSession,
) -> (Action, bool) {
    match outcome {
        TurnOutcome::TimedOut | TurnOutcome::Disconnected => (Action::Fold, true),
        TurnOutcome::Action(crate::protocol::ClientMessage::Action { action }) => {
            match parse_action(&action).and_then(|action| validate_action(action, valid_actions)) {
                Ok(action) => (action, false),
                Err(()) => {
                    session
                        .send(&ServerMessage::error(
                            ErrorCode::BadAction,
                            "invalid action for the current turn",
                        ))
                        .await;
                    (Action::Fold, false)
                }
            }
        }
        TurnOutcome::Action(_) => {
            // Not an `action` record at all while a turn was open.
            session
                .send(&ServerMessage::error(
                    ErrorCode::BadAction,
                    "expected an action record",
                ))
                .await;
            (Action::Fold, false)
        }
    }
}

/// Parses the loosely-typed action payload a client sent. An unrecognized
/// `type`, or a raise with a missing/non-integer `amount`, is a shape error
/// (`Err`) rather than a deserialization failure: the caller owes the actor
/// `BAD_ACTION` and an immediate auto-fold, never a stalled turn.
fn parse_action(value: &serde_json::Value) -> Result<Action, ()> {
    let kind = value.get("type").and_then(|v| v.as_str()).ok_or(())?;
    match kind {
        "fold" => Ok(Action::Fold),
        "check" => Ok(Action::Check),
        "call" => Ok(Action::Call),
        "raise" => {
            let amount = value.get("amount").and_then(|v| v.as_i64()).ok_or(())?;
            Ok(Action::Raise { amount })
        }
        _ => Err(()),
    }
}

/// `Ok` carries the action to apply (amounts clamped where the spec calls
/// for clamping rather than rejection); `Err` means auto-fold with
/// `BAD_ACTION` already owed to the caller.
fn validate_action(action: Action, valid_actions: &[ValidAction]) -> Result<Action, ()> {
    match action {
        Action::Fold => Ok(Action::Fold),
        Action::Check => {
            if valid_actions.iter().any(|v| matches!(v, ValidAction::Check)) {
                Ok(Action::Check)
            } else {
                Err(())
            }
        }
        Action::Call => {
            // Treat call with nothing owed as check; both are accepted
            // identically by the engine.
            if valid_actions
                .iter()
                .any(|v| matches!(v, ValidAction::Call { .. } | ValidAction::Check))
            {
                Ok(Action::Call)
            } else {
                Err(())
            }
        }
        Action::Raise { amount } => {
            let bounds = valid_actions.iter().find_map(|v| match v {
                ValidAction::Raise {
                    min_amount,
                    max_amount,
                } => Some((*min_amount, *max_amount)),
                _ => None,
            });
            match bounds {
                Some((min_amount, max_amount)) => {
                    let clamped = amount.clamp(min_amount, max_amount);
                    if clamped != amount {
                        warn!("clamped out-of-range raise {amount} to {clamped}");
                    }
                    Ok(Action::Raise { amount: clamped })
                }
                None => Err(()),
            }
        }
    }
}

async fn broadcast_hand_start(
    hand_number: u64,
    players: &[Player],
    ctx: ButtonContext,
    dealt_hole_cards: &[Vec<String>],
    spectators: &[Arc<PlayerSession>],
) {
    let player_names: Vec<String> = players.iter().map(|p| p.name.clone()).collect();
    let stacks: Vec<i64> = players.iter().map(|p| p.stack).collect();

    for (pk, player) in players.iter().enumerate() {
        let message = ServerMessage::HandStart {
            hand_number,
            dealer_seat: players[ctx.dealer_pk].seat_index,
            sb_seat: players[ctx.sb_pk].seat_index,
            bb_seat: players[ctx.bb_pk].seat_index,
            sb_amount: ctx.sb_amount,
            bb_amount: ctx.bb_amount,
            player_names: player_names.clone(),
            stacks: stacks.clone(),
            hole_cards: dealt_hole_cards[pk].clone(),
        };
        player.session.send(&message).await;
    }
    for spectator in spectators {
        let message = ServerMessage::HandStart {
            hand_number,
            dealer_seat: players[ctx.dealer_pk].seat_index,
            sb_seat: players[ctx.sb_pk].seat_index,
            bb_seat: players[ctx.bb_pk].seat_index,
            sb_amount: ctx.sb_amount,
            bb_amount: ctx.bb_amount,
            player_names: player_names.clone(),
            stacks: stacks.clone(),
            hole_cards: Vec::new(),
        };
        spectator.send(&message).await;
    }
}

/// The single function that shapes a `game_state` for one recipient. All
/// view construction funnels through here so a new field can't accidentally
/// leak an opponent's cards.
#[allow(clippy::too_many_arguments)]
fn build_game_state(
    players: &[Player],
    engine: &NlheEngine,
    recipient_pk: Option<usize>,
    actor_seat: Option<usize>,
    valid_actions: Vec<ValidAction>,
    ctx: ButtonContext,
    hand_number: u64,
) -> GameState {
    let stacks = engine.stacks();
    let bets = engine.bets();
    let raw_pots = engine.pots();
    let pots = PotsView {
        total: raw_pots.total,
        pots: raw_pots
            .pots
            .into_iter()
            .map(|pv| PotView {
                amount: pv.amount,
                eligible_seats: pv
                    .eligible_seats
                    .iter()
                    .map(|&pk| players[pk].seat_index)
                    .collect(),
            })
            .collect(),
    };
    let reveal_all = recipient_pk.is_none(); // spectators see every card

    let player_views = players
        .iter()
        .enumerate()
        .map(|(pk, player)| {
            let is_own_seat = Some(pk) == recipient_pk;
            let dealt = !engine.hole_cards(pk).is_empty();
            let hole_cards = if is_own_seat || reveal_all {
                engine.hole_cards(pk).iter().map(|c| c.to_string()).collect()
            } else if dealt {
                vec!["??".to_string(), "??".to_string()]
            } else {
                Vec::new()
            };
            PlayerView {
                seat: player.seat_index,
                name: player.name.clone(),
                stack: stacks[pk],
                bet: bets[pk],
                is_folded: engine.folded(pk),
                is_all_in: engine.all_in(pk),
                is_eliminated: player.is_eliminated,
                hole_cards_known: is_own_seat || reveal_all,
                hole_cards,
            }
        })
        .collect();

    GameState {
        street: engine.street(),
        hand_number,
        community_cards: engine.board_cards().iter().map(|c| c.to_string()).collect(),
        pot: pots,
        players: player_views,
        actor_seat,
        valid_actions,
        dealer_seat: players[ctx.dealer_pk].seat_index,
        sb_seat: players[ctx.sb_pk].seat_index,
        bb_seat: players[ctx.bb_pk].seat_index,
        sb_amount: ctx.sb_amount,
        bb_amount: ctx.bb_amount,
    }
}

#[allow(clippy::too_many_arguments)]
async fn broadcast_action_request(
    hand_number: u64,
    players: &[Player],
    engine: &NlheEngine,
    ctx: ButtonContext,
    actor_pk: usize,
    valid_actions: &[ValidAction],
    timeout_seconds: u64,
    spectators: &[Arc<PlayerSession>],
) {
    let actor_seat = players[actor_pk].seat_index;
    for (pk, player) in players.iter().enumerate() {
        let state = build_game_state(
            players,
            engine,
            Some(pk),
            Some(actor_seat),
            if pk == actor_pk {
                valid_actions.to_vec()
            } else {
                Vec::new()
            },
            ctx,
            hand_number,
        );
        player
            .session
            .send(&ServerMessage::ActionRequest {
                actor_seat,
                timeout_seconds,
                game_state: state,
            })
            .await;
    }
    for spectator in spectators {
        let state = build_game_state(players, engine, None, Some(actor_seat), Vec::new(), ctx, hand_number);
        spectator
            .send(&ServerMessage::ActionRequest {
                actor_seat,
                timeout_seconds,
                game_state: state,
            })
            .await;
    }
}

#[allow(clippy::too_many_arguments)]
async fn broadcast_action_result(
    hand_number: u64,
    players: &[Player],
    engine: &NlheEngine,
    ctx: ButtonContext,
    actor_pk: usize,
    player_name: &str,
    action: &Action,
    timed_out: bool,
    spectators: &[Arc<PlayerSession>],
) {
    let actor_seat = players[actor_pk].seat_index;
    let next_actor_seat = engine.actor_pk().map(|pk| players[pk].seat_index);

    let make = |recipient_pk: Option<usize>| {
        build_game_state(players, engine, recipient_pk, next_actor_seat, Vec::new(), ctx, hand_number)
    };

    for (pk, player) in players.iter().enumerate() {
        player
            .session
            .send(&ServerMessage::ActionResult {
                actor_seat,
                player_name: player_name.to_string(),
                action: action.clone(),
                timed_out,
                game_state: make(Some(pk)),
            })
            .await;
    }
    for spectator in spectators {
        spectator
            .send(&ServerMessage::ActionResult {
                actor_seat,
                player_name: player_name.to_string(),
                action: action.clone(),
                timed_out,
                game_state: make(None),
            })
            .await;
    }
}

async fn broadcast(players: &[Player], spectators: &[Arc<PlayerSession>], message: &ServerMessage) {
    for player in players {
        player.session.send(message).await;
    }
    for spectator in spectators {
        spectator.send(message).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    fn make_player(seat_index: usize, name: &str, stack: i64) -> (Player, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(64);
        let session = PlayerSession::new(tx);
        (
            Player {
                seat_index,
                name: name.to_string(),
                stack,
                is_eliminated: false,
                session,
            },
            rx,
        )
    }

    /// Drains a player's outbound frames, capturing every one, and replies
    /// check/call/fold (in that preference order) to any `action_request`
    /// addressed to this seat. Stands in for a real client in tests that
    /// need a hand driven to completion without a socket.
    fn spawn_auto_responder(
        seat_index: usize,
        session: Arc<PlayerSession>,
        mut rx: mpsc::Receiver<String>,
        captured: Arc<Mutex<Vec<serde_json::Value>>>,
    ) {
        tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
                captured.lock().unwrap().push(value.clone());
                if value["type"] == "action_request" && value["actor_seat"] == seat_index as u64 {
                    let valid_actions = value["game_state"]["valid_actions"].as_array().unwrap();
                    let action = if valid_actions.iter().any(|a| a["type"] == "check") {
                        serde_json::json!({"type": "check"})
                    } else if valid_actions.iter().any(|a| a["type"] == "call") {
                        serde_json::json!({"type": "call"})
                    } else {
                        serde_json::json!({"type": "fold"})
                    };
                    session.enqueue_action(crate::protocol::ClientMessage::Action { action });
                }
            }
        });
    }

    #[tokio::test]
    async fn eligible_seats_in_pot_view_uses_real_seat_index_not_local_position() {
        // Seat 1 has already busted out; the active players for this hand
        // are seats 0 and 2, a non-contiguous subset of the full roster.
        let (p0, rx0) = make_player(0, "Alice", 1_000);
        let (p2, rx2) = make_player(2, "Carol", 1_000);
        let captured = Arc::new(Mutex::new(Vec::new()));
        spawn_auto_responder(0, p0.session.clone(), rx0, captured.clone());
        spawn_auto_responder(2, p2.session.clone(), rx2, captured.clone());

        let config = TournamentConfig::default();
        let mut players = vec![p0, p2];
        tokio::time::timeout(
            Duration::from_secs(5),
            play_hand(1, &mut players, 0, &config, &[]),
        )
        .await
        .expect("hand should complete promptly against an auto-responder");

        let frames = captured.lock().unwrap();
        let eligible: Vec<i64> = frames
            .iter()
            .flat_map(|f| {
                f["game_state"]["pot"]["pots"]
                    .as_array()
                    .cloned()
                    .unwrap_or_default()
            })
            .flat_map(|pot| pot["eligible_seats"].as_array().cloned().unwrap_or_default())
            .map(|s| s.as_i64().unwrap())
            .collect();

        assert!(
            !eligible.is_empty(),
            "expected at least one pot view to be captured"
        );
        assert!(
            eligible.iter().all(|&s| s == 0 || s == 2),
            "eligible_seats leaked a local position instead of a real seat index: {eligible:?}"
        );
    }

    #[tokio::test]
    async fn showdown_reveals_every_seat_that_reached_showdown() {
        let (p0, rx0) = make_player(0, "Alice", 1_000);
        let (p1, rx1) = make_player(1, "Bob", 1_000);
        let captured = Arc::new(Mutex::new(Vec::new()));
        spawn_auto_responder(0, p0.session.clone(), rx0, captured.clone());
        spawn_auto_responder(1, p1.session.clone(), rx1, captured.clone());

        let config = TournamentConfig::default();
        let mut players = vec![p0, p1];
        tokio::time::timeout(
            Duration::from_secs(5),
            play_hand(1, &mut players, 0, &config, &[]),
        )
        .await
        .expect("hand should complete promptly against an auto-responder");

        let frames = captured.lock().unwrap();
        let hand_end = frames
            .iter()
            .find(|f| f["type"] == "hand_end")
            .expect("expected a hand_end frame");
        let revealed = hand_end["hole_cards_revealed"].as_array().unwrap();
        assert_eq!(
            revealed.len(),
            2,
            "both seats checked it down to showdown and should both be revealed"
        );
        for entry in revealed {
            assert_eq!(entry["hole_cards"].as_array().unwrap().len(), 2);
        }
    }

    #[tokio::test]
    async fn seat_index_stays_attached_to_the_same_player_across_the_hand() {
        let (p0, rx0) = make_player(0, "Alice", 1_000);
        let (p1, rx1) = make_player(1, "Bob", 1_000);
        let captured = Arc::new(Mutex::new(Vec::new()));
        spawn_auto_responder(0, p0.session.clone(), rx0, captured.clone());
        spawn_auto_responder(1, p1.session.clone(), rx1, captured.clone());

        let config = TournamentConfig::default();
        let mut players = vec![p0, p1];
        tokio::time::timeout(
            Duration::from_secs(5),
            play_hand(1, &mut players, 0, &config, &[]),
        )
        .await
        .expect("hand should complete promptly against an auto-responder");

        let frames = captured.lock().unwrap();
        for frame in frames.iter() {
            let Some(players_view) = frame["game_state"]["players"].as_array() else {
                continue;
            };
            for player_view in players_view {
                let seat = player_view["seat"].as_u64().unwrap();
                let name = player_view["name"].as_str().unwrap();
                let expected = if seat == 0 { "Alice" } else { "Bob" };
                assert_eq!(name, expected, "seat {seat} should always name the same player");
            }
        }
    }
}
