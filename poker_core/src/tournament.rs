//! `TournamentManager` (§4.7): the outer hand-sequencing loop. Waits for the
//! lobby to start, then runs hands back to back against a shrinking set of
//! active seats until one player remains.

use std::sync::Arc;

use log::info;

use crate::handloop::play_hand;
use crate::lobby::{Lobby, Player};
use crate::protocol::ServerMessage;

/// Drives an entire tournament to completion: `game_start`, every hand, and
/// `game_end`. Consumes the lobby's seated players once it starts, so no
/// further joins are possible by construction (the lobby itself also
/// refuses them once `started` flips).
pub async fn run_tournament(lobby: Arc<Lobby>) {
    lobby.wait_for_start().await;

    let mut players = lobby.take_players().await;
    let spectators = lobby.spectators().await;
    let config = lobby.config().clone();

    let (initial_sb, initial_bb) = config.blinds_for_hand(1);
    broadcast_game_start(&players, &spectators, config.starting_stack, initial_sb, initial_bb).await;

    // Parked one seat "before" seat 0 so the first advance in the loop below
    // lands the button on seat 0 for hand 1.
    let mut dealer_seat_index = players.last().expect("at least one player").seat_index;
    let mut hand_number: u64 = 0;

    loop {
        let remaining: usize = players.iter().filter(|p| !p.is_eliminated).count();
        if remaining <= 1 {
            break;
        }

        let active_seats: Vec<usize> = players
            .iter()
            .filter(|p| !p.is_eliminated)
            .map(|p| p.seat_index)
            .collect();

        // Advance the dealer to the next *active* seat before dealing, so a
        // seat that busted out last hand is never reconsidered (rotation is
        // over the current active set, not all-seats-modulo).
        dealer_seat_index = next_dealer_seat(&active_seats, dealer_seat_index);

        hand_number += 1;

        let (mut hand_players, mut benched): (Vec<Player>, Vec<Player>) = players
            .drain(..)
            .partition(|p| active_seats.contains(&p.seat_index));

        let hand_dealer_pk = hand_players
            .iter()
            .position(|p| p.seat_index == dealer_seat_index)
            .unwrap_or(0);

        play_hand(hand_number, &mut hand_players, hand_dealer_pk, &config, &spectators).await;

        players.append(&mut hand_players);
        players.append(&mut benched);
        players.sort_by_key(|p| p.seat_index);
    }

    let winner = players
        .iter()
        .find(|p| !p.is_eliminated)
        .expect("exactly one player remains when the tournament ends");

    let final_stacks: Vec<i64> = players.iter().map(|p| p.stack).collect();
    let player_names: Vec<String> = players.iter().map(|p| p.name.clone()).collect();

    let game_end = ServerMessage::GameEnd {
        winner: winner.name.clone(),
        winner_seat: winner.seat_index,
        final_stacks,
        player_names,
        total_hands: hand_number,
    };

    for player in &players {
        player.session.send(&game_end).await;
    }
    for spectator in &spectators {
        spectator.send(&game_end).await;
    }

    info!("tournament complete after {hand_number} hands, winner seat {}", winner.seat_index);
}

/// Advances the dealer button to the next seat in `active_seats` following
/// `previous_dealer_seat`. If the previous dealer has since been eliminated
/// (no longer present in `active_seats`), rotation continues from the end
/// of the current active list, landing on its first entry.
fn next_dealer_seat(active_seats: &[usize], previous_dealer_seat: usize) -> usize {
    let current_position = active_seats
        .iter()
        .position(|&s| s == previous_dealer_seat)
        .unwrap_or(active_seats.len() - 1);
    active_seats[(current_position + 1) % active_seats.len()]
}

async fn broadcast_game_start(
    players: &[Player],
    spectators: &[Arc<crate::session::PlayerSession>],
    starting_stack: i64,
    small_blind: i64,
    big_blind: i64,
) {
    let player_names: Vec<String> = players.iter().map(|p| p.name.clone()).collect();
    let message = ServerMessage::GameStart {
        player_names,
        starting_stacks: vec![starting_stack; players.len()],
        small_blind,
        big_blind,
    };
    for player in players {
        player.session.send(&message).await;
    }
    for spectator in spectators {
        spectator.send(&message).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dealer_rotation_cycles_through_active_seats() {
        let active_seats = vec![0, 1, 2, 3];
        assert_eq!(next_dealer_seat(&active_seats, 0), 1);
        assert_eq!(next_dealer_seat(&active_seats, 1), 2);
        assert_eq!(next_dealer_seat(&active_seats, 2), 3);
        assert_eq!(next_dealer_seat(&active_seats, 3), 0);
    }

    #[test]
    fn dealer_rotation_skips_seats_no_longer_active() {
        // Seat 1 busted out; rotation must skip straight from 0 to 2.
        let active_seats = vec![0, 2, 3];
        assert_eq!(next_dealer_seat(&active_seats, 0), 2);
    }

    #[test]
    fn dealer_rotation_handles_busted_previous_dealer() {
        // The previous dealer (seat 1) is no longer active; rotation
        // continues from the end of the current active list, landing on
        // its first entry.
        let active_seats = vec![0, 2, 3];
        assert_eq!(next_dealer_seat(&active_seats, 1), 0);
    }
}
