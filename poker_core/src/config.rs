//! Tunables exposed by the core (§6). A binary wires these from its own
//! configuration surface (environment, CLI flags, etc) into this struct.

use std::collections::BTreeMap;

/// `hand_number_threshold -> (small_blind, big_blind)`. At hand `H`, the
/// schedule entry with the greatest key `<= H` applies.
pub type BlindSchedule = BTreeMap<u64, (i64, i64)>;

#[derive(Clone, Debug)]
pub struct TournamentConfig {
    pub min_players: usize,
    pub max_players: usize,
    pub starting_stack: i64,
    pub action_timeout_seconds: u64,
    pub lobby_wait_seconds: u64,
    pub blind_schedule: BlindSchedule,
}

impl TournamentConfig {
    /// The blinds in effect at the given hand number.
    pub fn blinds_for_hand(&self, hand_number: u64) -> (i64, i64) {
        self.blind_schedule
            .range(..=hand_number)
            .next_back()
            .map(|(_, blinds)| *blinds)
            .unwrap_or((50, 100))
    }
}

impl Default for TournamentConfig {
    fn default() -> Self {
        let mut blind_schedule = BTreeMap::new();
        // Matches the reference blind ladder: doubles roughly every 10 hands.
        blind_schedule.insert(1, (50, 100));
        blind_schedule.insert(10, (100, 200));
        blind_schedule.insert(20, (200, 400));
        blind_schedule.insert(30, (400, 800));
        blind_schedule.insert(40, (800, 1600));
        blind_schedule.insert(50, (1600, 3200));

        TournamentConfig {
            min_players: 2,
            max_players: 9,
            starting_stack: 10_000,
            action_timeout_seconds: 30,
            lobby_wait_seconds: 5,
            blind_schedule,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blind_lookup_uses_greatest_threshold_not_exceeding_hand() {
        let config = TournamentConfig::default();
        assert_eq!(config.blinds_for_hand(1), (50, 100));
        assert_eq!(config.blinds_for_hand(9), (50, 100));
        assert_eq!(config.blinds_for_hand(10), (100, 200));
        assert_eq!(config.blinds_for_hand(999), (1600, 3200));
    }
}
