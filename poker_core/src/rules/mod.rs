//! The pluggable poker rules engine interface (§4.4) and its concrete
//! no-limit hold'em implementation.

mod nlhe;

pub use nlhe::NlheEngine;

use crate::cards::Card;
use crate::protocol::{Action, PotView, PotsView, Street, ValidAction};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("no actor to act")]
    NoActorToAct,
    #[error("action {action:?} submitted for a hand that has already terminated")]
    HandAlreadyTerminal { action: Action },
}

/// Per-seat outcome once a hand has resolved.
#[derive(Clone, Debug)]
pub struct HandResults {
    /// Net chip change for each seat this hand (can be negative).
    pub payoffs: Vec<i64>,
    pub final_stacks: Vec<i64>,
    pub community_cards: Vec<Card>,
    /// True iff two or more players were still in the hand when betting
    /// closed, i.e. hands were actually compared rather than one player
    /// winning by everyone else folding.
    pub showdown_occurred: bool,
}

/// Built fresh for each hand from `(n, dealer_pk, sb_amount, bb_amount,
/// starting_stacks)`. Owned exclusively by the current hand loop for the
/// duration of the hand.
pub trait RulesEngine {
    fn actor_pk(&self) -> Option<usize>;
    fn legal_actions(&self) -> Vec<ValidAction>;
    fn apply(&mut self, action: &Action) -> Result<(), RulesError>;
    fn is_terminal(&self) -> bool;
    fn results(&self) -> HandResults;
    fn hole_cards(&self, pk: usize) -> &[Card];
    fn board_cards(&self) -> &[Card];
    fn pots(&self) -> PotsView;
    fn stacks(&self) -> &[i64];
    fn bets(&self) -> &[i64];
    fn total_pot(&self) -> i64;
    fn street(&self) -> Street;
}

/// Tiered side-pot computation shared by any engine implementation: groups
/// contributions by distinct level and assigns eligibility to whoever
/// reached that level without folding.
pub(crate) fn compute_pots(total_contrib: &[i64], folded: &[bool]) -> Vec<(i64, Vec<usize>)> {
    let mut levels: Vec<i64> = total_contrib.iter().copied().filter(|&c| c > 0).collect();
    levels.sort_unstable();
    levels.dedup();

    let mut pots = Vec::new();
    let mut prev = 0i64;
    for level in levels {
        let contributors: Vec<usize> = (0..total_contrib.len())
            .filter(|&i| total_contrib[i] >= level)
            .collect();
        let amount = (level - prev) * contributors.len() as i64;
        if amount <= 0 {
            prev = level;
            continue;
        }
        let eligible: Vec<usize> = contributors.into_iter().filter(|&i| !folded[i]).collect();
        pots.push((amount, eligible));
        prev = level;
    }
    pots
}

pub(crate) fn pots_view(pots: &[(i64, Vec<usize>)]) -> PotsView {
    PotsView {
        total: pots.iter().map(|(amount, _)| amount).sum(),
        pots: pots
            .iter()
            .map(|(amount, eligible)| PotView {
                amount: *amount,
                eligible_seats: eligible.clone(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod pot_tests {
    use super::*;

    #[test]
    fn equal_contributions_form_a_single_pot() {
        let pots = compute_pots(&[100, 100, 100], &[false, false, false]);
        assert_eq!(pots, vec![(300, vec![0, 1, 2])]);
    }

    #[test]
    fn short_all_in_creates_a_side_pot() {
        // seat 0 all-in for 50, seats 1 and 2 put in 150 each.
        let pots = compute_pots(&[50, 150, 150], &[false, false, false]);
        assert_eq!(pots, vec![(150, vec![0, 1, 2]), (200, vec![1, 2])]);
    }

    #[test]
    fn folded_contributions_stay_in_the_pot_but_are_ineligible() {
        let pots = compute_pots(&[100, 100, 100], &[true, false, false]);
        assert_eq!(pots, vec![(300, vec![1, 2])]);
    }
}
