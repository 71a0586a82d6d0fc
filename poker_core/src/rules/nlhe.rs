//! Concrete no-limit hold'em implementation of [`RulesEngine`].
//!
//! Owns one hand end-to-end: posting blinds, dealing, the four betting
//! rounds, all-in run-outs, and pot distribution at showdown.

use super::{compute_pots, pots_view, HandResults, RulesEngine, RulesError};
use crate::cards::{evaluate_best, Card, Deck};
use crate::protocol::{Action, PotsView, Street, ValidAction};

pub struct NlheEngine {
    n: usize,
    dealer_pk: usize,
    sb_amount: i64,
    bb_amount: i64,

    stacks: Vec<i64>,
    stacks_at_start: Vec<i64>,
    bets: Vec<i64>,
    total_contrib: Vec<i64>,
    folded: Vec<bool>,
    all_in: Vec<bool>,
    acted_since_raise: Vec<bool>,

    hole_cards: Vec<[Card; 2]>,
    board: Vec<Card>,
    deck: Deck,

    street: Street,
    current_bet: i64,
    min_raise_size: i64,
    actor: Option<usize>,

    terminal: bool,
    cached_results: Option<HandResults>,
}

impl NlheEngine {
    /// `starting_stacks` indexes by `pk` (position within the active set for
    /// this hand), not by the tournament's permanent seat index; the caller
    /// maps between the two.
    pub fn new(
        dealer_pk: usize,
        sb_pk: usize,
        bb_pk: usize,
        sb_amount: i64,
        bb_amount: i64,
        starting_stacks: Vec<i64>,
    ) -> Self {
        let n = starting_stacks.len();
        assert!(n >= 2, "a hand requires at least two players");

        let mut deck = Deck::new_shuffled();
        let hole_cards: Vec<[Card; 2]> = (0..n).map(|_| [deck.deal(), deck.deal()]).collect();

        let mut stacks = starting_stacks.clone();
        let mut bets = vec![0i64; n];
        let mut total_contrib = vec![0i64; n];

        let mut post = |pk: usize, amount: i64| {
            let posted = amount.min(stacks[pk]);
            stacks[pk] -= posted;
            bets[pk] += posted;
            total_contrib[pk] += posted;
        };
        post(sb_pk, sb_amount);
        post(bb_pk, bb_amount);

        let all_in: Vec<bool> = (0..n).map(|i| stacks[i] == 0).collect();
        let current_bet = bets.iter().copied().max().unwrap_or(0);

        let mut engine = NlheEngine {
            n,
            dealer_pk,
            sb_amount,
            bb_amount,
            stacks_at_start: starting_stacks,
            stacks,
            bets,
            total_contrib,
            folded: vec![false; n],
            all_in,
            acted_since_raise: vec![false; n],
            hole_cards,
            board: Vec::new(),
            deck,
            street: Street::Preflop,
            current_bet,
            min_raise_size: bb_amount,
            actor: None,
            terminal: false,
            cached_results: None,
        };
        engine.actor = engine.next_actor_after(bb_pk);
        if engine.actor.is_none() {
            // Degenerate heads-up case: one side is all-in on the blind post.
            engine.advance_street();
        }
        engine
    }

    fn count_contestants(&self) -> usize {
        (0..self.n).filter(|&i| !self.folded[i]).count()
    }

    fn count_can_still_act(&self) -> usize {
        (0..self.n)
            .filter(|&i| !self.folded[i] && !self.all_in[i])
            .count()
    }

    fn next_actor_after(&self, from: usize) -> Option<usize> {
        for step in 1..=self.n {
            let pk = (from + step) % self.n;
            if pk == from {
                break;
            }
            if !self.folded[pk] && !self.all_in[pk] {
                return Some(pk);
            }
        }
        None
    }

    fn street_closed(&self) -> bool {
        (0..self.n).all(|i| {
            self.folded[i]
                || self.all_in[i]
                || (self.acted_since_raise[i] && self.bets[i] == self.current_bet)
        })
    }

    fn reset_for_new_street(&mut self) {
        self.bets = vec![0; self.n];
        self.current_bet = 0;
        self.min_raise_size = self.bb_amount;
        self.acted_since_raise = vec![false; self.n];
    }

    fn advance_street(&mut self) {
        if self.count_can_still_act() <= 1 {
            // Everyone left is all-in (or only one can act): run the board
            // straight out to the river with no further betting.
            while self.street != Street::River {
                self.deal_next_street_cards();
                self.street = next_street(self.street);
            }
            self.resolve_showdown();
            return;
        }

        if self.street == Street::River {
            self.resolve_showdown();
            return;
        }

        self.deal_next_street_cards();
        self.street = next_street(self.street);
        self.reset_for_new_street();
        self.actor = self.next_actor_after(self.dealer_pk);
        if self.actor.is_none() {
            self.advance_street();
        }
    }

    fn deal_next_street_cards(&mut self) {
        match self.street {
            Street::Preflop => {
                self.deck.deal();
                for _ in 0..3 {
                    self.board.push(self.deck.deal());
                }
            }
            Street::Flop | Street::Turn => {
                self.deck.deal();
                self.board.push(self.deck.deal());
            }
            Street::River | Street::Showdown => {}
        }
    }

    fn resolve_no_showdown(&mut self) {
        let winner = (0..self.n).find(|&i| !self.folded[i]);
        let pots = compute_pots(&self.total_contrib, &self.folded);
        if let Some(winner) = winner {
            for (amount, _eligible) in &pots {
                self.stacks[winner] += amount;
            }
        }
        self.terminal = true;
        self.actor = None;
        self.cached_results = Some(HandResults {
            payoffs: (0..self.n)
                .map(|i| self.stacks[i] - self.stacks_at_start[i])
                .collect(),
            final_stacks: self.stacks.clone(),
            community_cards: self.board.clone(),
            showdown_occurred: false,
        });
    }

    fn resolve_showdown(&mut self) {
        self.street = Street::Showdown;
        let pots = compute_pots(&self.total_contrib, &self.folded);

        let hand_value = |pk: usize| {
            let mut cards: Vec<Card> = self.hole_cards[pk].to_vec();
            cards.extend_from_slice(&self.board);
            evaluate_best(&cards)
        };

        for (amount, eligible) in &pots {
            if eligible.is_empty() {
                continue;
            }
            let best = eligible
                .iter()
                .map(|&pk| hand_value(pk))
                .max()
                .expect("eligible is non-empty");
            let winners: Vec<usize> = eligible
                .iter()
                .copied()
                .filter(|&pk| hand_value(pk) == best)
                .collect();
            let share = amount / winners.len() as i64;
            let remainder = amount % winners.len() as i64;
            for (idx, &pk) in winners.iter().enumerate() {
                self.stacks[pk] += share + if idx == 0 { remainder } else { 0 };
            }
        }

        self.terminal = true;
        self.actor = None;
        self.cached_results = Some(HandResults {
            payoffs: (0..self.n)
                .map(|i| self.stacks[i] - self.stacks_at_start[i])
                .collect(),
            final_stacks: self.stacks.clone(),
            community_cards: self.board.clone(),
            showdown_occurred: true,
        });
    }
}

fn next_street(street: Street) -> Street {
    match street {
        Street::Preflop => Street::Flop,
        Street::Flop => Street::Turn,
        Street::Turn => Street::River,
        Street::River | Street::Showdown => Street::Showdown,
    }
}

impl RulesEngine for NlheEngine {
    fn actor_pk(&self) -> Option<usize> {
        self.actor
    }

    fn legal_actions(&self) -> Vec<ValidAction> {
        let Some(pk) = self.actor else {
            return Vec::new();
        };
        let owed = self.current_bet - self.bets[pk];
        let mut actions = vec![ValidAction::Fold];
        if owed <= 0 {
            actions.push(ValidAction::Check);
        } else {
            actions.push(ValidAction::Call {
                amount: owed.min(self.stacks[pk]),
            });
        }
        // A player re-prompted only because a later short all-in raise
        // didn't meet the minimum may call the extra owed, never re-raise.
        if self.stacks[pk] > 0 && !self.acted_since_raise[pk] {
            let min_total = self.current_bet + self.min_raise_size;
            let max_total = self.bets[pk] + self.stacks[pk];
            if max_total > self.current_bet {
                actions.push(ValidAction::Raise {
                    min_amount: min_total.min(max_total),
                    max_amount: max_total,
                });
            }
        }
        actions
    }

    fn apply(&mut self, action: &Action) -> Result<(), RulesError> {
        let Some(pk) = self.actor else {
            return Err(RulesError::HandAlreadyTerminal {
                action: action.clone(),
            });
        };

        match action {
            Action::Fold => {
                self.folded[pk] = true;
            }
            Action::Check | Action::Call => {
                let owed = (self.current_bet - self.bets[pk]).max(0);
                let paid = owed.min(self.stacks[pk]);
                self.stacks[pk] -= paid;
                self.bets[pk] += paid;
                self.total_contrib[pk] += paid;
                if self.stacks[pk] == 0 {
                    self.all_in[pk] = true;
                }
            }
            Action::Raise { amount } => {
                let target = (*amount).min(self.bets[pk] + self.stacks[pk]);
                let delta = target - self.bets[pk];
                let raise_size = target - self.current_bet;
                self.stacks[pk] -= delta;
                self.bets[pk] += delta;
                self.total_contrib[pk] += delta;
                if raise_size > 0 {
                    self.current_bet = target;
                    // A short all-in raise below the current minimum still
                    // owes everyone the extra amount but doesn't reopen
                    // raising for players who've already acted this round.
                    if raise_size >= self.min_raise_size {
                        self.min_raise_size = raise_size;
                        for acted in self.acted_since_raise.iter_mut() {
                            *acted = false;
                        }
                    }
                }
                if self.stacks[pk] == 0 {
                    self.all_in[pk] = true;
                }
            }
        }

        self.acted_since_raise[pk] = true;

        if self.count_contestants() <= 1 {
            self.resolve_no_showdown();
            return Ok(());
        }

        self.actor = self.next_actor_after(pk);
        if self.actor.is_none() || self.street_closed() {
            self.actor = None;
            self.advance_street();
        }
        Ok(())
    }

    fn is_terminal(&self) -> bool {
        self.terminal
    }

    fn results(&self) -> HandResults {
        self.cached_results
            .clone()
            .expect("results() called before the hand reached a terminal state")
    }

    fn hole_cards(&self, pk: usize) -> &[Card] {
        &self.hole_cards[pk]
    }

    fn board_cards(&self) -> &[Card] {
        &self.board
    }

    fn pots(&self) -> PotsView {
        pots_view(&compute_pots(&self.total_contrib, &self.folded))
    }

    fn stacks(&self) -> &[i64] {
        &self.stacks
    }

    fn bets(&self) -> &[i64] {
        &self.bets
    }

    fn total_pot(&self) -> i64 {
        self.total_contrib.iter().sum()
    }

    fn street(&self) -> Street {
        self.street
    }
}

impl NlheEngine {
    pub fn folded(&self, pk: usize) -> bool {
        self.folded[pk]
    }

    pub fn all_in(&self, pk: usize) -> bool {
        self.all_in[pk]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_heads_up(stacks: Vec<i64>) -> NlheEngine {
        // Heads-up: dealer posts SB (pk 0), opponent posts BB (pk 1).
        NlheEngine::new(0, 0, 1, 50, 100, stacks)
    }

    #[test]
    fn blinds_are_posted_at_construction() {
        let engine = new_heads_up(vec![10_000, 10_000]);
        assert_eq!(engine.bets[0], 50);
        assert_eq!(engine.bets[1], 100);
        assert_eq!(engine.stacks[0], 9_950);
        assert_eq!(engine.stacks[1], 9_900);
    }

    #[test]
    fn heads_up_dealer_acts_first_preflop() {
        let engine = new_heads_up(vec![10_000, 10_000]);
        assert_eq!(engine.actor_pk(), Some(0));
    }

    #[test]
    fn check_down_to_showdown_conserves_chips() {
        let mut engine = new_heads_up(vec![10_000, 10_000]);
        // preflop: sb calls, bb checks
        engine.apply(&Action::Call).unwrap();
        engine.apply(&Action::Check).unwrap();
        for _ in 0..3 {
            // flop/turn/river: bb acts first postflop, both check
            engine.apply(&Action::Check).unwrap();
            engine.apply(&Action::Check).unwrap();
        }
        assert!(engine.is_terminal());
        let results = engine.results();
        let total: i64 = results.final_stacks.iter().sum();
        assert_eq!(total, 20_000);
    }

    #[test]
    fn fold_awards_the_entire_pot_without_showdown() {
        let mut engine = new_heads_up(vec![10_000, 10_000]);
        engine.apply(&Action::Fold).unwrap();
        assert!(engine.is_terminal());
        let results = engine.results();
        assert!(!results.showdown_occurred);
        assert_eq!(results.final_stacks.iter().sum::<i64>(), 20_000);
        assert_eq!(results.final_stacks[1], 10_050);
    }

    #[test]
    fn all_in_runs_the_board_out_with_no_further_actions() {
        let mut engine = new_heads_up(vec![150, 10_000]);
        // sb (dealer) shoves all-in preflop.
        engine.apply(&Action::Raise { amount: 150 }).unwrap();
        engine.apply(&Action::Call).unwrap();
        assert!(engine.is_terminal());
        assert_eq!(engine.board.len(), 5);
        let results = engine.results();
        assert_eq!(results.final_stacks.iter().sum::<i64>(), 10_150);
    }

    #[test]
    fn incomplete_allin_raise_does_not_reopen_raising_for_prior_actors() {
        // 3-handed: pk0 dealer/UTG, pk1 sb, pk2 bb with a short stack.
        let mut engine = NlheEngine::new(0, 1, 2, 50, 100, vec![1_000, 1_000, 600]);
        assert_eq!(engine.actor_pk(), Some(0));

        // Full raise to 500 (raise_size 400), sets min_raise_size to 400.
        engine.apply(&Action::Raise { amount: 500 }).unwrap();
        assert_eq!(engine.actor_pk(), Some(1));
        engine.apply(&Action::Call).unwrap();
        assert_eq!(engine.actor_pk(), Some(2));

        // pk2 shoves all-in to 550, a raise of only 50 - below the 400 minimum.
        engine.apply(&Action::Raise { amount: 550 }).unwrap();
        assert_eq!(engine.actor_pk(), Some(0));

        // pk0 already acted this round; the short all-in owes them 50 more
        // but must not let them raise again.
        let actions = engine.legal_actions();
        assert!(actions.iter().any(|a| matches!(a, ValidAction::Call { amount } if *amount == 50)));
        assert!(!actions.iter().any(|a| matches!(a, ValidAction::Raise { .. })));
    }
}
