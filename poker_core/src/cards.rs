//! Cards, decks, and 7-card hand evaluation.
//!
//! Card strings match §6 of the protocol: a rank character (`2-9,T,J,Q,K,A`)
//! followed by a suit (`c,d,h,s`), e.g. `Ah`, `Tc`.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Suit {
    Clubs,
    Diamonds,
    Hearts,
    Spades,
}

impl Suit {
    const ALL: [Suit; 4] = [Suit::Clubs, Suit::Diamonds, Suit::Hearts, Suit::Spades];

    fn char(self) -> char {
        match self {
            Suit::Clubs => 'c',
            Suit::Diamonds => 'd',
            Suit::Hearts => 'h',
            Suit::Spades => 's',
        }
    }
}

/// Card rank as a comparable value: 2=2 ... 10=10, J=11, Q=12, K=13, A=14.
pub type Rank = u8;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    const RANKS: [Rank; 13] = [2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14];

    fn rank_char(rank: Rank) -> char {
        match rank {
            2..=9 => (b'0' + rank) as char,
            10 => 'T',
            11 => 'J',
            12 => 'Q',
            13 => 'K',
            14 => 'A',
            _ => '?',
        }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Card::rank_char(self.rank), self.suit.char())
    }
}

/// The literal placeholder used for a card string hidden from the recipient.
pub const REDACTED_CARD: &str = "??";

/// An unbiased, freshly shuffled 52-card deck. Stands in for the
/// card/shuffle source collaborator described in §1 of the spec
/// (out of scope as an external interface; this is the concrete
/// implementation used end-to-end).
#[derive(Debug)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    pub fn new_shuffled() -> Self {
        let mut cards = Vec::with_capacity(52);
        for suit in Suit::ALL {
            for rank in Card::RANKS {
                cards.push(Card { rank, suit });
            }
        }
        cards.shuffle(&mut rand::rng());
        Self { cards }
    }

    /// Deal one card from the top. Panics if the deck is exhausted; with at
    /// most 23 players and a 52-card deck this never happens in a legal hand.
    pub fn deal(&mut self) -> Card {
        self.cards.pop().expect("deck exhausted")
    }
}

#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum HandRank {
    HighCard,
    OnePair,
    TwoPair,
    ThreeOfAKind,
    Straight,
    Flush,
    FullHouse,
    FourOfAKind,
    StraightFlush,
}

/// A fully comparable hand value: category first, then kicker ranks in
/// descending significance. Two `HandValue`s compare lexicographically,
/// which is exactly hand strength ordering.
#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct HandValue {
    pub rank: HandRank,
    pub tiebreak: Vec<Rank>,
}

/// Evaluate the best 5-card hand out of up to 7 cards (hole + board).
///
/// Enumerates every 5-card combination and keeps the strongest; simple and
/// easy to audit rather than table-driven, which matches the scale of a
/// single-table engine.
pub fn evaluate_best(cards: &[Card]) -> HandValue {
    assert!(cards.len() >= 5, "need at least 5 cards to evaluate a hand");
    let mut best: Option<HandValue> = None;
    for combo in combinations(cards, 5) {
        let value = evaluate_five(&combo);
        if best.as_ref().is_none_or(|b| value > *b) {
            best = Some(value);
        }
    }
    best.expect("at least one 5-card combination")
}

fn combinations(cards: &[Card], k: usize) -> Vec<Vec<Card>> {
    let n = cards.len();
    let mut result = Vec::new();
    let mut indices: Vec<usize> = (0..k).collect();
    if k > n {
        return result;
    }
    loop {
        result.push(indices.iter().map(|&i| cards[i]).collect());
        let mut i = k;
        loop {
            if i == 0 {
                return result;
            }
            i -= 1;
            if indices[i] != i + n - k {
                break;
            }
            if i == 0 {
                return result;
            }
        }
        indices[i] += 1;
        for j in i + 1..k {
            indices[j] = indices[j - 1] + 1;
        }
    }
}

fn evaluate_five(cards: &[Card]) -> HandValue {
    assert_eq!(cards.len(), 5);
    let mut ranks: Vec<Rank> = cards.iter().map(|c| c.rank).collect();
    ranks.sort_unstable_by(|a, b| b.cmp(a));

    let is_flush = cards.iter().all(|c| c.suit == cards[0].suit);
    let straight_high = straight_high_card(&ranks);

    let mut counts: Vec<(Rank, usize)> = Vec::new();
    for &r in &ranks {
        if let Some(entry) = counts.iter_mut().find(|(rank, _)| *rank == r) {
            entry.1 += 1;
        } else {
            counts.push((r, 1));
        }
    }
    // Sort by count desc, then rank desc, so tiebreak order falls out directly.
    counts.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(b.0.cmp(&a.0)));
    let tiebreak_by_groups: Vec<Rank> = counts.iter().map(|(r, _)| *r).collect();
    let shape: Vec<usize> = counts.iter().map(|(_, n)| *n).collect();

    if is_flush
        && let Some(high) = straight_high
    {
        return HandValue {
            rank: HandRank::StraightFlush,
            tiebreak: vec![high],
        };
    }
    if shape == [4, 1] {
        return HandValue {
            rank: HandRank::FourOfAKind,
            tiebreak: tiebreak_by_groups,
        };
    }
    if shape == [3, 2] {
        return HandValue {
            rank: HandRank::FullHouse,
            tiebreak: tiebreak_by_groups,
        };
    }
    if is_flush {
        return HandValue {
            rank: HandRank::Flush,
            tiebreak: ranks,
        };
    }
    if let Some(high) = straight_high {
        return HandValue {
            rank: HandRank::Straight,
            tiebreak: vec![high],
        };
    }
    if shape == [3, 1, 1] {
        return HandValue {
            rank: HandRank::ThreeOfAKind,
            tiebreak: tiebreak_by_groups,
        };
    }
    if shape == [2, 2, 1] {
        return HandValue {
            rank: HandRank::TwoPair,
            tiebreak: tiebreak_by_groups,
        };
    }
    if shape == [2, 1, 1, 1] {
        return HandValue {
            rank: HandRank::OnePair,
            tiebreak: tiebreak_by_groups,
        };
    }
    HandValue {
        rank: HandRank::HighCard,
        tiebreak: ranks,
    }
}

/// Returns the high card of a straight if `ranks` (descending, len 5, may
/// have duplicates already excluded by the caller) forms one. Handles the
/// wheel (A-2-3-4-5, where the ace plays low and 5 is the effective high).
fn straight_high_card(ranks_desc: &[Rank]) -> Option<Rank> {
    let mut unique: Vec<Rank> = ranks_desc.to_vec();
    unique.dedup();
    if unique.len() != 5 {
        return None;
    }
    if unique[0] - unique[4] == 4 {
        return Some(unique[0]);
    }
    // Wheel: A,5,4,3,2
    if unique == [14, 5, 4, 3, 2] {
        return Some(5);
    }
    None
}
