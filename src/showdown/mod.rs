//! showdown: hand categories, score packing and best-of-seven selection

use core::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::card::Card;

pub type Rank = u8; // 2..14 (A=14)

#[inline]
pub fn rank_of(card: Card) -> Rank {
    card.rank_index() + 2
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandCategory {
    HighCard = 0,
    OnePair = 1,
    TwoPair = 2,
    ThreeOfAKind = 3,
    Straight = 4,
    Flush = 5,
    FullHouse = 6,
    FourOfAKind = 7,
    StraightFlush = 8, // Royal is SF with high=14
}

impl HandCategory {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for HandCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HandCategory::HighCard => "high card",
            HandCategory::OnePair => "one pair",
            HandCategory::TwoPair => "two pair",
            HandCategory::ThreeOfAKind => "three of a kind",
            HandCategory::Straight => "straight",
            HandCategory::Flush => "flush",
            HandCategory::FullHouse => "full house",
            HandCategory::FourOfAKind => "four of a kind",
            HandCategory::StraightFlush => "straight flush",
        })
    }
}

/// Base-16 multipliers (no shifting) for packing (cat,c1..c5)
pub const M5: u32 = 1_048_576; // 16^5
pub const M4: u32 = 65_536; // 16^4
pub const M3: u32 = 4_096; // 16^3
pub const M2: u32 = 256; // 16^2
pub const M1: u32 = 16; // 16^1
pub const M0: u32 = 1; // 16^0

/// Deterministic sort-by-rank-desc, then suit-desc
pub fn sort_desc(cards: &mut [Card]) {
    cards.sort_by(|a, b| match rank_of(*b).cmp(&rank_of(*a)) {
        Ordering::Equal => b.suit_index().cmp(&a.suit_index()),
        o => o,
    });
}

#[inline]
pub fn is_wheel_ranks(r: &[Rank; 5]) -> bool {
    *r == [14, 5, 4, 3, 2]
}

#[inline]
pub fn is_run_desc_ranks(r: &[Rank; 5]) -> bool {
    r.windows(2).all(|w| w[0] == w[1] + 1)
}

pub mod native;

pub use native::{best_hand, best_of_seven, evaluate_five, pack_score, RankedHand};
