use serde::{Deserialize, Serialize};

use crate::card::Card;
use crate::showdown::*;

/// Canonical best five cards with their category and packed score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedHand {
    pub category: HandCategory,
    pub cards: [Card; 5],
    pub tiebreak: [Rank; 5],
    pub score: u32,
}

/// Pack (cat, c1..c5) into a u32 (base-16 digits; ≤ 16^6).
#[inline]
pub fn pack_score(cat: HandCategory, c: [Rank; 5]) -> u32 {
    u32::from(cat.as_u8()) * M5
        + u32::from(c[0]) * M4
        + u32::from(c[1]) * M3
        + u32::from(c[2]) * M2
        + u32::from(c[3]) * M1
        + u32::from(c[4]) * M0
}

/// Classifies five cards and orders them canonically: larger groups first, then higher
/// ranks, then higher suits. A wheel puts its ace last.
pub fn evaluate_five(hand: [Card; 5]) -> RankedHand {
    let mut cards = hand;
    sort_desc(&mut cards);

    let mut counts = [0u8; 15];
    for card in &cards {
        counts[usize::from(rank_of(*card))] += 1;
    }
    // (multiplicity, rank), biggest group first
    let mut groups: Vec<(u8, Rank)> = (2..=14u8)
        .rev()
        .filter(|r| counts[usize::from(*r)] > 0)
        .map(|r| (counts[usize::from(r)], r))
        .collect();
    groups.sort_by(|a, b| b.cmp(a));

    cards.sort_by(|a, b| {
        let key = |c: &Card| (counts[usize::from(rank_of(*c))], rank_of(*c), c.suit_index());
        key(b).cmp(&key(a))
    });

    let ranks: [Rank; 5] = cards.map(rank_of);
    let flush = cards.iter().all(|c| c.suit_index() == cards[0].suit_index());
    let distinct = groups.len() == 5;
    let straight_high = if distinct && is_run_desc_ranks(&ranks) {
        Some(ranks[0])
    } else if distinct && is_wheel_ranks(&ranks) {
        cards.rotate_left(1);
        Some(5)
    } else {
        None
    };

    let shape: Vec<u8> = groups.iter().map(|(n, _)| *n).collect();
    let group_rank = |i: usize| groups.get(i).map_or(0, |(_, r)| *r);
    let (category, tiebreak) = match (straight_high, flush, shape.as_slice()) {
        (Some(high), true, _) => (HandCategory::StraightFlush, [high, 0, 0, 0, 0]),
        (_, _, [4, 1]) => (
            HandCategory::FourOfAKind,
            [group_rank(0), group_rank(1), 0, 0, 0],
        ),
        (_, _, [3, 2]) => (
            HandCategory::FullHouse,
            [group_rank(0), group_rank(1), 0, 0, 0],
        ),
        (_, true, _) => (HandCategory::Flush, ranks),
        (Some(high), false, _) => (HandCategory::Straight, [high, 0, 0, 0, 0]),
        (_, _, [3, 1, 1]) => (
            HandCategory::ThreeOfAKind,
            [group_rank(0), group_rank(1), group_rank(2), 0, 0],
        ),
        (_, _, [2, 2, 1]) => (
            HandCategory::TwoPair,
            [group_rank(0), group_rank(1), group_rank(2), 0, 0],
        ),
        (_, _, [2, 1, 1, 1]) => (
            HandCategory::OnePair,
            [group_rank(0), group_rank(1), group_rank(2), group_rank(3), 0],
        ),
        _ => (HandCategory::HighCard, ranks),
    };

    RankedHand {
        category,
        cards,
        tiebreak,
        score: pack_score(category, tiebreak),
    }
}

/// Enumerate all 21 subsets of seven cards and keep the highest packed score.
pub fn best_of_seven(cards: [Card; 7]) -> RankedHand {
    let mut best: Option<RankedHand> = None;
    for skip_a in 0..7 {
        for skip_b in (skip_a + 1)..7 {
            let mut five = [cards[0]; 5];
            let mut k = 0;
            for (i, card) in cards.iter().enumerate() {
                if i != skip_a && i != skip_b {
                    five[k] = *card;
                    k += 1;
                }
            }
            let ranked = evaluate_five(five);
            if best.map_or(true, |b| ranked.score > b.score) {
                best = Some(ranked);
            }
        }
    }
    best.unwrap_or_else(|| evaluate_five([cards[0], cards[1], cards[2], cards[3], cards[4]]))
}

/// Best hand from five to seven cards; `None` for any other count.
pub fn best_hand(cards: &[Card]) -> Option<RankedHand> {
    if !(5..=7).contains(&cards.len()) {
        return None;
    }
    (0u32..1 << cards.len())
        .filter(|mask| mask.count_ones() == 5)
        .filter_map(|mask| {
            let picked: Vec<Card> = cards
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, c)| *c)
                .collect();
            <[Card; 5]>::try_from(picked).ok()
        })
        .map(evaluate_five)
        .max_by_key(|h| h.score)
}
