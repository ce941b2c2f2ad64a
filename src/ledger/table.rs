use std::ops::Range;

use ark_ff::One;
use serde::{Deserialize, Serialize};

use super::hash::hash_deck;
use super::types::{Address, DeckHash, PlayerIndex};
use crate::card::{Card, NUM_CARDS};
use crate::config::BOARD_CARDS;
use crate::engine::RevealProgress;
use crate::field::Scalar;
use crate::shuffling::{MaskedCard, MaskedDeck};

/// One accepted aggregate-key update.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyContribution {
    pub player: Address,
    #[serde(with = "crate::crypto_serde::field")]
    pub old_aggregate_key: Scalar,
    #[serde(with = "crate::crypto_serde::field")]
    pub new_aggregate_key: Scalar,
    #[serde(with = "crate::crypto_serde::field")]
    pub public_share: Scalar,
}

/// Cryptographic state of one lobby: aggregate key, current deck and per-slot reveal progress.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoTable {
    #[serde(with = "crate::crypto_serde::field")]
    aggregate_key: Scalar,
    contributions: Vec<KeyContribution>,
    deck: MaskedDeck,
    deck_hash: DeckHash,
    shufflers: Vec<Address>,
    reveals: Vec<RevealProgress>,
}

impl Default for CryptoTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CryptoTable {
    pub fn new() -> Self {
        let deck = MaskedDeck::ordered();
        let deck_hash = hash_deck(&deck);
        Self {
            aggregate_key: Scalar::one(),
            contributions: Vec::new(),
            deck,
            deck_hash,
            shufflers: Vec::new(),
            reveals: vec![RevealProgress::default(); NUM_CARDS],
        }
    }

    pub fn aggregate_key(&self) -> Scalar {
        self.aggregate_key
    }

    pub fn contributions(&self) -> &[KeyContribution] {
        &self.contributions
    }

    pub fn deck(&self) -> &MaskedDeck {
        &self.deck
    }

    pub fn deck_hash(&self) -> DeckHash {
        self.deck_hash
    }

    pub fn shufflers(&self) -> &[Address] {
        &self.shufflers
    }

    pub fn reveal(&self, slot: usize) -> Option<&RevealProgress> {
        self.reveals.get(slot)
    }

    pub fn public_share_of(&self, player: &Address) -> Option<Scalar> {
        self.contributions
            .iter()
            .find(|c| &c.player == player)
            .map(|c| c.public_share)
    }

    pub fn has_contributed(&self, player: &Address) -> bool {
        self.public_share_of(player).is_some()
    }

    pub fn keys_complete(&self, seats: usize) -> bool {
        self.contributions.len() == seats
    }

    pub fn shuffles_complete(&self, seats: usize) -> bool {
        self.shufflers.len() == seats
    }

    /// Shuffles run in join order, one per seat.
    pub fn next_shuffler(&self, players: &[Address]) -> Option<Address> {
        players.get(self.shufflers.len()).copied()
    }

    /// Plaintext of `slot` once every share has been removed.
    pub fn opened(&self, slot: usize) -> Option<Card> {
        self.reveals.get(slot).and_then(RevealProgress::opened)
    }

    /// True when every seat except the owner has removed its share from both hole cards.
    pub fn hole_cards_dealt(&self, plan: &DealPlan) -> bool {
        (0..plan.seats()).all(|seat| {
            plan.hole_slots(seat).iter().all(|slot| {
                self.reveals
                    .get(*slot)
                    .is_some_and(|progress| progress.all_others_applied(seat, plan.seats()))
            })
        })
    }

    pub(crate) fn record_contribution(&mut self, contribution: KeyContribution) {
        self.aggregate_key = contribution.new_aggregate_key;
        self.contributions.push(contribution);
    }

    pub(crate) fn record_shuffle(&mut self, shuffler: Address, deck: MaskedDeck) {
        self.deck_hash = hash_deck(&deck);
        self.deck = deck;
        self.shufflers.push(shuffler);
    }

    pub(crate) fn record_share(
        &mut self,
        slot: usize,
        seat: PlayerIndex,
        card: MaskedCard,
        plaintext: Option<Card>,
    ) {
        let Some(progress) = self.reveals.get_mut(slot) else {
            return;
        };
        progress.record_share(seat, plaintext);
        self.deck.replace(slot, card);
        self.deck_hash = hash_deck(&self.deck);
    }

    pub(crate) fn record_peek(&mut self, slot: usize, seat: PlayerIndex) {
        if let Some(progress) = self.reveals.get_mut(slot) {
            progress.record_peek(seat);
        }
    }
}

/// Fixed slot layout of a hand: two hole cards per seat, then the board.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DealPlan {
    seats: usize,
}

impl DealPlan {
    pub fn new(seats: usize) -> Self {
        Self { seats }
    }

    pub fn seats(&self) -> usize {
        self.seats
    }

    pub fn hole_slots(&self, seat: PlayerIndex) -> [usize; 2] {
        [2 * seat, 2 * seat + 1]
    }

    pub fn board_slots(&self) -> Range<usize> {
        2 * self.seats..2 * self.seats + BOARD_CARDS
    }

    /// Seat owning a hole slot; `None` for board and undealt slots.
    pub fn owner_of(&self, slot: usize) -> Option<PlayerIndex> {
        (slot < 2 * self.seats).then_some(slot / 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heads_up_layout() {
        let plan = DealPlan::new(2);
        assert_eq!(plan.hole_slots(0), [0, 1]);
        assert_eq!(plan.hole_slots(1), [2, 3]);
        assert_eq!(plan.board_slots(), 4..9);
        assert_eq!(plan.owner_of(3), Some(1));
        assert_eq!(plan.owner_of(4), None);
    }

    #[test]
    fn fresh_table_hashes_the_ordered_deck() {
        let table = CryptoTable::new();
        assert_eq!(table.aggregate_key(), Scalar::one());
        assert_eq!(table.deck_hash(), hash_deck(&MaskedDeck::ordered()));
        assert!(table.keys_complete(0));
        assert!(!table.keys_complete(2));
        assert_eq!(table.opened(0), None);
    }

    #[test]
    fn shufflers_follow_join_order() {
        let players = [Address::from_low_u64(7), Address::from_low_u64(3)];
        let mut table = CryptoTable::new();
        assert_eq!(table.next_shuffler(&players), Some(players[0]));
        table.record_shuffle(players[0], MaskedDeck::ordered());
        assert_eq!(table.next_shuffler(&players), Some(players[1]));
        table.record_shuffle(players[1], MaskedDeck::ordered());
        assert_eq!(table.next_shuffler(&players), None);
        assert!(table.shuffles_complete(2));
    }

    #[test]
    fn plans_beyond_the_deck_are_never_dealt() {
        let seats = NUM_CARDS / 2 + 1;
        let mut table = CryptoTable::new();
        for slot in 0..NUM_CARDS {
            let card = table.deck().cards()[slot];
            for seat in 0..seats {
                table.record_share(slot, seat, card, None);
            }
        }
        assert!(table.hole_cards_dealt(&DealPlan::new(NUM_CARDS / 2)));
        assert!(!table.hole_cards_dealt(&DealPlan::new(seats)));

        let hash = table.deck_hash();
        let card = table.deck().cards()[0];
        table.record_share(NUM_CARDS, 0, card, None);
        table.record_peek(NUM_CARDS, 0);
        assert_eq!(table.deck_hash(), hash);
        assert!(table.reveal(NUM_CARDS).is_none());
    }
}
