use ark_ff::{One, Zero};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use serde::{Deserialize, Serialize};

use super::error::ShuffleError;
use crate::card::{Card, CardPoint, NUM_CARDS};
use crate::field::{self, Exponent, FieldError, Scalar};

pub const DECK_SIZE: usize = NUM_CARDS;

/// Multiplicative ElGamal ciphertext `(c1, c2) = (g^r, m · Y^r)`.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    CanonicalSerialize,
    CanonicalDeserialize,
)]
pub struct ElGamalCiphertext {
    #[serde(with = "crate::crypto_serde::field")]
    pub c1: Scalar,
    #[serde(with = "crate::crypto_serde::field")]
    pub c2: Scalar,
}

/// A card slot as the ledger stores it.
pub type MaskedCard = ElGamalCiphertext;

impl ElGamalCiphertext {
    pub fn new(c1: Scalar, c2: Scalar) -> Self {
        Self { c1, c2 }
    }

    /// Unmasked encoding `(1, m)` of a card point.
    pub fn open(point: CardPoint) -> Self {
        Self::new(Scalar::one(), point.to_scalar())
    }

    /// `(c1 · g^r, c2 · Y^r)`.
    pub fn add_encryption_layer(&self, randomness: &Exponent, aggregate_key: &Scalar) -> Self {
        Self {
            c1: self.c1 * field::generator_pow(randomness),
            c2: self.c2 * field::pow(aggregate_key, randomness),
        }
    }

    /// `c1^sk`, the factor one player strips from `c2`.
    pub fn decryption_factor(&self, secret: &Exponent) -> Scalar {
        field::pow(&self.c1, secret)
    }

    /// `(c1, c2 / d)`.
    pub fn remove_share(&self, factor: &Scalar) -> Result<Self, FieldError> {
        Ok(Self {
            c1: self.c1,
            c2: field::checked_div(&self.c2, factor)?,
        })
    }

    /// Both components must live in `Fr*`.
    pub fn is_well_formed(&self) -> bool {
        !self.c1.is_zero() && !self.c2.is_zero()
    }
}

/// Exactly [`DECK_SIZE`] masked cards, indexed by slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ElGamalCiphertext>", into = "Vec<ElGamalCiphertext>")]
pub struct MaskedDeck(Vec<ElGamalCiphertext>);

impl MaskedDeck {
    pub fn new(cards: Vec<ElGamalCiphertext>) -> Result<Self, ShuffleError> {
        if cards.len() != DECK_SIZE {
            return Err(ShuffleError::InvalidDeckSize(cards.len()));
        }
        Ok(Self(cards))
    }

    /// Dealer-ordered deck: slot `i` holds `(1, i + 2)`.
    pub fn ordered() -> Self {
        Self(
            Card::all()
                .map(|card| ElGamalCiphertext::open(card.to_point()))
                .collect(),
        )
    }

    pub fn cards(&self) -> &[ElGamalCiphertext] {
        &self.0
    }

    pub fn get(&self, slot: usize) -> Option<&ElGamalCiphertext> {
        self.0.get(slot)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ElGamalCiphertext> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn replace(&mut self, slot: usize, card: ElGamalCiphertext) {
        self.0[slot] = card;
    }
}

impl TryFrom<Vec<ElGamalCiphertext>> for MaskedDeck {
    type Error = ShuffleError;

    fn try_from(cards: Vec<ElGamalCiphertext>) -> Result<Self, Self::Error> {
        MaskedDeck::new(cards)
    }
}

impl From<MaskedDeck> for Vec<ElGamalCiphertext> {
    fn from(deck: MaskedDeck) -> Self {
        deck.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn ordered_deck_encodes_card_points() {
        let deck = MaskedDeck::ordered();
        assert_eq!(deck.len(), DECK_SIZE);
        for (slot, card) in deck.iter().enumerate() {
            assert_eq!(card.c1, Scalar::one());
            assert_eq!(card.c2, Scalar::from(slot as u64 + 2));
        }
    }

    #[test]
    fn deck_rejects_wrong_length() {
        assert_eq!(
            MaskedDeck::new(vec![]).unwrap_err(),
            ShuffleError::InvalidDeckSize(0)
        );
        let json = serde_json::to_string(&vec![ElGamalCiphertext::open(
            Card::new(0).unwrap().to_point(),
        )])
        .unwrap();
        assert!(serde_json::from_str::<MaskedDeck>(&json).is_err());
    }

    #[test]
    fn layers_commute_with_share_removal() {
        let mut rng = StdRng::seed_from_u64(29);
        let sk1 = Exponent::random(&mut rng);
        let sk2 = Exponent::random(&mut rng);
        let key = field::generator_pow(&sk1.add(&sk2));

        let point = Card::new(30).unwrap().to_point();
        let masked = ElGamalCiphertext::open(point)
            .add_encryption_layer(&Exponent::random(&mut rng), &key)
            .add_encryption_layer(&Exponent::random(&mut rng), &key);

        let after_second = masked
            .remove_share(&masked.decryption_factor(&sk2))
            .unwrap();
        let opened = after_second
            .remove_share(&after_second.decryption_factor(&sk1))
            .unwrap();
        assert_eq!(opened.c2, point.to_scalar());
    }
}
