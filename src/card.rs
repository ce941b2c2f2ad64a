//! Card identifiers and their field encoding.
//!
//! A card id `c` in `[0, 52)` maps to the point `c + 2`. Points `0` and `1` are never
//! used so that an opened value can always be told apart from the additive and
//! multiplicative identities.

use std::fmt;
use std::str::FromStr;

use ark_ff::PrimeField;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::field::Scalar;

pub const NUM_CARDS: usize = 52;
pub const CARD_POINT_OFFSET: u8 = 2;

const RANKS: [char; 13] = [
    '2', '3', '4', '5', '6', '7', '8', '9', 'T', 'J', 'Q', 'K', 'A',
];
const SUITS: [char; 4] = ['c', 'd', 'h', 's'];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CardError {
    #[error("card id {0} outside [0, 52)")]
    IdOutOfRange(u8),
    #[error("card point {0} outside [2, 54)")]
    PointOutOfRange(u8),
    #[error("field element {0} does not encode a card")]
    NotACardPoint(String),
    #[error("cannot parse {0:?} as a card")]
    Unparseable(String),
}

/// Card id in `[0, 52)`. Suit is `id / 13`, rank is `id % 13` (deuce first).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Card(u8);

impl Card {
    pub fn new(id: u8) -> Result<Self, CardError> {
        if usize::from(id) >= NUM_CARDS {
            return Err(CardError::IdOutOfRange(id));
        }
        Ok(Self(id))
    }

    pub fn id(self) -> u8 {
        self.0
    }

    /// Rank index, 0 for a deuce through 12 for an ace.
    pub fn rank_index(self) -> u8 {
        self.0 % 13
    }

    pub fn suit_index(self) -> u8 {
        self.0 / 13
    }

    pub fn to_point(self) -> CardPoint {
        CardPoint(self.0 + CARD_POINT_OFFSET)
    }

    pub fn all() -> impl Iterator<Item = Card> {
        (0..NUM_CARDS as u8).map(Card)
    }
}

impl TryFrom<u8> for Card {
    type Error = CardError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Card::new(value)
    }
}

impl From<Card> for u8 {
    fn from(card: Card) -> Self {
        card.0
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            RANKS[usize::from(self.rank_index())],
            SUITS[usize::from(self.suit_index())]
        )
    }
}

impl FromStr for Card {
    type Err = CardError;

    /// Parses the two-character form produced by `Display`, e.g. `"Td"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let reject = || CardError::Unparseable(s.to_string());
        let mut chars = s.chars();
        let (Some(rank), Some(suit), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(reject());
        };
        let rank = RANKS.iter().position(|r| *r == rank).ok_or_else(reject)?;
        let suit = SUITS.iter().position(|c| *c == suit).ok_or_else(reject)?;
        Card::new((suit * 13 + rank) as u8)
    }
}

/// Field encoding of a card, always in `[2, 54)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CardPoint(u8);

impl CardPoint {
    pub fn new(value: u8) -> Result<Self, CardError> {
        if value < CARD_POINT_OFFSET || usize::from(value) >= NUM_CARDS + CARD_POINT_OFFSET as usize
        {
            return Err(CardError::PointOutOfRange(value));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn to_card(self) -> Card {
        Card(self.0 - CARD_POINT_OFFSET)
    }

    pub fn to_scalar(self) -> Scalar {
        Scalar::from(u64::from(self.0))
    }

    /// Decodes an opened plaintext back into a card point.
    pub fn from_scalar(value: &Scalar) -> Result<Self, CardError> {
        let reject = || CardError::NotACardPoint(value.to_string());
        let bigint = value.into_bigint();
        let limbs = bigint.as_ref();
        if limbs.iter().skip(1).any(|limb| *limb != 0) {
            return Err(reject());
        }
        let point = u8::try_from(limbs[0]).map_err(|_| reject())?;
        Self::new(point).map_err(|_| reject())
    }
}
