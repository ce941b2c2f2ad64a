use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

pub type LobbyId = u64;
/// Smallest currency unit.
pub type Wei = u128;
/// Seat number, equal to join order.
pub type PlayerIndex = usize;

pub const WEI_PER_ETHER: Wei = 1_000_000_000_000_000_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid address {input:?}: {reason}")]
pub struct AddressParseError {
    pub input: String,
    pub reason: &'static str,
}

/// 20-byte account identifier, rendered as `0x`-prefixed hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

impl Address {
    /// Address whose trailing eight bytes hold `value`.
    pub fn from_low_u64(value: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let error = |reason| AddressParseError {
            input: s.to_string(),
            reason,
        };
        let trimmed = s.strip_prefix("0x").ok_or_else(|| error("missing 0x prefix"))?;
        let bytes = hex::decode(trimmed).map_err(|_| error("not hex"))?;
        let bytes: [u8; 20] = bytes.try_into().map_err(|_| error("expected 20 bytes"))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Digest of a masked deck as recorded by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeckHash([u8; 32]);

impl DeckHash {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn zero() -> Self {
        Self([0u8; 32])
    }
}

impl Default for DeckHash {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for DeckHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl From<[u8; 32]> for DeckHash {
    fn from(bytes: [u8; 32]) -> Self {
        DeckHash::new(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::serde::assert_round_trip_eq;

    #[test]
    fn address_parses_prefixed_hex() {
        let addr: Address = "0x00000000000000000000000000000000000000ff".parse().unwrap();
        assert_eq!(addr, Address::from_low_u64(255));
        assert_eq!(addr.to_string(), "0x00000000000000000000000000000000000000ff");

        assert!("00000000000000000000000000000000000000ff".parse::<Address>().is_err());
        assert!("0x00ff".parse::<Address>().is_err());
        assert!("0xgg".parse::<Address>().is_err());
    }

    #[test]
    fn address_serializes_as_string() {
        let addr = Address::from_low_u64(0xabc);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"0x0000000000000000000000000000000000000abc\"");
        assert_round_trip_eq(&addr);
        assert_round_trip_eq(&DeckHash::new([7u8; 32]));
    }
}
