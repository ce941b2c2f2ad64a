use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::card::NUM_CARDS;

/// Board cards dealt face up after the hole cards.
pub const BOARD_CARDS: usize = 5;

/// Upper bound on seats so that every hole and board slot fits in the deck.
pub const MAX_SEATS: usize = (NUM_CARDS - BOARD_CARDS) / 2;

/// When monetary actions may begin relative to the cryptographic deal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BettingGate {
    /// Raises are allowed as soon as the game starts.
    Immediate,
    /// Raises wait until keys, shuffles and hole-card deals have all been accepted.
    #[default]
    AfterDeal,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("max_players must be within [2, {MAX_SEATS}], got {0}")]
    Seats(usize),
    #[error("{field} must be at least 1")]
    Zero { field: &'static str },
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Runtime knobs shared by the ledger, proof backend and player sessions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Seats per lobby.
    pub max_players: usize,
    /// Cut-and-choose rounds per shuffle argument; soundness error is `2^-rounds`.
    pub shuffle_rounds: usize,
    pub betting_gate: BettingGate,
    /// Read-verify-write attempts before a session gives up on a stale submission.
    pub max_submit_attempts: usize,
    /// Capacity of the ledger event broadcast channel.
    pub event_buffer: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            max_players: 2,
            shuffle_rounds: 40,
            betting_gate: BettingGate::AfterDeal,
            max_submit_attempts: 8,
            event_buffer: 256,
        }
    }
}

impl ProtocolConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(2..=MAX_SEATS).contains(&self.max_players) {
            return Err(ConfigError::Seats(self.max_players));
        }
        for (field, value) in [
            ("shuffle_rounds", self.shuffle_rounds),
            ("max_submit_attempts", self.max_submit_attempts),
            ("event_buffer", self.event_buffer),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }
        Ok(())
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ProtocolConfig::default();
        config.validate().unwrap();
        assert_eq!(config.max_players, 2);
        assert_eq!(config.shuffle_rounds, 40);
        assert_eq!(config.betting_gate, BettingGate::AfterDeal);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config =
            ProtocolConfig::from_json_str(r#"{"shuffle_rounds": 12, "betting_gate": "immediate"}"#)
                .unwrap();
        assert_eq!(config.shuffle_rounds, 12);
        assert_eq!(config.betting_gate, BettingGate::Immediate);
        assert_eq!(config.max_submit_attempts, 8);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            ProtocolConfig::from_json_str(r#"{"max_players": 1}"#),
            Err(ConfigError::Seats(1))
        ));
        assert!(matches!(
            ProtocolConfig::from_json_str(r#"{"max_players": 24}"#),
            Err(ConfigError::Seats(24))
        ));
        assert!(matches!(
            ProtocolConfig::from_json_str(r#"{"shuffle_rounds": 0}"#),
            Err(ConfigError::Zero {
                field: "shuffle_rounds"
            })
        ));
        assert!(ProtocolConfig::from_json_str("not json").is_err());
    }
}
