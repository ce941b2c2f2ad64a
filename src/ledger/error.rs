use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::lobby::GamePhase;
use super::types::{Address, LobbyId, Wei};
use crate::field::FieldError;
use crate::proof_system::{CircuitId, VerifyError};

/// Coarse classification callers branch on; `StaleState` is the only retryable kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    StaleState,
    InvalidProof,
    InvalidRange,
    IllegalTransition,
    InsufficientStake,
    UnknownLobby,
    Unauthorized,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("stale {what}: ledger holds {expected}, submission carried {provided}")]
    StaleState {
        what: &'static str,
        expected: String,
        provided: String,
    },
    #[error("invalid {circuit} proof: {reason}")]
    InvalidProof { circuit: CircuitId, reason: String },
    #[error("{what} out of range: {provided}")]
    InvalidRange {
        what: &'static str,
        provided: String,
    },
    #[error("cannot {action} while {phase}: {reason}")]
    IllegalTransition {
        action: &'static str,
        phase: GamePhase,
        reason: String,
    },
    #[error("stake mismatch: expected {expected} wei, provided {provided} wei")]
    InsufficientStake { expected: Wei, provided: Wei },
    #[error("lobby {0} does not exist")]
    UnknownLobby(LobbyId),
    #[error("{caller} is not allowed to {action}")]
    Unauthorized {
        caller: Address,
        action: &'static str,
    },
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::StaleState { .. } => ErrorKind::StaleState,
            LedgerError::InvalidProof { .. } => ErrorKind::InvalidProof,
            LedgerError::InvalidRange { .. } => ErrorKind::InvalidRange,
            LedgerError::IllegalTransition { .. } => ErrorKind::IllegalTransition,
            LedgerError::InsufficientStake { .. } => ErrorKind::InsufficientStake,
            LedgerError::UnknownLobby(_) => ErrorKind::UnknownLobby,
            LedgerError::Unauthorized { .. } => ErrorKind::Unauthorized,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.kind() == ErrorKind::StaleState
    }

    pub fn stale(what: &'static str, expected: impl Display, provided: impl Display) -> Self {
        Self::StaleState {
            what,
            expected: expected.to_string(),
            provided: provided.to_string(),
        }
    }

    pub fn illegal(action: &'static str, phase: GamePhase, reason: impl Into<String>) -> Self {
        Self::IllegalTransition {
            action,
            phase,
            reason: reason.into(),
        }
    }

    pub fn out_of_range(what: &'static str, provided: impl Display) -> Self {
        Self::InvalidRange {
            what,
            provided: provided.to_string(),
        }
    }

    pub fn invalid_proof(circuit: CircuitId, reason: impl Display) -> Self {
        Self::InvalidProof {
            circuit,
            reason: reason.to_string(),
        }
    }
}

impl From<VerifyError> for LedgerError {
    fn from(err: VerifyError) -> Self {
        let circuit = match &err {
            VerifyError::ShapeMismatch { proof, .. } => *proof,
            VerifyError::Rejected { circuit, .. } => *circuit,
        };
        LedgerError::invalid_proof(circuit, err)
    }
}

impl From<FieldError> for LedgerError {
    fn from(err: FieldError) -> Self {
        LedgerError::out_of_range("field element", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_stale_state_is_retryable() {
        let stale = LedgerError::stale("deck hash", "0x01", "0x02");
        assert!(stale.is_stale());
        assert!(!LedgerError::UnknownLobby(3).is_stale());
        assert_eq!(
            LedgerError::InsufficientStake {
                expected: 5,
                provided: 4
            }
            .kind(),
            ErrorKind::InsufficientStake
        );
    }

    #[test]
    fn verifier_rejections_map_to_invalid_proof() {
        let err: LedgerError = VerifyError::Rejected {
            circuit: CircuitId::Shuffle,
            reason: "round 3 failed".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::InvalidProof);
        assert!(err.to_string().contains("round 3 failed"));
    }
}
