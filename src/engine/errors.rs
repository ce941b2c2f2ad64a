use thiserror::Error;

use crate::card::CardError;
use crate::field::FieldError;
use crate::ledger::types::PlayerIndex;
use crate::proof_system::{CircuitId, ProverError};
use crate::sampler::SamplerError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)]
    Field(#[from] FieldError),
    #[error(transparent)]
    Prover(#[from] ProverError),
    #[error(transparent)]
    Card(#[from] CardError),
    #[error(transparent)]
    Sampler(#[from] SamplerError),
    #[error("plaintext withheld: {applied} of {required} shares applied")]
    PrematureReveal { applied: usize, required: usize },
    #[error("player {player} already applied a share to this card")]
    ShareAlreadyApplied { player: PlayerIndex },
    #[error("deal proof carries no decryption factor")]
    MissingDisclosure,
    #[error("prover answered a {expected} request with {actual} signals")]
    UnexpectedSignals {
        expected: CircuitId,
        actual: CircuitId,
    },
}
