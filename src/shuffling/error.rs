use thiserror::Error;

use crate::field::FieldError;
use crate::sampler::SamplerError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShuffleError {
    #[error("Invalid deck size: expected 52, got {0}")]
    InvalidDeckSize(usize),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Shuffle argument needs {expected} rounds, got {actual}")]
    RoundCount { expected: usize, actual: usize },

    #[error("Shuffle argument rejected at round {round}: {reason}")]
    Rejected { round: usize, reason: &'static str },

    #[error(transparent)]
    Sampler(#[from] SamplerError),

    #[error(transparent)]
    Field(#[from] FieldError),
}
