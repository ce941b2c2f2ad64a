//! Prover and verifier capabilities, keyed by circuit id.
//!
//! Witnesses, public signals and proofs are tagged enums with one fixed-shape variant per
//! [`CircuitId`]. A bundle whose proof and signals carry different tags is rejected outright.

pub mod sigma;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chaum_pedersen::{ChaumPedersenProof, SchnorrProof};
use crate::field::{self, FieldError, Scalar, SecretKey};
use crate::sampler::{MaskingVector, PermutationMatrix};
use crate::shuffling::{MaskedCard, MaskedDeck, ShuffleArgument, ShuffleError};

pub use sigma::SigmaProofSystem;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitId {
    KeyAggregate,
    Shuffle,
    Reveal,
}

impl fmt::Display for CircuitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CircuitId::KeyAggregate => "key-aggregate",
            CircuitId::Shuffle => "shuffle",
            CircuitId::Reveal => "reveal",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevealMode {
    /// Self-reveal: only the caller learns the plaintext.
    Peek,
    /// Reveal-to-table: the partially unmasked card is published.
    Deal,
}

#[derive(Clone, Debug)]
pub struct KeyAggregateWitness {
    pub old_aggregate_key: Scalar,
    pub secret: SecretKey,
}

#[derive(Clone, Debug)]
pub struct ShuffleWitness {
    pub aggregate_key: Scalar,
    pub input_deck: MaskedDeck,
    pub permutation: PermutationMatrix,
    pub masking: MaskingVector,
}

#[derive(Clone, Debug)]
pub struct RevealWitness {
    pub masked_card: MaskedCard,
    pub secret: SecretKey,
    pub mode: RevealMode,
}

/// Private input for one circuit.
#[derive(Clone, Debug)]
pub enum Witness {
    KeyAggregate(KeyAggregateWitness),
    Shuffle(ShuffleWitness),
    Reveal(RevealWitness),
}

impl Witness {
    pub fn circuit_id(&self) -> CircuitId {
        match self {
            Witness::KeyAggregate(_) => CircuitId::KeyAggregate,
            Witness::Shuffle(_) => CircuitId::Shuffle,
            Witness::Reveal(_) => CircuitId::Reveal,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyAggregateSignals {
    #[serde(with = "crate::crypto_serde::field")]
    pub old_aggregate_key: Scalar,
    #[serde(with = "crate::crypto_serde::field")]
    pub new_aggregate_key: Scalar,
}

impl KeyAggregateSignals {
    /// `new / old`, the contributor's public share.
    pub fn public_share(&self) -> Result<Scalar, FieldError> {
        field::checked_div(&self.new_aggregate_key, &self.old_aggregate_key)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShuffleSignals {
    #[serde(with = "crate::crypto_serde::field")]
    pub aggregate_key: Scalar,
    pub input_deck: MaskedDeck,
    pub output_deck: MaskedDeck,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Disclosure {
    Peek,
    Deal {
        #[serde(with = "crate::crypto_serde::field")]
        decryption_factor: Scalar,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealSignals {
    #[serde(with = "crate::crypto_serde::field")]
    pub public_share: Scalar,
    pub masked_card: MaskedCard,
    pub disclosure: Disclosure,
}

impl RevealSignals {
    pub fn mode(&self) -> RevealMode {
        match self.disclosure {
            Disclosure::Peek => RevealMode::Peek,
            Disclosure::Deal { .. } => RevealMode::Deal,
        }
    }

    /// Ciphertext with this share removed; `None` for a peek.
    pub fn unmasked(&self) -> Result<Option<MaskedCard>, FieldError> {
        match &self.disclosure {
            Disclosure::Peek => Ok(None),
            Disclosure::Deal { decryption_factor } => {
                self.masked_card.remove_share(decryption_factor).map(Some)
            }
        }
    }
}

/// Public inputs and outputs a proof is checked against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "circuit", rename_all = "kebab-case")]
pub enum PublicSignals {
    KeyAggregate(KeyAggregateSignals),
    Shuffle(ShuffleSignals),
    Reveal(RevealSignals),
}

impl PublicSignals {
    pub fn circuit_id(&self) -> CircuitId {
        match self {
            PublicSignals::KeyAggregate(_) => CircuitId::KeyAggregate,
            PublicSignals::Shuffle(_) => CircuitId::Shuffle,
            PublicSignals::Reveal(_) => CircuitId::Reveal,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RevealProof {
    Peek(SchnorrProof),
    Deal(ChaumPedersenProof),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "circuit", rename_all = "kebab-case")]
pub enum Proof {
    KeyAggregate(SchnorrProof),
    Shuffle(ShuffleArgument),
    Reveal(RevealProof),
}

impl Proof {
    pub fn circuit_id(&self) -> CircuitId {
        match self {
            Proof::KeyAggregate(_) => CircuitId::KeyAggregate,
            Proof::Shuffle(_) => CircuitId::Shuffle,
            Proof::Reveal(_) => CircuitId::Reveal,
        }
    }
}

/// Proof together with the public signals it attests to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofBundle {
    pub proof: Proof,
    pub public_signals: PublicSignals,
}

impl ProofBundle {
    /// Circuit id shared by proof and signals.
    pub fn circuit_id(&self) -> Result<CircuitId, VerifyError> {
        let proof = self.proof.circuit_id();
        let signals = self.public_signals.circuit_id();
        if proof != signals {
            return Err(VerifyError::ShapeMismatch { proof, signals });
        }
        Ok(proof)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProverError {
    #[error("malformed {circuit} witness: {reason}")]
    MalformedWitness { circuit: CircuitId, reason: String },
    #[error(transparent)]
    Shuffle(#[from] ShuffleError),
    #[error(transparent)]
    Field(#[from] FieldError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("proof is for {proof} but public signals are for {signals}")]
    ShapeMismatch { proof: CircuitId, signals: CircuitId },
    #[error("{circuit} proof rejected: {reason}")]
    Rejected { circuit: CircuitId, reason: String },
}

/// Turns a private witness into a proof and its public signals.
pub trait Prover: Send + Sync {
    fn prove(&self, witness: &Witness) -> Result<ProofBundle, ProverError>;
}

/// Checks a proof against its public signals.
pub trait ProofVerifier: Send + Sync {
    fn verify(&self, bundle: &ProofBundle) -> Result<(), VerifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Exponent;

    #[test]
    fn mismatched_tags_are_a_shape_error() {
        let bundle = ProofBundle {
            proof: Proof::KeyAggregate(SchnorrProof {
                commitment: Scalar::from(3u64),
                response: Exponent::from_u64(4),
            }),
            public_signals: PublicSignals::Reveal(RevealSignals {
                public_share: Scalar::from(5u64),
                masked_card: MaskedCard::new(Scalar::from(1u64), Scalar::from(2u64)),
                disclosure: Disclosure::Peek,
            }),
        };
        assert_eq!(
            bundle.circuit_id(),
            Err(VerifyError::ShapeMismatch {
                proof: CircuitId::KeyAggregate,
                signals: CircuitId::Reveal,
            })
        );
    }

    #[test]
    fn signals_serialize_with_circuit_tag() {
        let signals = PublicSignals::KeyAggregate(KeyAggregateSignals {
            old_aggregate_key: Scalar::from(1u64),
            new_aggregate_key: Scalar::from(25u64),
        });
        let json = serde_json::to_value(&signals).unwrap();
        assert_eq!(json["circuit"], "key-aggregate");
        crate::test_utils::serde::assert_round_trip_eq(&signals);
    }
}
