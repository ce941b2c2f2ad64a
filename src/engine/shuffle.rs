use std::sync::Arc;

use rand::{CryptoRng, Rng};

use super::errors::EngineError;
use crate::field::Scalar;
use crate::proof_system::{CircuitId, ProofBundle, Prover, PublicSignals, ShuffleWitness, Witness};
use crate::sampler::{MaskingVector, PermutationMatrix};
use crate::shuffling::MaskedDeck;

const LOG_TARGET: &str = "mental_poker::engine::shuffle";

#[derive(Clone, Debug)]
pub struct ShuffleOutcome {
    pub deck: MaskedDeck,
    pub bundle: ProofBundle,
}

/// Permutes and re-masks a whole deck with a proof of correct shuffling.
#[derive(Clone)]
pub struct ShuffleEngine {
    prover: Arc<dyn Prover>,
}

impl ShuffleEngine {
    pub fn new(prover: Arc<dyn Prover>) -> Self {
        Self { prover }
    }

    #[tracing::instrument(target = LOG_TARGET, skip_all)]
    pub fn shuffle(
        &self,
        deck: &MaskedDeck,
        aggregate_key: Scalar,
        permutation: PermutationMatrix,
        masking: MaskingVector,
    ) -> Result<ShuffleOutcome, EngineError> {
        let bundle = self.prover.prove(&Witness::Shuffle(ShuffleWitness {
            aggregate_key,
            input_deck: deck.clone(),
            permutation,
            masking,
        }))?;
        let PublicSignals::Shuffle(signals) = &bundle.public_signals else {
            return Err(EngineError::UnexpectedSignals {
                expected: CircuitId::Shuffle,
                actual: bundle.public_signals.circuit_id(),
            });
        };
        let deck = signals.output_deck.clone();
        tracing::debug!(target: LOG_TARGET, "deck shuffled");
        Ok(ShuffleOutcome { deck, bundle })
    }

    /// Samples a fresh permutation and masking vector, then shuffles.
    pub fn shuffle_random<R: Rng + CryptoRng + ?Sized>(
        &self,
        deck: &MaskedDeck,
        aggregate_key: Scalar,
        rng: &mut R,
    ) -> Result<ShuffleOutcome, EngineError> {
        let permutation = PermutationMatrix::random(rng);
        let masking = MaskingVector::random(rng);
        self.shuffle(deck, aggregate_key, permutation, masking)
    }
}
