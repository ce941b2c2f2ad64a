use super::data_structures::*;
use super::error::ShuffleError;
use crate::field::{Exponent, Scalar};
use crate::sampler::{MaskingVector, Permutation};

const LOG_TARGET: &str = "mental_poker::shuffling::encryption";

/// Permutes `deck` and adds one encryption layer per slot.
///
/// Output slot `j` holds input slot `permutation[j]` re-masked with `masking[j]`.
#[tracing::instrument(target = LOG_TARGET, skip_all)]
pub fn shuffle_and_remask(
    deck: &MaskedDeck,
    aggregate_key: &Scalar,
    permutation: &Permutation,
    masking: &[Exponent],
) -> Result<MaskedDeck, ShuffleError> {
    if permutation.len() != deck.len() || masking.len() != deck.len() {
        return Err(ShuffleError::InvalidInput(format!(
            "deck of {} with permutation of {} and {} masking factors",
            deck.len(),
            permutation.len(),
            masking.len()
        )));
    }

    let cards = permutation
        .as_slice()
        .iter()
        .zip(masking)
        .map(|(&source, r)| deck.cards()[source].add_encryption_layer(r, aggregate_key))
        .collect();
    tracing::debug!(target: LOG_TARGET, slots = deck.len(), "re-masked deck");
    MaskedDeck::new(cards)
}

/// Convenience wrapper over [`shuffle_and_remask`] for a sampled masking vector.
pub fn apply_shuffle(
    deck: &MaskedDeck,
    aggregate_key: &Scalar,
    permutation: &Permutation,
    masking: &MaskingVector,
) -> Result<MaskedDeck, ShuffleError> {
    shuffle_and_remask(deck, aggregate_key, permutation, masking.factors())
}
