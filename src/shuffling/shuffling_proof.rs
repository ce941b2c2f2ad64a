//! Cut-and-choose argument that one masked deck is a re-masked permutation of another.
//!
//! For each round the prover publishes a shadow deck `S = σ(input)` re-masked with `s`.
//! A Fiat-Shamir bit then asks it to open either `input -> S` with `(σ, s)` or
//! `S -> output` with `τ = σ⁻¹ ∘ π` and `t_j = r_j - s_τ(j)`. A cheating prover survives
//! each round with probability 1/2. Either opening alone is uniformly distributed, so the
//! shuffle permutation and masking stay hidden.

use ark_ff::Zero;
use rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};

use super::data_structures::MaskedDeck;
use super::encryption::shuffle_and_remask;
use super::error::ShuffleError;
use crate::field::{Exponent, Scalar};
use crate::sampler::Permutation;
use crate::transcript::Transcript;

const LOG_TARGET: &str = "mental_poker::shuffling::shuffling_proof";
const TRANSCRIPT_KIND: &str = "shuffle/cut_and_choose_v1";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "side", rename_all = "snake_case")]
pub enum ShadowOpening {
    /// Shadow deck equals the input deck permuted and re-masked.
    Input {
        permutation: Permutation,
        masking: Vec<Exponent>,
    },
    /// Output deck equals the shadow deck permuted and re-masked.
    Output {
        permutation: Permutation,
        masking: Vec<Exponent>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShuffleArgument {
    pub shadows: Vec<MaskedDeck>,
    pub openings: Vec<ShadowOpening>,
}

impl ShuffleArgument {
    pub fn rounds(&self) -> usize {
        self.shadows.len()
    }
}

fn challenge_bits(
    aggregate_key: &Scalar,
    input: &MaskedDeck,
    output: &MaskedDeck,
    shadows: &[MaskedDeck],
) -> Vec<bool> {
    let mut transcript = Transcript::new(TRANSCRIPT_KIND);
    transcript.append_scalar(aggregate_key);
    transcript.append_deck(input);
    transcript.append_deck(output);
    transcript.append_u64(shadows.len() as u64);
    for shadow in shadows {
        transcript.append_deck(shadow);
    }
    transcript.challenge_bits(b"rounds", shadows.len())
}

/// Proves `output = π(input)` re-masked with `masking` under `aggregate_key`.
#[tracing::instrument(target = LOG_TARGET, skip_all, fields(rounds = rounds))]
pub fn prove_shuffle<R: Rng + CryptoRng + ?Sized>(
    aggregate_key: &Scalar,
    input: &MaskedDeck,
    output: &MaskedDeck,
    permutation: &Permutation,
    masking: &[Exponent],
    rounds: usize,
    rng: &mut R,
) -> Result<ShuffleArgument, ShuffleError> {
    if rounds == 0 {
        return Err(ShuffleError::InvalidInput(
            "shuffle argument needs at least one round".into(),
        ));
    }
    let n = input.len();
    if permutation.len() != n || masking.len() != n {
        return Err(ShuffleError::InvalidInput(format!(
            "witness covers {} slots and {} factors for a deck of {n}",
            permutation.len(),
            masking.len()
        )));
    }

    let mut shadows = Vec::with_capacity(rounds);
    let mut secrets = Vec::with_capacity(rounds);
    for _ in 0..rounds {
        let sigma = Permutation::random(n, rng);
        let s: Vec<Exponent> = (0..n).map(|_| Exponent::random(rng)).collect();
        shadows.push(shuffle_and_remask(input, aggregate_key, &sigma, &s)?);
        secrets.push((sigma, s));
    }

    let bits = challenge_bits(aggregate_key, input, output, &shadows);
    let openings = secrets
        .into_iter()
        .zip(bits)
        .map(|((sigma, s), open_output)| {
            if !open_output {
                return ShadowOpening::Input {
                    permutation: sigma,
                    masking: s,
                };
            }
            let tau = permutation.compose(&sigma.inverse());
            let t = (0..n)
                .map(|j| masking[j].sub(&s[tau.source_of(j)]))
                .collect();
            ShadowOpening::Output {
                permutation: tau,
                masking: t,
            }
        })
        .collect();

    tracing::debug!(target: LOG_TARGET, rounds, "built shuffle argument");
    Ok(ShuffleArgument { shadows, openings })
}

/// Checks a [`ShuffleArgument`] produced with exactly `rounds` rounds.
#[tracing::instrument(target = LOG_TARGET, skip_all)]
pub fn verify_shuffle(
    aggregate_key: &Scalar,
    input: &MaskedDeck,
    output: &MaskedDeck,
    argument: &ShuffleArgument,
    rounds: usize,
) -> Result<(), ShuffleError> {
    if aggregate_key.is_zero() {
        return Err(ShuffleError::InvalidInput("aggregate key is zero".into()));
    }
    if argument.shadows.len() != rounds || argument.openings.len() != rounds {
        return Err(ShuffleError::RoundCount {
            expected: rounds,
            actual: argument.shadows.len().min(argument.openings.len()),
        });
    }

    let bits = challenge_bits(aggregate_key, input, output, &argument.shadows);
    for (round, ((shadow, opening), open_output)) in argument
        .shadows
        .iter()
        .zip(&argument.openings)
        .zip(bits)
        .enumerate()
    {
        let holds = match (opening, open_output) {
            (
                ShadowOpening::Input {
                    permutation,
                    masking,
                },
                false,
            ) => shuffle_and_remask(input, aggregate_key, permutation, masking)? == *shadow,
            (
                ShadowOpening::Output {
                    permutation,
                    masking,
                },
                true,
            ) => shuffle_and_remask(shadow, aggregate_key, permutation, masking)? == *output,
            _ => {
                return Err(ShuffleError::Rejected {
                    round,
                    reason: "opening does not answer the challenge",
                })
            }
        };
        if !holds {
            tracing::debug!(target: LOG_TARGET, round, "shadow opening mismatch");
            return Err(ShuffleError::Rejected {
                round,
                reason: "opening does not reproduce the committed deck",
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field;
    use crate::sampler::MaskingVector;
    use crate::shuffling::encryption::apply_shuffle;
    use rand::{rngs::StdRng, SeedableRng};

    const ROUNDS: usize = 6;

    struct Fixture {
        key: Scalar,
        input: MaskedDeck,
        output: MaskedDeck,
        permutation: Permutation,
        masking: MaskingVector,
    }

    fn fixture() -> Fixture {
        let mut rng = StdRng::seed_from_u64(31);
        let key = field::generator_pow(&Exponent::random(&mut rng));
        let input = MaskedDeck::ordered();
        let permutation = Permutation::random(input.len(), &mut rng);
        let masking = MaskingVector::random(&mut rng);
        let output = apply_shuffle(&input, &key, &permutation, &masking).unwrap();
        Fixture {
            key,
            input,
            output,
            permutation,
            masking,
        }
    }

    #[test]
    fn honest_shuffle_verifies() {
        let f = fixture();
        let mut rng = StdRng::seed_from_u64(31);
        let argument = prove_shuffle(
            &f.key,
            &f.input,
            &f.output,
            &f.permutation,
            f.masking.factors(),
            ROUNDS,
            &mut rng,
        )
        .unwrap();
        assert_eq!(argument.rounds(), ROUNDS);
        verify_shuffle(&f.key, &f.input, &f.output, &argument, ROUNDS).unwrap();

        assert!(matches!(
            verify_shuffle(&f.key, &f.input, &f.output, &argument, ROUNDS + 1),
            Err(ShuffleError::RoundCount { .. })
        ));
    }

    #[test]
    fn tampered_output_is_rejected() {
        let f = fixture();
        let mut rng = StdRng::seed_from_u64(31);
        let argument = prove_shuffle(
            &f.key,
            &f.input,
            &f.output,
            &f.permutation,
            f.masking.factors(),
            ROUNDS,
            &mut rng,
        )
        .unwrap();

        let mut cards = f.output.cards().to_vec();
        cards.swap(3, 4);
        let tampered = MaskedDeck::new(cards).unwrap();
        assert!(verify_shuffle(&f.key, &f.input, &tampered, &argument, ROUNDS).is_err());

        let other_key = f.key * f.key;
        assert!(verify_shuffle(&other_key, &f.input, &f.output, &argument, ROUNDS).is_err());
    }

    #[test]
    fn wrong_witness_cannot_prove() {
        let f = fixture();
        let mut rng = StdRng::seed_from_u64(31);
        // A card was replaced outright, so no permutation explains the output.
        let mut cards = f.output.cards().to_vec();
        cards[0] = cards[0].add_encryption_layer(&Exponent::from_u64(1), &Scalar::from(9u64));
        let forged = MaskedDeck::new(cards).unwrap();
        let argument = prove_shuffle(
            &f.key,
            &f.input,
            &forged,
            &f.permutation,
            f.masking.factors(),
            16,
            &mut rng,
        )
        .unwrap();
        assert!(verify_shuffle(&f.key, &f.input, &forged, &argument, 16).is_err());
    }
}
