//! Native sigma-protocol backend for all three circuits.

use ark_ff::{One, Zero};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::*;
use crate::chaum_pedersen::{ChaumPedersenProof, SchnorrProof};
use crate::config::ProtocolConfig;
use crate::field::Exponent;
use crate::shuffling::{apply_shuffle, prove_shuffle, verify_shuffle};
use crate::transcript::Transcript;

const LOG_TARGET: &str = "mental_poker::proof_system::sigma";

const KEY_AGGREGATE_KIND: &str = "key_aggregate/schnorr_v1";
const REVEAL_DEAL_KIND: &str = "reveal/deal_dleq_v1";
const REVEAL_PEEK_KIND: &str = "reveal/peek_schnorr_v1";

fn key_aggregate_transcript(signals: &KeyAggregateSignals) -> Transcript {
    let mut transcript = Transcript::new(KEY_AGGREGATE_KIND);
    transcript.append_scalar(&signals.old_aggregate_key);
    transcript.append_scalar(&signals.new_aggregate_key);
    transcript
}

fn reveal_transcript(kind: &'static str, public_share: &Scalar, card: &MaskedCard) -> Transcript {
    let mut transcript = Transcript::new(kind);
    transcript.append_scalar(public_share);
    transcript.append_ciphertext(card);
    transcript
}

/// Fiat-Shamir prover and verifier over `Fr*`.
pub struct SigmaProofSystem {
    shuffle_rounds: usize,
    rng: Mutex<StdRng>,
}

impl SigmaProofSystem {
    pub fn new(shuffle_rounds: usize) -> Self {
        Self {
            shuffle_rounds,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn from_config(config: &ProtocolConfig) -> Self {
        Self::new(config.shuffle_rounds)
    }

    /// Deterministic proof randomness for tests and replays.
    pub fn with_seed(shuffle_rounds: usize, seed: u64) -> Self {
        Self {
            shuffle_rounds,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn shuffle_rounds(&self) -> usize {
        self.shuffle_rounds
    }

    fn prove_key_aggregate(
        &self,
        witness: &KeyAggregateWitness,
    ) -> Result<ProofBundle, ProverError> {
        if witness.old_aggregate_key.is_zero() {
            return Err(ProverError::MalformedWitness {
                circuit: CircuitId::KeyAggregate,
                reason: "old aggregate key is zero".into(),
            });
        }
        let secret = witness.secret.exponent();
        let signals = KeyAggregateSignals {
            old_aggregate_key: witness.old_aggregate_key,
            new_aggregate_key: witness.old_aggregate_key * witness.secret.public_share(),
        };
        let proof = SchnorrProof::prove(
            &key_aggregate_transcript(&signals),
            &secret,
            field::generator(),
            &mut *self.rng.lock(),
        );
        Ok(ProofBundle {
            proof: Proof::KeyAggregate(proof),
            public_signals: PublicSignals::KeyAggregate(signals),
        })
    }

    fn prove_shuffle(&self, witness: &ShuffleWitness) -> Result<ProofBundle, ProverError> {
        let malformed = |reason: String| ProverError::MalformedWitness {
            circuit: CircuitId::Shuffle,
            reason,
        };
        if witness.aggregate_key.is_zero() || witness.aggregate_key.is_one() {
            return Err(malformed("aggregate key must be a non-trivial unit".into()));
        }
        if witness.permutation.dimension() != witness.input_deck.len() {
            return Err(malformed(format!(
                "permutation matrix is {}x{}, deck has {} cards",
                witness.permutation.dimension(),
                witness.permutation.dimension(),
                witness.input_deck.len()
            )));
        }
        if witness.masking.len() != witness.input_deck.len() {
            return Err(malformed(format!(
                "{} masking factors for {} cards",
                witness.masking.len(),
                witness.input_deck.len()
            )));
        }

        let permutation = witness.permutation.permutation();
        let output_deck = apply_shuffle(
            &witness.input_deck,
            &witness.aggregate_key,
            permutation,
            &witness.masking,
        )?;
        let argument = prove_shuffle(
            &witness.aggregate_key,
            &witness.input_deck,
            &output_deck,
            permutation,
            witness.masking.factors(),
            self.shuffle_rounds,
            &mut *self.rng.lock(),
        )?;
        Ok(ProofBundle {
            proof: Proof::Shuffle(argument),
            public_signals: PublicSignals::Shuffle(ShuffleSignals {
                aggregate_key: witness.aggregate_key,
                input_deck: witness.input_deck.clone(),
                output_deck,
            }),
        })
    }

    fn prove_reveal(&self, witness: &RevealWitness) -> Result<ProofBundle, ProverError> {
        if !witness.masked_card.is_well_formed() {
            return Err(ProverError::MalformedWitness {
                circuit: CircuitId::Reveal,
                reason: "masked card has a zero component".into(),
            });
        }
        let secret = witness.secret.exponent();
        let public_share = witness.secret.public_share();
        let card = witness.masked_card;

        let (proof, disclosure) = match witness.mode {
            RevealMode::Deal => {
                let decryption_factor = card.decryption_factor(&secret);
                let proof = ChaumPedersenProof::prove(
                    &reveal_transcript(REVEAL_DEAL_KIND, &public_share, &card),
                    &secret,
                    field::generator(),
                    card.c1,
                    &mut *self.rng.lock(),
                );
                (RevealProof::Deal(proof), Disclosure::Deal { decryption_factor })
            }
            RevealMode::Peek => {
                let proof = SchnorrProof::prove(
                    &reveal_transcript(REVEAL_PEEK_KIND, &public_share, &card),
                    &secret,
                    field::generator(),
                    &mut *self.rng.lock(),
                );
                (RevealProof::Peek(proof), Disclosure::Peek)
            }
        };
        Ok(ProofBundle {
            proof: Proof::Reveal(proof),
            public_signals: PublicSignals::Reveal(RevealSignals {
                public_share,
                masked_card: card,
                disclosure,
            }),
        })
    }

    fn verify_key_aggregate(
        &self,
        proof: &SchnorrProof,
        signals: &KeyAggregateSignals,
    ) -> Result<(), String> {
        let share = signals.public_share().map_err(|err| err.to_string())?;
        if !proof.verify(&key_aggregate_transcript(signals), field::generator(), share) {
            return Err("schnorr check failed for new / old".into());
        }
        Ok(())
    }

    fn verify_reveal(&self, proof: &RevealProof, signals: &RevealSignals) -> Result<(), String> {
        let card = &signals.masked_card;
        if !card.is_well_formed() {
            return Err("masked card has a zero component".into());
        }
        let ok = match (proof, &signals.disclosure) {
            (RevealProof::Deal(proof), Disclosure::Deal { decryption_factor }) => proof.verify(
                &reveal_transcript(REVEAL_DEAL_KIND, &signals.public_share, card),
                field::generator(),
                card.c1,
                signals.public_share,
                *decryption_factor,
            ),
            (RevealProof::Peek(proof), Disclosure::Peek) => proof.verify(
                &reveal_transcript(REVEAL_PEEK_KIND, &signals.public_share, card),
                field::generator(),
                signals.public_share,
            ),
            _ => return Err("proof mode does not match disclosure".into()),
        };
        if !ok {
            return Err(format!("{:?} proof check failed", signals.mode()));
        }
        Ok(())
    }
}

impl Prover for SigmaProofSystem {
    #[tracing::instrument(target = LOG_TARGET, skip_all, fields(circuit = %witness.circuit_id()))]
    fn prove(&self, witness: &Witness) -> Result<ProofBundle, ProverError> {
        let bundle = match witness {
            Witness::KeyAggregate(w) => self.prove_key_aggregate(w),
            Witness::Shuffle(w) => self.prove_shuffle(w),
            Witness::Reveal(w) => self.prove_reveal(w),
        }?;
        tracing::debug!(target: LOG_TARGET, "proof generated");
        Ok(bundle)
    }
}

impl ProofVerifier for SigmaProofSystem {
    #[tracing::instrument(target = LOG_TARGET, skip_all)]
    fn verify(&self, bundle: &ProofBundle) -> Result<(), VerifyError> {
        let circuit = bundle.circuit_id()?;
        let outcome = match (&bundle.proof, &bundle.public_signals) {
            (Proof::KeyAggregate(proof), PublicSignals::KeyAggregate(signals)) => {
                self.verify_key_aggregate(proof, signals)
            }
            (Proof::Shuffle(argument), PublicSignals::Shuffle(signals)) => verify_shuffle(
                &signals.aggregate_key,
                &signals.input_deck,
                &signals.output_deck,
                argument,
                self.shuffle_rounds,
            )
            .map_err(|err| err.to_string()),
            (Proof::Reveal(proof), PublicSignals::Reveal(signals)) => {
                self.verify_reveal(proof, signals)
            }
            (proof, signals) => {
                return Err(VerifyError::ShapeMismatch {
                    proof: proof.circuit_id(),
                    signals: signals.circuit_id(),
                })
            }
        };
        outcome.map_err(|reason| {
            tracing::warn!(target: LOG_TARGET, %circuit, %reason, "proof rejected");
            VerifyError::Rejected { circuit, reason }
        })
    }
}
