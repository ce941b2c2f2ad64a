use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::errors::EngineError;
use crate::card::{Card, CardPoint};
use crate::field::SecretKey;
use crate::ledger::types::PlayerIndex;
use crate::proof_system::{
    CircuitId, ProofBundle, Prover, PublicSignals, RevealMode, RevealWitness, Witness,
};
use crate::shuffling::MaskedCard;

const LOG_TARGET: &str = "mental_poker::engine::reveal";

/// Which shares a single card slot has received.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealProgress {
    applied: BTreeSet<PlayerIndex>,
    peeked: BTreeSet<PlayerIndex>,
    opened: Option<Card>,
}

impl RevealProgress {
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    pub fn has_applied(&self, player: PlayerIndex) -> bool {
        self.applied.contains(&player)
    }

    pub fn has_peeked(&self, player: PlayerIndex) -> bool {
        self.peeked.contains(&player)
    }

    pub fn opened(&self) -> Option<Card> {
        self.opened
    }

    /// True when every share except `player`'s has been removed.
    pub fn awaits_only(&self, player: PlayerIndex, required: usize) -> bool {
        !self.has_applied(player) && self.applied.len() + 1 == required
    }

    /// True when every seat other than `player` has applied its share.
    pub fn all_others_applied(&self, player: PlayerIndex, players: usize) -> bool {
        (0..players)
            .filter(|idx| *idx != player)
            .all(|idx| self.has_applied(idx))
    }

    pub(crate) fn record_share(&mut self, player: PlayerIndex, plaintext: Option<Card>) {
        self.applied.insert(player);
        if plaintext.is_some() {
            self.opened = plaintext;
        }
    }

    pub(crate) fn record_peek(&mut self, player: PlayerIndex) {
        self.peeked.insert(player);
    }
}

#[derive(Clone, Debug)]
pub enum RevealOutcome {
    /// Share removed; other shares still mask the card.
    Partial {
        card: MaskedCard,
        remaining: usize,
        bundle: ProofBundle,
    },
    /// Last share removed; the card is public.
    Opened { card: Card, bundle: ProofBundle },
    /// Plaintext known only to the caller; the proof hides the decryption factor.
    Peeked { card: Card, bundle: ProofBundle },
    /// Already public; nothing to prove.
    AlreadyOpen(Card),
}

impl RevealOutcome {
    pub fn bundle(&self) -> Option<&ProofBundle> {
        match self {
            RevealOutcome::Partial { bundle, .. }
            | RevealOutcome::Opened { bundle, .. }
            | RevealOutcome::Peeked { bundle, .. } => Some(bundle),
            RevealOutcome::AlreadyOpen(_) => None,
        }
    }

    pub fn into_parts(self) -> (Option<ProofBundle>, Option<Card>) {
        let card = self.card();
        match self {
            RevealOutcome::Partial { bundle, .. }
            | RevealOutcome::Opened { bundle, .. }
            | RevealOutcome::Peeked { bundle, .. } => (Some(bundle), card),
            RevealOutcome::AlreadyOpen(_) => (None, card),
        }
    }

    /// Plaintext visible to the caller, if any.
    pub fn card(&self) -> Option<Card> {
        match self {
            RevealOutcome::Partial { .. } => None,
            RevealOutcome::Opened { card, .. }
            | RevealOutcome::Peeked { card, .. }
            | RevealOutcome::AlreadyOpen(card) => Some(*card),
        }
    }
}

/// Removes `secret`'s layer locally and decodes the remaining plaintext.
pub fn decrypt_last_share(card: &MaskedCard, secret: &SecretKey) -> Result<Card, EngineError> {
    let opened = card.remove_share(&card.decryption_factor(&secret.exponent()))?;
    Ok(CardPoint::from_scalar(&opened.c2)?.to_card())
}

/// Partial decryption of single cards, with progress tracking.
#[derive(Clone)]
pub struct RevealEngine {
    prover: Arc<dyn Prover>,
}

impl RevealEngine {
    pub fn new(prover: Arc<dyn Prover>) -> Self {
        Self { prover }
    }

    /// Applies `player`'s share to `card` out of `required` shares in total.
    ///
    /// A plaintext is only produced once every other share has been applied.
    #[tracing::instrument(target = LOG_TARGET, skip(self, card, progress, secret))]
    pub fn reveal(
        &self,
        card: &MaskedCard,
        progress: &RevealProgress,
        required: usize,
        player: PlayerIndex,
        secret: &SecretKey,
        mode: RevealMode,
    ) -> Result<RevealOutcome, EngineError> {
        if let Some(opened) = progress.opened() {
            tracing::debug!(target: LOG_TARGET, %opened, "card already open");
            return Ok(RevealOutcome::AlreadyOpen(opened));
        }
        if progress.has_applied(player) {
            return Err(EngineError::ShareAlreadyApplied { player });
        }
        let last_share = progress.awaits_only(player, required);

        if mode == RevealMode::Peek && !last_share {
            return Err(EngineError::PrematureReveal {
                applied: progress.applied_count(),
                required,
            });
        }

        let bundle = self.prover.prove(&Witness::Reveal(RevealWitness {
            masked_card: *card,
            secret: secret.clone(),
            mode,
        }))?;
        let PublicSignals::Reveal(signals) = &bundle.public_signals else {
            return Err(EngineError::UnexpectedSignals {
                expected: CircuitId::Reveal,
                actual: bundle.public_signals.circuit_id(),
            });
        };

        match mode {
            RevealMode::Peek => {
                let card = decrypt_last_share(card, secret)?;
                Ok(RevealOutcome::Peeked { card, bundle })
            }
            RevealMode::Deal => {
                let unmasked = signals
                    .unmasked()?
                    .ok_or(EngineError::MissingDisclosure)?;
                if last_share {
                    let card = CardPoint::from_scalar(&unmasked.c2)?.to_card();
                    tracing::debug!(target: LOG_TARGET, %card, "card opened");
                    Ok(RevealOutcome::Opened { card, bundle })
                } else {
                    Ok(RevealOutcome::Partial {
                        card: unmasked,
                        remaining: required - progress.applied_count() - 1,
                        bundle,
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Exponent, Scalar};
    use crate::proof_system::{ProofVerifier, SigmaProofSystem};
    use crate::sampler::sample_secret_key;
    use crate::shuffling::ElGamalCiphertext;
    use rand::{rngs::StdRng, SeedableRng};

    struct Table {
        engine: RevealEngine,
        verifier: Arc<SigmaProofSystem>,
        secrets: Vec<SecretKey>,
        card: MaskedCard,
        plaintext: Card,
    }

    fn table(players: usize) -> Table {
        let mut rng = StdRng::seed_from_u64(9);
        let system = Arc::new(SigmaProofSystem::with_seed(2, 9));
        let secrets: Vec<SecretKey> = (0..players).map(|_| sample_secret_key(&mut rng)).collect();
        let key = secrets
            .iter()
            .fold(Scalar::from(1u64), |acc, sk| acc * sk.public_share());
        let plaintext = Card::new(44).unwrap();
        let card = ElGamalCiphertext::open(plaintext.to_point())
            .add_encryption_layer(&Exponent::random(&mut rng), &key)
            .add_encryption_layer(&Exponent::random(&mut rng), &key);
        Table {
            engine: RevealEngine::new(system.clone()),
            verifier: system,
            secrets,
            card,
            plaintext,
        }
    }

    #[test]
    fn plaintext_only_after_every_share() {
        let t = table(3);
        let mut progress = RevealProgress::default();
        let mut card = t.card;

        for player in 0..2 {
            let outcome = t
                .engine
                .reveal(&card, &progress, 3, player, &t.secrets[player], RevealMode::Deal)
                .unwrap();
            t.verifier.verify(outcome.bundle().unwrap()).unwrap();
            assert_eq!(outcome.card(), None);
            let RevealOutcome::Partial { card: next, remaining, .. } = outcome else {
                panic!("expected a partial reveal");
            };
            assert_eq!(remaining, 2 - player);
            assert_ne!(next.c2, t.plaintext.to_point().to_scalar());
            progress.record_share(player, None);
            card = next;
        }

        let outcome = t
            .engine
            .reveal(&card, &progress, 3, 2, &t.secrets[2], RevealMode::Deal)
            .unwrap();
        assert!(matches!(outcome, RevealOutcome::Opened { card, .. } if card == t.plaintext));
        progress.record_share(2, Some(t.plaintext));

        let again = t
            .engine
            .reveal(&card, &progress, 3, 0, &t.secrets[0], RevealMode::Deal)
            .unwrap();
        assert!(matches!(again, RevealOutcome::AlreadyOpen(card) if card == t.plaintext));
    }

    #[test]
    fn peek_requires_all_other_shares() {
        let t = table(2);
        let progress = RevealProgress::default();

        let early = t
            .engine
            .reveal(&t.card, &progress, 2, 0, &t.secrets[0], RevealMode::Peek);
        assert_eq!(
            early.unwrap_err(),
            EngineError::PrematureReveal {
                applied: 0,
                required: 2
            }
        );

        let dealt = t
            .engine
            .reveal(&t.card, &progress, 2, 1, &t.secrets[1], RevealMode::Deal)
            .unwrap();
        let RevealOutcome::Partial { card, .. } = dealt else {
            panic!("expected a partial reveal");
        };
        let mut progress = progress;
        progress.record_share(1, None);

        let peeked = t
            .engine
            .reveal(&card, &progress, 2, 0, &t.secrets[0], RevealMode::Peek)
            .unwrap();
        t.verifier.verify(peeked.bundle().unwrap()).unwrap();
        assert!(matches!(peeked, RevealOutcome::Peeked { card, .. } if card == t.plaintext));
    }

    #[test]
    fn duplicate_share_is_refused() {
        let t = table(2);
        let mut progress = RevealProgress::default();
        progress.record_share(0, None);
        assert_eq!(
            t.engine
                .reveal(&t.card, &progress, 2, 0, &t.secrets[0], RevealMode::Deal)
                .unwrap_err(),
            EngineError::ShareAlreadyApplied { player: 0 }
        );
    }
}
