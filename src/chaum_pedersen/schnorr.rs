use rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};

use crate::field::{self, Exponent, Scalar};
use crate::transcript::Transcript;

const LOG_TARGET: &str = "mental_poker::chaum_pedersen::schnorr";

/// Proof of knowledge of `x` such that `y = base^x`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchnorrProof {
    /// T = base^w
    #[serde(with = "crate::crypto_serde::field")]
    pub commitment: Scalar,
    /// z = w + c·x mod (R - 1)
    pub response: Exponent,
}

impl SchnorrProof {
    pub fn prove<R: Rng + CryptoRng + ?Sized>(
        transcript: &Transcript,
        secret: &Exponent,
        base: Scalar,
        rng: &mut R,
    ) -> Self {
        let public = field::pow(&base, secret);
        let w = Exponent::random(rng);
        let commitment = field::pow(&base, &w);
        let challenge = Self::compute_challenge(transcript, base, public, commitment);
        Self {
            commitment,
            response: w.add(&challenge.mul(secret)),
        }
    }

    pub fn verify(&self, transcript: &Transcript, base: Scalar, public: Scalar) -> bool {
        let challenge = Self::compute_challenge(transcript, base, public, self.commitment);
        let ok = field::pow(&base, &self.response) == self.commitment * field::pow(&public, &challenge);
        tracing::debug!(target: LOG_TARGET, ok, "schnorr verification");
        ok
    }

    fn compute_challenge(
        transcript: &Transcript,
        base: Scalar,
        public: Scalar,
        commitment: Scalar,
    ) -> Exponent {
        let mut transcript = transcript.clone();
        transcript.append_scalar(&base);
        transcript.append_scalar(&public);
        transcript.append_scalar(&commitment);
        transcript.challenge_exponent(b"schnorr/challenge")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn proves_knowledge_of_the_exponent() {
        let mut rng = StdRng::seed_from_u64(41);
        let transcript = Transcript::new("test/schnorr");
        let secret = Exponent::random(&mut rng);
        let public = field::generator_pow(&secret);

        let proof = SchnorrProof::prove(&transcript, &secret, field::generator(), &mut rng);
        assert!(proof.verify(&transcript, field::generator(), public));
        assert!(!proof.verify(&transcript, field::generator(), public * public));

        let mut forged = proof.clone();
        forged.response = forged.response.add(&Exponent::from_u64(1));
        assert!(!forged.verify(&transcript, field::generator(), public));
    }
}
