use rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};

use crate::field::{self, Exponent, Scalar};
use crate::transcript::Transcript;

const LOG_TARGET: &str = "mental_poker::chaum_pedersen";

/// Chaum-Pedersen proof for proving equality of discrete logarithms in `Fr*`.
/// Proves that the same secret was used to compute α = g^secret and β = h^secret.
/// This is a non-interactive proof using the Fiat-Shamir heuristic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaumPedersenProof {
    /// First commitment: T_g = g^w
    #[serde(with = "crate::crypto_serde::field")]
    pub t_g: Scalar,
    /// Second commitment: T_h = h^w
    #[serde(with = "crate::crypto_serde::field")]
    pub t_h: Scalar,
    /// Response: z = w + c·secret mod (R - 1)
    pub z: Exponent,
}

impl ChaumPedersenProof {
    /// Generate a non-interactive Chaum-Pedersen proof.
    ///
    /// The caller binds any statement context into `transcript` beforehand.
    ///
    /// # Arguments
    /// * `secret` - The secret exponent used in both α and β
    /// * `g` - First base
    /// * `h` - Second base
    pub fn prove<R: Rng + CryptoRng + ?Sized>(
        transcript: &Transcript,
        secret: &Exponent,
        g: Scalar,
        h: Scalar,
        rng: &mut R,
    ) -> Self {
        let alpha = field::pow(&g, secret);
        let beta = field::pow(&h, secret);

        let w = Exponent::random(rng);
        let t_g = field::pow(&g, &w);
        let t_h = field::pow(&h, &w);

        let challenge = Self::compute_challenge(transcript, g, h, alpha, beta, t_g, t_h);
        tracing::debug!(target: LOG_TARGET, %challenge, "generated challenge");

        let z = w.add(&challenge.mul(secret));
        ChaumPedersenProof { t_g, t_h, z }
    }

    /// Verify a Chaum-Pedersen proof.
    ///
    /// # Arguments
    /// * `g` - First base
    /// * `h` - Second base
    /// * `alpha` - First public value (should be g^secret)
    /// * `beta` - Second public value (should be h^secret)
    pub fn verify(
        &self,
        transcript: &Transcript,
        g: Scalar,
        h: Scalar,
        alpha: Scalar,
        beta: Scalar,
    ) -> bool {
        let challenge = Self::compute_challenge(transcript, g, h, alpha, beta, self.t_g, self.t_h);

        // g^z = T_g · α^c
        let check1 = field::pow(&g, &self.z) == self.t_g * field::pow(&alpha, &challenge);
        // h^z = T_h · β^c
        let check2 = field::pow(&h, &self.z) == self.t_h * field::pow(&beta, &challenge);

        let result = check1 && check2;
        tracing::debug!(target: LOG_TARGET, check1, check2, "chaum-pedersen verification");
        result
    }

    fn compute_challenge(
        transcript: &Transcript,
        g: Scalar,
        h: Scalar,
        alpha: Scalar,
        beta: Scalar,
        t_g: Scalar,
        t_h: Scalar,
    ) -> Exponent {
        let mut transcript = transcript.clone();
        for value in [g, h, alpha, beta, t_g, t_h] {
            transcript.append_scalar(&value);
        }
        transcript.challenge_exponent(b"chaum_pedersen/challenge")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn context() -> Transcript {
        let mut transcript = Transcript::new("test/dleq");
        transcript.append_u64(1);
        transcript
    }

    #[test]
    fn test_chaum_pedersen_proof() {
        let mut rng = StdRng::seed_from_u64(43);

        let g = field::generator();
        let h = field::generator_pow(&Exponent::random(&mut rng));
        let secret = Exponent::random(&mut rng);
        let alpha = field::pow(&g, &secret);
        let beta = field::pow(&h, &secret);

        let proof = ChaumPedersenProof::prove(&context(), &secret, g, h, &mut rng);
        assert!(proof.verify(&context(), g, h, alpha, beta));
    }

    #[test]
    fn test_chaum_pedersen_rejects_different_exponents() {
        let mut rng = StdRng::seed_from_u64(43);

        let g = field::generator();
        let h = field::generator_pow(&Exponent::random(&mut rng));
        let secret = Exponent::random(&mut rng);
        let other = Exponent::random(&mut rng);
        let alpha = field::pow(&g, &secret);
        let beta = field::pow(&h, &other);

        let proof = ChaumPedersenProof::prove(&context(), &secret, g, h, &mut rng);
        assert!(!proof.verify(&context(), g, h, alpha, beta));

        // Same statement, different context.
        let beta = field::pow(&h, &secret);
        let foreign = Transcript::new("test/other");
        assert!(!proof.verify(&foreign, g, h, alpha, beta));
    }
}
