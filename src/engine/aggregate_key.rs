use std::sync::Arc;

use num_bigint::BigUint;

use super::errors::EngineError;
use crate::field::{Scalar, SecretKey};
use crate::proof_system::{
    CircuitId, KeyAggregateWitness, ProofBundle, Prover, PublicSignals, Witness,
};

const LOG_TARGET: &str = "mental_poker::engine::aggregate_key";

/// Result of folding one contribution into the aggregate key.
#[derive(Clone, Debug)]
pub struct KeyUpdate {
    pub new_aggregate_key: Scalar,
    pub bundle: ProofBundle,
}

/// Folds secret contributions into the running aggregate key, one proof per update.
#[derive(Clone)]
pub struct AggregateKeyEngine {
    prover: Arc<dyn Prover>,
}

impl AggregateKeyEngine {
    pub fn new(prover: Arc<dyn Prover>) -> Self {
        Self { prover }
    }

    /// `new = old · g^sk`, with a proof bound to `(old, new)`.
    #[tracing::instrument(target = LOG_TARGET, skip_all)]
    pub fn update_aggregate_key(
        &self,
        old_aggregate_key: Scalar,
        secret: &SecretKey,
    ) -> Result<KeyUpdate, EngineError> {
        let bundle = self
            .prover
            .prove(&Witness::KeyAggregate(KeyAggregateWitness {
                old_aggregate_key,
                secret: secret.clone(),
            }))?;
        let PublicSignals::KeyAggregate(signals) = &bundle.public_signals else {
            return Err(EngineError::UnexpectedSignals {
                expected: CircuitId::KeyAggregate,
                actual: bundle.public_signals.circuit_id(),
            });
        };
        let new_aggregate_key = signals.new_aggregate_key;
        tracing::debug!(target: LOG_TARGET, %old_aggregate_key, %new_aggregate_key, "aggregate key updated");
        Ok(KeyUpdate {
            new_aggregate_key,
            bundle,
        })
    }

    /// Range-checks a raw contribution before any proving work starts.
    pub fn update_with_contribution(
        &self,
        old_aggregate_key: Scalar,
        contribution: &BigUint,
    ) -> Result<KeyUpdate, EngineError> {
        let secret = SecretKey::from_biguint(contribution)?;
        self.update_aggregate_key(old_aggregate_key, &secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldError, FIELD_MODULUS};
    use crate::proof_system::{ProofVerifier, SigmaProofSystem};
    use ark_ff::One;

    fn engine() -> (AggregateKeyEngine, Arc<SigmaProofSystem>) {
        let system = Arc::new(SigmaProofSystem::with_seed(4, 3));
        (AggregateKeyEngine::new(system.clone()), system)
    }

    #[test]
    fn sequential_updates_verify() {
        let (engine, verifier) = engine();
        let alice = SecretKey::from_u64(1_000_003).unwrap();
        let bob = SecretKey::from_u64(77).unwrap();

        let first = engine.update_aggregate_key(Scalar::one(), &alice).unwrap();
        verifier.verify(&first.bundle).unwrap();
        let second = engine
            .update_aggregate_key(first.new_aggregate_key, &bob)
            .unwrap();
        verifier.verify(&second.bundle).unwrap();

        assert_eq!(
            second.new_aggregate_key,
            alice.public_share() * bob.public_share()
        );
    }

    #[test]
    fn out_of_range_contributions_never_reach_the_prover() {
        let (engine, _) = engine();
        for bad in [
            BigUint::from(0u32),
            BigUint::from(1u32),
            FIELD_MODULUS.clone(),
        ] {
            assert!(matches!(
                engine.update_with_contribution(Scalar::one(), &bad),
                Err(EngineError::Field(FieldError::SecretOutOfRange { .. }))
            ));
        }
        assert!(engine
            .update_with_contribution(Scalar::one(), &BigUint::from(2u32))
            .is_ok());
    }
}
