//! Randomness for keys, permutations and masking vectors.
//!
//! Every sampler takes a caller-supplied `Rng + CryptoRng`; secret material is never drawn
//! from a non-cryptographic source.

use ark_ff::{One, UniformRand, Zero};
use rand::seq::SliceRandom;
use rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::card::NUM_CARDS;
use crate::field::{Exponent, Scalar, SecretKey};

const LOG_TARGET: &str = "mental_poker::sampler";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SamplerError {
    #[error("expected {expected} {what}, found {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("matrix is not a permutation: {reason}")]
    NotPermutation { reason: String },
}

/// Uniform element of the scalar field.
pub fn sample_field_element<R: Rng + CryptoRng + ?Sized>(rng: &mut R) -> Scalar {
    Scalar::rand(rng)
}

/// Uniform secret key in `[2, R)`, resampling anything below the lower bound.
pub fn sample_secret_key<R: Rng + CryptoRng + ?Sized>(rng: &mut R) -> SecretKey {
    loop {
        if let Ok(key) = SecretKey::new(sample_field_element(rng)) {
            return key;
        }
        tracing::debug!(target: LOG_TARGET, "rejected secret key sample below range");
    }
}

/// Permutation of `[0, n)`. Output slot `j` takes input slot `self[j]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct Permutation(Vec<usize>);

impl TryFrom<Vec<usize>> for Permutation {
    type Error = SamplerError;

    fn try_from(mapping: Vec<usize>) -> Result<Self, Self::Error> {
        Permutation::new(mapping)
    }
}

impl From<Permutation> for Vec<usize> {
    fn from(permutation: Permutation) -> Self {
        permutation.0
    }
}

impl Permutation {
    pub fn identity(n: usize) -> Self {
        Self((0..n).collect())
    }

    pub fn new(mapping: Vec<usize>) -> Result<Self, SamplerError> {
        let mut seen = vec![false; mapping.len()];
        for (slot, &source) in mapping.iter().enumerate() {
            if source >= mapping.len() {
                return Err(SamplerError::NotPermutation {
                    reason: format!("slot {slot} points at {source}"),
                });
            }
            if std::mem::replace(&mut seen[source], true) {
                return Err(SamplerError::NotPermutation {
                    reason: format!("input {source} used twice"),
                });
            }
        }
        Ok(Self(mapping))
    }

    /// Fisher-Yates shuffle of `[0, n)`.
    pub fn random<R: Rng + CryptoRng + ?Sized>(n: usize, rng: &mut R) -> Self {
        let mut mapping: Vec<usize> = (0..n).collect();
        mapping.shuffle(rng);
        Self(mapping)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn source_of(&self, slot: usize) -> usize {
        self.0[slot]
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn inverse(&self) -> Self {
        let mut inverse = vec![0; self.0.len()];
        for (slot, &source) in self.0.iter().enumerate() {
            inverse[source] = slot;
        }
        Self(inverse)
    }

    /// Mapping `j -> inner[self[j]]`.
    pub fn compose(&self, inner: &Permutation) -> Self {
        Self(self.0.iter().map(|&slot| inner.0[slot]).collect())
    }

    pub fn apply<T: Clone>(&self, items: &[T]) -> Vec<T> {
        self.0.iter().map(|&source| items[source].clone()).collect()
    }
}

/// Square 0/1 matrix with exactly one `1` per row and per column.
///
/// Row `j` selects the input that lands in output slot `j`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PermutationMatrix {
    rows: Vec<Vec<Scalar>>,
    permutation: Permutation,
}

impl PermutationMatrix {
    pub fn from_permutation(permutation: Permutation) -> Self {
        let n = permutation.len();
        let rows = permutation
            .as_slice()
            .iter()
            .map(|&source| {
                let mut row = vec![Scalar::zero(); n];
                row[source] = Scalar::one();
                row
            })
            .collect();
        Self { rows, permutation }
    }

    /// Validates a raw `NUM_CARDS x NUM_CARDS` matrix.
    pub fn from_rows(rows: Vec<Vec<Scalar>>) -> Result<Self, SamplerError> {
        if rows.len() != NUM_CARDS {
            return Err(SamplerError::DimensionMismatch {
                what: "matrix rows",
                expected: NUM_CARDS,
                actual: rows.len(),
            });
        }
        let mut mapping = Vec::with_capacity(NUM_CARDS);
        for (j, row) in rows.iter().enumerate() {
            if row.len() != NUM_CARDS {
                return Err(SamplerError::DimensionMismatch {
                    what: "matrix columns",
                    expected: NUM_CARDS,
                    actual: row.len(),
                });
            }
            let mut source = None;
            for (i, entry) in row.iter().enumerate() {
                if entry.is_one() {
                    if source.replace(i).is_some() {
                        return Err(SamplerError::NotPermutation {
                            reason: format!("row {j} has more than one entry set"),
                        });
                    }
                } else if !entry.is_zero() {
                    return Err(SamplerError::NotPermutation {
                        reason: format!("entry ({j}, {i}) is neither 0 nor 1"),
                    });
                }
            }
            let source = source.ok_or_else(|| SamplerError::NotPermutation {
                reason: format!("row {j} is empty"),
            })?;
            mapping.push(source);
        }
        let permutation = Permutation::new(mapping)?;
        Ok(Self { rows, permutation })
    }

    pub fn identity() -> Self {
        Self::from_permutation(Permutation::identity(NUM_CARDS))
    }

    pub fn random<R: Rng + CryptoRng + ?Sized>(rng: &mut R) -> Self {
        Self::from_permutation(Permutation::random(NUM_CARDS, rng))
    }

    pub fn dimension(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[Vec<Scalar>] {
        &self.rows
    }

    pub fn permutation(&self) -> &Permutation {
        &self.permutation
    }
}

/// One masking exponent per deck slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Exponent>", into = "Vec<Exponent>")]
pub struct MaskingVector(Vec<Exponent>);

impl TryFrom<Vec<Exponent>> for MaskingVector {
    type Error = SamplerError;

    fn try_from(factors: Vec<Exponent>) -> Result<Self, Self::Error> {
        MaskingVector::new(factors)
    }
}

impl From<MaskingVector> for Vec<Exponent> {
    fn from(masking: MaskingVector) -> Self {
        masking.0
    }
}

impl MaskingVector {
    pub fn new(factors: Vec<Exponent>) -> Result<Self, SamplerError> {
        if factors.len() != NUM_CARDS {
            return Err(SamplerError::DimensionMismatch {
                what: "masking factors",
                expected: NUM_CARDS,
                actual: factors.len(),
            });
        }
        Ok(Self(factors))
    }

    /// Fresh uniform factors in `[0, R - 1)`.
    pub fn random<R: Rng + CryptoRng + ?Sized>(rng: &mut R) -> Self {
        Self((0..NUM_CARDS).map(|_| Exponent::random(rng)).collect())
    }

    pub fn factors(&self) -> &[Exponent] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn sampled_matrix_is_a_permutation() {
        let mut rng = StdRng::seed_from_u64(11);
        let matrix = PermutationMatrix::random(&mut rng);
        assert_eq!(matrix.dimension(), NUM_CARDS);

        for row in matrix.rows() {
            assert_eq!(row.iter().filter(|v| v.is_one()).count(), 1);
        }
        for col in 0..NUM_CARDS {
            let ones = matrix
                .rows()
                .iter()
                .filter(|row| row[col].is_one())
                .count();
            assert_eq!(ones, 1, "column {col}");
        }

        let rebuilt = PermutationMatrix::from_rows(matrix.rows().to_vec()).unwrap();
        assert_eq!(rebuilt.permutation(), matrix.permutation());
    }

    #[test]
    fn malformed_matrices_are_rejected() {
        let identity = PermutationMatrix::identity();

        let mut short = identity.rows().to_vec();
        short.pop();
        assert!(matches!(
            PermutationMatrix::from_rows(short),
            Err(SamplerError::DimensionMismatch { actual: 51, .. })
        ));

        let mut duplicated = identity.rows().to_vec();
        duplicated[1] = duplicated[0].clone();
        assert!(matches!(
            PermutationMatrix::from_rows(duplicated),
            Err(SamplerError::NotPermutation { .. })
        ));

        let mut scaled = identity.rows().to_vec();
        scaled[3][3] = Scalar::from(2u64);
        assert!(PermutationMatrix::from_rows(scaled).is_err());
    }

    #[test]
    fn permutation_inverse_and_composition() {
        let mut rng = StdRng::seed_from_u64(11);
        let sigma = Permutation::random(NUM_CARDS, &mut rng);
        let pi = Permutation::random(NUM_CARDS, &mut rng);
        let items: Vec<usize> = (100..100 + NUM_CARDS).collect();

        let identity = Permutation::identity(NUM_CARDS);
        assert_eq!(sigma.inverse().compose(&sigma), identity);

        // τ = σ⁻¹ ∘ π applied to σ(items) yields π(items).
        let tau = pi.compose(&sigma.inverse());
        let shadow = sigma.apply(&items);
        assert_eq!(tau.apply(&shadow), pi.apply(&items));
    }

    #[test]
    fn deserialized_permutations_are_validated() {
        assert!(serde_json::from_str::<Permutation>("[1, 0, 2]").is_ok());
        assert!(serde_json::from_str::<Permutation>("[1, 1, 2]").is_err());
        assert!(serde_json::from_str::<Permutation>("[0, 3]").is_err());
    }

    #[test]
    fn masking_vector_length_is_checked() {
        assert!(MaskingVector::new(vec![Exponent::zero(); 10]).is_err());
        let mut rng = StdRng::seed_from_u64(11);
        assert_eq!(MaskingVector::random(&mut rng).len(), NUM_CARDS);
    }

    #[test]
    fn sampled_secret_keys_are_in_range() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..16 {
            let key = sample_secret_key(&mut rng);
            assert!(!key.expose().is_zero());
            assert!(!key.expose().is_one());
        }
    }
}
