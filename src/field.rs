//! Prime-field arithmetic for the masking algebra.
//!
//! Every protocol value is an element of the BN254 scalar field `Fr` (modulus `R`). The
//! cryptosystem lives in the multiplicative group `Fr*`, whose order is `R - 1`, so secret
//! keys and masking factors act as exponents and are reduced modulo `R - 1`.

use std::fmt;

use ark_ff::{BigInteger, FftField, Field, One, PrimeField, Zero};
use num_bigint::{BigUint, RandBigInt};
use once_cell::sync::Lazy;
use rand::{CryptoRng, Rng};
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Field element type used by every public value of the protocol.
pub type Scalar = ark_bn254::Fr;

/// Smallest secret key a player may contribute.
pub const MIN_SECRET_KEY: u64 = 2;

/// `R`, the modulus of the scalar field.
pub static FIELD_MODULUS: Lazy<BigUint> =
    Lazy::new(|| BigUint::from_bytes_le(&Scalar::MODULUS.to_bytes_le()));

/// `R - 1`, the order of `Fr*`.
pub static GROUP_ORDER: Lazy<BigUint> = Lazy::new(|| FIELD_MODULUS.clone() - 1u32);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("secret key {value} outside [2, R)")]
    SecretOutOfRange { value: String },
    #[error("zero has no multiplicative inverse")]
    ZeroDivisor,
    #[error("failed to parse integer from {input:?}")]
    Parse { input: String },
}

/// Fixed generator `g` of `Fr*`.
pub fn generator() -> Scalar {
    Scalar::GENERATOR
}

/// Raises `base` to an exponent given modulo `R - 1`.
pub fn pow(base: &Scalar, exponent: &Exponent) -> Scalar {
    base.pow(exponent.0.to_u64_digits())
}

/// `g^exponent`.
pub fn generator_pow(exponent: &Exponent) -> Scalar {
    pow(&generator(), exponent)
}

/// Computes `numerator / denominator`, failing on a zero denominator.
pub fn checked_div(numerator: &Scalar, denominator: &Scalar) -> Result<Scalar, FieldError> {
    let inverse = denominator.inverse().ok_or(FieldError::ZeroDivisor)?;
    Ok(*numerator * inverse)
}

pub fn scalar_to_biguint(value: &Scalar) -> BigUint {
    BigUint::from_bytes_le(&value.into_bigint().to_bytes_le())
}

pub fn parse_decimal(input: &str) -> Result<BigUint, FieldError> {
    BigUint::parse_bytes(input.trim().as_bytes(), 10).ok_or_else(|| FieldError::Parse {
        input: input.to_string(),
    })
}

/// Integer modulo `R - 1`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Exponent(BigUint);

impl Exponent {
    pub fn zero() -> Self {
        Self(BigUint::default())
    }

    pub fn from_u64(value: u64) -> Self {
        Self::from_biguint(BigUint::from(value))
    }

    pub fn from_biguint(value: BigUint) -> Self {
        Self(value % &*GROUP_ORDER)
    }

    /// Reads the canonical integer behind a field element as an exponent.
    pub fn from_scalar(value: &Scalar) -> Self {
        Self::from_biguint(scalar_to_biguint(value))
    }

    pub fn random<R: Rng + CryptoRng + ?Sized>(rng: &mut R) -> Self {
        Self(rng.gen_biguint_below(&GROUP_ORDER))
    }

    pub fn is_zero(&self) -> bool {
        self.0.bits() == 0
    }

    pub fn add(&self, other: &Exponent) -> Exponent {
        Self::from_biguint(&self.0 + &other.0)
    }

    pub fn sub(&self, other: &Exponent) -> Exponent {
        if self.0 >= other.0 {
            Self(&self.0 - &other.0)
        } else {
            Self(&*GROUP_ORDER - (&other.0 - &self.0))
        }
    }

    pub fn mul(&self, other: &Exponent) -> Exponent {
        Self::from_biguint(&self.0 * &other.0)
    }

    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    pub fn to_bytes_le(&self) -> Vec<u8> {
        self.0.to_bytes_le()
    }

    pub fn from_bytes_le(bytes: &[u8]) -> Self {
        Self::from_biguint(BigUint::from_bytes_le(bytes))
    }
}

impl fmt::Debug for Exponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Exponent({})", self.0)
    }
}

impl fmt::Display for Exponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Exponent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(self.to_bytes_le())))
    }
}

impl<'de> Deserialize<'de> for Exponent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let trimmed = raw.strip_prefix("0x").unwrap_or(&raw);
        let bytes = hex::decode(trimmed).map_err(DeError::custom)?;
        let value = BigUint::from_bytes_le(&bytes);
        if value >= *GROUP_ORDER {
            return Err(DeError::custom("exponent is not reduced modulo R - 1"));
        }
        Ok(Self(value))
    }
}

/// A player's secret contribution `sk` with `2 <= sk < R`.
///
/// The value is wiped from memory when dropped and never printed.
#[derive(Clone)]
pub struct SecretKey(Scalar);

impl SecretKey {
    pub fn new(value: Scalar) -> Result<Self, FieldError> {
        if value.is_zero() || value.is_one() {
            return Err(FieldError::SecretOutOfRange {
                value: value.to_string(),
            });
        }
        Ok(Self(value))
    }

    pub fn from_u64(value: u64) -> Result<Self, FieldError> {
        Self::from_biguint(&BigUint::from(value))
    }

    pub fn from_biguint(value: &BigUint) -> Result<Self, FieldError> {
        if value < &BigUint::from(MIN_SECRET_KEY) || value >= &*FIELD_MODULUS {
            return Err(FieldError::SecretOutOfRange {
                value: value.to_string(),
            });
        }
        Ok(Self(Scalar::from_le_bytes_mod_order(&value.to_bytes_le())))
    }

    /// Parses a user-supplied decimal secret.
    pub fn from_decimal_str(input: &str) -> Result<Self, FieldError> {
        Self::from_biguint(&parse_decimal(input)?)
    }

    /// Exposes the raw field element to proof backends.
    pub fn expose(&self) -> &Scalar {
        &self.0
    }

    pub fn exponent(&self) -> Exponent {
        Exponent::from_scalar(&self.0)
    }

    /// `y = g^sk`, the player's published share of the aggregate key.
    pub fn public_share(&self) -> Scalar {
        generator_pow(&self.exponent())
    }
}

impl Zeroize for SecretKey {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl ZeroizeOnDrop for SecretKey {}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}
