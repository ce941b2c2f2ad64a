pub mod card;
pub mod chaum_pedersen;
pub mod config;
pub mod crypto_serde;
pub mod engine;
pub mod field;
pub mod ledger;
pub mod player;
pub mod proof_system;
pub mod sampler;
pub mod showdown;
pub mod shuffling;
pub mod transcript;

#[cfg(test)]
pub mod test_utils;

pub use card::{Card, CardPoint};
pub use field::{Exponent, Scalar, SecretKey};
