//! Proof-producing engines for key aggregation, shuffling and reveals.
//!
//! Engines never touch ledger state. Each takes the expected previous value as an explicit
//! argument and returns the new value together with the proof bundle to submit.

pub mod aggregate_key;
pub mod errors;
pub mod reveal;
pub mod shuffle;

pub use aggregate_key::*;
pub use errors::*;
pub use reveal::*;
pub use shuffle::*;
