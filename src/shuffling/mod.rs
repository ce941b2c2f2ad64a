pub mod data_structures;
pub mod encryption;
pub mod error;
pub mod shuffling_proof;

pub use data_structures::*;
pub use encryption::*;
pub use error::*;
pub use shuffling_proof::*;
