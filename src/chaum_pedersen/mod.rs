pub mod native;
pub mod schnorr;

// Re-export common types/functions for ergonomic imports
pub use native::*;
pub use schnorr::*;
