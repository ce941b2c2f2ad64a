pub mod service;
pub mod submission;
pub mod types;
pub mod validation;


pub use service::Transition;
pub use submission::{Admission, MutationRequest, SubmitReceipt};
pub use types::*;
pub use validation::*;
