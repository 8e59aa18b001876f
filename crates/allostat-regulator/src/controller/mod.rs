//! Action selection: candidate generation and active inference scoring
pub mod candidates;
pub mod inference;
pub mod sensitivity;

pub use self::candidates::{CandidateGenerator, CandidateRules};
pub use self::inference::{ActiveInferenceController, ExpectedFreeEnergy, Preference, ScoredAction};
