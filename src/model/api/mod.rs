//! API-compatible types.
//!
//! Request bodies are deserialised leniently (every field optional) and then
//! validated into the strongly-typed database types, so that a missing or
//! malformed field becomes a validation error with a readable message rather
//! than a bare deserialisation failure.

pub mod candidate;
pub mod health;
pub mod vote;
pub mod voter;

pub use candidate::CandidateRegistration;
pub use health::{DbHealth, Liveness};
pub use vote::{VoteConfirmation, VoteRequest};
pub use voter::VoterRegistration;
