//! The core operations: registration, vote casting, tallying and auditing.

pub mod audit;
pub mod cast;
pub mod registration;
pub mod tally;

pub use audit::{audit, audit_store, AuditReport, Inconsistency};
pub use cast::{cast_vote, VoteReceipt};
pub use registration::{register_candidate, register_voter};
pub use tally::{compute_statistics, CandidateTally, Statistics};
