//! Database row types.
//!
//! Each entity has a `*Core` type holding the data supplied at registration,
//! and a full row type wrapping it with the system-assigned fields. Only the
//! registration guard and the vote transaction engine write these tables.

pub mod candidate;
pub mod registered_name;
pub mod vote;
pub mod voter;

pub use candidate::{Candidate, CandidateCore, NewCandidate};
pub use registered_name::Role;
pub use vote::{Vote, VoteWithNames};
pub use voter::{NewVoter, Voter, VoterCore};
