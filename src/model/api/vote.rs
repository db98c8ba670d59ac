use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{common::required, sqlite::Id, voting::VoteReceipt};

pub const VOTE_RECORDED: &str = "Vote recorded";

/// A request to cast a vote.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct VoteRequest {
    pub voter_id: Option<i64>,
    pub candidate_id: Option<i64>,
}

fn positive_id(field: &str, raw: Option<i64>) -> Result<Id> {
    let raw = required(field, raw)?;
    Id::new(raw).ok_or_else(|| Error::validation(format!("{field} must be a positive integer")))
}

/// Parse a vote ID taken from the request path.
pub fn vote_id(raw: &str) -> Result<Id> {
    raw.parse()
        .ok()
        .and_then(Id::new)
        .ok_or_else(|| Error::validation("id must be a positive integer"))
}

impl VoteRequest {
    /// The validated `(voter_id, candidate_id)` pair.
    pub fn ids(&self) -> Result<(Id, Id)> {
        Ok((
            positive_id("voter_id", self.voter_id)?,
            positive_id("candidate_id", self.candidate_id)?,
        ))
    }
}

/// The response to a successful vote.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct VoteConfirmation {
    pub id: Id,
    pub voter_id: Id,
    pub candidate_id: Id,
    pub message: String,
}

impl From<VoteReceipt> for VoteConfirmation {
    fn from(receipt: VoteReceipt) -> Self {
        Self {
            id: receipt.vote_id,
            voter_id: receipt.voter_id,
            candidate_id: receipt.candidate_id,
            message: VOTE_RECORDED.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_must_be_positive() {
        let req = VoteRequest {
            voter_id: Some(1),
            candidate_id: Some(2),
        };
        let (voter, candidate) = req.ids().unwrap();
        assert_eq!((voter.get(), candidate.get()), (1, 2));

        for (voter_id, candidate_id) in [(Some(0), Some(1)), (Some(1), Some(-3)), (None, Some(1))] {
            let req = VoteRequest {
                voter_id,
                candidate_id,
            };
            assert!(matches!(req.ids(), Err(Error::Validation(_))));
        }
    }

    #[test]
    fn path_ids() {
        assert_eq!(vote_id("12").unwrap().get(), 12);
        for raw in ["0", "-4", "abc", "1.5", ""] {
            assert!(matches!(vote_id(raw), Err(Error::Validation(_))), "{raw}");
        }
    }

    #[test]
    fn confirmation_from_receipt() {
        let receipt = VoteReceipt {
            vote_id: Id::new(7).unwrap(),
            voter_id: Id::new(1).unwrap(),
            candidate_id: Id::new(2).unwrap(),
        };
        let confirmation = VoteConfirmation::from(receipt);
        assert_eq!(confirmation.id, receipt.vote_id);
        assert_eq!(confirmation.message, VOTE_RECORDED);
    }
}
