use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::sqlite::Id;

/// An immutable vote linking one voter to one candidate.
///
/// Vote rows are the source of truth for tallies; `Candidate::votes` and
/// `Voter::has_voted` are caches derived from them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub id: Id,
    pub voter_id: Id,
    pub candidate_id: Id,
    pub created_at: DateTime<Utc>,
}

/// A vote joined with the names of its voter and candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteWithNames {
    pub id: Id,
    pub voter_id: Id,
    pub voter_name: String,
    pub candidate_id: Id,
    pub candidate_name: String,
    pub created_at: DateTime<Utc>,
}

const WITH_NAMES: &str = "SELECT vote.id, vote.voter_id, voter.name AS voter_name,
        vote.candidate_id, candidate.name AS candidate_name, vote.created_at
    FROM vote
    JOIN voter ON voter.id = vote.voter_id
    JOIN candidate ON candidate.id = vote.candidate_id";

impl VoteWithNames {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            voter_id: row.get("voter_id")?,
            voter_name: row.get("voter_name")?,
            candidate_id: row.get("candidate_id")?,
            candidate_name: row.get("candidate_name")?,
            created_at: row.get("created_at")?,
        })
    }
}

impl Vote {
    pub(crate) const COLUMNS: &'static str = "id, voter_id, candidate_id, created_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            voter_id: row.get("voter_id")?,
            candidate_id: row.get("candidate_id")?,
            created_at: row.get("created_at")?,
        })
    }

    /// The vote cast by the given voter, if any.
    pub fn find_by_voter(conn: &Connection, voter_id: Id) -> Result<Option<Self>> {
        let vote = conn
            .query_row(
                &format!("SELECT {} FROM vote WHERE voter_id = ?1", Self::COLUMNS),
                [voter_id],
                Self::from_row,
            )
            .optional()?;
        Ok(vote)
    }

    /// Every vote with its voter and candidate names, newest first.
    pub fn list_with_names(conn: &Connection) -> Result<Vec<VoteWithNames>> {
        let mut stmt = conn.prepare(&format!("{WITH_NAMES} ORDER BY vote.id DESC"))?;
        let votes = stmt
            .query_map([], VoteWithNames::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(votes)
    }

    /// One vote with its voter and candidate names.
    pub fn find_with_names(conn: &Connection, id: Id) -> Result<Option<VoteWithNames>> {
        let vote = conn
            .query_row(
                &format!("{WITH_NAMES} WHERE vote.id = ?1"),
                [id],
                VoteWithNames::from_row,
            )
            .optional()?;
        Ok(vote)
    }

    /// Count the vote rows referencing the given candidate.
    pub fn count_for_candidate(conn: &Connection, candidate_id: Id) -> Result<u64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM vote WHERE candidate_id = ?1",
            [candidate_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Count all vote rows.
    pub fn count(conn: &Connection) -> Result<u64> {
        let count = conn.query_row("SELECT COUNT(*) FROM vote", [], |row| row.get(0))?;
        Ok(count)
    }
}
