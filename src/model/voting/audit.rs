//! Read-only consistency checks over the committed ballot state.

use std::fmt::{Display, Formatter};

use rusqlite::Connection;
use serde::Serialize;

use crate::error::Result;
use crate::model::sqlite::{Id, Store};

/// A single broken invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Inconsistency {
    /// The voter is flagged as having voted but no vote references them.
    FlaggedWithoutVote { voter_id: Id },
    /// A vote exists but its voter is not flagged.
    VoteWithoutFlag { voter_id: Id, vote_id: Id },
    /// The candidate's cached counter differs from its vote rows.
    CounterMismatch {
        candidate_id: Id,
        cached: u64,
        counted: u64,
    },
}

impl Display for Inconsistency {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FlaggedWithoutVote { voter_id } => {
                write!(f, "voter {voter_id} is marked as voted but has no vote")
            }
            Self::VoteWithoutFlag { voter_id, vote_id } => {
                write!(f, "vote {vote_id} exists but voter {voter_id} is not marked as voted")
            }
            Self::CounterMismatch {
                candidate_id,
                cached,
                counted,
            } => write!(
                f,
                "candidate {candidate_id} has a counter of {cached} but {counted} votes"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub voters: u64,
    pub candidates: u64,
    pub votes: u64,
    pub inconsistencies: Vec<Inconsistency>,
}

impl AuditReport {
    pub fn is_consistent(&self) -> bool {
        self.inconsistencies.is_empty()
    }
}

/// Check every voter flag and candidate counter against the vote rows.
///
/// Should be run inside a transaction (or on an otherwise idle database) so
/// that all queries see the same state.
pub fn audit(conn: &Connection) -> Result<AuditReport> {
    let (voters, candidates, votes): (u64, u64, u64) = conn.query_row(
        "SELECT (SELECT COUNT(*) FROM voter), (SELECT COUNT(*) FROM candidate), (SELECT COUNT(*) FROM vote)",
        [],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;

    let mut inconsistencies = Vec::new();

    let mut stmt = conn.prepare(
        "SELECT v.id FROM voter v
         WHERE v.has_voted = 1 AND NOT EXISTS (SELECT 1 FROM vote WHERE voter_id = v.id)
         ORDER BY v.id",
    )?;
    for voter_id in stmt.query_map([], |row| row.get::<_, Id>(0))? {
        inconsistencies.push(Inconsistency::FlaggedWithoutVote { voter_id: voter_id? });
    }

    let mut stmt = conn.prepare(
        "SELECT vote.voter_id, vote.id FROM vote
         JOIN voter ON voter.id = vote.voter_id
         WHERE voter.has_voted = 0
         ORDER BY vote.id",
    )?;
    for row in stmt.query_map([], |row| Ok((row.get::<_, Id>(0)?, row.get::<_, Id>(1)?)))? {
        let (voter_id, vote_id) = row?;
        inconsistencies.push(Inconsistency::VoteWithoutFlag { voter_id, vote_id });
    }

    let mut stmt = conn.prepare(
        "SELECT c.id, c.votes, COUNT(v.id) FROM candidate c
         LEFT JOIN vote v ON v.candidate_id = c.id
         GROUP BY c.id
         HAVING c.votes != COUNT(v.id)
         ORDER BY c.id",
    )?;
    for row in stmt.query_map([], |row| {
        Ok((row.get::<_, Id>(0)?, row.get::<_, u64>(1)?, row.get::<_, u64>(2)?))
    })? {
        let (candidate_id, cached, counted) = row?;
        inconsistencies.push(Inconsistency::CounterMismatch {
            candidate_id,
            cached,
            counted,
        });
    }

    Ok(AuditReport {
        voters,
        candidates,
        votes,
        inconsistencies,
    })
}

/// Audit the store from a single read snapshot.
pub async fn audit_store(store: &Store) -> Result<AuditReport> {
    store.read(|tx| audit(tx)).await
}
