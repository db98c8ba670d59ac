use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::sqlite::{Id, Store};

/// Aggregate results over every registered candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_votes: u64,
    pub total_voters_voted: u64,
    pub by_candidate: Vec<CandidateTally>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateTally {
    pub id: Id,
    pub name: String,
    pub party: Option<String>,
    pub votes: u64,
    /// Share of all votes, rounded to two decimal places.
    pub percentage: f64,
}

/// `votes` as a percentage of `total`, rounded to two decimals; 0 if nobody voted.
pub fn percentage(votes: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (votes as f64 * 10_000.0 / total as f64).round() / 100.0
}

impl CandidateTally {
    fn from_row(row: &Row<'_>, total: u64) -> rusqlite::Result<Self> {
        let votes: u64 = row.get("votes")?;
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            party: row.get("party")?,
            votes,
            percentage: percentage(votes, total),
        })
    }
}

pub(crate) fn statistics_in(conn: &Connection) -> Result<Statistics> {
    let (total_votes, total_voters_voted): (u64, u64) = conn.query_row(
        "SELECT (SELECT COUNT(*) FROM vote), (SELECT COUNT(*) FROM voter WHERE has_voted = 1)",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let mut stmt = conn.prepare(
        "SELECT id, name, party, votes FROM candidate ORDER BY votes DESC, name ASC, id ASC",
    )?;
    let by_candidate = stmt
        .query_map([], |row| CandidateTally::from_row(row, total_votes))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(Statistics {
        total_votes,
        total_voters_voted,
        by_candidate,
    })
}

/// Compute vote totals and per-candidate shares from one consistent snapshot.
pub async fn compute_statistics(store: &Store) -> Result<Statistics> {
    store.read(|tx| statistics_in(tx)).await
}
