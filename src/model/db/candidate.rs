use std::ops::Deref;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{common::PersonName, sqlite::Id};

/// Core candidate data, as supplied at registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCore {
    /// Unique across all candidates, ignoring case.
    pub name: PersonName,
    pub party: Option<String>,
}

/// A candidate without an ID.
pub type NewCandidate = CandidateCore;

impl CandidateCore {
    pub fn new(name: PersonName, party: Option<String>) -> Self {
        Self { name, party }
    }

    /// Insert this candidate with a zero vote counter, returning the stored row.
    pub(crate) fn insert(&self, conn: &Connection) -> rusqlite::Result<Candidate> {
        conn.query_row(
            &format!(
                "INSERT INTO candidate (name, party, votes) VALUES (?1, ?2, 0) RETURNING {}",
                Candidate::COLUMNS
            ),
            params![self.name, self.party],
            Candidate::from_row,
        )
    }
}

/// A candidate from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: Id,
    #[serde(flatten)]
    pub candidate: CandidateCore,
    /// Cached count of the votes referencing this candidate.
    pub votes: u64,
    pub created_at: DateTime<Utc>,
}

impl Candidate {
    pub(crate) const COLUMNS: &'static str = "id, name, party, votes, created_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            candidate: CandidateCore {
                name: row.get("name")?,
                party: row.get("party")?,
            },
            votes: row.get("votes")?,
            created_at: row.get("created_at")?,
        })
    }

    /// Look up a candidate by ID.
    pub fn find(conn: &Connection, id: Id) -> Result<Option<Self>> {
        let candidate = conn
            .query_row(
                &format!("SELECT {} FROM candidate WHERE id = ?1", Self::COLUMNS),
                [id],
                Self::from_row,
            )
            .optional()?;
        Ok(candidate)
    }
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl CandidateCore {
        pub fn example() -> Self {
            Self::named("Ana", Some("X"))
        }

        pub fn example2() -> Self {
            Self::named("Diego", None)
        }

        pub fn named(name: &str, party: Option<&str>) -> Self {
            Self::new(PersonName::parse(name).unwrap(), party.map(str::to_string))
        }
    }
}
