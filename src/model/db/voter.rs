use std::ops::Deref;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{
    common::{Email, PersonName},
    sqlite::Id,
};

/// Core voter data, as supplied at registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterCore {
    pub name: PersonName,
    /// Unique across all voters, ignoring case.
    pub email: Email,
}

/// A voter without an ID.
pub type NewVoter = VoterCore;

impl VoterCore {
    pub fn new(name: PersonName, email: Email) -> Self {
        Self { name, email }
    }

    /// Insert this voter, returning the stored row.
    ///
    /// The raw database error is returned so callers can tell a duplicate
    /// email apart from other failures.
    pub(crate) fn insert(&self, conn: &Connection) -> rusqlite::Result<Voter> {
        conn.query_row(
            &format!(
                "INSERT INTO voter (name, email) VALUES (?1, ?2) RETURNING {}",
                Voter::COLUMNS
            ),
            params![self.name, self.email],
            Voter::from_row,
        )
    }

    /// Whether a voter has already registered this address.
    pub fn email_taken(conn: &Connection, email: &Email) -> Result<bool> {
        let found = conn
            .query_row("SELECT 1 FROM voter WHERE email = ?1", [email], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }
}

/// A voter from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    pub id: Id,
    #[serde(flatten)]
    pub voter: VoterCore,
    /// True iff exactly one vote references this voter.
    pub has_voted: bool,
    pub created_at: DateTime<Utc>,
}

impl Voter {
    pub(crate) const COLUMNS: &'static str = "id, name, email, has_voted, created_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            voter: VoterCore {
                name: row.get("name")?,
                email: row.get("email")?,
            },
            has_voted: row.get("has_voted")?,
            created_at: row.get("created_at")?,
        })
    }

    /// Look up a voter by ID.
    pub fn find(conn: &Connection, id: Id) -> Result<Option<Self>> {
        let voter = conn
            .query_row(
                &format!("SELECT {} FROM voter WHERE id = ?1", Self::COLUMNS),
                [id],
                Self::from_row,
            )
            .optional()?;
        Ok(voter)
    }
}

impl Deref for Voter {
    type Target = VoterCore;

    fn deref(&self) -> &Self::Target {
        &self.voter
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl VoterCore {
        pub fn example() -> Self {
            Self::named("Bob", "bob@example.com")
        }

        pub fn example2() -> Self {
            Self::named("Carla", "carla@example.com")
        }

        pub fn named(name: &str, email: &str) -> Self {
            Self::new(PersonName::parse(name).unwrap(), Email::parse(email).unwrap())
        }
    }
}
