use rusqlite::{
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
    params, Connection, OptionalExtension,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::common::PersonName;

/// Which kind of registrant a name belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Voter,
    Candidate,
}

impl Role {
    fn as_str(self) -> &'static str {
        match self {
            Self::Voter => "voter",
            Self::Candidate => "candidate",
        }
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "voter" => Ok(Self::Voter),
            "candidate" => Ok(Self::Candidate),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

/// Record `name` as belonging to `role`, unless it is already registered.
/// Returns the role that holds the name afterwards.
pub(crate) fn claim(conn: &Connection, name: &PersonName, role: Role) -> Result<Role> {
    conn.execute(
        "INSERT INTO registered_name (name, role) VALUES (?1, ?2) ON CONFLICT (name) DO NOTHING",
        params![name, role],
    )?;
    let holder = conn.query_row(
        "SELECT role FROM registered_name WHERE name = ?1",
        [name],
        |row| row.get(0),
    )?;
    Ok(holder)
}

/// The role currently holding `name`, if any.
pub fn holder(conn: &Connection, name: &PersonName) -> Result<Option<Role>> {
    let role = conn
        .query_row(
            "SELECT role FROM registered_name WHERE name = ?1",
            [name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(role)
}
