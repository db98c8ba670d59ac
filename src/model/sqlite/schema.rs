use log::debug;
use rusqlite::Connection;

/// Names and emails compare case-insensitively.
///
/// `registered_name` is the cross-entity name registry: one row per name,
/// owned by either the voters or the single candidate using it.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS voter (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    name       TEXT    NOT NULL COLLATE NOCASE,
    email      TEXT    NOT NULL COLLATE NOCASE UNIQUE,
    has_voted  INTEGER NOT NULL DEFAULT 0 CHECK (has_voted IN (0, 1)),
    created_at TEXT    NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS candidate (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    name       TEXT    NOT NULL COLLATE NOCASE UNIQUE,
    party      TEXT,
    votes      INTEGER NOT NULL DEFAULT 0 CHECK (votes >= 0),
    created_at TEXT    NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS vote (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    voter_id     INTEGER NOT NULL UNIQUE
                 REFERENCES voter (id) ON DELETE RESTRICT ON UPDATE RESTRICT,
    candidate_id INTEGER NOT NULL
                 REFERENCES candidate (id) ON DELETE RESTRICT ON UPDATE RESTRICT,
    created_at   TEXT    NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS vote_candidate_id ON vote (candidate_id);

CREATE TABLE IF NOT EXISTS registered_name (
    name TEXT NOT NULL COLLATE NOCASE PRIMARY KEY,
    role TEXT NOT NULL CHECK (role IN ('voter', 'candidate'))
);
";

/// Ensure that all the required tables, constraints and indexes exist.
///
/// This operation is idempotent.
pub fn ensure_schema_exists(conn: &Connection) -> rusqlite::Result<()> {
    debug!("Ensuring database schema exists");
    conn.execute_batch(SCHEMA)
}

#[cfg(test)]
mod tests {
    use rusqlite::params;

    use super::*;
    use crate::model::sqlite::{is_foreign_key_violation, is_unique_violation};

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", true).unwrap();
        ensure_schema_exists(&conn).unwrap();
        conn
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = memory_db();
        ensure_schema_exists(&conn).unwrap();
    }

    #[test]
    fn one_vote_per_voter() {
        let conn = memory_db();
        conn.execute_batch(
            "INSERT INTO voter (name, email) VALUES ('Bob', 'bob@example.com');
             INSERT INTO candidate (name) VALUES ('Ana');
             INSERT INTO vote (voter_id, candidate_id) VALUES (1, 1);",
        )
        .unwrap();

        let err = conn
            .execute(
                "INSERT INTO vote (voter_id, candidate_id) VALUES (?1, ?2)",
                params![1, 1],
            )
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn votes_must_reference_existing_rows() {
        let conn = memory_db();
        let err = conn
            .execute(
                "INSERT INTO vote (voter_id, candidate_id) VALUES (?1, ?2)",
                params![3, 4],
            )
            .unwrap_err();
        assert!(is_foreign_key_violation(&err));
    }

    #[test]
    fn referenced_rows_cannot_be_deleted() {
        let conn = memory_db();
        conn.execute_batch(
            "INSERT INTO voter (name, email) VALUES ('Bob', 'bob@example.com');
             INSERT INTO voter (name, email) VALUES ('Cid', 'cid@example.com');
             INSERT INTO candidate (name) VALUES ('Ana');
             INSERT INTO vote (voter_id, candidate_id) VALUES (1, 1);",
        )
        .unwrap();

        let err = conn.execute("DELETE FROM voter WHERE id = 1", []).unwrap_err();
        assert!(is_foreign_key_violation(&err));
        let err = conn
            .execute("DELETE FROM candidate WHERE id = 1", [])
            .unwrap_err();
        assert!(is_foreign_key_violation(&err));

        // Voters without a vote are free to go.
        assert_eq!(conn.execute("DELETE FROM voter WHERE id = 2", []).unwrap(), 1);
    }

    #[test]
    fn emails_and_candidate_names_are_unique_ignoring_case() {
        let conn = memory_db();
        conn.execute_batch(
            "INSERT INTO voter (name, email) VALUES ('Bob', 'bob@example.com');
             INSERT INTO candidate (name) VALUES ('Ana');",
        )
        .unwrap();

        let err = conn
            .execute(
                "INSERT INTO voter (name, email) VALUES ('Robert', 'BOB@example.com')",
                [],
            )
            .unwrap_err();
        assert!(is_unique_violation(&err));
        let err = conn
            .execute("INSERT INTO candidate (name) VALUES ('ana')", [])
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn counters_cannot_go_negative() {
        let conn = memory_db();
        conn.execute("INSERT INTO candidate (name) VALUES ('Ana')", [])
            .unwrap();
        assert!(conn
            .execute("UPDATE candidate SET votes = votes - 1 WHERE id = 1", [])
            .is_err());
    }
}
