//! rusqlite reports constraint failures through extended result codes.
//! These helpers name the ones we branch on.

use rusqlite::{
    ffi::{
        SQLITE_CONSTRAINT_FOREIGNKEY, SQLITE_CONSTRAINT_PRIMARYKEY, SQLITE_CONSTRAINT_TRIGGER,
        SQLITE_CONSTRAINT_UNIQUE,
    },
    Error as DbError,
};

fn extended_code(err: &DbError) -> Option<i32> {
    match err {
        DbError::SqliteFailure(e, _) => Some(e.extended_code),
        _ => None,
    }
}

/// Return true if the given error is a UNIQUE or PRIMARY KEY violation.
pub fn is_unique_violation(err: &DbError) -> bool {
    matches!(
        extended_code(err),
        Some(SQLITE_CONSTRAINT_UNIQUE) | Some(SQLITE_CONSTRAINT_PRIMARYKEY)
    )
}

const FOREIGN_KEY_FAILED: &str = "FOREIGN KEY constraint failed";

/// Return true if the given error is a FOREIGN KEY violation, e.g. inserting
/// a vote for a missing voter or deleting a row that a vote still references.
///
/// SQLite reports `ON DELETE RESTRICT` / `ON UPDATE RESTRICT` through the
/// trigger code rather than the foreign key one, so both are accepted.
pub fn is_foreign_key_violation(err: &DbError) -> bool {
    match err {
        DbError::SqliteFailure(e, msg) => match e.extended_code {
            SQLITE_CONSTRAINT_FOREIGNKEY => true,
            SQLITE_CONSTRAINT_TRIGGER => msg.as_deref() == Some(FOREIGN_KEY_FAILED),
            _ => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use super::*;

    #[test]
    fn restrict_violations_are_foreign_key_violations() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", true).unwrap();
        conn.execute_batch(
            "CREATE TABLE parent (id INTEGER PRIMARY KEY);
             CREATE TABLE child (parent_id INTEGER REFERENCES parent (id) ON DELETE RESTRICT);
             INSERT INTO parent (id) VALUES (1);
             INSERT INTO child (parent_id) VALUES (1);",
        )
        .unwrap();

        let err = conn.execute("DELETE FROM parent WHERE id = 1", []).unwrap_err();
        assert!(is_foreign_key_violation(&err));
        assert!(!is_unique_violation(&err));
    }

    #[test]
    fn other_trigger_failures_are_not() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (x INTEGER);
             CREATE TRIGGER no_negatives BEFORE INSERT ON t WHEN NEW.x < 0
             BEGIN SELECT RAISE(ABORT, 'negative'); END;",
        )
        .unwrap();

        let err = conn.execute("INSERT INTO t (x) VALUES (-1)", []).unwrap_err();
        assert!(!is_foreign_key_violation(&err));
    }
}
