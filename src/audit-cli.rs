//! A simple CLI tool for checking a voting database for internal consistency.
//! This uses the server's own audit queries, so it agrees with the server on
//! what a consistent database is.

use clap::{Arg, ArgAction, ArgMatches, Command};
use rusqlite::{Connection, OpenFlags};

use voting_backend::model::voting::{audit, AuditReport};

const PROGRAM_NAME: &str = "audit-votes";

const ABOUT_TEXT: &str = "Check that every voter flag and candidate counter agrees with the recorded votes.

EXIT CODES:
     0: The database is consistent.
   255: Ran successfully, but inconsistencies were found.
 Other: Error.";

const DB_PATH: &str = "DB_PATH";

const DB_PATH_HELP: &str = "The path to the SQLite database used by the server";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME).about(ABOUT_TEXT).arg(
        Arg::new(DB_PATH)
            .help(DB_PATH_HELP)
            .action(ArgAction::Set)
            .required(true),
    )
}

/// Errors that this program may produce.
#[derive(Debug, Eq, PartialEq)]
enum Error {
    /// Could not open the database.
    IO(String),
    /// The database could be opened but not queried.
    Db(String),
}

/// Audit the database at `path` from one read snapshot.
fn run_audit(path: &str) -> Result<AuditReport, Error> {
    let mut conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|e| Error::IO(e.to_string()))?;
    let tx = conn.transaction().map_err(|e| Error::Db(e.to_string()))?;
    audit(&tx).map_err(|e| Error::Db(e.to_string()))
}

/// Run the audit, report the result, and return the exit code.
fn run(args: &ArgMatches) -> u8 {
    let path: &String = args.get_one(DB_PATH).unwrap(); // Required argument is guaranteed to be present.
    match run_audit(path) {
        Ok(report) => {
            println!(
                "{} voters, {} candidates, {} votes.",
                report.voters, report.candidates, report.votes
            );
            if report.is_consistent() {
                println!("Audit passed.");
                0
            } else {
                for inconsistency in &report.inconsistencies {
                    println!("{inconsistency}");
                }
                println!(
                    "Audit failed: {} inconsistencies found.",
                    report.inconsistencies.len()
                );
                255
            }
        }
        Err(Error::IO(msg)) => {
            println!("IO error: {msg}");
            1
        }
        Err(Error::Db(msg)) => {
            println!("Database error: {msg}");
            1
        }
    }
}

fn main() {
    let args = cli().get_matches();
    let exit_code = run(&args);
    std::process::exit(exit_code.into())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use rand::Rng;
    use voting_backend::model::sqlite::ensure_schema_exists;

    use super::*;

    /// A database file that is removed when dropped.
    struct TempDb(PathBuf);

    impl TempDb {
        fn new(setup: &str) -> Self {
            let name = format!("audit-test{}.db", rand::thread_rng().gen::<u64>());
            let path = std::env::temp_dir().join(name);
            let conn = Connection::open(&path).unwrap();
            ensure_schema_exists(&conn).unwrap();
            conn.execute_batch(setup).unwrap();
            Self(path)
        }

        fn path(&self) -> &str {
            self.0.to_str().unwrap()
        }
    }

    impl Drop for TempDb {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    const CONSISTENT: &str = "
        INSERT INTO candidate (id, name, party, votes) VALUES (1, 'Ana', 'X', 1);
        INSERT INTO voter (id, name, email, has_voted) VALUES (1, 'Bob', 'bob@example.com', 1);
        INSERT INTO voter (id, name, email, has_voted) VALUES (2, 'Carla', 'carla@example.com', 0);
        INSERT INTO vote (voter_id, candidate_id) VALUES (1, 1);
    ";

    #[test]
    fn audit_report() {
        let db = TempDb::new(CONSISTENT);
        let report = run_audit(db.path()).unwrap();
        assert_eq!((report.voters, report.candidates, report.votes), (2, 1, 1));
        assert!(report.is_consistent());

        let db = TempDb::new(&format!(
            "{CONSISTENT} UPDATE candidate SET votes = 3 WHERE id = 1;"
        ));
        let report = run_audit(db.path()).unwrap();
        assert_eq!(report.inconsistencies.len(), 1);
    }

    #[test]
    fn correct_cli_usage() {
        let good = TempDb::new(CONSISTENT);
        let command_line = [PROGRAM_NAME, good.path()];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 0);

        let bad = TempDb::new(&format!(
            "{CONSISTENT} UPDATE voter SET has_voted = 1 WHERE id = 2;"
        ));
        let command_line = [PROGRAM_NAME, bad.path()];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 255);

        let command_line = [PROGRAM_NAME, "not a real file"];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 1);
    }

    #[test]
    fn bad_cli_usage() {
        // Something very wrong.
        let command_line = [PROGRAM_NAME, "this", "invocation", "is", "incorrect"];
        cli().try_get_matches_from(command_line).unwrap_err();

        // No options at all.
        let command_line = [PROGRAM_NAME];
        cli().try_get_matches_from(command_line).unwrap_err();
    }
}
