//! Voter and candidate registration, guarded so that no name belongs to both.
//!
//! The cross-entity rule is backed by the `registered_name` table: each name
//! is claimed by exactly one role, and the claim, the duplicate checks and the
//! insert all happen in one write transaction.

use log::info;
use rusqlite::Transaction;

use crate::error::{Error, Result};
use crate::model::{
    common::PersonName,
    db::{registered_name, Candidate, NewCandidate, NewVoter, Role, Voter},
    sqlite::{is_unique_violation, Store},
};

pub const NAME_HELD_BY_CANDIDATE: &str = "Cannot register voter: name already belongs to a candidate";
pub const NAME_HELD_BY_VOTER: &str = "Cannot register candidate: name already belongs to a voter";
pub const DUPLICATE_CANDIDATE: &str = "A candidate with this name already exists";
pub const DUPLICATE_EMAIL: &str = "Email is already registered";

/// Claim `name` for `role`, failing if the other role already holds it.
/// Voters may share a name with each other; candidates may not.
fn claim_name(tx: &Transaction<'_>, name: &PersonName, role: Role) -> Result<()> {
    match (role, registered_name::claim(tx, name, role)?) {
        (Role::Voter, Role::Voter) => Ok(()),
        (Role::Voter, Role::Candidate) => Err(Error::conflict(NAME_HELD_BY_CANDIDATE)),
        (Role::Candidate, Role::Voter) => Err(Error::conflict(NAME_HELD_BY_VOTER)),
        // The claim can't tell a fresh insert from an existing candidate;
        // the candidate table's own UNIQUE constraint settles it below.
        (Role::Candidate, Role::Candidate) => Ok(()),
    }
}

fn register_voter_in(tx: &Transaction<'_>, voter: &NewVoter) -> Result<Voter> {
    claim_name(tx, &voter.name, Role::Voter)?;
    if NewVoter::email_taken(tx, &voter.email)? {
        return Err(Error::conflict(DUPLICATE_EMAIL));
    }
    voter.insert(tx).map_err(|e| {
        if is_unique_violation(&e) {
            Error::conflict(DUPLICATE_EMAIL)
        } else {
            e.into()
        }
    })
}

fn register_candidate_in(tx: &Transaction<'_>, candidate: &NewCandidate) -> Result<Candidate> {
    claim_name(tx, &candidate.name, Role::Candidate)?;
    candidate.insert(tx).map_err(|e| {
        if is_unique_violation(&e) {
            Error::conflict(DUPLICATE_CANDIDATE)
        } else {
            e.into()
        }
    })
}

/// Register a new voter.
///
/// Fails with `Conflict` if a candidate holds the same name or the email is
/// already registered. On success exactly one voter row is inserted.
pub async fn register_voter(store: &Store, voter: NewVoter) -> Result<Voter> {
    let voter = store.write(move |tx| register_voter_in(tx, &voter)).await?;
    info!("Registered voter {} ({})", voter.id, voter.email);
    Ok(voter)
}

/// Register a new candidate with a zero vote counter.
///
/// Fails with `Conflict` if a voter holds the same name or another candidate
/// already uses it. On success exactly one candidate row is inserted.
pub async fn register_candidate(store: &Store, candidate: NewCandidate) -> Result<Candidate> {
    let candidate = store
        .write(move |tx| register_candidate_in(tx, &candidate))
        .await?;
    info!("Registered candidate {} ({})", candidate.id, candidate.name);
    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use rocket::futures::future;

    use super::*;
    use crate::model::db::{CandidateCore, VoterCore};

    async fn count(store: &Store, table: &'static str) -> u64 {
        store
            .read(move |tx| {
                Ok(tx.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?)
            })
            .await
            .unwrap()
    }

    #[backend_test]
    async fn register_voter_and_candidate(store: Store) {
        let voter = register_voter(&store, VoterCore::example()).await.unwrap();
        assert_eq!(voter.voter, VoterCore::example());
        assert!(!voter.has_voted);

        let candidate = register_candidate(&store, CandidateCore::example())
            .await
            .unwrap();
        assert_eq!(candidate.candidate, CandidateCore::example());
        assert_eq!(candidate.votes, 0);

        let name = CandidateCore::example().name;
        let role = store
            .read(move |tx| registered_name::holder(tx, &name))
            .await
            .unwrap();
        assert_eq!(role, Some(Role::Candidate));
    }

    #[backend_test]
    async fn voter_cannot_take_candidate_name(store: Store) {
        register_candidate(&store, CandidateCore::named("Ana", Some("X")))
            .await
            .unwrap();

        let err = register_voter(&store, VoterCore::named("Ana", "ana@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(ref msg) if msg == NAME_HELD_BY_CANDIDATE));
        assert_eq!(count(&store, "voter").await, 0);

        // Names collide regardless of case.
        let err = register_voter(&store, VoterCore::named("ANA", "ana@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[backend_test]
    async fn candidate_cannot_take_voter_name(store: Store) {
        register_voter(&store, VoterCore::example()).await.unwrap();

        let err = register_candidate(&store, CandidateCore::named("Bob", None))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(ref msg) if msg == NAME_HELD_BY_VOTER));
        assert_eq!(count(&store, "candidate").await, 0);
    }

    #[backend_test]
    async fn duplicate_candidate_name(store: Store) {
        register_candidate(&store, CandidateCore::example())
            .await
            .unwrap();

        let err = register_candidate(&store, CandidateCore::named("Ana", Some("Y")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(ref msg) if msg == DUPLICATE_CANDIDATE));
        assert_eq!(count(&store, "candidate").await, 1);
    }

    #[backend_test]
    async fn duplicate_voter_email(store: Store) {
        register_voter(&store, VoterCore::example()).await.unwrap();

        let err = register_voter(&store, VoterCore::named("Robert", "BOB@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(ref msg) if msg == DUPLICATE_EMAIL));
        assert_eq!(count(&store, "voter").await, 1);
    }

    #[backend_test]
    async fn voters_may_share_a_name(store: Store) {
        register_voter(&store, VoterCore::named("Bob", "bob@example.com"))
            .await
            .unwrap();
        register_voter(&store, VoterCore::named("Bob", "bob2@example.com"))
            .await
            .unwrap();
        assert_eq!(count(&store, "voter").await, 2);
    }

    #[backend_test]
    async fn concurrent_cross_registration(store: Store) {
        // A voter and a candidate race for the same name: exactly one wins.
        let (voter, candidate) = future::join(
            register_voter(&store, VoterCore::named("Eva", "eva@example.com")),
            register_candidate(&store, CandidateCore::named("Eva", None)),
        )
        .await;
        assert!(voter.is_ok() ^ candidate.is_ok());
        assert_eq!(
            count(&store, "voter").await + count(&store, "candidate").await,
            1
        );
    }
}
