//! The vote transaction engine.
//!
//! Casting a vote is the only operation that writes `voter.has_voted` or
//! `candidate.votes`. Everything happens in one write transaction:
//!
//! 1. lock the voter row; it must exist and must not have voted,
//! 2. lock the candidate row; it must exist,
//! 3. insert the vote (the UNIQUE constraint on `vote.voter_id` backs up 1),
//! 4. increment the candidate's counter,
//! 5. flag the voter,
//! 6. commit.
//!
//! Any failure rolls back all of it, so no orphan vote, stale counter or
//! wrongly-flagged voter is ever visible.

use log::{debug, info};
use rusqlite::{OptionalExtension, Transaction};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::sqlite::{is_unique_violation, Id, Store};

pub const ALREADY_VOTED: &str = "Voter has already voted";
pub const VOTER: &str = "voter";
pub const CANDIDATE: &str = "candidate";

/// The outcome of a successful cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub vote_id: Id,
    pub voter_id: Id,
    pub candidate_id: Id,
}

/// Proof that both rows of a ballot are locked by the current transaction.
struct LockedBallot {
    voter_id: Id,
    candidate_id: Id,
}

/// Lock the voter row, then the candidate row.
///
/// This is the single place where voting locks rows; the voter-before-candidate
/// order must hold for every caller. Under SQLite the write transaction
/// already holds the database write lock, which covers both rows for the rest
/// of the transaction.
fn lock_ballot_rows(tx: &Transaction<'_>, voter_id: Id, candidate_id: Id) -> Result<LockedBallot> {
    let has_voted: Option<bool> = tx
        .query_row(
            "SELECT has_voted FROM voter WHERE id = ?1",
            [voter_id],
            |row| row.get(0),
        )
        .optional()?;
    match has_voted {
        None => return Err(Error::not_found(VOTER)),
        Some(true) => return Err(Error::conflict(ALREADY_VOTED)),
        Some(false) => {}
    }

    let candidate = tx
        .query_row(
            "SELECT id FROM candidate WHERE id = ?1",
            [candidate_id],
            |row| row.get::<_, Id>(0),
        )
        .optional()?;
    if candidate.is_none() {
        return Err(Error::not_found(CANDIDATE));
    }

    Ok(LockedBallot {
        voter_id,
        candidate_id,
    })
}

fn insert_vote(tx: &Transaction<'_>, ballot: &LockedBallot) -> Result<Id> {
    tx.query_row(
        "INSERT INTO vote (voter_id, candidate_id) VALUES (?1, ?2) RETURNING id",
        [ballot.voter_id, ballot.candidate_id],
        |row| row.get(0),
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            Error::conflict(ALREADY_VOTED)
        } else {
            e.into()
        }
    })
}

/// The only writer of `candidate.votes`.
fn increment_candidate_votes(tx: &Transaction<'_>, ballot: &LockedBallot) -> Result<()> {
    let updated = tx.execute(
        "UPDATE candidate SET votes = votes + 1 WHERE id = ?1",
        [ballot.candidate_id],
    )?;
    debug_assert_eq!(updated, 1, "locked candidate row vanished");
    Ok(())
}

/// The only writer of `voter.has_voted`.
fn mark_voter_voted(tx: &Transaction<'_>, ballot: &LockedBallot) -> Result<()> {
    let updated = tx.execute(
        "UPDATE voter SET has_voted = 1 WHERE id = ?1 AND has_voted = 0",
        [ballot.voter_id],
    )?;
    if updated != 1 {
        // Unreachable while the row is locked, but never flag twice.
        return Err(Error::conflict(ALREADY_VOTED));
    }
    Ok(())
}

fn cast_vote_in(tx: &Transaction<'_>, voter_id: Id, candidate_id: Id) -> Result<VoteReceipt> {
    let ballot = lock_ballot_rows(tx, voter_id, candidate_id)?;
    let vote_id = insert_vote(tx, &ballot)?;
    increment_candidate_votes(tx, &ballot)?;
    mark_voter_voted(tx, &ballot)?;
    Ok(VoteReceipt {
        vote_id,
        voter_id,
        candidate_id,
    })
}

/// Record `voter_id`'s vote for `candidate_id`.
///
/// Fails with `NotFound("voter")` or `NotFound("candidate")` if either row is
/// missing, and with `Conflict` if the voter has already voted. A Conflict is
/// final for that voter; it is never retried.
pub async fn cast_vote(store: &Store, voter_id: Id, candidate_id: Id) -> Result<VoteReceipt> {
    let result = store
        .write(move |tx| cast_vote_in(tx, voter_id, candidate_id))
        .await;
    match &result {
        Ok(receipt) => info!(
            "Recorded vote {}: voter {voter_id} -> candidate {candidate_id}",
            receipt.vote_id
        ),
        Err(e) => debug!("Refused vote from voter {voter_id} for candidate {candidate_id}: {e}"),
    }
    result
}
