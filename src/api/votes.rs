use rocket::{http::Status, serde::json::Json, Route};

use crate::error::{Error, Result};
use crate::model::{
    api::{vote::vote_id, VoteConfirmation, VoteRequest},
    db::{Vote, VoteWithNames},
    sqlite::Store,
    voting::{cast_vote, compute_statistics, Statistics},
};

pub fn routes() -> Vec<Route> {
    routes![create_vote, list_votes, get_vote, statistics]
}

#[post("/votes", data = "<request>", format = "json")]
async fn create_vote(
    request: Json<VoteRequest>,
    store: Store,
) -> Result<(Status, Json<VoteConfirmation>)> {
    let (voter_id, candidate_id) = request.ids()?;
    let receipt = cast_vote(&store, voter_id, candidate_id).await?;
    Ok((Status::Created, Json(receipt.into())))
}

#[get("/votes")]
async fn list_votes(store: Store) -> Result<Json<Vec<VoteWithNames>>> {
    Ok(Json(store.read(|tx| Vote::list_with_names(tx)).await?))
}

#[get("/votes/<id>")]
async fn get_vote(id: &str, store: Store) -> Result<Json<VoteWithNames>> {
    let id = vote_id(id)?;
    store
        .read(move |tx| Vote::find_with_names(tx, id))
        .await?
        .map(Json)
        .ok_or_else(|| Error::not_found("vote"))
}

#[get("/votes/statistics")]
async fn statistics(store: Store) -> Result<Json<Statistics>> {
    Ok(Json(compute_statistics(&store).await?))
}
