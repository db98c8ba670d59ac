use rocket::{http::Status, serde::json::Json, Route};

use crate::error::Result;
use crate::model::{
    api::VoterRegistration,
    db::{NewVoter, Voter},
    sqlite::Store,
    voting::register_voter,
};

pub fn routes() -> Vec<Route> {
    routes![create_voter]
}

#[post("/voters", data = "<registration>", format = "json")]
async fn create_voter(
    registration: Json<VoterRegistration>,
    store: Store,
) -> Result<(Status, Json<Voter>)> {
    let voter = NewVoter::try_from(registration.into_inner())?;
    let voter = register_voter(&store, voter).await?;
    Ok((Status::Created, Json(voter)))
}
