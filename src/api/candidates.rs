use rocket::{http::Status, serde::json::Json, Route};

use crate::error::Result;
use crate::model::{
    api::CandidateRegistration,
    db::{Candidate, NewCandidate},
    sqlite::Store,
    voting::register_candidate,
};

pub fn routes() -> Vec<Route> {
    routes![create_candidate]
}

#[post("/candidates", data = "<registration>", format = "json")]
async fn create_candidate(
    registration: Json<CandidateRegistration>,
    store: Store,
) -> Result<(Status, Json<Candidate>)> {
    let candidate = NewCandidate::try_from(registration.into_inner())?;
    let candidate = register_candidate(&store, candidate).await?;
    Ok((Status::Created, Json(candidate)))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::ContentType,
        local::asynchronous::Client,
        serde::json::serde_json::json,
    };

    use crate::error::{ErrorBody, ErrorKind};
    use crate::model::db::{CandidateCore, VoterCore};
    use crate::model::voting::register_voter;

    use super::*;

    #[backend_test]
    async fn register_without_party(client: Client) {
        let response = client
            .post("/api/candidates")
            .header(ContentType::JSON)
            .body(json!({"name": "Diego"}).to_string())
            .dispatch()
            .await;

        assert_eq!(Status::Created, response.status());
        let candidate = response.into_json::<Candidate>().await.unwrap();
        assert_eq!(candidate.candidate, CandidateCore::example2());
        assert_eq!(candidate.votes, 0);
    }

    #[backend_test]
    async fn blank_name(client: Client) {
        let response = client
            .post("/api/candidates")
            .header(ContentType::JSON)
            .body(json!({"name": "  ", "party": "X"}).to_string())
            .dispatch()
            .await;

        assert_eq!(Status::BadRequest, response.status());
    }

    #[backend_test]
    async fn name_taken_by_voter(client: Client, store: Store) {
        register_voter(&store, VoterCore::example()).await.unwrap();

        let response = client
            .post("/api/candidates")
            .header(ContentType::JSON)
            .body(json!({"name": "Bob", "party": "Y"}).to_string())
            .dispatch()
            .await;

        assert_eq!(Status::Conflict, response.status());
        let body = response.into_json::<ErrorBody>().await.unwrap();
        assert_eq!(body.error.kind, ErrorKind::Conflict);
    }
}
