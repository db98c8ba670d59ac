use rocket::{serde::json::Json, Route};

use crate::error::Result;
use crate::model::{
    api::{DbHealth, Liveness},
    sqlite::Store,
};

pub fn routes() -> Vec<Route> {
    routes![health, db_health]
}

#[get("/health")]
fn health() -> Json<Liveness> {
    Json(Liveness::ok())
}

/// Round-trip a trivial query through the pool.
#[get("/db/health")]
async fn db_health(store: Store) -> Result<Json<DbHealth>> {
    let result = store
        .read(|tx| Ok(tx.query_row("SELECT 1", [], |row| row.get(0))?))
        .await?;
    Ok(Json(DbHealth::ok(result)))
}

#[cfg(test)]
mod tests {
    use rocket::{http::Status, local::asynchronous::Client};

    use super::*;

    #[backend_test]
    async fn liveness(client: Client) {
        let response = client.get("/api/health").dispatch().await;

        assert_eq!(Status::Ok, response.status());
        assert_eq!(
            response.into_json::<Liveness>().await.unwrap(),
            Liveness::ok()
        );
    }

    #[backend_test]
    async fn database_probe(client: Client) {
        let response = client.get("/api/db/health").dispatch().await;

        assert_eq!(Status::Ok, response.status());
        assert_eq!(
            response.into_json::<DbHealth>().await.unwrap(),
            DbHealth::ok(1)
        );
    }
}
