use rocket::{http::Status, serde::json::Json, Catcher, Request, Route};

use crate::error::{Error, ErrorBody, ErrorKind};

mod candidates;
mod health;
mod voters;
mod votes;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(voters::routes());
    routes.extend(candidates::routes());
    routes.extend(votes::routes());
    routes.extend(health::routes());
    routes.extend(routes![not_json]);
    routes
}

/// Resources that accept a JSON body on `POST`.
const JSON_RESOURCES: [&str; 3] = ["voters", "candidates", "votes"];

/// Reached when a `POST` to a JSON resource is not declared as JSON.
#[post("/<resource>", rank = 2)]
fn not_json(resource: &str) -> Option<Error> {
    JSON_RESOURCES
        .contains(&resource)
        .then(|| Error::validation("request body must be JSON (Content-Type: application/json)"))
}

pub fn catchers() -> Vec<Catcher> {
    catchers![default_catcher]
}

/// Render failures that never reached a handler (unknown route, unparseable
/// body, panics) in the same shape as handler errors.
#[catch(default)]
fn default_catcher(status: Status, _req: &Request) -> (Status, Json<ErrorBody>) {
    let kind = ErrorKind::from_status(status);
    let message = match status.code {
        404 => "No such resource".to_string(),
        422 => "Request body is malformed".to_string(),
        _ => status.reason_lossy().to_string(),
    };
    (kind.status(), Json(ErrorBody::new(kind, message)))
}
