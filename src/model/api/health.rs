use serde::{Deserialize, Serialize};

/// Liveness response; produced without touching the database.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Liveness {
    pub status: String,
}

impl Liveness {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

/// Database probe response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DbHealth {
    pub db: String,
    /// What the probe query returned.
    pub result: i64,
}

impl DbHealth {
    pub fn ok(result: i64) -> Self {
        Self {
            db: "ok".to_string(),
            result,
        }
    }
}
