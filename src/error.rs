use log::{debug, error};
use r2d2::Error as PoolError;
use rocket::{
    http::Status,
    response::{self, Responder},
    serde::json::Json,
    tokio::task::JoinError,
    Request, Response,
};
use rusqlite::Error as DbError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{logging::RequestId, Config};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error("Database task failed: {0}")]
    Join(#[from] JoinError),
    #[error("Write abandoned by its caller before commit")]
    Abandoned,
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// The stable, client-facing category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Db(_) | Self::Pool(_) | Self::Join(_) | Self::Abandoned => ErrorKind::Internal,
        }
    }
}

/// Client-facing error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Internal,
}

impl ErrorKind {
    pub fn status(self) -> Status {
        match self {
            Self::Validation => Status::BadRequest,
            Self::NotFound => Status::NotFound,
            Self::Conflict => Status::Conflict,
            Self::Internal => Status::InternalServerError,
        }
    }

    /// Categorise a bare HTTP status, e.g. one produced by a failing request guard.
    pub fn from_status(status: Status) -> Self {
        match status.code {
            404 => Self::NotFound,
            409 => Self::Conflict,
            400..=499 => Self::Validation,
            _ => Self::Internal,
        }
    }
}

/// The JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorBody {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                kind,
                message: message.into(),
            },
        }
    }
}

pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let id = req.local_cache(RequestId::next);
        let kind = self.kind();
        let message = if kind == ErrorKind::Internal {
            error!("req{id} internal failure: {self}");
            // Storage detail only leaves the server when explicitly enabled.
            let expose = req
                .rocket()
                .state::<Config>()
                .map_or(false, Config::expose_internal_errors);
            if expose {
                self.to_string()
            } else {
                INTERNAL_ERROR_MESSAGE.to_string()
            }
        } else {
            debug!("req{id} refused: {self}");
            self.to_string()
        };

        let body = Json(ErrorBody::new(kind, message)).respond_to(req)?;
        Response::build_from(body).status(kind.status()).ok()
    }
}
