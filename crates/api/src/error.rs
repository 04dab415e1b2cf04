use axum::response::{IntoResponse, Response};
use axum::{Json, http::StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::CryptoError;

/// The closed set of error kinds the core produces. Each variant maps to
/// exactly one HTTP status code; callers that need to distinguish "why"
/// (e.g. to decide whether to retry) match on the variant rather than
/// parsing the message.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("crypto error: {0}")]
    Crypto(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("not implemented: {0}")]
    NotImplemented(String),
}

impl LedgerError {
    pub fn status(&self) -> StatusCode {
        match self {
            LedgerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            LedgerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            LedgerError::Crypto(_) => StatusCode::INTERNAL_SERVER_ERROR,
            LedgerError::Protocol(_) => StatusCode::BAD_REQUEST,
            LedgerError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
        }
    }
}

impl From<CryptoError> for LedgerError {
    fn from(err: CryptoError) -> Self {
        LedgerError::Crypto(err.to_string())
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => LedgerError::NotFound("row not found".to_string()),
            other => LedgerError::Storage(other.to_string()),
        }
    }
}

impl From<uuid::Error> for LedgerError {
    fn from(err: uuid::Error) -> Self {
        LedgerError::BadRequest(format!("invalid uuid: {err}"))
    }
}

impl From<base64::DecodeError> for LedgerError {
    fn from(err: base64::DecodeError) -> Self {
        LedgerError::BadRequest(format!("invalid base64: {err}"))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FailureBody {
    status: &'static str,
    err: String,
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::error!(%status, error = %self, "request failed");
        let body = FailureBody {
            status: "failed",
            err: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Envelope for every successful response: `{status:"OK", ...fields}`.
/// `T` is flattened into the body alongside the `status` field, matching
/// the wire contract in the spec (`{status:"OK", transaction:<TxJSON>}`
/// and friends) rather than nesting payloads under a generic `data` key.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    status: &'static str,
    #[serde(flatten)]
    body: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(body: T) -> Self {
        Self { status: "OK", body }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
