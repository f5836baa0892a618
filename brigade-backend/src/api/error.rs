use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use brigade_common::{ApiReply, LoginReply, StoreError};
use thiserror::Error;

pub const INVALID_CREDENTIALS: &str = "invalid credentials";

#[derive(Debug, Error)]
pub enum IngestError {
    /// Malformed report; nothing was stored or broadcast
    #[error("{0}")]
    Validation(String),

    /// The store refused or never saw the write; nothing was broadcast
    #[error("failed to persist position: {0}")]
    Persistence(#[from] StoreError),
}

impl IngestError {
    pub fn status(&self) -> StatusCode {
        match self {
            IngestError::Validation(_) => StatusCode::BAD_REQUEST,
            IngestError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        (self.status(), Json(ApiReply::failure(self.to_string()))).into_response()
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("credential lookup failed: {0}")]
    Store(#[from] StoreError),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = match &self {
            AuthError::InvalidCredentials => LoginReply::failure(INVALID_CREDENTIALS),
            AuthError::Store(_) => LoginReply::failure("authentication service unavailable"),
        };
        (self.status(), Json(body)).into_response()
    }
}
