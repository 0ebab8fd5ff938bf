//! Error kinds surfaced to HTTP callers and their uniform JSON envelope.
use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

pub const INVALID_BODY_MESSAGE: &str = "Invalid request body.";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(&'static str),

    #[error("User already exists.")]
    Conflict,

    #[error("Invalid email or password.")]
    InvalidCredentials,

    #[error("Invalid or expired token.")]
    InvalidOrExpiredToken,

    #[error("User not found.")]
    UserNotFound,

    #[error("Invalid or missing token.")]
    Unauthorized,

    #[error("Job application not found.")]
    NotFound,

    #[error("Server error.")]
    Internal(#[source] anyhow::Error),
}

/// Body of every non-2xx response, and of message-only success responses.
#[derive(Debug, Serialize)]
pub struct MessageBody {
    pub message: String,
}

impl MessageBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::Conflict
            | ApiError::InvalidCredentials
            | ApiError::InvalidOrExpiredToken
            | ApiError::UserNotFound => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// `Json` extractor whose rejections (bad syntax, wrong field types, missing
/// content type) come back as a `Validation` error in the usual envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!(status = %rejection.status(), reason = %rejection.body_text(), "request body rejected");
        ApiError::Validation(INVALID_BODY_MESSAGE)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(cause) = &self {
            error!(error = ?cause, "internal error");
        }
        let status = self.status_code();
        (status, Json(MessageBody::new(self.to_string()))).into_response()
    }
}
