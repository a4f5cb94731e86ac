use crate::reconstruction::ReconstructionError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
use utoipa::ToSchema;

#[derive(ThisError, Debug)]
pub enum Error {
    /// No fal.ai credential is configured, so conversions cannot be attempted
    #[error("Reconstruction service is not configured")]
    MissingCredential,

    /// Invalid request data or business rule violation
    #[error("{message}")]
    BadRequest { message: String },

    /// The external reconstruction call chain failed (submit, poll, result, or asset fetch)
    #[error(transparent)]
    Reconstruction(#[from] ReconstructionError),

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// JSON error body returned to callers.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::MissingCredential => StatusCode::SERVICE_UNAVAILABLE,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::Reconstruction(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::MissingCredential => "Reconstruction service is not configured".to_string(),
            Error::BadRequest { message } => message.clone(),
            // Every flavor of conversion failure collapses to the same generic message:
            // the external call chain carries URLs and credentials callers must not see.
            Error::Reconstruction(_) => "Failed to convert image".to_string(),
            Error::Internal { .. } | Error::Other(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Reconstruction(_) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Conversion failed: {:#}", self);
            }
            Error::MissingCredential => {
                tracing::warn!("Rejected conversion request: no fal.ai credential configured");
            }
            Error::BadRequest { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        let body = ErrorBody {
            error: self.user_message(),
        };

        (status, Json(body)).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
