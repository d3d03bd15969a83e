use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use thiserror::Error;

use crate::models::ApiResponse;
use crate::store::StoreError;

/// Every failure a handler can surface. Rendered as
/// `{"success": false, "message": ...}` with a matching status code.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// `message` is what the caller sees; `source` only goes to the log.
    #[error("{message}")]
    Persistence {
        message: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("{0}")]
    Internal(&'static str),
}

impl ApiError {
    /// Adapter for `map_err` on store calls.
    pub fn persistence(message: &'static str) -> impl FnOnce(StoreError) -> ApiError {
        move |source| {
            tracing::error!(error = %source, "{}", message);
            ApiError::Persistence { message, source }
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Persistence { .. } | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ApiResponse::<()>::failure(self.to_string()))
    }
}
