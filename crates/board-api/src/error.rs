use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use board_db::StoreError;
use board_types::api::ApiErrorBody;

use crate::validator::ValidationError;

/// Why a message submission was refused.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("rate limited for another {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("CSRF token mismatch")]
    Csrf,

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl BoardError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Csrf => StatusCode::FORBIDDEN,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text safe to show the visitor. Store and internal failures stay generic.
    pub fn user_messages(&self) -> Vec<String> {
        match self {
            Self::Validation(e) => e.messages(),
            Self::RateLimited { retry_after } => {
                let minutes = retry_after.div_ceil(60).max(1);
                vec![format!("Too many attempts. Please wait {minutes} minute(s).")]
            }
            Self::Csrf => vec!["Invalid security token. Please reload the page.".to_string()],
            Self::Store(_) | Self::Internal(_) => {
                vec!["A technical error occurred while adding the message.".to_string()]
            }
        }
    }
}

/// Errors of the JSON poll API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(&'static str),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Rate limit exceeded")]
    RateLimited { retry_after: u64 },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ApiErrorBody {
                    success: None,
                    error: msg.to_string(),
                    retry_after: None,
                },
            ),
            Self::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                ApiErrorBody {
                    success: None,
                    error: self.to_string(),
                    retry_after: None,
                },
            ),
            Self::RateLimited { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                ApiErrorBody {
                    success: None,
                    error: self.to_string(),
                    retry_after: Some(*retry_after),
                },
            ),
            Self::Store(_) | Self::Internal(_) => {
                error!("Poll API failure: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorBody {
                        success: Some(false),
                        error: "Unable to fetch messages".to_string(),
                        retry_after: None,
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
