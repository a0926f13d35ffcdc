use std::fmt::Display;

use axum::{
    http,
    response::{IntoResponse, Response},
    Json,
};
use mise::basic_models::ErrorBody;

use crate::{detect::DetectError, generation::GenerationError, illustrate::ImageError};

pub type WebResult<T> = std::result::Result<T, WebError>;

#[derive(thiserror::Error, Debug)]
pub enum WebError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("Not found")]
    NotFound,
    #[error("Failed to generate image.")]
    ImageUnavailable,
    #[error("Bad image data format.")]
    Image(#[from] ImageError),
    #[error(transparent)]
    Detect(#[from] DetectError),
    #[error("Internal Server Error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<GenerationError> for WebError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::InvalidArgument(msg) => WebError::InvalidArgument(msg),
            other => WebError::Internal(other.into()),
        }
    }
}

/// Only development builds explain internal failures to the caller.
fn internal_details(err: &dyn Display) -> Option<String> {
    if cfg!(debug_assertions) {
        Some(err.to_string())
    } else {
        None
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let error = self.to_string();
        let (status, details) = match &self {
            // Shape errors and auth failures are always explained
            WebError::InvalidArgument(_) => (http::StatusCode::BAD_REQUEST, None),
            WebError::Unauthorized(_) => (http::StatusCode::UNAUTHORIZED, None),
            WebError::NotFound => (http::StatusCode::NOT_FOUND, None),
            WebError::ImageUnavailable => (http::StatusCode::INTERNAL_SERVER_ERROR, None),
            WebError::Image(err) => (http::StatusCode::INTERNAL_SERVER_ERROR, internal_details(err)),
            WebError::Detect(err) => (http::StatusCode::INTERNAL_SERVER_ERROR, Some(err.details())),
            WebError::Internal(err) => {
                tracing::error!("{err:#}");
                return (
                    http::StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorBody {
                        error: "Internal Server Error".into(),
                        details: internal_details(&format!("{err:#}")),
                    }),
                )
                    .into_response();
            }
        };
        (status, Json(ErrorBody { error, details })).into_response()
    }
}
