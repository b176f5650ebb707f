//! Request pipeline errors
//!
//! Each stage (decode, segment, flatten, store) returns its own error kind;
//! the HTTP boundary maps kinds to status codes.

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::segment::SegmentError;
use crate::storage::StorageError;

/// Message returned when no usable upload is present
pub const NO_IMAGE_UPLOADED: &str = "No image uploaded";

/// Errors surfaced by the `/remove-bg` pipeline
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("{0}")]
    Validation(String),

    #[error("{}", .0.body_text())]
    Upload(#[from] MultipartError),

    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("background removal failed: {0}")]
    Segmentation(#[from] SegmentError),

    #[error("storage failed: {0}")]
    Storage(#[from] StorageError),
}

impl ProcessError {
    /// Missing or empty `image` field
    pub fn no_image() -> Self {
        ProcessError::Validation(NO_IMAGE_UPLOADED.to_string())
    }

    /// HTTP status for this error kind
    pub fn status(&self) -> StatusCode {
        match self {
            ProcessError::Validation(_) => StatusCode::BAD_REQUEST,
            ProcessError::Upload(e) => e.status(),
            ProcessError::InvalidImage(_)
            | ProcessError::Segmentation(_)
            | ProcessError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<image::ImageError> for ProcessError {
    fn from(e: image::ImageError) -> Self {
        ProcessError::InvalidImage(e.to_string())
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for ProcessError {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
