//! # Error Handling
//!
//! The request boundary distinguishes exactly two caller-visible failure
//! categories:
//!
//! - **InvalidInput** (400): the request itself is unusable (unknown model
//!   name, missing file field, oversized upload). Rejected before any
//!   resources are allocated.
//! - **Processing** (500): anything that went wrong after validation, in
//!   staging, model loading, audio decoding, or transcription. The body
//!   carries the error message, the full diagnostic chain and the elapsed
//!   time, matching the service contract.
//!
//! Inside the pipeline everything is `anyhow::Result` with `?` propagation;
//! the handler converts to `AppError` exactly once at the boundary.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    /// Request rejected before any work was done.
    InvalidInput(String),

    /// Processing failed after validation; carries the diagnostic detail
    /// returned to the caller.
    Processing {
        error: String,
        traceback: String,
        processing_time_seconds: f64,
    },
}

impl AppError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        AppError::InvalidInput(message.into())
    }

    /// Wrap a pipeline error together with the elapsed wall-clock seconds.
    /// The alternate debug rendering of `anyhow::Error` carries the whole
    /// cause chain, which serves as the diagnostic trace.
    pub fn processing(err: &anyhow::Error, processing_time_seconds: f64) -> Self {
        AppError::Processing {
            error: err.to_string(),
            traceback: format!("{err:?}"),
            processing_time_seconds,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AppError::Processing { error, .. } => write!(f, "Processing failure: {}", error),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Processing { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::InvalidInput(msg) => {
                HttpResponse::BadRequest().json(json!({ "detail": msg }))
            }
            AppError::Processing {
                error,
                traceback,
                processing_time_seconds,
            } => HttpResponse::InternalServerError().json(json!({
                "detail": {
                    "error": error,
                    "traceback": traceback,
                    "processing_time_seconds": processing_time_seconds,
                }
            })),
        }
    }
}

impl From<actix_multipart::MultipartError> for AppError {
    fn from(err: actix_multipart::MultipartError) -> Self {
        AppError::InvalidInput(format!("Multipart error: {}", err))
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_maps_to_400() {
        let err = AppError::invalid_input("bad model");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_processing_maps_to_500_with_detail() {
        let source = anyhow::anyhow!("weights missing").context("model load failed");
        let err = AppError::processing(&source, 1.25);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        match err {
            AppError::Processing {
                error,
                traceback,
                processing_time_seconds,
            } => {
                assert_eq!(error, "model load failed");
                assert!(traceback.contains("weights missing"));
                assert!((processing_time_seconds - 1.25).abs() < f64::EPSILON);
            }
            _ => panic!("expected Processing variant"),
        }
    }
}
