use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::generation::{InputError, PipelineError};

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<InputError> for AppError {
    fn from(e: InputError) -> Self {
        AppError::Validation(e.to_string())
    }
}

impl AppError {
    /// Stable machine-readable error kind.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Pipeline(PipelineError::ContentParseFailed(_)) => "CONTENT_PARSE_FAILED",
            AppError::Pipeline(PipelineError::PromptSynthesisFailed(_)) => {
                "PROMPT_SYNTHESIS_FAILED"
            }
            AppError::Pipeline(PipelineError::ImageSynthesisFailed(_)) => "IMAGE_SYNTHESIS_FAILED",
            AppError::Pipeline(PipelineError::CompositionFailed(_)) => "COMPOSITION_FAILED",
            AppError::NotConfigured(_) => "NOT_CONFIGURED",
            AppError::Forbidden => "FORBIDDEN",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, message, details): (StatusCode, String, Option<Value>) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::Pipeline(PipelineError::ContentParseFailed(failure)) => {
                tracing::error!("Content extraction failed: {failure}");
                (
                    StatusCode::BAD_GATEWAY,
                    "Content extraction returned an unusable response".to_string(),
                    Some(json!(failure)),
                )
            }
            AppError::Pipeline(
                PipelineError::PromptSynthesisFailed(failure)
                | PipelineError::ImageSynthesisFailed(failure),
            ) => {
                tracing::error!("Synthesis failed: {failure}");
                (
                    StatusCode::BAD_GATEWAY,
                    "An AI synthesis call failed".to_string(),
                    Some(json!(failure)),
                )
            }
            AppError::Pipeline(PipelineError::CompositionFailed(msg)) => {
                tracing::error!("Composition failed: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "The card could not be composed".to_string(),
                    None,
                )
            }
            AppError::NotConfigured(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone(), None),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Access denied".to_string(), None),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred".to_string(),
                    None,
                )
            }
        };

        let mut error = json!({
            "code": code,
            "message": message
        });
        if let Some(details) = details {
            error["details"] = details;
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}
