//! Stage A: content resolution.
//!
//! Either splits the raw text locally (first line = title, next lines = points)
//! or asks the synthesis backend for `{title, points}` and validates the answer.
//! Malformed model output is a `ContentParseFailed`, never a blank card.

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::generation::pipeline::{PipelineError, UpstreamFailure};
use crate::generation::prompts::content_extraction_system;
use crate::llm_client::{parse_json, ResponseFormat, SynthesisBackend};
use crate::models::{strip_undrawable, CardContent, ContentError, MAX_POINTS};

/// Points taken from the lines following the title in a local split.
pub const LOCAL_MAX_POINTS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("Valid Tamil text is required (at least {min} characters, got {actual})")]
    TooShort { min: usize, actual: usize },
}

/// Rejects input whose trimmed length is below `min_chars` characters.
pub fn validate_text(text: &str, min_chars: usize) -> Result<(), InputError> {
    let actual = text.trim().chars().count();
    if actual < min_chars {
        return Err(InputError::TooShort {
            min: min_chars,
            actual,
        });
    }
    Ok(())
}

/// Local split: first non-empty line is the title, the next up to
/// [`LOCAL_MAX_POINTS`] non-empty lines are the points.
pub fn split_local(text: &str) -> Result<CardContent, ContentError> {
    let text = strip_undrawable(text);
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    let title = lines.next().unwrap_or_default();
    let points = lines.take(LOCAL_MAX_POINTS).map(str::to_string).collect();
    CardContent::new(title, points)
}

/// The shape the extraction prompt asks the model for.
#[derive(Debug, Deserialize)]
struct ExtractedContent {
    title: String,
    points: Vec<String>,
}

/// External extraction via the synthesis backend.
pub async fn extract_content(
    backend: &dyn SynthesisBackend,
    text: &str,
) -> Result<CardContent, PipelineError> {
    let raw = backend
        .chat(&content_extraction_system(), text, ResponseFormat::Json)
        .await
        .map_err(|e| PipelineError::ContentParseFailed(e.into()))?;

    let extracted: ExtractedContent = parse_json(&raw).map_err(|e| {
        PipelineError::ContentParseFailed(UpstreamFailure::diagnostic(format!(
            "model output is not a {{title, points}} object ({e}): {raw}"
        )))
    })?;

    let mut points: Vec<String> = extracted
        .points
        .into_iter()
        .filter(|p| !strip_undrawable(p).trim().is_empty())
        .collect();
    if points.len() > MAX_POINTS {
        warn!(
            "Extraction returned {} points; keeping the first {MAX_POINTS}",
            points.len()
        );
        points.truncate(MAX_POINTS);
    }

    CardContent::new(extracted.title, points).map_err(|e| {
        PipelineError::ContentParseFailed(UpstreamFailure::diagnostic(format!(
            "{e}: {raw}"
        )))
    })
}
