//! Axum route handlers for the Card API.

use axum::{
    extract::{rejection::JsonRejection, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::artifacts::persist_card;
use crate::errors::AppError;
use crate::generation::validate_text;
use crate::models::{CardImage, RawRequest};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GenerateCardRequest {
    /// Missing text is treated as empty and rejected by validation.
    #[serde(default)]
    pub text: String,
}

/// A finished card together with the id it was logged and persisted under.
#[derive(Debug, Clone)]
pub struct GeneratedCard {
    pub request_id: Uuid,
    pub card: CardImage,
}

impl IntoResponse for GeneratedCard {
    fn into_response(self) -> Response {
        let headers = [
            ("content-type", "image/png".to_string()),
            ("x-card-width", self.card.width.to_string()),
            ("x-card-height", self.card.height.to_string()),
            ("x-request-id", self.request_id.to_string()),
        ];
        (headers, self.card.png).into_response()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Shared generation entry point
// ────────────────────────────────────────────────────────────────────────────

/// Validates `text`, runs the pipeline and persists the result when configured.
///
/// Used by the HTTP handler and the chat webhook alike. Validation happens
/// before any external call.
pub async fn generate_card(state: &AppState, text: &str) -> Result<GeneratedCard, AppError> {
    validate_text(text, state.config.min_text_chars)?;

    let request_id = Uuid::new_v4();
    let span = info_span!("generate_card", %request_id, mode = state.pipeline.mode().as_str());

    async move {
        let request = RawRequest {
            text: text.to_string(),
        };
        let card = state.pipeline.generate(&request).await?;
        info!("Card generated: {} bytes", card.png.len());

        if let Some(dir) = state.config.card_output_dir.clone() {
            let copy = card.clone();
            match tokio::task::spawn_blocking(move || persist_card(&dir, request_id, &copy)).await
            {
                Ok(Ok(path)) => info!("Card persisted to {}", path.display()),
                Ok(Err(e)) => warn!("Card persistence failed: {e}"),
                Err(e) => warn!("Card persistence task failed: {e}"),
            }
        }

        Ok::<_, AppError>(GeneratedCard { request_id, card })
    }
    .instrument(span)
    .await
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/cards (also mounted at POST /ai-generate-image)
///
/// Body `{ "text": "..." }`. Responds with the PNG card.
pub async fn handle_generate_card(
    State(state): State<AppState>,
    payload: Result<Json<GenerateCardRequest>, JsonRejection>,
) -> Result<GeneratedCard, AppError> {
    let Json(request) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    generate_card(&state, &request.text).await
}
