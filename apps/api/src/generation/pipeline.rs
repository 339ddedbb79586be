//! Card generation pipeline: raw text to finished card.
//!
//! Flow: (Stage A: content resolution ‖ Stage B: background resolution) →
//!       Stage C: composition → PNG.
//!
//! Stages A and B run concurrently; C starts once both have settled. Stage B
//! failures are recoverable: they are logged and the card is drawn on a solid
//! background instead. Every external call is made at most once per request.

use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::generation::content::{extract_content, split_local};
use crate::generation::prompts::{image_prompt, PROMPT_SYNTHESIS_SYSTEM};
use crate::llm_client::{ImageSize, LlmError, ResponseFormat, SynthesisBackend};
use crate::models::{CardContent, CardImage, RawRequest};
use crate::render::{BackgroundSpec, Compositor, RenderOptions};

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Upstream status and diagnostic attached to a failed stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpstreamFailure {
    pub status: Option<u16>,
    pub detail: String,
}

impl UpstreamFailure {
    pub fn diagnostic(detail: impl Into<String>) -> Self {
        Self {
            status: None,
            detail: detail.into(),
        }
    }
}

impl From<LlmError> for UpstreamFailure {
    fn from(e: LlmError) -> Self {
        Self {
            status: e.status(),
            detail: e.to_string(),
        }
    }
}

impl std::fmt::Display for UpstreamFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "upstream status {status}: {}", self.detail),
            None => f.write_str(&self.detail),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("prompt synthesis failed: {0}")]
    PromptSynthesisFailed(UpstreamFailure),

    #[error("image synthesis failed: {0}")]
    ImageSynthesisFailed(UpstreamFailure),

    #[error("content parse failed: {0}")]
    ContentParseFailed(UpstreamFailure),

    #[error("composition failed: {0}")]
    CompositionFailed(String),
}

// ────────────────────────────────────────────────────────────────────────────
// Mode
// ────────────────────────────────────────────────────────────────────────────

/// Where Stage A gets the title and points from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentSource {
    Local,
    Extracted,
}

/// Which stages a deployment runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PipelineMode {
    /// Local split, solid background. No external calls.
    #[default]
    Plain,
    /// Local split, synthesized background.
    Illustrated,
    /// External extraction, solid background.
    Extracted,
    /// External extraction, synthesized background.
    ExtractedIllustrated,
}

impl PipelineMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineMode::Plain => "plain",
            PipelineMode::Illustrated => "illustrated",
            PipelineMode::Extracted => "extracted",
            PipelineMode::ExtractedIllustrated => "extracted-illustrated",
        }
    }

    pub fn content_source(self) -> ContentSource {
        match self {
            PipelineMode::Plain | PipelineMode::Illustrated => ContentSource::Local,
            PipelineMode::Extracted | PipelineMode::ExtractedIllustrated => {
                ContentSource::Extracted
            }
        }
    }

    pub fn synthesizes_background(self) -> bool {
        matches!(
            self,
            PipelineMode::Illustrated | PipelineMode::ExtractedIllustrated
        )
    }

    pub fn needs_backend(self) -> bool {
        self.content_source() == ContentSource::Extracted || self.synthesizes_background()
    }
}

impl FromStr for PipelineMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "plain" => Ok(PipelineMode::Plain),
            "illustrated" => Ok(PipelineMode::Illustrated),
            "extracted" => Ok(PipelineMode::Extracted),
            "extracted-illustrated" => Ok(PipelineMode::ExtractedIllustrated),
            other => Err(format!(
                "unknown pipeline mode '{other}' (expected plain, illustrated, extracted or extracted-illustrated)"
            )),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

/// Process-wide, immutable pipeline shared by every request.
#[derive(Clone)]
pub struct CardPipeline {
    mode: PipelineMode,
    backend: Option<Arc<dyn SynthesisBackend>>,
    compositor: Compositor,
    options: RenderOptions,
    image_size: ImageSize,
    /// Drawn when the mode does not synthesize a background.
    base_background: BackgroundSpec,
}

impl CardPipeline {
    /// Fails with `NotConfigured` when `mode` calls out but no backend is given.
    pub fn new(
        mode: PipelineMode,
        backend: Option<Arc<dyn SynthesisBackend>>,
        compositor: Compositor,
        options: RenderOptions,
    ) -> Result<Self, LlmError> {
        if mode.needs_backend() && backend.is_none() {
            return Err(LlmError::NotConfigured);
        }
        Ok(Self {
            mode,
            backend,
            compositor,
            options,
            image_size: ImageSize::SQUARE_1024,
            base_background: BackgroundSpec::default(),
        })
    }

    /// Replaces the solid white base for modes without background synthesis.
    pub fn with_background(mut self, background: BackgroundSpec) -> Self {
        self.base_background = background;
        self
    }

    pub fn mode(&self) -> PipelineMode {
        self.mode
    }

    /// Runs the configured stages for one request.
    ///
    /// The caller validates the input length first.
    pub async fn generate(&self, request: &RawRequest) -> Result<CardImage, PipelineError> {
        let (content, background) = tokio::join!(
            self.resolve_content(&request.text),
            self.resolve_background(&request.text)
        );
        let content = content?;
        info!(
            "Content resolved: {} points, {} background",
            content.points().len(),
            if background.is_raster() { "raster" } else { "solid" }
        );

        self.compose(content, background).await
    }

    async fn resolve_content(&self, text: &str) -> Result<CardContent, PipelineError> {
        match self.mode.content_source() {
            ContentSource::Local => split_local(text).map_err(|e| {
                PipelineError::ContentParseFailed(UpstreamFailure::diagnostic(e.to_string()))
            }),
            ContentSource::Extracted => {
                let backend = self
                    .backend()
                    .map_err(|e| PipelineError::ContentParseFailed(e.into()))?;
                extract_content(backend, text).await
            }
        }
    }

    /// Stage B with its fallback applied. Never fails.
    async fn resolve_background(&self, text: &str) -> BackgroundSpec {
        if !self.mode.synthesizes_background() {
            return self.base_background.clone();
        }
        match self.synthesize_background(text).await {
            Ok(background) => background,
            Err(e) => {
                warn!("Background synthesis failed, using solid background: {e}");
                BackgroundSpec::default()
            }
        }
    }

    async fn synthesize_background(&self, text: &str) -> Result<BackgroundSpec, PipelineError> {
        let backend = self
            .backend()
            .map_err(|e| PipelineError::PromptSynthesisFailed(e.into()))?;

        let description = backend
            .chat(PROMPT_SYNTHESIS_SYSTEM, text, ResponseFormat::Text)
            .await
            .map_err(|e| PipelineError::PromptSynthesisFailed(e.into()))?;
        let description = description.trim();
        if description.is_empty() {
            return Err(PipelineError::PromptSynthesisFailed(
                UpstreamFailure::diagnostic("model returned a blank description"),
            ));
        }

        let bytes = backend
            .generate_image(&image_prompt(description), self.image_size)
            .await
            .map_err(|e| PipelineError::ImageSynthesisFailed(e.into()))?;

        BackgroundSpec::from_encoded(&bytes).map_err(|e| {
            PipelineError::ImageSynthesisFailed(UpstreamFailure::diagnostic(format!(
                "image payload could not be decoded: {e}"
            )))
        })
    }

    /// Stage C. CPU-bound, so it runs on the blocking pool.
    async fn compose(
        &self,
        content: CardContent,
        background: BackgroundSpec,
    ) -> Result<CardImage, PipelineError> {
        let compositor = self.compositor.clone();
        let options = self.options.clone();
        tokio::task::spawn_blocking(move || compositor.render(&content, background, &options))
            .await
            .map_err(|e| PipelineError::CompositionFailed(format!("render task failed: {e}")))?
            .map_err(|e| PipelineError::CompositionFailed(e.to_string()))
    }

    fn backend(&self) -> Result<&dyn SynthesisBackend, LlmError> {
        self.backend.as_deref().ok_or(LlmError::NotConfigured)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
