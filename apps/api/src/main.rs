mod artifacts;
mod config;
mod errors;
mod generation;
mod layout;
mod llm_client;
mod messaging;
mod models;
mod render;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::generation::CardPipeline;
use crate::layout::FontRegistry;
use crate::llm_client::{OpenAiClient, OpenAiSettings, SynthesisBackend};
use crate::messaging::{MessagingPlatform, WhatsAppClient};
use crate::render::{BackgroundSpec, Compositor, RenderOptions, Rgb};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Tamil card API v{}", env!("CARGO_PKG_VERSION"));

    // Load the card font once; every request shares it
    let fonts = FontRegistry::load(&config.font_path)
        .with_context(|| format!("Failed to load font from {}", config.font_path.display()))?
        .with_system_fallback();
    info!("Font loaded: family '{}'", fonts.family());
    if !fonts.has_glyph('•') {
        warn!("Font '{}' has no bullet glyph; a system font will draw it", fonts.family());
    }

    // Initialize the synthesis backend when a key is present
    let backend: Option<Arc<dyn SynthesisBackend>> = match &config.openai_api_key {
        Some(api_key) => {
            let client = OpenAiClient::new(OpenAiSettings {
                api_key: api_key.clone(),
                base_url: config.openai_base_url.clone(),
                chat_model: config.chat_model.clone(),
                image_model: config.image_model.clone(),
                timeout: config.upstream_timeout,
            })?;
            info!(
                "Synthesis client initialized (chat: {}, image: {})",
                config.chat_model, config.image_model
            );
            Some(Arc::new(client) as Arc<dyn SynthesisBackend>)
        }
        None => None,
    };

    let options = RenderOptions {
        footer: config.card_footer.clone(),
        ..RenderOptions::default()
    };
    let mut pipeline = CardPipeline::new(
        config.pipeline_mode,
        backend,
        Compositor::new(Arc::new(fonts)),
        options,
    )?;
    if let Some(path) = &config.card_background {
        pipeline = pipeline.with_background(BackgroundSpec::from_file(path, Rgb::WHITE));
        info!("Static background: {}", path.display());
    }
    info!("Pipeline mode: {}", pipeline.mode().as_str());

    // Initialize the chat platform client when the webhook is configured
    let messenger: Option<Arc<dyn MessagingPlatform>> = match &config.whatsapp {
        Some(whatsapp) => {
            let client = WhatsAppClient::new(whatsapp.clone(), config.upstream_timeout)?;
            info!("Chat webhook enabled");
            Some(Arc::new(client) as Arc<dyn MessagingPlatform>)
        }
        None => {
            warn!("WhatsApp variables not set; webhook routes will answer 503");
            None
        }
    };

    // Build app state
    let state = AppState {
        config: config.clone(),
        pipeline: Arc::new(pipeline),
        messenger,
    };

    // Build router
    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
