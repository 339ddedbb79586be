use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::generation::PipelineMode;
use crate::llm_client::DEFAULT_BASE_URL;

pub const DEFAULT_GRAPH_API_BASE: &str = "https://graph.facebook.com/v19.0";

/// Application configuration loaded from environment variables.
/// Startup fails if a variable is malformed or the mode needs a missing key.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub pipeline_mode: PipelineMode,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub chat_model: String,
    pub image_model: String,
    pub upstream_timeout: Duration,
    pub font_path: PathBuf,
    pub min_text_chars: usize,
    pub card_footer: Option<String>,
    /// Static background image for modes that do not synthesize one.
    pub card_background: Option<PathBuf>,
    /// When set, every generated card is also written here.
    pub card_output_dir: Option<PathBuf>,
    /// Present only when all three WhatsApp variables are set.
    pub whatsapp: Option<WhatsAppConfig>,
}

#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    pub token: String,
    pub phone_number_id: String,
    pub verify_token: String,
    pub graph_api_base: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let pipeline_mode = match get("PIPELINE_MODE") {
            Some(raw) => raw
                .parse::<PipelineMode>()
                .map_err(anyhow::Error::msg)
                .context("PIPELINE_MODE is invalid")?,
            None => PipelineMode::default(),
        };

        let openai_api_key = get("OPENAI_API_KEY");
        if pipeline_mode.needs_backend() && openai_api_key.is_none() {
            bail!(
                "PIPELINE_MODE '{}' calls the AI provider but OPENAI_API_KEY is not set",
                pipeline_mode.as_str()
            );
        }

        let whatsapp = match (
            get("WHATSAPP_TOKEN"),
            get("WHATSAPP_PHONE_NUMBER_ID"),
            get("WHATSAPP_VERIFY_TOKEN"),
        ) {
            (Some(token), Some(phone_number_id), Some(verify_token)) => Some(WhatsAppConfig {
                token,
                phone_number_id,
                verify_token,
                graph_api_base: or("GRAPH_API_BASE", DEFAULT_GRAPH_API_BASE),
            }),
            (None, None, None) => None,
            _ => bail!(
                "WHATSAPP_TOKEN, WHATSAPP_PHONE_NUMBER_ID and WHATSAPP_VERIFY_TOKEN must be set together"
            ),
        };

        Ok(Config {
            port: or("PORT", "10000")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: or("RUST_LOG", "info"),
            pipeline_mode,
            openai_api_key,
            openai_base_url: or("OPENAI_BASE_URL", DEFAULT_BASE_URL),
            chat_model: or("CHAT_MODEL", "gpt-4o-mini"),
            image_model: or("IMAGE_MODEL", "gpt-image-1"),
            upstream_timeout: Duration::from_secs(
                or("UPSTREAM_TIMEOUT_SECS", "30")
                    .parse::<u64>()
                    .context("UPSTREAM_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
            font_path: PathBuf::from(or("FONT_PATH", "./fonts/NotoSansTamil-Regular.ttf")),
            min_text_chars: or("MIN_TEXT_CHARS", "10")
                .parse::<usize>()
                .context("MIN_TEXT_CHARS must be a non-negative integer")?,
            card_footer: get("CARD_FOOTER"),
            card_background: get("CARD_BACKGROUND").map(PathBuf::from),
            card_output_dir: get("CARD_OUTPUT_DIR").map(PathBuf::from),
            whatsapp,
        })
    }
}
