use std::sync::Arc;

use crate::config::Config;
use crate::generation::CardPipeline;
use crate::messaging::MessagingPlatform;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Built once at startup; holds the font registry and the synthesis backend.
    pub pipeline: Arc<CardPipeline>,
    /// `None` unless the WhatsApp variables are configured.
    pub messenger: Option<Arc<dyn MessagingPlatform>>,
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub(crate) fn test_config() -> Config {
        Config::from_lookup(|_| None).expect("default config is valid")
    }

    pub(crate) fn test_state(
        pipeline: CardPipeline,
        messenger: Option<Arc<dyn MessagingPlatform>>,
    ) -> AppState {
        AppState {
            config: test_config(),
            pipeline: Arc::new(pipeline),
            messenger,
        }
    }
}
