pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::generation::handlers;
use crate::messaging::webhook;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::root_handler))
        .route("/health", get(health::health_handler))
        // Card API
        .route("/api/v1/cards", post(handlers::handle_generate_card))
        .route("/ai-generate-image", post(handlers::handle_generate_card))
        // Chat webhook
        .route(
            "/webhook",
            get(webhook::handle_verify).post(webhook::handle_inbound),
        )
        .with_state(state)
}
