//! Chat-webhook routes: subscription handshake and inbound message processing.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::{error, info, info_span, warn, Instrument};

use crate::errors::AppError;
use crate::generation::handlers::{generate_card, GeneratedCard};
use crate::messaging::{DeliveryReceipt, MessagingError, MessagingPlatform};
use crate::state::AppState;

/// Reply sent when generation fails for a reason other than invalid input.
pub const GENERATION_FAILED_REPLY: &str =
    "Sorry, the card could not be generated right now. Please try again later.";

// ────────────────────────────────────────────────────────────────────────────
// Payload types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Notification envelope: `entry[].changes[].value.messages[]`.
#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookChange {
    #[serde(default)]
    pub value: ChangeValue,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub messages: Vec<PlatformMessage>,
}

#[derive(Debug, Deserialize)]
pub struct PlatformMessage {
    pub from: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub text: Option<PlatformText>,
}

#[derive(Debug, Deserialize)]
pub struct PlatformText {
    pub body: String,
}

/// One inbound text message worth answering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundChat {
    pub sender: String,
    pub text: String,
}

impl WebhookPayload {
    /// Every text message in the envelope, in order. Other kinds are skipped.
    pub fn text_messages(self) -> Vec<InboundChat> {
        self.entry
            .into_iter()
            .flat_map(|entry| entry.changes)
            .flat_map(|change| change.value.messages)
            .filter(|message| message.kind == "text")
            .filter_map(|message| {
                message.text.map(|text| InboundChat {
                    sender: message.from,
                    text: text.body,
                })
            })
            .collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /webhook
///
/// Echoes `hub.challenge` when the subscription request carries our token.
pub async fn handle_verify(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> Result<String, AppError> {
    let whatsapp = state
        .config
        .whatsapp
        .as_ref()
        .ok_or_else(|| AppError::NotConfigured("Chat webhook is not configured".to_string()))?;

    let subscribed = params.mode.as_deref() == Some("subscribe")
        && params.verify_token.as_deref() == Some(whatsapp.verify_token.as_str());

    match (subscribed, params.challenge) {
        (true, Some(challenge)) => {
            info!("Webhook subscription verified");
            Ok(challenge)
        }
        _ => {
            warn!("Webhook verification rejected");
            Err(AppError::Forbidden)
        }
    }
}

/// POST /webhook
///
/// Acknowledges at once; each text message is processed on its own task.
pub async fn handle_inbound(
    State(state): State<AppState>,
    payload: Result<Json<WebhookPayload>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let messenger = state
        .messenger
        .clone()
        .ok_or_else(|| AppError::NotConfigured("Chat webhook is not configured".to_string()))?;
    let Json(payload) = payload.map_err(|e| AppError::Validation(e.body_text()))?;

    let chats = payload.text_messages();
    info!("Webhook delivered {} text message(s)", chats.len());

    for chat in chats {
        tokio::spawn(process_inbound(state.clone(), messenger.clone(), chat));
    }

    Ok(StatusCode::OK)
}

// ────────────────────────────────────────────────────────────────────────────
// Processing
// ────────────────────────────────────────────────────────────────────────────

/// Generates a card for one message and sends it back, or a text reply on failure.
pub async fn process_inbound(
    state: AppState,
    messenger: Arc<dyn MessagingPlatform>,
    chat: InboundChat,
) {
    let span = info_span!("inbound_chat", sender = %chat.sender);

    async move {
        let reply = match generate_card(&state, &chat.text).await {
            Ok(generated) => match deliver_card(messenger.as_ref(), &chat.sender, generated).await {
                Ok(receipt) => {
                    info!("Card delivered as {}", receipt.message_id);
                    return;
                }
                Err(e) => {
                    error!("Card delivery failed: {e}");
                    GENERATION_FAILED_REPLY.to_string()
                }
            },
            Err(AppError::Validation(message)) => message,
            Err(e) => {
                error!("Card generation failed: {e}");
                GENERATION_FAILED_REPLY.to_string()
            }
        };

        if let Err(e) = messenger.send_text(&chat.sender, &reply).await {
            error!("Failure reply could not be sent: {e}");
        }
    }
    .instrument(span)
    .await
}

async fn deliver_card(
    messenger: &dyn MessagingPlatform,
    to: &str,
    generated: GeneratedCard,
) -> Result<DeliveryReceipt, MessagingError> {
    let media = messenger.upload_media(generated.card.png).await?;
    messenger.send_image(to, &media).await
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::Request,
        routing::get,
        Router,
    };
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::config::WhatsAppConfig;
    use crate::generation::test_support::{pipeline, FakeBackend};
    use crate::generation::PipelineMode;
    use crate::messaging::test_support::{FakeMessenger, Sent};
    use crate::state::test_support::test_state;

    const SAMPLE: &str = "தமிழக அரசு புதிய அறிவிப்பு\nபுதிய விதிமுறை அமல்\nஜனவரி 10 முதல் அமல்";

    fn configured_state(messenger: Option<Arc<dyn MessagingPlatform>>) -> AppState {
        let mut state = test_state(pipeline(PipelineMode::Plain, None), messenger);
        state.config.whatsapp = Some(WhatsAppConfig {
            token: "token".to_string(),
            phone_number_id: "42".to_string(),
            verify_token: "s3cret".to_string(),
            graph_api_base: "http://127.0.0.1:9".to_string(),
        });
        state
    }

    fn app(state: AppState) -> Router {
        Router::new()
            .route("/webhook", get(handle_verify).post(handle_inbound))
            .with_state(state)
    }

    fn chat(text: &str) -> InboundChat {
        InboundChat {
            sender: "919900000000".to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_text_messages_extracts_only_text() {
        let payload: WebhookPayload = serde_json::from_value(json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "1",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messages": [
                            { "from": "111", "type": "text", "text": { "body": "முதல் செய்தி" } },
                            { "from": "222", "type": "image", "image": { "id": "x" } },
                            { "from": "333", "type": "text", "text": { "body": "second" } }
                        ]
                    }
                }, {
                    "field": "messages",
                    "value": { "statuses": [{ "id": "s" }] }
                }]
            }]
        }))
        .unwrap();

        assert_eq!(
            payload.text_messages(),
            vec![
                InboundChat {
                    sender: "111".to_string(),
                    text: "முதல் செய்தி".to_string()
                },
                InboundChat {
                    sender: "333".to_string(),
                    text: "second".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_verify_echoes_challenge() {
        let response = app(configured_state(None))
            .oneshot(
                Request::get("/webhook?hub.mode=subscribe&hub.verify_token=s3cret&hub.challenge=1158201444")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"1158201444");
    }

    #[tokio::test]
    async fn test_verify_rejects_wrong_token() {
        let response = app(configured_state(None))
            .oneshot(
                Request::get("/webhook?hub.mode=subscribe&hub.verify_token=nope&hub.challenge=1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_webhook_not_configured_is_503() {
        let state = test_state(pipeline(PipelineMode::Plain, None), None);
        let response = app(state)
            .oneshot(
                Request::post("/webhook")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"entry": []}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_inbound_acknowledges_immediately() {
        let messenger = Arc::new(FakeMessenger::default());
        let state = configured_state(Some(messenger as Arc<dyn MessagingPlatform>));
        let response = app(state)
            .oneshot(
                Request::post("/webhook")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"object": "whatsapp_business_account", "entry": []}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_inbound_malformed_body_uses_error_envelope() {
        let messenger = Arc::new(FakeMessenger::default());
        let state = configured_state(Some(messenger.clone() as Arc<dyn MessagingPlatform>));
        let response = app(state)
            .oneshot(
                Request::post("/webhook")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn test_process_inbound_uploads_then_sends_image() {
        let messenger = Arc::new(FakeMessenger::default());
        let state = configured_state(Some(messenger.clone() as Arc<dyn MessagingPlatform>));

        process_inbound(state, messenger.clone(), chat(SAMPLE)).await;

        let sent = messenger.sent();
        assert_eq!(sent.len(), 2);
        assert!(matches!(sent[0], Sent::Media(len) if len > 0));
        assert_eq!(
            sent[1],
            Sent::Image {
                to: "919900000000".to_string(),
                media: "media-1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_process_inbound_short_text_replies_with_reason() {
        let messenger = Arc::new(FakeMessenger::default());
        let state = configured_state(Some(messenger.clone() as Arc<dyn MessagingPlatform>));

        process_inbound(state, messenger.clone(), chat("hi")).await;

        match messenger.sent().as_slice() {
            [Sent::Text { to, body }] => {
                assert_eq!(to, "919900000000");
                assert!(body.contains("at least 10 characters"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_process_inbound_pipeline_failure_replies_with_apology() {
        let backend = Arc::new(FakeBackend::default().with_chat_json("not json"));
        let messenger = Arc::new(FakeMessenger::default());
        let mut state = configured_state(Some(messenger.clone() as Arc<dyn MessagingPlatform>));
        state.pipeline = Arc::new(pipeline(PipelineMode::Extracted, Some(backend)));

        process_inbound(state, messenger.clone(), chat(SAMPLE)).await;

        assert_eq!(
            messenger.sent(),
            vec![Sent::Text {
                to: "919900000000".to_string(),
                body: GENERATION_FAILED_REPLY.to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_process_inbound_upload_failure_replies_with_apology() {
        let messenger = Arc::new(FakeMessenger {
            fail_upload: true,
            ..Default::default()
        });
        let state = configured_state(Some(messenger.clone() as Arc<dyn MessagingPlatform>));

        process_inbound(state, messenger.clone(), chat(SAMPLE)).await;

        assert!(matches!(
            messenger.sent().as_slice(),
            [Sent::Text { body, .. }] if body == GENERATION_FAILED_REPLY
        ));
    }
}
