//! Chat-platform delivery: inbound webhook parsing and outbound media/messages.
//!
//! `MessagingPlatform` is the seam; `WhatsAppClient` talks to the Graph API.

pub mod webhook;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{multipart, Client};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::WhatsAppConfig;

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Platform request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Platform API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse platform response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Platform response carried no {0} id")]
    MissingId(&'static str),
}

/// Identifier of an uploaded media object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaId(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub message_id: String,
}

#[async_trait]
pub trait MessagingPlatform: Send + Sync {
    async fn upload_media(&self, png: Bytes) -> Result<MediaId, MessagingError>;

    async fn send_image(&self, to: &str, media: &MediaId) -> Result<DeliveryReceipt, MessagingError>;

    async fn send_text(&self, to: &str, body: &str) -> Result<DeliveryReceipt, MessagingError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Graph API wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct OutboundMessage<'a> {
    messaging_product: &'static str,
    recipient_type: &'static str,
    to: &'a str,
    #[serde(flatten)]
    body: OutboundBody<'a>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum OutboundBody<'a> {
    Image { image: MediaRef<'a> },
    Text { text: TextBody<'a> },
}

#[derive(Debug, Serialize)]
struct MediaRef<'a> {
    id: &'a str,
}

#[derive(Debug, Serialize)]
struct TextBody<'a> {
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GraphErrorEnvelope {
    error: GraphErrorBody,
}

#[derive(Debug, Deserialize)]
struct GraphErrorBody {
    message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct WhatsAppClient {
    client: Client,
    config: WhatsAppConfig,
    timeout: Duration,
}

impl WhatsAppClient {
    pub fn new(config: WhatsAppConfig, timeout: Duration) -> Result<Self, MessagingError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            config,
            timeout,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.graph_api_base.trim_end_matches('/'),
            self.config.phone_number_id,
            endpoint
        )
    }

    /// Sends once and returns the successful response body as text.
    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<String, MessagingError> {
        let response = request
            .bearer_auth(&self.config.token)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            let message = serde_json::from_str::<GraphErrorEnvelope>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(MessagingError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(text)
    }

    async fn send(&self, to: &str, body: OutboundBody<'_>) -> Result<DeliveryReceipt, MessagingError> {
        let message = OutboundMessage {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to,
            body,
        };
        let text = self
            .execute(self.client.post(self.url("messages")).json(&message))
            .await?;
        let response: SendResponse = serde_json::from_str(&text)?;

        response
            .messages
            .into_iter()
            .next()
            .map(|m| DeliveryReceipt { message_id: m.id })
            .ok_or(MessagingError::MissingId("message"))
    }

    fn transport_error(&self, e: reqwest::Error) -> MessagingError {
        if e.is_timeout() {
            MessagingError::Timeout {
                secs: self.timeout.as_secs(),
            }
        } else {
            MessagingError::Http(e)
        }
    }
}

#[async_trait]
impl MessagingPlatform for WhatsAppClient {
    async fn upload_media(&self, png: Bytes) -> Result<MediaId, MessagingError> {
        let file = multipart::Part::bytes(png.to_vec())
            .file_name("card.png")
            .mime_str("image/png")?;
        let form = multipart::Form::new()
            .text("messaging_product", "whatsapp")
            .text("type", "image/png")
            .part("file", file);

        let text = self
            .execute(self.client.post(self.url("media")).multipart(form))
            .await?;
        let response: UploadResponse = serde_json::from_str(&text)?;

        let id = response.id.ok_or(MessagingError::MissingId("media"))?;
        debug!("Uploaded card media {id}");
        Ok(MediaId(id))
    }

    async fn send_image(&self, to: &str, media: &MediaId) -> Result<DeliveryReceipt, MessagingError> {
        self.send(to, OutboundBody::Image {
            image: MediaRef { id: &media.0 },
        })
        .await
    }

    async fn send_text(&self, to: &str, body: &str) -> Result<DeliveryReceipt, MessagingError> {
        self.send(to, OutboundBody::Text {
            text: TextBody { body },
        })
        .await
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
