//! Wire types for the WhatsApp Cloud API.
//!
//! The inbound shape is the n8n-flattened webhook: the Cloud API `value`
//! object delivered directly (with `field` hoisted alongside it) instead of
//! wrapped in `{ object, entry[{ changes[] }] }`.

use serde::{Deserialize, Serialize};

// ── Inbound webhook ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct WhatsAppWebhook {
    pub messaging_product: String,
    #[serde(default)]
    pub metadata: Option<WebhookMetadata>,
    #[serde(default)]
    pub contacts: Vec<WebhookContact>,
    #[serde(default)]
    pub messages: Vec<WebhookMessage>,
    #[serde(default)]
    pub field: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookMetadata {
    #[serde(default)]
    pub display_phone_number: Option<String>,
    pub phone_number_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookContact {
    pub wa_id: String,
    #[serde(default)]
    pub profile: Option<WebhookProfile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookProfile {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookMessage {
    pub from: String,
    pub id: String,
    /// Epoch seconds, delivered as a string.
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<WebhookText>,
    #[serde(default)]
    pub image: Option<WebhookMedia>,
    #[serde(default)]
    pub audio: Option<WebhookMedia>,
    #[serde(default)]
    pub video: Option<WebhookMedia>,
    #[serde(default)]
    pub document: Option<WebhookMedia>,
    #[serde(default)]
    pub sticker: Option<WebhookMedia>,
}

impl WebhookMessage {
    /// The media object matching the message's declared type, if any.
    pub fn media(&self) -> Option<&WebhookMedia> {
        self.image
            .as_ref()
            .or(self.audio.as_ref())
            .or(self.video.as_ref())
            .or(self.document.as_ref())
            .or(self.sticker.as_ref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookText {
    pub body: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookMedia {
    /// Cloud API media id, exchanged later for a signed download URL.
    pub id: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

// ── Send API ─────────────────────────────────────────────────────────────────

/// Response from `POST /{phone_number_id}/messages`.
///
/// ```json
/// {
///   "messaging_product": "whatsapp",
///   "contacts": [{ "input": "584147083834", "wa_id": "584147083834" }],
///   "messages": [{ "id": "wamid.HBgM..." }]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendResponse {
    #[serde(default)]
    pub messaging_product: Option<String>,
    #[serde(default)]
    pub contacts: Vec<SendResponseContact>,
    #[serde(default)]
    pub messages: Vec<SendResponseMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendResponseContact {
    #[serde(default)]
    pub input: Option<String>,
    pub wa_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendResponseMessage {
    pub id: String,
}

impl SendResponse {
    /// The wa_id the message was delivered to.
    pub fn recipient_wa_id(&self) -> Option<&str> {
        self.contacts.first().map(|c| c.wa_id.as_str())
    }

    /// The wamid assigned to the sent message.
    pub fn message_id(&self) -> Option<&str> {
        self.messages.first().map(|m| m.id.as_str())
    }
}
