//! Wire types for the Instagram Messaging API webhook and send endpoint.

use serde::{Deserialize, Serialize};

// ── Inbound webhook ──────────────────────────────────────────────────────────

/// Top-level webhook body: `{ "object": "instagram", "entry": [...] }`.
#[derive(Debug, Clone, Deserialize)]
pub struct InstagramWebhook {
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEntry {
    pub id: String,
    #[serde(default)]
    pub time: Option<i64>,
    #[serde(default)]
    pub messaging: Vec<MessagingEvent>,
}

/// One messaging event. Reads, reactions, and postbacks arrive without a
/// `message` object and are filtered out before normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagingEvent {
    pub sender: EventParty,
    pub recipient: EventParty,
    /// Epoch seconds.
    pub timestamp: i64,
    #[serde(default)]
    pub message: Option<EventMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventParty {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventMessage {
    pub mid: String,
    #[serde(default)]
    pub text: Option<String>,
    /// Set on messages the business account sent to itself, looped back as
    /// webhook notifications. Never recorded as inbound.
    #[serde(default)]
    pub is_echo: bool,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub is_unsupported: bool,
    #[serde(default)]
    pub attachments: Vec<EventAttachment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventAttachment {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub payload: Option<AttachmentPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentPayload {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

// ── Send API ─────────────────────────────────────────────────────────────────

/// Response from `POST /me/messages`.
///
/// ```json
/// {
///   "recipient_id": "26171369109181060",
///   "message_id": "aWdfZAG1faXRlbToxOklHTWVzc2FnZAUlE..."
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendResponse {
    /// Instagram-scoped id (IGSID) of the recipient.
    pub recipient_id: String,
    /// Instagram message id, the stored external id.
    pub message_id: String,
}
