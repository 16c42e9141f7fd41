//! Domain records for customers, conversations, and messages, plus the
//! request shapes accepted by the dispatch endpoints.

use serde::{Deserialize, Serialize};

use parley_common::{
    ChannelType, MessageDirection, MessageMedia, MessageStatus, MessageType, Sender, now_ms,
};

// ── Customer ─────────────────────────────────────────────────────────────────

/// One customer per (tenant, channel identity). A person reaching out on
/// both channels is two customer records, one per identity.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub tenant_id: String,
    pub display_name: String,
    /// wa_id; exactly one of this and `instagram_id` is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whatsapp_id: Option<String>,
    /// Instagram-scoped account id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instagram_id: Option<String>,
    pub is_blocked: bool,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl Customer {
    /// Fresh customer for a channel identity; the display name falls back to
    /// the external id when the channel gave no hint.
    pub fn for_identity(
        tenant_id: &str,
        channel: ChannelType,
        external_id: &str,
        display_name: Option<&str>,
    ) -> Self {
        let now = now_ms();
        let (whatsapp_id, instagram_id) = match channel {
            ChannelType::WhatsApp => (Some(external_id.to_string()), None),
            ChannelType::Instagram => (None, Some(external_id.to_string())),
        };
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            display_name: display_name.unwrap_or(external_id).to_string(),
            whatsapp_id,
            instagram_id,
            is_blocked: false,
            created_at_ms: now,
            updated_at_ms: now,
        }
    }

    /// The channel identity this record belongs to.
    pub fn external_id(&self, channel: ChannelType) -> Option<&str> {
        match channel {
            ChannelType::WhatsApp => self.whatsapp_id.as_deref(),
            ChannelType::Instagram => self.instagram_id.as_deref(),
        }
    }
}

// ── Conversation ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationStatus {
    Open,
    Pending,
    Closed,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Pending => "PENDING",
            Self::Closed => "CLOSED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(Self::Open),
            "PENDING" => Some(Self::Pending),
            "CLOSED" => Some(Self::Closed),
            _ => None,
        }
    }

    /// Open and pending conversations both count as the customer's single
    /// active thread on a channel.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Open | Self::Pending)
    }
}

/// One thread per (tenant, customer, channel). The summary fields
/// (`last_message*`, `unread_count`, `bot_enabled`) are a cache over the
/// message stream, mutated via atomic single-row updates.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub tenant_id: String,
    pub customer_id: String,
    pub channel: ChannelType,
    pub status: ConversationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_at_ms: Option<i64>,
    pub unread_count: i64,
    pub bot_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_disabled_at_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_at_ms: Option<i64>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl Conversation {
    /// Fresh open conversation with the bot enabled and nothing read.
    pub fn open(tenant_id: &str, customer_id: &str, channel: ChannelType) -> Self {
        let now = now_ms();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            customer_id: customer_id.to_string(),
            channel,
            status: ConversationStatus::Open,
            last_message_id: None,
            last_message_at_ms: None,
            unread_count: 0,
            bot_enabled: true,
            bot_disabled_at_ms: None,
            read_at_ms: None,
            created_at_ms: now,
            updated_at_ms: now,
        }
    }
}

// ── Message ──────────────────────────────────────────────────────────────────

/// Immutable once created; delivery-status transitions live outside this
/// core.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub tenant_id: String,
    pub conversation_id: String,
    pub channel: ChannelType,
    pub direction: MessageDirection,
    pub message_type: MessageType,
    pub sender: Sender,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<MessageMedia>,
    /// Channel-native id (wamid / mid); the idempotency key when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub status: MessageStatus,
    pub sent_at_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_at_ms: Option<i64>,
    pub created_at_ms: i64,
}

// ── Request shapes ───────────────────────────────────────────────────────────

/// Agent-authored send, from the UI. Tenant and sender identity come from
/// the session context, never from the client body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub conversation_id: String,
    pub message_type: MessageType,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub media: Option<MessageMedia>,
}

/// Registration of a message a bot already delivered through the Graph API.
/// `meta_response` is the verbatim channel acknowledgment; the channel is
/// detected from its shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotResponseRequest {
    /// Tenant identifier — canonical id or slug.
    pub tenant_id: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub message_type: Option<MessageType>,
    #[serde(default)]
    pub media: Option<MessageMedia>,
    pub meta_response: serde_json::Value,
}
