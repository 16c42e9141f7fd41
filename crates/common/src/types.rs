use serde::{Deserialize, Serialize};

// ── Channels ─────────────────────────────────────────────────────────────────

/// The two supported messaging platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelType {
    #[serde(rename = "WHATSAPP")]
    WhatsApp,
    Instagram,
}

impl ChannelType {
    /// Canonical wire form, as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WhatsApp => "WHATSAPP",
            Self::Instagram => "INSTAGRAM",
        }
    }

    /// Lowercase slug used in filesystem paths and log fields.
    pub fn slug(&self) -> &'static str {
        match self {
            Self::WhatsApp => "whatsapp",
            Self::Instagram => "instagram",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "WHATSAPP" => Some(Self::WhatsApp),
            "INSTAGRAM" => Some(Self::Instagram),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Message enums ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageDirection {
    Inbound,
    Outbound,
}

impl MessageDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "INBOUND",
            Self::Outbound => "OUTBOUND",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INBOUND" => Some(Self::Inbound),
            "OUTBOUND" => Some(Self::Outbound),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
    Failed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "SENT",
            Self::Delivered => "DELIVERED",
            Self::Read => "READ",
            Self::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SENT" => Some(Self::Sent),
            "DELIVERED" => Some(Self::Delivered),
            "READ" => Some(Self::Read),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Unified message types across both channels.
///
/// WhatsApp:  text | image | audio | video | document | sticker | location |
///            contacts | interactive | button | reaction | order | system
/// Instagram: text | image | audio | video | file | reel | share | sticker |
///            postback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Text,
    Image,
    Audio,
    Video,
    Document,
    Sticker,
    Location,
    Contacts,
    Interactive,
    Button,
    Reaction,
    Order,
    Reel,
    Share,
    Postback,
    System,
    Unknown,
}

impl MessageType {
    /// True for the types that carry a downloadable media payload. A media
    /// field arriving on any other classified type is ignored.
    pub fn is_media(&self) -> bool {
        matches!(
            self,
            Self::Image | Self::Audio | Self::Video | Self::Document | Self::Sticker
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Image => "IMAGE",
            Self::Audio => "AUDIO",
            Self::Video => "VIDEO",
            Self::Document => "DOCUMENT",
            Self::Sticker => "STICKER",
            Self::Location => "LOCATION",
            Self::Contacts => "CONTACTS",
            Self::Interactive => "INTERACTIVE",
            Self::Button => "BUTTON",
            Self::Reaction => "REACTION",
            Self::Order => "ORDER",
            Self::Reel => "REEL",
            Self::Share => "SHARE",
            Self::Postback => "POSTBACK",
            Self::System => "SYSTEM",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "TEXT" => Some(Self::Text),
            "IMAGE" => Some(Self::Image),
            "AUDIO" => Some(Self::Audio),
            "VIDEO" => Some(Self::Video),
            "DOCUMENT" => Some(Self::Document),
            "STICKER" => Some(Self::Sticker),
            "LOCATION" => Some(Self::Location),
            "CONTACTS" => Some(Self::Contacts),
            "INTERACTIVE" => Some(Self::Interactive),
            "BUTTON" => Some(Self::Button),
            "REACTION" => Some(Self::Reaction),
            "ORDER" => Some(Self::Order),
            "REEL" => Some(Self::Reel),
            "SHARE" => Some(Self::Share),
            "POSTBACK" => Some(Self::Postback),
            "SYSTEM" => Some(Self::System),
            "UNKNOWN" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Sender ───────────────────────────────────────────────────────────────────

/// Who authored a message. Modeled as a tagged variant so a bot sender
/// cannot carry a stray reference id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Sender {
    #[serde(rename = "CUSTOMER")]
    Customer { id: String },
    #[serde(rename = "USER")]
    User { id: String },
    #[serde(rename = "BOT")]
    Bot,
}

impl Sender {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Customer { .. } => "CUSTOMER",
            Self::User { .. } => "USER",
            Self::Bot => "BOT",
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Customer { id } | Self::User { id } => Some(id),
            Self::Bot => None,
        }
    }
}

// ── Media ────────────────────────────────────────────────────────────────────

/// Unified media descriptor.
///
/// WhatsApp supplies a media id (resolved later against the Cloud API) plus
/// mime type, sha256, caption, and filename; Instagram supplies a direct CDN
/// URL. All fields are optional so the same shape serves either channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMedia {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whatsapp_media_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

// ── Canonical inbound event ──────────────────────────────────────────────────

/// One normalized inbound message, produced by a channel normalizer from a
/// webhook payload. Pure data; resolution and persistence happen downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    /// Channel-issued sender id (wa_id / Instagram-scoped id).
    pub sender_external_id: String,
    /// Display name hint, when the channel provides one.
    pub display_name: Option<String>,
    /// Channel-reported send time, epoch milliseconds. Never the local clock.
    pub occurred_at_ms: i64,
    pub message_type: MessageType,
    pub body: Option<String>,
    pub media: Option<MessageMedia>,
    /// Channel-native message id (wamid / mid), the idempotency key.
    pub external_message_id: String,
}

// ── Clock ────────────────────────────────────────────────────────────────────

/// Current time as epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_type_round_trip() {
        for ch in [ChannelType::WhatsApp, ChannelType::Instagram] {
            assert_eq!(ChannelType::parse(ch.as_str()), Some(ch));
        }
        assert_eq!(ChannelType::parse("SMS"), None);
    }

    #[test]
    fn channel_type_wire_casing() {
        assert_eq!(
            serde_json::to_value(ChannelType::WhatsApp).unwrap(),
            serde_json::json!("WHATSAPP")
        );
        assert_eq!(
            serde_json::to_value(ChannelType::Instagram).unwrap(),
            serde_json::json!("INSTAGRAM")
        );
    }

    #[test]
    fn media_gate_covers_only_downloadable_types() {
        assert!(MessageType::Image.is_media());
        assert!(MessageType::Sticker.is_media());
        assert!(!MessageType::Text.is_media());
        assert!(!MessageType::Reaction.is_media());
        assert!(!MessageType::Share.is_media());
    }

    #[test]
    fn bot_sender_serializes_without_id() {
        let json = serde_json::to_value(Sender::Bot).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "BOT" }));

        let json = serde_json::to_value(Sender::User { id: "u1".into() }).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "USER", "id": "u1" }));
    }

    #[test]
    fn message_type_parse_rejects_unknown_tokens() {
        assert_eq!(MessageType::parse("TEXT"), Some(MessageType::Text));
        assert_eq!(MessageType::parse("text"), None);
    }
}
