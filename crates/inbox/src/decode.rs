//! Discriminated decoding of channel payloads.
//!
//! Detection lives here and nowhere else: a payload is validated against
//! each known channel schema in a fixed order and the first match wins;
//! anything else is unknown. The same applies to outbound acknowledgments.

use tracing::warn;

use parley_common::{ChannelType, InboundEvent};

/// An inbound webhook recognized as one of the two channels.
#[derive(Debug, Clone)]
pub enum InboundWebhook {
    WhatsApp(parley_whatsapp::WhatsAppWebhook),
    Instagram(parley_instagram::InstagramWebhook),
}

impl InboundWebhook {
    /// Decode a raw webhook body.
    ///
    /// WhatsApp payloads carry `messaging_product: "whatsapp"`; Instagram
    /// payloads carry `object: "instagram"`. Detection is mutually
    /// exclusive; payloads matching neither signature (or failing their
    /// channel's schema) return `None` and are dropped by the caller.
    pub fn decode(value: &serde_json::Value) -> Option<Self> {
        if value.get("messaging_product").and_then(|v| v.as_str()) == Some("whatsapp") {
            return match serde_json::from_value(value.clone()) {
                Ok(payload) => Some(Self::WhatsApp(payload)),
                Err(e) => {
                    warn!(error = %e, "payload matched whatsapp signature but failed schema");
                    None
                },
            };
        }
        if value.get("object").and_then(|v| v.as_str()) == Some("instagram") {
            return match serde_json::from_value(value.clone()) {
                Ok(payload) => Some(Self::Instagram(payload)),
                Err(e) => {
                    warn!(error = %e, "payload matched instagram signature but failed schema");
                    None
                },
            };
        }
        None
    }

    pub fn channel(&self) -> ChannelType {
        match self {
            Self::WhatsApp(_) => ChannelType::WhatsApp,
            Self::Instagram(_) => ChannelType::Instagram,
        }
    }

    /// Run the matching channel's pure normalizer.
    pub fn normalize(&self) -> Vec<InboundEvent> {
        match self {
            Self::WhatsApp(payload) => parley_whatsapp::normalize(payload),
            Self::Instagram(payload) => parley_instagram::normalize(payload),
        }
    }
}

/// A Graph API send acknowledgment recognized as one of the two channels.
///
/// Instagram acks are `{ recipient_id, message_id }`; WhatsApp acks carry
/// `messaging_product` with `contacts[]`/`messages[]`.
#[derive(Debug, Clone)]
pub enum SendAck {
    WhatsApp(parley_whatsapp::SendResponse),
    Instagram(parley_instagram::SendResponse),
}

impl SendAck {
    pub fn decode(value: &serde_json::Value) -> Option<Self> {
        if value.get("recipient_id").is_some() {
            return serde_json::from_value(value.clone())
                .map(Self::Instagram)
                .map_err(|e| warn!(error = %e, "malformed instagram send ack"))
                .ok();
        }
        if value.get("messaging_product").and_then(|v| v.as_str()) == Some("whatsapp") {
            return serde_json::from_value(value.clone())
                .map(Self::WhatsApp)
                .map_err(|e| warn!(error = %e, "malformed whatsapp send ack"))
                .ok();
        }
        None
    }

    pub fn channel(&self) -> ChannelType {
        match self {
            Self::WhatsApp(_) => ChannelType::WhatsApp,
            Self::Instagram(_) => ChannelType::Instagram,
        }
    }

    /// External id of the recipient the message was delivered to. `None`
    /// for a WhatsApp ack with an empty contacts array — a hard error for
    /// the caller, since there is nobody to attribute the message to.
    pub fn recipient_external_id(&self) -> Option<&str> {
        match self {
            Self::WhatsApp(ack) => ack.recipient_wa_id(),
            Self::Instagram(ack) => Some(&ack.recipient_id),
        }
    }

    /// Channel-native id assigned to the sent message.
    pub fn message_id(&self) -> Option<&str> {
        match self {
            Self::WhatsApp(ack) => ack.message_id(),
            Self::Instagram(ack) => Some(&ack.message_id),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whatsapp_webhook_is_detected() {
        let value = serde_json::json!({
            "messaging_product": "whatsapp",
            "messages": [],
            "field": "messages"
        });
        let decoded = InboundWebhook::decode(&value).unwrap();
        assert_eq!(decoded.channel(), ChannelType::WhatsApp);
    }

    #[test]
    fn instagram_webhook_is_detected() {
        let value = serde_json::json!({ "object": "instagram", "entry": [] });
        let decoded = InboundWebhook::decode(&value).unwrap();
        assert_eq!(decoded.channel(), ChannelType::Instagram);
    }

    #[test]
    fn detection_is_mutually_exclusive() {
        // A whatsapp-marked payload never routes to the instagram schema,
        // even when it also carries an object field.
        let value = serde_json::json!({
            "messaging_product": "whatsapp",
            "object": "instagram",
            "messages": []
        });
        assert!(matches!(
            InboundWebhook::decode(&value),
            Some(InboundWebhook::WhatsApp(_))
        ));
    }

    #[test]
    fn foreign_payload_is_unknown() {
        assert!(InboundWebhook::decode(&serde_json::json!({ "object": "page" })).is_none());
        assert!(InboundWebhook::decode(&serde_json::json!({ "hello": "world" })).is_none());
        assert!(InboundWebhook::decode(&serde_json::json!(null)).is_none());
    }

    #[test]
    fn instagram_ack_is_detected_by_recipient_id() {
        let value = serde_json::json!({ "recipient_id": "26171", "message_id": "mid.1" });
        let ack = SendAck::decode(&value).unwrap();
        assert_eq!(ack.channel(), ChannelType::Instagram);
        assert_eq!(ack.recipient_external_id(), Some("26171"));
        assert_eq!(ack.message_id(), Some("mid.1"));
    }

    #[test]
    fn whatsapp_ack_is_detected_by_messaging_product() {
        let value = serde_json::json!({
            "messaging_product": "whatsapp",
            "contacts": [{ "input": "584147083834", "wa_id": "584147083834" }],
            "messages": [{ "id": "wamid.out" }]
        });
        let ack = SendAck::decode(&value).unwrap();
        assert_eq!(ack.channel(), ChannelType::WhatsApp);
        assert_eq!(ack.recipient_external_id(), Some("584147083834"));
        assert_eq!(ack.message_id(), Some("wamid.out"));
    }

    #[test]
    fn whatsapp_ack_with_empty_contacts_has_no_recipient() {
        let value = serde_json::json!({
            "messaging_product": "whatsapp",
            "contacts": [],
            "messages": [{ "id": "wamid.out" }]
        });
        let ack = SendAck::decode(&value).unwrap();
        assert_eq!(ack.recipient_external_id(), None);
    }

    #[test]
    fn unknown_ack_shape_is_rejected() {
        assert!(SendAck::decode(&serde_json::json!({ "ok": true })).is_none());
    }
}
