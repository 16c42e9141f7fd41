//! WhatsApp webhook handling: signature/subscription verification and the
//! pure normalizer from the webhook value object to canonical inbound events.

use std::collections::HashMap;

use {
    hmac::{Hmac, Mac},
    sha2::Sha256,
    tracing::{debug, warn},
};

use parley_common::{InboundEvent, MessageMedia, MessageType};

use crate::types::{WebhookMessage, WhatsAppWebhook};

type HmacSha256 = Hmac<Sha256>;

/// Verify the webhook signature from Meta.
///
/// The signature is sent in the `X-Hub-Signature-256` header as `sha256=<hex>`.
pub fn verify_signature(body: &[u8], signature_header: &str, app_secret: &str) -> bool {
    let expected = match signature_header.strip_prefix("sha256=") {
        Some(hex) => hex,
        None => {
            warn!("invalid signature header format (missing sha256= prefix)");
            return false;
        },
    };

    let mut mac = match HmacSha256::new_from_slice(app_secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => {
            warn!("failed to create HMAC");
            return false;
        },
    };

    mac.update(body);
    let computed = hex::encode(mac.finalize().into_bytes());

    // Constant-time comparison to prevent timing attacks.
    constant_time_eq(&computed, expected)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Verify a webhook subscription (GET request).
///
/// Meta sends `hub.mode=subscribe`, `hub.verify_token=<token>`, and
/// `hub.challenge=<random>`; returns `Some(challenge)` when the token
/// matches the tenant's configured verify token.
pub fn verify_webhook_subscription(
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&str>,
    verify_token: &str,
) -> Option<String> {
    let mode = mode?;
    let token = token?;
    let challenge = challenge?;

    if mode == "subscribe" && token == verify_token {
        Some(challenge.to_string())
    } else {
        None
    }
}

// ── Normalization ────────────────────────────────────────────────────────────

/// Translate a webhook value object into canonical inbound events.
///
/// Pure: no I/O, no clock. A payload with no message entries yields an empty
/// vector; messages with an unparseable timestamp are skipped.
pub fn normalize(payload: &WhatsAppWebhook) -> Vec<InboundEvent> {
    if payload.messages.is_empty() {
        debug!("whatsapp webhook with no messages, skipping");
        return Vec::new();
    }

    // Contact lookup: wa_id → profile name.
    let names: HashMap<&str, &str> = payload
        .contacts
        .iter()
        .filter_map(|c| c.profile.as_ref().map(|p| (c.wa_id.as_str(), p.name.as_str())))
        .collect();

    let mut events = Vec::with_capacity(payload.messages.len());
    for msg in &payload.messages {
        let occurred_at_ms = match msg.timestamp.parse::<i64>() {
            Ok(secs) => secs * 1000,
            Err(_) => {
                warn!(wamid = %msg.id, timestamp = %msg.timestamp, "unparseable message timestamp, skipping");
                continue;
            },
        };

        let message_type = map_message_type(&msg.kind);
        let media = media_for(msg, message_type);

        events.push(InboundEvent {
            sender_external_id: msg.from.clone(),
            display_name: names.get(msg.from.as_str()).map(|n| (*n).to_string()),
            occurred_at_ms,
            message_type,
            body: msg.text.as_ref().map(|t| t.body.clone()),
            media,
            external_message_id: msg.id.clone(),
        });
    }
    events
}

/// Map the Cloud API `type` tag to the internal message type.
pub fn map_message_type(kind: &str) -> MessageType {
    match kind {
        "text" => MessageType::Text,
        "image" => MessageType::Image,
        "audio" => MessageType::Audio,
        "video" => MessageType::Video,
        "document" => MessageType::Document,
        "sticker" => MessageType::Sticker,
        "location" => MessageType::Location,
        "contacts" => MessageType::Contacts,
        "interactive" => MessageType::Interactive,
        "button" => MessageType::Button,
        "reaction" => MessageType::Reaction,
        "order" => MessageType::Order,
        "system" => MessageType::System,
        _ => MessageType::Unknown,
    }
}

/// Media descriptor for the message, only when the classified type actually
/// carries media.
fn media_for(msg: &WebhookMessage, message_type: MessageType) -> Option<MessageMedia> {
    if !message_type.is_media() {
        return None;
    }
    msg.media().map(|raw| MessageMedia {
        whatsapp_media_id: raw.id.clone(),
        mime_type: raw.mime_type.clone(),
        sha256: raw.sha256.clone(),
        caption: raw.caption.clone(),
        filename: raw.filename.clone(),
        ..Default::default()
    })
}
