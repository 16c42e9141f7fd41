//! Pure normalizer from Instagram webhook entries to canonical inbound
//! events.

use tracing::debug;

use parley_common::{InboundEvent, MessageMedia, MessageType};

use crate::types::{EventMessage, InstagramWebhook};

/// Translate a webhook body into canonical inbound events.
///
/// Echo events (the business account's own messages looping back) and
/// events without an attached message (reads, reactions, postbacks) are
/// filtered out. An entry with no messaging events yields nothing.
pub fn normalize(payload: &InstagramWebhook) -> Vec<InboundEvent> {
    let mut events = Vec::new();

    for entry in &payload.entry {
        for event in &entry.messaging {
            let Some(message) = &event.message else {
                debug!(entry = %entry.id, "instagram event without message, skipping");
                continue;
            };
            if message.is_echo {
                debug!(mid = %message.mid, "instagram echo event, skipping");
                continue;
            }

            let message_type = classify(message);
            let media = media_for(message, message_type);

            events.push(InboundEvent {
                sender_external_id: event.sender.id.clone(),
                // Instagram webhooks carry no profile name.
                display_name: None,
                occurred_at_ms: event.timestamp * 1000,
                message_type,
                body: message.text.clone(),
                media,
                external_message_id: message.mid.clone(),
            });
        }
    }
    events
}

/// Classify from the first attachment's type; text-only messages with a
/// nonempty body are TEXT, anything else is UNKNOWN.
fn classify(message: &EventMessage) -> MessageType {
    if let Some(kind) = message
        .attachments
        .first()
        .and_then(|a| a.kind.as_deref())
    {
        return map_attachment_type(kind);
    }
    match message.text.as_deref() {
        Some(text) if !text.is_empty() => MessageType::Text,
        _ => MessageType::Unknown,
    }
}

/// Map an Instagram attachment type to the internal message type.
pub fn map_attachment_type(kind: &str) -> MessageType {
    match kind {
        "image" => MessageType::Image,
        "audio" => MessageType::Audio,
        "video" => MessageType::Video,
        "file" => MessageType::Document,
        "reel" | "ig_reel" => MessageType::Reel,
        "share" => MessageType::Share,
        "like_heart" => MessageType::Sticker,
        _ => MessageType::Unknown,
    }
}

fn media_for(message: &EventMessage, message_type: MessageType) -> Option<MessageMedia> {
    if !message_type.is_media() {
        return None;
    }
    let url = message
        .attachments
        .first()
        .and_then(|a| a.payload.as_ref())
        .and_then(|p| p.url.clone())?;
    Some(MessageMedia {
        url: Some(url),
        ..Default::default()
    })
}
