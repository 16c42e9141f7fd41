//! Real-time fan-out seam.
//!
//! The core is the exclusive producer of these events; the gateway provides
//! the WebSocket transport. Emission is best-effort, at-most-once: an
//! implementation never returns an error and never blocks the persistence
//! path.

use {async_trait::async_trait, serde::Serialize};

use crate::types::{Conversation, Message};

/// Events pushed to every session in the owning tenant's room.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum InboxEvent {
    #[serde(rename_all = "camelCase")]
    MessageReceived { message: Message },
    #[serde(rename_all = "camelCase")]
    MessageSent { message: Message },
    #[serde(rename_all = "camelCase")]
    ConversationRead {
        conversation_id: String,
        unread_count: i64,
        read_at_ms: i64,
    },
    #[serde(rename_all = "camelCase")]
    BotToggled {
        conversation_id: String,
        bot_enabled: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        bot_disabled_at_ms: Option<i64>,
    },
}

impl InboxEvent {
    /// Wire event name, as subscribed to by agent clients.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MessageReceived { .. } => "message_received",
            Self::MessageSent { .. } => "message_sent",
            Self::ConversationRead { .. } => "conversation_read",
            Self::BotToggled { .. } => "conversation_bot_toggled",
        }
    }

    pub fn conversation_read(conversation: &Conversation) -> Self {
        Self::ConversationRead {
            conversation_id: conversation.id.clone(),
            unread_count: conversation.unread_count,
            read_at_ms: conversation.read_at_ms.unwrap_or_default(),
        }
    }

    pub fn bot_toggled(conversation: &Conversation) -> Self {
        Self::BotToggled {
            conversation_id: conversation.id.clone(),
            bot_enabled: conversation.bot_enabled,
            bot_disabled_at_ms: conversation.bot_disabled_at_ms,
        }
    }
}

/// Sink for tenant-scoped events — the gateway provides the concrete
/// implementation.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver `event` to every session in `tenant_id`'s room. Must not
    /// fail and must not block on slow consumers.
    async fn emit(&self, tenant_id: &str, event: InboxEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

#[async_trait]
impl EventSink for NoopEventSink {
    async fn emit(&self, _tenant_id: &str, _event: InboxEvent) {}
}

/// Records emitted events for assertions in tests.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: std::sync::Mutex<Vec<(String, InboxEvent)>>,
}

impl MemoryEventSink {
    pub fn take(&self) -> Vec<(String, InboxEvent)> {
        self.events
            .lock()
            .map(|mut e| std::mem::take(&mut *e))
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventSink for MemoryEventSink {
    async fn emit(&self, tenant_id: &str, event: InboxEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push((tenant_id.to_string(), event));
        }
    }
}
