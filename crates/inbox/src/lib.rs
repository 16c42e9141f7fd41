//! The parley core: webhook decoding, customer/conversation resolution,
//! idempotent message persistence, outbound dispatch, bot-response
//! reconciliation, and the real-time event seam.
//!
//! Control flow: decode → normalize → identity resolver → conversation
//! resolver → message store → fan-out. The outbound dispatcher and the bot
//! reconciler re-enter the same resolver/store stages from the other
//! direction.

pub mod decode;
pub mod error;
pub mod events;
pub mod service;
pub mod store;
pub mod store_sqlite;
pub mod types;

pub use {
    decode::{InboundWebhook, SendAck},
    error::{Error, Result},
    events::{EventSink, InboxEvent, MemoryEventSink, NoopEventSink},
    service::InboxService,
    store::{ConversationStore, CustomerStore, MessageStore},
    store_sqlite::SqliteInboxStore,
    types::{
        BotResponseRequest, Conversation, ConversationStatus, Customer, Message,
        SendMessageRequest,
    },
};
