//! WhatsApp Cloud API channel: webhook payload types, the pure inbound
//! normalizer, webhook verification helpers, and the outbound send client.

pub mod outbound;
pub mod types;
pub mod webhook;

pub use {
    outbound::{Error, WhatsAppClient},
    types::{SendResponse, WhatsAppWebhook},
    webhook::{normalize, verify_signature, verify_webhook_subscription},
};
