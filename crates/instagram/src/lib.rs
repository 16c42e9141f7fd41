//! Instagram Messaging API channel: webhook payload types, the pure inbound
//! normalizer (echo and non-message filtering), and the outbound send client.

pub mod outbound;
pub mod types;
pub mod webhook;

pub use {
    outbound::{Error, InstagramClient},
    types::{InstagramWebhook, SendResponse},
    webhook::normalize,
};
