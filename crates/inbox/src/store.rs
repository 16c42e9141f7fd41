//! Store traits for the inbox domain. Every method is scoped by tenant id;
//! no entity is ever visible across tenants.

use async_trait::async_trait;

use parley_common::ChannelType;

use crate::{
    error::Result,
    types::{Conversation, Customer, Message},
};

#[async_trait]
pub trait CustomerStore: Send + Sync {
    /// Look up by (tenant, channel, external id).
    async fn find_by_identity(
        &self,
        tenant_id: &str,
        channel: ChannelType,
        external_id: &str,
    ) -> Result<Option<Customer>>;

    /// Insert a new customer. Fails with `Duplicate` when the channel
    /// identity already exists for this tenant (a lost find-or-create race).
    async fn insert(&self, customer: &Customer) -> Result<()>;

    async fn get(&self, tenant_id: &str, customer_id: &str) -> Result<Option<Customer>>;
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// The customer's single open-or-pending conversation on a channel.
    async fn find_active(
        &self,
        tenant_id: &str,
        customer_id: &str,
        channel: ChannelType,
    ) -> Result<Option<Conversation>>;

    /// Insert a new conversation. Fails with `Duplicate` when an active
    /// conversation already exists for (tenant, customer, channel).
    async fn insert(&self, conversation: &Conversation) -> Result<()>;

    async fn get(&self, tenant_id: &str, conversation_id: &str) -> Result<Option<Conversation>>;

    /// Record a persisted message in the conversation summary: set the last
    /// message reference atomically and, for inbound traffic, increment the
    /// unread counter in the same statement.
    async fn record_message(
        &self,
        tenant_id: &str,
        conversation_id: &str,
        message_id: &str,
        at_ms: i64,
        increment_unread: bool,
    ) -> Result<()>;

    /// Reset the unread counter and stamp the read time. Returns the
    /// updated conversation.
    async fn mark_read(
        &self,
        tenant_id: &str,
        conversation_id: &str,
        read_at_ms: i64,
    ) -> Result<Conversation>;

    /// Toggle the bot flag; disabling stamps `bot_disabled_at`, enabling
    /// clears it. Returns the updated conversation.
    async fn set_bot_enabled(
        &self,
        tenant_id: &str,
        conversation_id: &str,
        enabled: bool,
        at_ms: i64,
    ) -> Result<Conversation>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a message. Fails with `Duplicate` when (tenant, external id)
    /// is already stored — the idempotency guarantee for redeliveries.
    async fn insert(&self, message: &Message) -> Result<()>;

    async fn find_by_external_id(
        &self,
        tenant_id: &str,
        external_id: &str,
    ) -> Result<Option<Message>>;
}
