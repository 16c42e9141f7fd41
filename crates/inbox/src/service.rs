//! The ingestion, dispatch, and reconciliation service.
//!
//! Each webhook delivery is one unit of work: messages inside a batch are
//! processed strictly in array order, and no ordering is guaranteed across
//! deliveries beyond the store's per-row atomicity. Media download and
//! event fan-out are fire-and-forget; channel API calls on the outbound
//! path are not — a failure there aborts before anything is persisted.

use std::sync::Arc;

use tracing::{debug, info, warn};

use {
    parley_common::{
        ChannelType, InboundEvent, MediaCache, MediaDownloadJob, MessageDirection, MessageStatus,
        MessageType, Sender, now_ms,
    },
    parley_instagram::InstagramClient,
    parley_tenants::{CredentialProvider, TenantDirectory},
    parley_whatsapp::WhatsAppClient,
};

use crate::{
    decode::{InboundWebhook, SendAck},
    error::{Error, Result},
    events::{EventSink, InboxEvent},
    store::{ConversationStore, CustomerStore, MessageStore},
    types::{BotResponseRequest, Conversation, Customer, Message, SendMessageRequest},
};

/// All dependencies are injected traits so the pipeline runs against
/// in-memory stores, a recording sink, and Graph API doubles in tests.
pub struct InboxService {
    pub customers: Arc<dyn CustomerStore>,
    pub conversations: Arc<dyn ConversationStore>,
    pub messages: Arc<dyn MessageStore>,
    pub tenants: Arc<dyn TenantDirectory>,
    pub credentials: Arc<dyn CredentialProvider>,
    pub whatsapp: WhatsAppClient,
    pub instagram: InstagramClient,
    pub events: Arc<dyn EventSink>,
    pub media: Arc<dyn MediaCache>,
}

impl InboxService {
    // ── Inbound webhooks ─────────────────────────────────────────────────

    /// Ingest one webhook delivery and return the created messages.
    ///
    /// Unknown payload shapes are logged and dropped (zero messages, no
    /// error): a webhook sender must always see success or it disables
    /// delivery. Redelivered messages are skipped as no-ops. All other
    /// failures propagate.
    pub async fn receive_webhook(
        &self,
        tenant_ref: &str,
        payload: &serde_json::Value,
    ) -> Result<Vec<Message>> {
        let tenant_id = self.tenants.resolve_id(tenant_ref).await?;

        let Some(webhook) = InboundWebhook::decode(payload) else {
            warn!(tenant_id, "webhook matched no known channel signature, dropping");
            return Ok(Vec::new());
        };
        let channel = webhook.channel();
        let events = webhook.normalize();
        debug!(tenant_id, channel = %channel, count = events.len(), "webhook normalized");

        let mut saved = Vec::with_capacity(events.len());
        for event in &events {
            match self.ingest_event(&tenant_id, channel, event).await {
                Ok(message) => saved.push(message),
                Err(Error::Duplicate { external_id }) => {
                    debug!(tenant_id, external_id, "redelivered message, skipping");
                },
                Err(e) => return Err(e),
            }
        }
        Ok(saved)
    }

    /// Run one normalized event through the full pipeline:
    /// identity → conversation → persist → media → fan-out.
    async fn ingest_event(
        &self,
        tenant_id: &str,
        channel: ChannelType,
        event: &InboundEvent,
    ) -> Result<Message> {
        let customer = self
            .resolve_customer(
                tenant_id,
                channel,
                &event.sender_external_id,
                event.display_name.as_deref(),
            )
            .await?;
        let conversation = self
            .resolve_active_conversation(tenant_id, &customer.id, channel)
            .await?;

        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            conversation_id: conversation.id.clone(),
            channel,
            direction: MessageDirection::Inbound,
            message_type: event.message_type,
            sender: Sender::Customer {
                id: customer.id.clone(),
            },
            body: event.body.clone(),
            media: event.media.clone(),
            external_id: Some(event.external_message_id.clone()),
            status: MessageStatus::Delivered,
            sent_at_ms: event.occurred_at_ms,
            delivered_at_ms: None,
            read_at_ms: None,
            created_at_ms: now_ms(),
        };
        self.messages.insert(&message).await?;

        // The summary is a cache over the message stream: failing to update
        // it must not lose the message row.
        if let Err(e) = self
            .conversations
            .record_message(tenant_id, &conversation.id, &message.id, message.sent_at_ms, true)
            .await
        {
            warn!(tenant_id, conversation_id = %conversation.id, error = %e,
                "failed to update conversation summary");
        }

        if let Some(media) = &message.media {
            self.media.schedule(MediaDownloadJob {
                tenant_id: tenant_id.to_string(),
                channel,
                media_type: message.message_type,
                media: media.clone(),
            });
        }

        self.events
            .emit(tenant_id, InboxEvent::MessageReceived {
                message: message.clone(),
            })
            .await;

        Ok(message)
    }

    // ── Identity resolver ────────────────────────────────────────────────

    /// Find-or-create the customer owning a channel identity. A lost create
    /// race fails on the identity index and resolves by re-reading.
    async fn resolve_customer(
        &self,
        tenant_id: &str,
        channel: ChannelType,
        external_id: &str,
        display_name: Option<&str>,
    ) -> Result<Customer> {
        if let Some(customer) = self
            .customers
            .find_by_identity(tenant_id, channel, external_id)
            .await?
        {
            return Ok(customer);
        }

        info!(tenant_id, channel = %channel, external_id, "customer not found, creating");
        let customer = Customer::for_identity(tenant_id, channel, external_id, display_name);
        match self.customers.insert(&customer).await {
            Ok(()) => Ok(customer),
            Err(Error::Duplicate { .. }) => self
                .customers
                .find_by_identity(tenant_id, channel, external_id)
                .await?
                .ok_or_else(|| Error::internal("customer vanished after create conflict")),
            Err(e) => Err(e),
        }
    }

    // ── Conversation resolver ────────────────────────────────────────────

    /// Find the customer's open-or-pending conversation on a channel, or
    /// open a new one. Never transitions an existing conversation's status.
    async fn resolve_active_conversation(
        &self,
        tenant_id: &str,
        customer_id: &str,
        channel: ChannelType,
    ) -> Result<Conversation> {
        if let Some(conversation) = self
            .conversations
            .find_active(tenant_id, customer_id, channel)
            .await?
        {
            return Ok(conversation);
        }

        info!(tenant_id, customer_id, channel = %channel, "no active conversation, opening one");
        let conversation = Conversation::open(tenant_id, customer_id, channel);
        match self.conversations.insert(&conversation).await {
            Ok(()) => Ok(conversation),
            Err(Error::Duplicate { .. }) => self
                .conversations
                .find_active(tenant_id, customer_id, channel)
                .await?
                .ok_or_else(|| Error::internal("conversation vanished after create conflict")),
            Err(e) => Err(e),
        }
    }

    // ── Outbound dispatch ────────────────────────────────────────────────

    /// Send an agent-authored message through the conversation's channel
    /// API, then persist and fan out. If the channel call fails nothing is
    /// persisted and the error surfaces to the caller.
    pub async fn send_as_agent(
        &self,
        tenant_ref: &str,
        agent_id: &str,
        request: SendMessageRequest,
    ) -> Result<Message> {
        let tenant_id = self.tenants.resolve_id(tenant_ref).await?;

        let conversation = self
            .conversations
            .get(&tenant_id, &request.conversation_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("conversation {}", request.conversation_id)))?;

        let external_id = self.dispatch(&tenant_id, &conversation, &request).await?;

        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.clone(),
            conversation_id: conversation.id.clone(),
            channel: conversation.channel,
            direction: MessageDirection::Outbound,
            message_type: request.message_type,
            sender: Sender::User {
                id: agent_id.to_string(),
            },
            body: request.body,
            media: request.media,
            external_id: Some(external_id),
            status: MessageStatus::Sent,
            // The Graph ack carries no timestamp; outbound stamps the
            // server clock.
            sent_at_ms: now_ms(),
            delivered_at_ms: None,
            read_at_ms: None,
            created_at_ms: now_ms(),
        };
        self.messages.insert(&message).await?;

        if let Err(e) = self
            .conversations
            .record_message(&tenant_id, &conversation.id, &message.id, message.sent_at_ms, false)
            .await
        {
            warn!(tenant_id, conversation_id = %conversation.id, error = %e,
                "failed to update conversation summary");
        }

        self.events
            .emit(&tenant_id, InboxEvent::MessageSent {
                message: message.clone(),
            })
            .await;

        Ok(message)
    }

    /// Load credentials and the recipient identity, call the channel send
    /// API, and return the channel-native message id.
    async fn dispatch(
        &self,
        tenant_id: &str,
        conversation: &Conversation,
        request: &SendMessageRequest,
    ) -> Result<String> {
        match conversation.channel {
            ChannelType::WhatsApp => {
                let creds = self
                    .credentials
                    .whatsapp_credentials(tenant_id)
                    .await?
                    .ok_or_else(|| {
                        Error::configuration("tenant has no whatsapp credentials configured")
                    })?;
                let customer = self.recipient(tenant_id, conversation).await?;
                let to = self.recipient_identity(&customer, conversation.channel)?;
                let ack = self
                    .whatsapp
                    .send_message(
                        &creds.access_token,
                        &creds.phone_number_id,
                        to,
                        request.message_type,
                        request.body.as_deref(),
                        request.media.as_ref(),
                    )
                    .await?;
                ack.message_id().map(str::to_string).ok_or(Error::Upstream {
                    channel: ChannelType::WhatsApp,
                    message: "send ack carried no message id".into(),
                })
            },
            ChannelType::Instagram => {
                let creds = self
                    .credentials
                    .instagram_credentials(tenant_id)
                    .await?
                    .ok_or_else(|| {
                        Error::configuration("tenant has no instagram credentials configured")
                    })?;
                let customer = self.recipient(tenant_id, conversation).await?;
                let to = self.recipient_identity(&customer, conversation.channel)?;
                let ack = self
                    .instagram
                    .send_message(
                        &creds.access_token,
                        to,
                        request.message_type,
                        request.body.as_deref(),
                        request.media.as_ref(),
                    )
                    .await?;
                Ok(ack.message_id)
            },
        }
    }

    async fn recipient(&self, tenant_id: &str, conversation: &Conversation) -> Result<Customer> {
        self.customers
            .get(tenant_id, &conversation.customer_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("customer {}", conversation.customer_id)))
    }

    fn recipient_identity<'c>(
        &self,
        customer: &'c Customer,
        channel: ChannelType,
    ) -> Result<&'c str> {
        customer.external_id(channel).ok_or_else(|| {
            Error::internal(format!(
                "customer {} has no {channel} identity",
                customer.id
            ))
        })
    }

    // ── Bot response reconciliation ──────────────────────────────────────

    /// Reconcile a message a bot already delivered through the Graph API
    /// into the customer/conversation/message model. The channel is
    /// detected purely from the shape of the acknowledgment.
    pub async fn reconcile_bot_response(&self, request: BotResponseRequest) -> Result<Message> {
        let tenant_id = self.tenants.resolve_id(&request.tenant_id).await?;

        let ack = SendAck::decode(&request.meta_response)
            .ok_or_else(|| Error::invalid_input("meta response matches no known channel shape"))?;
        let channel = ack.channel();
        let recipient = ack
            .recipient_external_id()
            .ok_or_else(|| Error::invalid_input("meta response has no recipient to attribute"))?
            .to_string();
        let external_id = ack
            .message_id()
            .ok_or_else(|| Error::invalid_input("meta response has no message id"))?
            .to_string();

        // Only the identity is known here — no display-name hint exists on
        // an outbound acknowledgment.
        let customer = self
            .resolve_customer(&tenant_id, channel, &recipient, None)
            .await?;
        let conversation = self
            .resolve_active_conversation(&tenant_id, &customer.id, channel)
            .await?;

        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.clone(),
            conversation_id: conversation.id.clone(),
            channel,
            direction: MessageDirection::Outbound,
            message_type: request.message_type.unwrap_or(MessageType::Text),
            sender: Sender::Bot,
            body: request.content,
            media: request.media,
            external_id: Some(external_id.clone()),
            status: MessageStatus::Sent,
            sent_at_ms: now_ms(),
            delivered_at_ms: None,
            read_at_ms: None,
            created_at_ms: now_ms(),
        };
        match self.messages.insert(&message).await {
            Ok(()) => {},
            Err(Error::Duplicate { .. }) => {
                // Bot retried the registration; answer with the stored row.
                debug!(tenant_id, external_id, "bot response already reconciled");
                return self
                    .messages
                    .find_by_external_id(&tenant_id, &external_id)
                    .await?
                    .ok_or_else(|| Error::internal("message vanished after duplicate insert"));
            },
            Err(e) => return Err(e),
        }

        if let Err(e) = self
            .conversations
            .record_message(&tenant_id, &conversation.id, &message.id, message.sent_at_ms, false)
            .await
        {
            warn!(tenant_id, conversation_id = %conversation.id, error = %e,
                "failed to update conversation summary");
        }

        self.events
            .emit(&tenant_id, InboxEvent::MessageSent {
                message: message.clone(),
            })
            .await;

        Ok(message)
    }

    // ── Conversation state ───────────────────────────────────────────────

    /// Reset the unread counter and broadcast the read event.
    pub async fn mark_read(&self, tenant_ref: &str, conversation_id: &str) -> Result<Conversation> {
        let tenant_id = self.tenants.resolve_id(tenant_ref).await?;
        let conversation = self
            .conversations
            .mark_read(&tenant_id, conversation_id, now_ms())
            .await?;
        self.events
            .emit(&tenant_id, InboxEvent::conversation_read(&conversation))
            .await;
        Ok(conversation)
    }

    /// Toggle the conversation's bot flag and broadcast the change.
    pub async fn set_bot_enabled(
        &self,
        tenant_ref: &str,
        conversation_id: &str,
        enabled: bool,
    ) -> Result<Conversation> {
        let tenant_id = self.tenants.resolve_id(tenant_ref).await?;
        let conversation = self
            .conversations
            .set_bot_enabled(&tenant_id, conversation_id, enabled, now_ms())
            .await?;
        self.events
            .emit(&tenant_id, InboxEvent::bot_toggled(&conversation))
            .await;
        Ok(conversation)
    }
}
