//! SQLite-backed stores for customers, conversations, and messages.
//!
//! Uniqueness invariants live in partial unique indexes: one customer per
//! (tenant, channel identity), one active conversation per (tenant,
//! customer, channel), one message per (tenant, external id). Counter and
//! summary updates are single atomic statements, never read-modify-write.

use {
    async_trait::async_trait,
    sqlx::{Row, SqlitePool, sqlite::SqliteRow},
};

use parley_common::{ChannelType, MessageDirection, MessageStatus, MessageType, Sender};

use crate::{
    error::{Error, Result},
    store::{ConversationStore, CustomerStore, MessageStore},
    types::{Conversation, ConversationStatus, Customer, Message},
};

pub struct SqliteInboxStore {
    pool: SqlitePool,
}

impl SqliteInboxStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the inbox schema. Idempotent.
    pub async fn init(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS customers (
                id            TEXT    PRIMARY KEY,
                tenant_id     TEXT    NOT NULL,
                display_name  TEXT    NOT NULL,
                whatsapp_id   TEXT,
                instagram_id  TEXT,
                is_blocked    INTEGER NOT NULL DEFAULT 0,
                created_at_ms INTEGER NOT NULL,
                updated_at_ms INTEGER NOT NULL,
                CHECK ((whatsapp_id IS NULL) <> (instagram_id IS NULL))
            )"#,
        )
        .execute(pool)
        .await?;
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS customers_tenant_whatsapp
             ON customers(tenant_id, whatsapp_id) WHERE whatsapp_id IS NOT NULL",
        )
        .execute(pool)
        .await?;
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS customers_tenant_instagram
             ON customers(tenant_id, instagram_id) WHERE instagram_id IS NOT NULL",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS conversations (
                id                 TEXT    PRIMARY KEY,
                tenant_id          TEXT    NOT NULL,
                customer_id        TEXT    NOT NULL,
                channel            TEXT    NOT NULL,
                status             TEXT    NOT NULL DEFAULT 'OPEN',
                last_message_id    TEXT,
                last_message_at_ms INTEGER,
                unread_count       INTEGER NOT NULL DEFAULT 0 CHECK (unread_count >= 0),
                bot_enabled        INTEGER NOT NULL DEFAULT 1,
                bot_disabled_at_ms INTEGER,
                read_at_ms         INTEGER,
                created_at_ms      INTEGER NOT NULL,
                updated_at_ms      INTEGER NOT NULL
            )"#,
        )
        .execute(pool)
        .await?;
        // At most one open-or-pending conversation per (tenant, customer,
        // channel); a losing concurrent create fails here and is retried as
        // a lookup.
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS conversations_one_active
             ON conversations(tenant_id, customer_id, channel)
             WHERE status IN ('OPEN', 'PENDING')",
        )
        .execute(pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS conversations_tenant_last
             ON conversations(tenant_id, last_message_at_ms)",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS messages (
                id              TEXT    PRIMARY KEY,
                tenant_id       TEXT    NOT NULL,
                conversation_id TEXT    NOT NULL,
                channel         TEXT    NOT NULL,
                direction       TEXT    NOT NULL,
                message_type    TEXT    NOT NULL,
                sender_kind     TEXT    NOT NULL,
                sender_id       TEXT,
                body            TEXT,
                media           TEXT,
                external_id     TEXT,
                status          TEXT    NOT NULL,
                sent_at_ms      INTEGER NOT NULL,
                delivered_at_ms INTEGER,
                read_at_ms      INTEGER,
                created_at_ms   INTEGER NOT NULL
            )"#,
        )
        .execute(pool)
        .await?;
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS messages_tenant_external
             ON messages(tenant_id, external_id) WHERE external_id IS NOT NULL",
        )
        .execute(pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS messages_tenant_conversation_sent
             ON messages(tenant_id, conversation_id, sent_at_ms)",
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}

// ── Row mapping ──────────────────────────────────────────────────────────────

fn parse_channel(s: &str) -> Result<ChannelType> {
    ChannelType::parse(s).ok_or_else(|| Error::internal(format!("unknown channel in store: {s}")))
}

fn customer_from_row(row: &SqliteRow) -> Customer {
    Customer {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        display_name: row.get("display_name"),
        whatsapp_id: row.get("whatsapp_id"),
        instagram_id: row.get("instagram_id"),
        is_blocked: row.get::<i64, _>("is_blocked") != 0,
        created_at_ms: row.get("created_at_ms"),
        updated_at_ms: row.get("updated_at_ms"),
    }
}

fn conversation_from_row(row: &SqliteRow) -> Result<Conversation> {
    let channel: String = row.get("channel");
    let status: String = row.get("status");
    Ok(Conversation {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        customer_id: row.get("customer_id"),
        channel: parse_channel(&channel)?,
        status: ConversationStatus::parse(&status)
            .ok_or_else(|| Error::internal(format!("unknown conversation status: {status}")))?,
        last_message_id: row.get("last_message_id"),
        last_message_at_ms: row.get("last_message_at_ms"),
        unread_count: row.get("unread_count"),
        bot_enabled: row.get::<i64, _>("bot_enabled") != 0,
        bot_disabled_at_ms: row.get("bot_disabled_at_ms"),
        read_at_ms: row.get("read_at_ms"),
        created_at_ms: row.get("created_at_ms"),
        updated_at_ms: row.get("updated_at_ms"),
    })
}

fn message_from_row(row: &SqliteRow) -> Result<Message> {
    let channel: String = row.get("channel");
    let direction: String = row.get("direction");
    let message_type: String = row.get("message_type");
    let status: String = row.get("status");
    let sender_kind: String = row.get("sender_kind");
    let sender_id: Option<String> = row.get("sender_id");
    let media: Option<String> = row.get("media");

    let sender = match (sender_kind.as_str(), sender_id) {
        ("CUSTOMER", Some(id)) => Sender::Customer { id },
        ("USER", Some(id)) => Sender::User { id },
        ("BOT", _) => Sender::Bot,
        (kind, id) => {
            return Err(Error::internal(format!(
                "invalid sender in store: kind={kind}, id={id:?}"
            )));
        },
    };

    Ok(Message {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        conversation_id: row.get("conversation_id"),
        channel: parse_channel(&channel)?,
        direction: MessageDirection::parse(&direction)
            .ok_or_else(|| Error::internal(format!("unknown direction: {direction}")))?,
        message_type: MessageType::parse(&message_type)
            .ok_or_else(|| Error::internal(format!("unknown message type: {message_type}")))?,
        sender,
        body: row.get("body"),
        media: media.map(|m| serde_json::from_str(&m)).transpose()?,
        external_id: row.get("external_id"),
        status: MessageStatus::parse(&status)
            .ok_or_else(|| Error::internal(format!("unknown message status: {status}")))?,
        sent_at_ms: row.get("sent_at_ms"),
        delivered_at_ms: row.get("delivered_at_ms"),
        read_at_ms: row.get("read_at_ms"),
        created_at_ms: row.get("created_at_ms"),
    })
}

fn map_unique_violation(e: sqlx::Error, key: &str) -> Error {
    match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => Error::duplicate(key),
        other => other.into(),
    }
}

// ── CustomerStore ────────────────────────────────────────────────────────────

#[async_trait]
impl CustomerStore for SqliteInboxStore {
    async fn find_by_identity(
        &self,
        tenant_id: &str,
        channel: ChannelType,
        external_id: &str,
    ) -> Result<Option<Customer>> {
        let column = match channel {
            ChannelType::WhatsApp => "whatsapp_id",
            ChannelType::Instagram => "instagram_id",
        };
        let sql = format!("SELECT * FROM customers WHERE tenant_id = ? AND {column} = ?");
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(customer_from_row))
    }

    async fn insert(&self, customer: &Customer) -> Result<()> {
        sqlx::query(
            "INSERT INTO customers
               (id, tenant_id, display_name, whatsapp_id, instagram_id, is_blocked,
                created_at_ms, updated_at_ms)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&customer.id)
        .bind(&customer.tenant_id)
        .bind(&customer.display_name)
        .bind(&customer.whatsapp_id)
        .bind(&customer.instagram_id)
        .bind(customer.is_blocked as i64)
        .bind(customer.created_at_ms)
        .bind(customer.updated_at_ms)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let identity = customer
                .whatsapp_id
                .as_deref()
                .or(customer.instagram_id.as_deref())
                .unwrap_or(&customer.id);
            map_unique_violation(e, identity)
        })?;
        Ok(())
    }

    async fn get(&self, tenant_id: &str, customer_id: &str) -> Result<Option<Customer>> {
        let row = sqlx::query("SELECT * FROM customers WHERE tenant_id = ? AND id = ?")
            .bind(tenant_id)
            .bind(customer_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(customer_from_row))
    }
}

// ── ConversationStore ────────────────────────────────────────────────────────

#[async_trait]
impl ConversationStore for SqliteInboxStore {
    async fn find_active(
        &self,
        tenant_id: &str,
        customer_id: &str,
        channel: ChannelType,
    ) -> Result<Option<Conversation>> {
        let row = sqlx::query(
            "SELECT * FROM conversations
             WHERE tenant_id = ? AND customer_id = ? AND channel = ?
               AND status IN ('OPEN', 'PENDING')",
        )
        .bind(tenant_id)
        .bind(customer_id)
        .bind(channel.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(conversation_from_row).transpose()
    }

    async fn insert(&self, conversation: &Conversation) -> Result<()> {
        sqlx::query(
            "INSERT INTO conversations
               (id, tenant_id, customer_id, channel, status, last_message_id,
                last_message_at_ms, unread_count, bot_enabled, bot_disabled_at_ms,
                read_at_ms, created_at_ms, updated_at_ms)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&conversation.id)
        .bind(&conversation.tenant_id)
        .bind(&conversation.customer_id)
        .bind(conversation.channel.as_str())
        .bind(conversation.status.as_str())
        .bind(&conversation.last_message_id)
        .bind(conversation.last_message_at_ms)
        .bind(conversation.unread_count)
        .bind(conversation.bot_enabled as i64)
        .bind(conversation.bot_disabled_at_ms)
        .bind(conversation.read_at_ms)
        .bind(conversation.created_at_ms)
        .bind(conversation.updated_at_ms)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &conversation.customer_id))?;
        Ok(())
    }

    async fn get(&self, tenant_id: &str, conversation_id: &str) -> Result<Option<Conversation>> {
        let row = sqlx::query("SELECT * FROM conversations WHERE tenant_id = ? AND id = ?")
            .bind(tenant_id)
            .bind(conversation_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(conversation_from_row).transpose()
    }

    async fn record_message(
        &self,
        tenant_id: &str,
        conversation_id: &str,
        message_id: &str,
        at_ms: i64,
        increment_unread: bool,
    ) -> Result<()> {
        let sql = if increment_unread {
            "UPDATE conversations
             SET last_message_id = ?, last_message_at_ms = ?,
                 unread_count = unread_count + 1, updated_at_ms = ?
             WHERE tenant_id = ? AND id = ?"
        } else {
            "UPDATE conversations
             SET last_message_id = ?, last_message_at_ms = ?, updated_at_ms = ?
             WHERE tenant_id = ? AND id = ?"
        };
        let result = sqlx::query(sql)
            .bind(message_id)
            .bind(at_ms)
            .bind(parley_common::now_ms())
            .bind(tenant_id)
            .bind(conversation_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found(format!("conversation {conversation_id}")));
        }
        Ok(())
    }

    async fn mark_read(
        &self,
        tenant_id: &str,
        conversation_id: &str,
        read_at_ms: i64,
    ) -> Result<Conversation> {
        let result = sqlx::query(
            "UPDATE conversations
             SET unread_count = 0, read_at_ms = ?, updated_at_ms = ?
             WHERE tenant_id = ? AND id = ?",
        )
        .bind(read_at_ms)
        .bind(parley_common::now_ms())
        .bind(tenant_id)
        .bind(conversation_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found(format!("conversation {conversation_id}")));
        }
        ConversationStore::get(self, tenant_id, conversation_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("conversation {conversation_id}")))
    }

    async fn set_bot_enabled(
        &self,
        tenant_id: &str,
        conversation_id: &str,
        enabled: bool,
        at_ms: i64,
    ) -> Result<Conversation> {
        let disabled_at = if enabled { None } else { Some(at_ms) };
        let result = sqlx::query(
            "UPDATE conversations
             SET bot_enabled = ?, bot_disabled_at_ms = ?, updated_at_ms = ?
             WHERE tenant_id = ? AND id = ?",
        )
        .bind(enabled as i64)
        .bind(disabled_at)
        .bind(parley_common::now_ms())
        .bind(tenant_id)
        .bind(conversation_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found(format!("conversation {conversation_id}")));
        }
        ConversationStore::get(self, tenant_id, conversation_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("conversation {conversation_id}")))
    }
}

// ── MessageStore ─────────────────────────────────────────────────────────────

#[async_trait]
impl MessageStore for SqliteInboxStore {
    async fn insert(&self, message: &Message) -> Result<()> {
        let media = message
            .media
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        sqlx::query(
            "INSERT INTO messages
               (id, tenant_id, conversation_id, channel, direction, message_type,
                sender_kind, sender_id, body, media, external_id, status,
                sent_at_ms, delivered_at_ms, read_at_ms, created_at_ms)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(&message.tenant_id)
        .bind(&message.conversation_id)
        .bind(message.channel.as_str())
        .bind(message.direction.as_str())
        .bind(message.message_type.as_str())
        .bind(message.sender.kind())
        .bind(message.sender.id())
        .bind(&message.body)
        .bind(media)
        .bind(&message.external_id)
        .bind(message.status.as_str())
        .bind(message.sent_at_ms)
        .bind(message.delivered_at_ms)
        .bind(message.read_at_ms)
        .bind(message.created_at_ms)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            map_unique_violation(e, message.external_id.as_deref().unwrap_or(&message.id))
        })?;
        Ok(())
    }

    async fn find_by_external_id(
        &self,
        tenant_id: &str,
        external_id: &str,
    ) -> Result<Option<Message>> {
        let row = sqlx::query("SELECT * FROM messages WHERE tenant_id = ? AND external_id = ?")
            .bind(tenant_id)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(message_from_row).transpose()
    }
}
