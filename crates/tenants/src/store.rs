//! SQLite-backed tenant store.
//!
//! Credentials go in encrypted (whole-blob), come out decrypted; nothing
//! else in the workspace touches ciphertext.

use {
    async_trait::async_trait,
    sqlx::{Row, SqlitePool},
    tracing::info,
};

use parley_common::now_ms;

use crate::{
    error::{Error, Result},
    secrets::CredentialCipher,
    types::{InstagramCredentials, NewTenant, Tenant, WhatsAppCredentials, normalize_slug},
};

/// Resolution of tenant identifiers and existence checks, consumed by the
/// ingestion core and the gateway.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Map an id-or-slug to the canonical tenant id.
    async fn resolve_id(&self, id_or_slug: &str) -> Result<String>;

    /// Fetch a tenant by canonical id.
    async fn get(&self, tenant_id: &str) -> Result<Option<Tenant>>;
}

/// Decrypted per-channel credentials, read fresh on every call — the core
/// never caches these.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn whatsapp_credentials(&self, tenant_id: &str) -> Result<Option<WhatsAppCredentials>>;
    async fn instagram_credentials(&self, tenant_id: &str) -> Result<Option<InstagramCredentials>>;
}

pub struct SqliteTenantStore {
    pool: SqlitePool,
    cipher: CredentialCipher,
}

impl SqliteTenantStore {
    pub fn new(pool: SqlitePool, cipher: CredentialCipher) -> Self {
        Self { pool, cipher }
    }

    /// Initialize the tenants table schema. Idempotent.
    pub async fn init(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS tenants (
                id                    TEXT    PRIMARY KEY,
                slug                  TEXT    NOT NULL UNIQUE,
                name                  TEXT    NOT NULL,
                whatsapp_credentials  TEXT,
                instagram_credentials TEXT,
                created_at_ms         INTEGER NOT NULL,
                updated_at_ms         INTEGER NOT NULL
            )"#,
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn create(&self, new: NewTenant) -> Result<Tenant> {
        let slug = normalize_slug(&new.slug);
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_ms();

        let result = sqlx::query(
            "INSERT INTO tenants (id, slug, name, created_at_ms, updated_at_ms)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&slug)
        .bind(&new.name)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {},
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(Error::SlugTaken { slug });
            },
            Err(e) => return Err(e.into()),
        }

        info!(tenant_id = %id, slug = %slug, "tenant created");
        Ok(Tenant {
            id,
            slug,
            name: new.name,
            created_at_ms: now,
            updated_at_ms: now,
        })
    }

    pub async fn set_whatsapp_credentials(
        &self,
        tenant_id: &str,
        creds: &WhatsAppCredentials,
    ) -> Result<()> {
        let blob = self.cipher.encrypt_str(&serde_json::to_string(creds)?)?;
        self.set_credentials_column(tenant_id, "whatsapp_credentials", &blob)
            .await
    }

    pub async fn set_instagram_credentials(
        &self,
        tenant_id: &str,
        creds: &InstagramCredentials,
    ) -> Result<()> {
        let blob = self.cipher.encrypt_str(&serde_json::to_string(creds)?)?;
        self.set_credentials_column(tenant_id, "instagram_credentials", &blob)
            .await
    }

    async fn set_credentials_column(
        &self,
        tenant_id: &str,
        column: &'static str,
        blob: &str,
    ) -> Result<()> {
        let sql =
            format!("UPDATE tenants SET {column} = ?, updated_at_ms = ? WHERE id = ?");
        let result = sqlx::query(&sql)
            .bind(blob)
            .bind(now_ms())
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found(tenant_id));
        }
        Ok(())
    }

    async fn credentials_column(
        &self,
        tenant_id: &str,
        column: &'static str,
    ) -> Result<Option<String>> {
        let sql = format!("SELECT {column} AS blob FROM tenants WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let blob: Option<String> = row.get("blob");
                match blob {
                    Some(blob) => Ok(Some(self.cipher.decrypt_str(&blob)?)),
                    None => Ok(None),
                }
            },
            None => Err(Error::not_found(tenant_id)),
        }
    }
}

fn tenant_from_row(row: &sqlx::sqlite::SqliteRow) -> Tenant {
    Tenant {
        id: row.get("id"),
        slug: row.get("slug"),
        name: row.get("name"),
        created_at_ms: row.get("created_at_ms"),
        updated_at_ms: row.get("updated_at_ms"),
    }
}

#[async_trait]
impl TenantDirectory for SqliteTenantStore {
    async fn resolve_id(&self, id_or_slug: &str) -> Result<String> {
        let row = sqlx::query("SELECT id FROM tenants WHERE id = ?")
            .bind(id_or_slug)
            .fetch_optional(&self.pool)
            .await?;
        if let Some(row) = row {
            return Ok(row.get("id"));
        }

        let slug = normalize_slug(id_or_slug);
        let row = sqlx::query("SELECT id FROM tenants WHERE slug = ?")
            .bind(&slug)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| r.get("id"))
            .ok_or_else(|| Error::not_found(id_or_slug))
    }

    async fn get(&self, tenant_id: &str) -> Result<Option<Tenant>> {
        let row = sqlx::query(
            "SELECT id, slug, name, created_at_ms, updated_at_ms FROM tenants WHERE id = ?",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(tenant_from_row))
    }
}

#[async_trait]
impl CredentialProvider for SqliteTenantStore {
    async fn whatsapp_credentials(&self, tenant_id: &str) -> Result<Option<WhatsAppCredentials>> {
        match self
            .credentials_column(tenant_id, "whatsapp_credentials")
            .await?
        {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn instagram_credentials(
        &self,
        tenant_id: &str,
    ) -> Result<Option<InstagramCredentials>> {
        match self
            .credentials_column(tenant_id, "instagram_credentials")
            .await?
        {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}
