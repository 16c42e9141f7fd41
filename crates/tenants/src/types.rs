use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// A tenant: one isolated customer account. Every query in the system is
/// scoped to exactly one tenant id.
#[derive(Debug, Clone)]
pub struct Tenant {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

/// Input for creating a tenant.
#[derive(Debug, Clone)]
pub struct NewTenant {
    pub slug: String,
    pub name: String,
}

/// WhatsApp Cloud API credentials for one tenant.
#[derive(Clone, Serialize, Deserialize)]
pub struct WhatsAppCredentials {
    #[serde(serialize_with = "serialize_secret")]
    pub access_token: Secret<String>,
    pub phone_number_id: String,
    pub business_account_id: String,
    #[serde(default)]
    pub webhook_verify_token: Option<String>,
    #[serde(serialize_with = "serialize_secret")]
    pub app_secret: Secret<String>,
}

impl std::fmt::Debug for WhatsAppCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhatsAppCredentials")
            .field("access_token", &"[REDACTED]")
            .field("phone_number_id", &self.phone_number_id)
            .field("business_account_id", &self.business_account_id)
            .field("webhook_verify_token", &self.webhook_verify_token)
            .field("app_secret", &"[REDACTED]")
            .finish()
    }
}

/// Instagram Messaging API credentials for one tenant.
#[derive(Clone, Serialize, Deserialize)]
pub struct InstagramCredentials {
    #[serde(serialize_with = "serialize_secret")]
    pub access_token: Secret<String>,
    pub account_id: String,
    pub page_id: String,
    #[serde(serialize_with = "serialize_secret")]
    pub app_secret: Secret<String>,
}

impl std::fmt::Debug for InstagramCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstagramCredentials")
            .field("access_token", &"[REDACTED]")
            .field("account_id", &self.account_id)
            .field("page_id", &self.page_id)
            .field("app_secret", &"[REDACTED]")
            .finish()
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// Normalize a slug the way it is stored: lowercase, URL-safe.
pub fn normalize_slug(slug: &str) -> String {
    slug.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}
