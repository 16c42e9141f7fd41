//! Tenant records and per-channel Graph API credentials.
//!
//! Credentials are encrypted at rest and decrypted only inside the store's
//! read path; everything above this crate sees plaintext credentials through
//! the [`CredentialProvider`] trait and can be tested with plain fixtures.

pub mod error;
pub mod secrets;
pub mod store;
pub mod types;

pub use {
    error::{Error, Result},
    secrets::CredentialCipher,
    store::{CredentialProvider, SqliteTenantStore, TenantDirectory},
    types::{InstagramCredentials, NewTenant, Tenant, WhatsAppCredentials},
};
