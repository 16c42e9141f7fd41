/// Crate-wide result type for tenant operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No tenant matches the given id or slug.
    #[error("tenant not found: {ident}")]
    NotFound { ident: String },

    /// A tenant with the same slug already exists.
    #[error("tenant slug already taken: {slug}")]
    SlugTaken { slug: String },

    /// Credential encryption or decryption failed.
    #[error("credential cipher error: {0}")]
    Cipher(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn not_found(ident: impl std::fmt::Display) -> Self {
        Self::NotFound {
            ident: ident.to_string(),
        }
    }

    #[must_use]
    pub fn cipher(message: impl std::fmt::Display) -> Self {
        Self::Cipher(message.to_string())
    }
}
