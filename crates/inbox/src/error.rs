use parley_common::ChannelType;

/// Crate-wide result type for inbox operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed failures raised by resolvers, stores, and the dispatch paths.
///
/// The webhook entry point downgrades only `Duplicate` (redelivery) locally;
/// everything else propagates to the transport layer for translation into a
/// response code.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Referenced tenant/conversation/customer is missing (or owned by
    /// another tenant, which is indistinguishable by design).
    #[error("{what} not found")]
    NotFound { what: String },

    /// The tenant is missing required channel credentials.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// The channel API answered with a failure; nothing was persisted.
    #[error("channel api failure ({channel}): {message}")]
    Upstream {
        channel: ChannelType,
        message: String,
    },

    /// An insert hit the (tenant, external id) uniqueness constraint: the
    /// same channel delivery was already persisted.
    #[error("duplicate delivery: {external_id}")]
    Duplicate { external_id: String },

    /// The request payload is structurally invalid.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound {
            what: what.to_string(),
        }
    }

    #[must_use]
    pub fn configuration(message: impl std::fmt::Display) -> Self {
        Self::Configuration {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn invalid_input(message: impl std::fmt::Display) -> Self {
        Self::InvalidInput {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn internal(message: impl std::fmt::Display) -> Self {
        Self::Internal {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn duplicate(external_id: impl Into<String>) -> Self {
        Self::Duplicate {
            external_id: external_id.into(),
        }
    }
}

impl From<parley_tenants::Error> for Error {
    fn from(e: parley_tenants::Error) -> Self {
        match e {
            parley_tenants::Error::NotFound { ident } => Self::NotFound {
                what: format!("tenant \"{ident}\""),
            },
            parley_tenants::Error::Database(e) => Self::Database(e),
            other => Self::internal(other),
        }
    }
}

impl From<parley_whatsapp::Error> for Error {
    fn from(e: parley_whatsapp::Error) -> Self {
        match e {
            parley_whatsapp::Error::Upstream { status, body } => Self::Upstream {
                channel: ChannelType::WhatsApp,
                message: format!("{status}: {body}"),
            },
            parley_whatsapp::Error::InvalidContent(message) => Self::InvalidInput { message },
            parley_whatsapp::Error::Http(e) => Self::Upstream {
                channel: ChannelType::WhatsApp,
                message: e.to_string(),
            },
        }
    }
}

impl From<parley_instagram::Error> for Error {
    fn from(e: parley_instagram::Error) -> Self {
        match e {
            parley_instagram::Error::Upstream { status, body } => Self::Upstream {
                channel: ChannelType::Instagram,
                message: format!("{status}: {body}"),
            },
            parley_instagram::Error::InvalidContent(message) => Self::InvalidInput { message },
            parley_instagram::Error::Http(e) => Self::Upstream {
                channel: ChannelType::Instagram,
                message: e.to_string(),
            },
        }
    }
}
