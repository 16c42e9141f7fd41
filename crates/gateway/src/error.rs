//! Translation of the core error taxonomy into HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use parley_inbox::Error as InboxError;

/// Wrapper so inbox errors can flow out of handlers with `?`.
pub struct ApiError(pub InboxError);

impl From<InboxError> for ApiError {
    fn from(e: InboxError) -> Self {
        Self(e)
    }
}

impl From<parley_tenants::Error> for ApiError {
    fn from(e: parley_tenants::Error) -> Self {
        Self(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InboxError::NotFound { .. } => StatusCode::NOT_FOUND,
            InboxError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            InboxError::Configuration { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            InboxError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            InboxError::Duplicate { .. } => StatusCode::CONFLICT,
            InboxError::Internal { .. }
            | InboxError::Database(_)
            | InboxError::SerdeJson(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(e: InboxError) -> StatusCode {
        ApiError(e).into_response().status()
    }

    #[test]
    fn taxonomy_maps_to_status_codes() {
        assert_eq!(
            status_of(InboxError::not_found("conversation x")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(InboxError::invalid_input("bad shape")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(InboxError::configuration("no credentials")),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(InboxError::Upstream {
                channel: parley_common::ChannelType::WhatsApp,
                message: "500".into()
            }),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(InboxError::duplicate("wamid.x")),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(InboxError::internal("boom")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
