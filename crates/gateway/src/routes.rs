//! HTTP handlers for the messaging endpoints.
//!
//! Tenant and agent identity arrive in the `Tenant-Id` / `Agent-Id` headers,
//! populated by the authenticating layer in front of this service; this
//! crate only resolves them to canonical ids.

use {
    axum::{
        Json,
        extract::{Path, Query, State},
        http::{HeaderMap, StatusCode},
        response::{IntoResponse, Response},
    },
    serde::Deserialize,
    tracing::debug,
};

use parley_inbox::{
    Error as InboxError,
    types::{BotResponseRequest, Conversation, Message, SendMessageRequest},
};

use crate::{error::ApiError, state::AppState};

pub const TENANT_HEADER: &str = "tenant-id";
pub const AGENT_HEADER: &str = "agent-id";

fn required_header(headers: &HeaderMap, name: &'static str) -> Result<String, ApiError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            ApiError(InboxError::invalid_input(format!(
                "missing required header: {name}"
            )))
        })
}

// ── Inbound webhook ──────────────────────────────────────────────────────────

/// `POST /messages/receive` — unified inbound endpoint; the channel is
/// auto-detected from the payload shape. Always answers 200 for recognized
/// tenants, even when zero messages were extracted, so the upstream sender
/// never disables delivery.
pub async fn receive_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let tenant = required_header(&headers, TENANT_HEADER)?;
    let messages = state.service.receive_webhook(&tenant, &payload).await?;
    Ok(Json(messages))
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// `GET /messages/receive` — Meta webhook-subscription handshake: echo the
/// challenge when the verify token matches the tenant's configured one.
pub async fn verify_subscription(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SubscriptionQuery>,
) -> Result<Response, ApiError> {
    let tenant = required_header(&headers, TENANT_HEADER)?;
    let tenant_id = state.tenants.resolve_id(&tenant).await?;

    let verify_token = state
        .credentials
        .whatsapp_credentials(&tenant_id)
        .await?
        .and_then(|c| c.webhook_verify_token)
        .ok_or_else(|| {
            ApiError(InboxError::configuration(
                "tenant has no webhook verify token configured",
            ))
        })?;

    match parley_whatsapp::verify_webhook_subscription(
        query.mode.as_deref(),
        query.verify_token.as_deref(),
        query.challenge.as_deref(),
        &verify_token,
    ) {
        Some(challenge) => Ok(challenge.into_response()),
        None => {
            debug!(tenant_id, "webhook subscription verification failed");
            Ok(StatusCode::FORBIDDEN.into_response())
        },
    }
}

// ── Outbound ─────────────────────────────────────────────────────────────────

/// `POST /messages/bot-response` — register a message a bot already sent
/// through the Graph API.
pub async fn bot_response(
    State(state): State<AppState>,
    Json(request): Json<BotResponseRequest>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let message = state.service.reconcile_bot_response(request).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// `POST /messages/send` — agent-authored send through the conversation's
/// channel API.
pub async fn send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let tenant = required_header(&headers, TENANT_HEADER)?;
    let agent = required_header(&headers, AGENT_HEADER)?;
    let message = state.service.send_as_agent(&tenant, &agent, request).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

// ── Conversation state ───────────────────────────────────────────────────────

/// `POST /conversations/{id}/read` — reset the unread counter.
pub async fn mark_conversation_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(conversation_id): Path<String>,
) -> Result<Json<Conversation>, ApiError> {
    let tenant = required_header(&headers, TENANT_HEADER)?;
    let conversation = state.service.mark_read(&tenant, &conversation_id).await?;
    Ok(Json(conversation))
}

#[derive(Debug, Deserialize)]
pub struct BotToggleRequest {
    pub enabled: bool,
}

/// `POST /conversations/{id}/bot` — toggle the conversation's bot flag.
pub async fn toggle_conversation_bot(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(conversation_id): Path<String>,
    Json(request): Json<BotToggleRequest>,
) -> Result<Json<Conversation>, ApiError> {
    let tenant = required_header(&headers, TENANT_HEADER)?;
    let conversation = state
        .service
        .set_bot_enabled(&tenant, &conversation_id, request.enabled)
        .await?;
    Ok(Json(conversation))
}

// ── Health ───────────────────────────────────────────────────────────────────

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}
