//! WebSocket sessions.
//!
//! A client connects with `?tenant=<id-or-slug>`; after resolution the
//! session joins exactly that tenant's room and receives event frames until
//! it disconnects. Clients send nothing meaningful — the socket is a
//! server-push surface.

use {
    axum::{
        extract::{
            Query, State, WebSocketUpgrade,
            ws::{Message, WebSocket},
        },
        response::{IntoResponse, Response},
    },
    futures::{SinkExt, stream::StreamExt},
    serde::Deserialize,
    tokio::sync::mpsc,
    tracing::{debug, info, warn},
};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SocketQuery {
    pub tenant: String,
}

/// `GET /socket?tenant=<id-or-slug>` — upgrade and join the tenant room.
pub async fn socket_upgrade(
    State(state): State<AppState>,
    Query(query): Query<SocketQuery>,
    upgrade: WebSocketUpgrade,
) -> Response {
    // Resolve before upgrading so an unknown tenant is an HTTP 404, not a
    // silently dropped socket.
    let tenant_id = match state.tenants.resolve_id(&query.tenant).await {
        Ok(id) => id,
        Err(e) => {
            warn!(tenant = %query.tenant, error = %e, "socket rejected: unknown tenant");
            return crate::error::ApiError::from(e).into_response();
        },
    };

    upgrade.on_upgrade(move |socket| handle_connection(socket, state, tenant_id))
}

/// Drive one session: join the room, forward frames from the room channel
/// to the socket, clean up on disconnect.
async fn handle_connection(socket: WebSocket, state: AppState, tenant_id: String) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    info!(conn_id = %conn_id, tenant_id = %tenant_id, "ws: session connected");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (client_tx, mut client_rx) = mpsc::unbounded_channel::<String>();

    state.rooms.join(&tenant_id, &conn_id, client_tx).await;

    // Write loop: forward frames from the room into the socket.
    let write_conn_id = conn_id.clone();
    let write_handle = tokio::spawn(async move {
        while let Some(frame) = client_rx.recv().await {
            if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                debug!(conn_id = %write_conn_id, "ws: write loop closed");
                break;
            }
        }
    });

    // Read loop: the client is not expected to send anything; drain until
    // close so pings are answered and disconnects are observed.
    while let Some(message) = ws_rx.next().await {
        match message {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(other) => debug!(conn_id = %conn_id, "ws: ignoring client frame: {other:?}"),
        }
    }

    state.rooms.leave(&tenant_id, &conn_id).await;
    write_handle.abort();
    info!(conn_id = %conn_id, tenant_id = %tenant_id, "ws: session disconnected");
}
