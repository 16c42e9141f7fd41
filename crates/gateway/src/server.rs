use std::net::SocketAddr;

use {
    axum::{
        Router,
        routing::{get, post},
    },
    tower_http::cors::{Any, CorsLayer},
    tracing::info,
};

use crate::{routes, state::AppState, ws};

/// Build the router (shared between production startup and tests).
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health))
        .route(
            "/messages/receive",
            post(routes::receive_message).get(routes::verify_subscription),
        )
        .route("/messages/bot-response", post(routes::bot_response))
        .route("/messages/send", post(routes::send_message))
        .route(
            "/conversations/{id}/read",
            post(routes::mark_conversation_read),
        )
        .route(
            "/conversations/{id}/bot",
            post(routes::toggle_conversation_bot),
        )
        .route("/socket", get(ws::socket_upgrade))
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: AppState, addr: SocketAddr) -> std::io::Result<()> {
    let app = build_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "gateway listening");
    axum::serve(listener, app).await
}
