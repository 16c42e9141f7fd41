//! HTTP + WebSocket surface: webhook receive, bot-response, agent send,
//! conversation-state endpoints, and the per-tenant room broadcaster.

pub mod broadcast;
pub mod error;
pub mod routes;
pub mod server;
pub mod state;
pub mod ws;

pub use {
    broadcast::TenantRooms,
    server::{build_app, serve},
    state::AppState,
};
