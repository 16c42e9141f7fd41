//! Per-tenant room broadcaster.
//!
//! One room per tenant id; every authenticated WebSocket session joins
//! exactly one room. Delivery is best-effort, at-most-once: a frame is
//! serialized once and pushed to each session's write channel without ever
//! blocking — a closed or slow session simply misses the event.

use std::collections::HashMap;

use {
    async_trait::async_trait,
    serde::Serialize,
    tokio::sync::{RwLock, mpsc},
    tracing::{debug, warn},
};

use parley_inbox::{EventSink, InboxEvent};

/// Wire frame pushed to clients.
#[derive(Debug, Serialize)]
pub struct EventFrame<'a> {
    pub event: &'a str,
    pub payload: serde_json::Value,
    pub ts: i64,
}

#[derive(Default)]
pub struct TenantRooms {
    inner: RwLock<HashMap<String, HashMap<String, mpsc::UnboundedSender<String>>>>,
}

impl TenantRooms {
    /// Add a session to its tenant's room.
    pub async fn join(&self, tenant_id: &str, conn_id: &str, sender: mpsc::UnboundedSender<String>) {
        let mut rooms = self.inner.write().await;
        rooms
            .entry(tenant_id.to_string())
            .or_default()
            .insert(conn_id.to_string(), sender);
        debug!(tenant_id, conn_id, "session joined tenant room");
    }

    /// Remove a session; empty rooms are dropped.
    pub async fn leave(&self, tenant_id: &str, conn_id: &str) {
        let mut rooms = self.inner.write().await;
        if let Some(room) = rooms.get_mut(tenant_id) {
            room.remove(conn_id);
            if room.is_empty() {
                rooms.remove(tenant_id);
            }
        }
        debug!(tenant_id, conn_id, "session left tenant room");
    }

    /// Sessions currently in a tenant's room.
    pub async fn session_count(&self, tenant_id: &str) -> usize {
        self.inner
            .read()
            .await
            .get(tenant_id)
            .map(HashMap::len)
            .unwrap_or(0)
    }

    /// Deliver an event to every session in the tenant's room.
    pub async fn emit_to_tenant(&self, tenant_id: &str, event: &str, payload: serde_json::Value) {
        let frame = EventFrame {
            event,
            payload,
            ts: parley_common::now_ms(),
        };
        let json = match serde_json::to_string(&frame) {
            Ok(j) => j,
            Err(e) => {
                warn!(event, "failed to serialize event frame: {e}");
                return;
            },
        };

        let rooms = self.inner.read().await;
        let Some(room) = rooms.get(tenant_id) else {
            debug!(tenant_id, event, "no sessions in room, dropping event");
            return;
        };
        debug!(tenant_id, event, sessions = room.len(), "broadcasting event");
        for (conn_id, sender) in room {
            // A closed receiver means the session is mid-disconnect; its
            // read loop cleans the room up.
            if sender.send(json.clone()).is_err() {
                debug!(tenant_id, conn_id, "session channel closed, skipping");
            }
        }
    }
}

#[async_trait]
impl EventSink for TenantRooms {
    async fn emit(&self, tenant_id: &str, event: InboxEvent) {
        let payload = match serde_json::to_value(&event) {
            Ok(v) => v,
            Err(e) => {
                warn!("failed to serialize inbox event: {e}");
                return;
            },
        };
        self.emit_to_tenant(tenant_id, event.name(), payload).await;
    }
}
