//! Integration tests for the HTTP + WebSocket surface: a real server on an
//! ephemeral port, driven by reqwest and a WebSocket client.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{net::SocketAddr, sync::Arc, time::Duration};

use {
    futures::StreamExt,
    secrecy::Secret,
    sqlx::SqlitePool,
    tokio_tungstenite::tungstenite::Message as WsMessage,
};

use {
    parley_common::NoopMediaCache,
    parley_gateway::{AppState, TenantRooms, build_app},
    parley_inbox::{InboxService, SqliteInboxStore},
    parley_instagram::InstagramClient,
    parley_tenants::{
        CredentialCipher, NewTenant, SqliteTenantStore, WhatsAppCredentials,
    },
    parley_whatsapp::WhatsAppClient,
};

struct TestServer {
    addr: SocketAddr,
    pool: SqlitePool,
    tenants: Arc<SqliteTenantStore>,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    fn ws_url(&self, tenant: &str) -> String {
        format!("ws://{}/socket?tenant={tenant}", self.addr)
    }
}

/// Start a server with two seeded tenants ("acme" and "globex") and Graph
/// clients pointed at `graph_base`.
async fn start_server(graph_base: &str) -> TestServer {
    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    SqliteTenantStore::init(&pool).await.unwrap();
    SqliteInboxStore::init(&pool).await.unwrap();

    let tenants = Arc::new(SqliteTenantStore::new(
        pool.clone(),
        CredentialCipher::new([3u8; 32]),
    ));
    for (slug, name) in [("acme", "Acme"), ("globex", "Globex")] {
        tenants
            .create(NewTenant {
                slug: slug.into(),
                name: name.into(),
            })
            .await
            .unwrap();
    }

    let store = Arc::new(SqliteInboxStore::new(pool.clone()));
    let rooms = Arc::new(TenantRooms::default());
    let service = Arc::new(InboxService {
        customers: store.clone(),
        conversations: store.clone(),
        messages: store,
        tenants: tenants.clone(),
        credentials: tenants.clone(),
        whatsapp: WhatsAppClient::new(graph_base),
        instagram: InstagramClient::new(graph_base),
        events: rooms.clone(),
        media: Arc::new(NoopMediaCache),
    });

    let state = AppState {
        service,
        tenants: tenants.clone(),
        credentials: tenants.clone(),
        rooms,
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, build_app(state)).await.unwrap();
    });

    TestServer {
        addr,
        pool,
        tenants,
    }
}

fn wa_webhook(wamid: &str, body: &str) -> serde_json::Value {
    serde_json::json!({
        "messaging_product": "whatsapp",
        "contacts": [{ "profile": { "name": "Miguel Vivas" }, "wa_id": "584147083834" }],
        "messages": [{
            "from": "584147083834",
            "id": wamid,
            "timestamp": "1770928719",
            "type": "text",
            "text": { "body": body }
        }],
        "field": "messages"
    })
}

async fn seed_wa_credentials(server: &TestServer, verify_token: &str) {
    use parley_tenants::TenantDirectory;

    let acme = server.tenants.resolve_id("acme").await.unwrap();
    server
        .tenants
        .set_whatsapp_credentials(&acme, &WhatsAppCredentials {
            access_token: Secret::new("token".into()),
            phone_number_id: "pn".into(),
            business_account_id: "biz".into(),
            webhook_verify_token: Some(verify_token.into()),
            app_secret: Secret::new("shh".into()),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn health_endpoint() {
    let server = start_server("http://127.0.0.1:9").await;
    let resp = reqwest::get(server.url("/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn webhook_roundtrip_returns_created_messages() {
    let server = start_server("http://127.0.0.1:9").await;
    let client = reqwest::Client::new();

    let resp = client
        .post(server.url("/messages/receive"))
        .header("Tenant-Id", "acme")
        .json(&wa_webhook("wamid.http1", "hi"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Vec<serde_json::Value> = resp.json().await.unwrap();
    assert_eq!(body.len(), 1);
    assert_eq!(body[0]["body"], "hi");
    assert_eq!(body[0]["direction"], "INBOUND");
    assert_eq!(body[0]["status"], "DELIVERED");
    assert_eq!(body[0]["sender"]["type"], "CUSTOMER");
}

#[tokio::test]
async fn webhook_without_tenant_header_is_rejected() {
    let server = start_server("http://127.0.0.1:9").await;
    let resp = reqwest::Client::new()
        .post(server.url("/messages/receive"))
        .json(&wa_webhook("wamid.x", "hi"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn webhook_for_unknown_tenant_is_404() {
    let server = start_server("http://127.0.0.1:9").await;
    let resp = reqwest::Client::new()
        .post(server.url("/messages/receive"))
        .header("Tenant-Id", "ghost")
        .json(&wa_webhook("wamid.x", "hi"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn unrecognized_payload_still_succeeds_with_empty_list() {
    let server = start_server("http://127.0.0.1:9").await;
    let resp = reqwest::Client::new()
        .post(server.url("/messages/receive"))
        .header("Tenant-Id", "acme")
        .json(&serde_json::json!({ "object": "page", "entry": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Vec<serde_json::Value> = resp.json().await.unwrap();
    assert!(body.is_empty());
}

#[tokio::test]
async fn subscription_handshake_echoes_challenge() {
    let server = start_server("http://127.0.0.1:9").await;
    seed_wa_credentials(&server, "verify-me").await;
    let client = reqwest::Client::new();

    let resp = client
        .get(server.url(
            "/messages/receive?hub.mode=subscribe&hub.verify_token=verify-me&hub.challenge=ch-42",
        ))
        .header("Tenant-Id", "acme")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "ch-42");

    let resp = client
        .get(server.url(
            "/messages/receive?hub.mode=subscribe&hub.verify_token=wrong&hub.challenge=ch-42",
        ))
        .header("Tenant-Id", "acme")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn bot_response_endpoint_creates_message() {
    let server = start_server("http://127.0.0.1:9").await;
    let resp = reqwest::Client::new()
        .post(server.url("/messages/bot-response"))
        .json(&serde_json::json!({
            "tenantId": "acme",
            "content": "thanks!",
            "metaResponse": { "recipient_id": "26171", "message_id": "mid.bot" }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["sender"], serde_json::json!({ "type": "BOT" }));
    assert_eq!(body["externalId"], "mid.bot");
    assert_eq!(body["channel"], "INSTAGRAM");
}

#[tokio::test]
async fn send_without_credentials_is_unprocessable() {
    let server = start_server("http://127.0.0.1:9").await;
    let client = reqwest::Client::new();

    // Seed a conversation through the webhook path first.
    let resp = client
        .post(server.url("/messages/receive"))
        .header("Tenant-Id", "acme")
        .json(&wa_webhook("wamid.seed", "hi"))
        .send()
        .await
        .unwrap();
    let created: Vec<serde_json::Value> = resp.json().await.unwrap();
    let conversation_id = created[0]["conversationId"].as_str().unwrap().to_string();

    let resp = client
        .post(server.url("/messages/send"))
        .header("Tenant-Id", "acme")
        .header("Agent-Id", "agent-1")
        .json(&serde_json::json!({
            "conversationId": conversation_id,
            "messageType": "TEXT",
            "body": "hello"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 422);
}

#[tokio::test]
async fn agent_send_succeeds_against_graph_double() {
    let mut graph = mockito::Server::new_async().await;
    graph
        .mock("POST", "/pn/messages")
        .with_status(200)
        .with_body(
            serde_json::json!({
                "messaging_product": "whatsapp",
                "contacts": [{ "wa_id": "584147083834" }],
                "messages": [{ "id": "wamid.sent" }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let server = start_server(&graph.url()).await;
    seed_wa_credentials(&server, "verify-me").await;
    let client = reqwest::Client::new();

    let resp = client
        .post(server.url("/messages/receive"))
        .header("Tenant-Id", "acme")
        .json(&wa_webhook("wamid.seed", "hi"))
        .send()
        .await
        .unwrap();
    let created: Vec<serde_json::Value> = resp.json().await.unwrap();
    let conversation_id = created[0]["conversationId"].as_str().unwrap().to_string();

    let resp = client
        .post(server.url("/messages/send"))
        .header("Tenant-Id", "acme")
        .header("Agent-Id", "agent-1")
        .json(&serde_json::json!({
            "conversationId": conversation_id,
            "messageType": "TEXT",
            "body": "how can we help?"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["externalId"], "wamid.sent");
    assert_eq!(body["direction"], "OUTBOUND");
    assert_eq!(body["sender"]["id"], "agent-1");
}

#[tokio::test]
async fn conversation_read_and_bot_toggle() {
    let server = start_server("http://127.0.0.1:9").await;
    let client = reqwest::Client::new();

    let resp = client
        .post(server.url("/messages/receive"))
        .header("Tenant-Id", "acme")
        .json(&wa_webhook("wamid.seed", "hi"))
        .send()
        .await
        .unwrap();
    let created: Vec<serde_json::Value> = resp.json().await.unwrap();
    let conversation_id = created[0]["conversationId"].as_str().unwrap().to_string();

    let resp = client
        .post(server.url(&format!("/conversations/{conversation_id}/read")))
        .header("Tenant-Id", "acme")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["unreadCount"], 0);

    let resp = client
        .post(server.url(&format!("/conversations/{conversation_id}/bot")))
        .header("Tenant-Id", "acme")
        .json(&serde_json::json!({ "enabled": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["botEnabled"], false);

    // A foreign tenant cannot touch the conversation.
    let resp = client
        .post(server.url(&format!("/conversations/{conversation_id}/read")))
        .header("Tenant-Id", "globex")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let row_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM conversations")
        .fetch_one(&server.pool)
        .await
        .unwrap();
    assert_eq!(row_count, 1);
}

#[tokio::test]
async fn websocket_fanout_is_scoped_to_the_tenant_room() {
    let server = start_server("http://127.0.0.1:9").await;

    let (mut acme_ws, _) = tokio_tungstenite::connect_async(server.ws_url("acme"))
        .await
        .unwrap();
    let (mut globex_ws, _) = tokio_tungstenite::connect_async(server.ws_url("globex"))
        .await
        .unwrap();
    // Give the sessions a beat to join their rooms.
    tokio::time::sleep(Duration::from_millis(100)).await;

    reqwest::Client::new()
        .post(server.url("/messages/receive"))
        .header("Tenant-Id", "acme")
        .json(&wa_webhook("wamid.ws1", "hi"))
        .send()
        .await
        .unwrap();

    let frame = tokio::time::timeout(Duration::from_secs(2), acme_ws.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let WsMessage::Text(text) = frame else {
        panic!("expected text frame");
    };
    let frame: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(frame["event"], "message_received");
    assert_eq!(frame["payload"]["message"]["body"], "hi");

    // The other tenant's session must see nothing.
    let nothing = tokio::time::timeout(Duration::from_millis(300), globex_ws.next()).await;
    assert!(nothing.is_err(), "globex session received a foreign event");
}

#[tokio::test]
async fn websocket_for_unknown_tenant_is_rejected() {
    let server = start_server("http://127.0.0.1:9").await;
    let result = tokio_tungstenite::connect_async(server.ws_url("ghost")).await;
    assert!(result.is_err());
}
