//! Outbound sends through the Instagram Messaging API.

use {
    secrecy::{ExposeSecret, Secret},
    serde_json::json,
    tracing::info,
};

use parley_common::{MessageMedia, MessageType};

use crate::types::SendResponse;

/// Default Graph API base. Overridable so tests can point at a local double.
pub const DEFAULT_GRAPH_BASE: &str = "https://graph.instagram.com/v23.0";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The Messaging API answered with a non-success status.
    #[error("instagram api rejected send ({status}): {body}")]
    Upstream { status: u16, body: String },

    /// The outbound content cannot be expressed as a Messaging API request.
    #[error("invalid outbound instagram message: {0}")]
    InvalidContent(String),

    /// Transport-level failure.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Thin client over `POST /me/messages`.
#[derive(Debug, Clone)]
pub struct InstagramClient {
    http: reqwest::Client,
    base_url: String,
}

impl Default for InstagramClient {
    fn default() -> Self {
        Self::new(DEFAULT_GRAPH_BASE)
    }
}

impl InstagramClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Send a message to `recipient_igsid` and return the Messaging API ack.
    pub async fn send_message(
        &self,
        access_token: &Secret<String>,
        recipient_igsid: &str,
        message_type: MessageType,
        body: Option<&str>,
        media: Option<&MessageMedia>,
    ) -> Result<SendResponse, Error> {
        let request = build_request(recipient_igsid, message_type, body, media)?;

        let url = format!("{}/me/messages", self.base_url);
        let resp = self
            .http
            .post(url)
            .bearer_auth(access_token.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Upstream { status, body });
        }

        let ack: SendResponse = resp.json().await?;
        info!(
            recipient_igsid,
            message_type = %message_type,
            mid = %ack.message_id,
            "instagram outbound sent"
        );
        Ok(ack)
    }
}

fn build_request(
    recipient_igsid: &str,
    message_type: MessageType,
    body: Option<&str>,
    media: Option<&MessageMedia>,
) -> Result<serde_json::Value, Error> {
    let message = if message_type == MessageType::Text {
        let body = body
            .filter(|b| !b.is_empty())
            .ok_or_else(|| Error::InvalidContent("text message requires a body".into()))?;
        json!({ "text": body })
    } else {
        let kind = match message_type {
            MessageType::Image => "image",
            MessageType::Audio => "audio",
            MessageType::Video => "video",
            MessageType::Document => "file",
            other => {
                return Err(Error::InvalidContent(format!(
                    "unsupported outbound type {other}"
                )));
            },
        };
        let url = media
            .and_then(|m| m.url.as_deref())
            .ok_or_else(|| Error::InvalidContent("media requires a direct url".into()))?;
        json!({ "attachment": { "type": kind, "payload": { "url": url } } })
    };

    Ok(json!({
        "recipient": { "id": recipient_igsid },
        "message": message,
    }))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> Secret<String> {
        Secret::new("ig-token".to_string())
    }

    #[test]
    fn text_request_shape() {
        let req = build_request("26171369109181060", MessageType::Text, Some("hola"), None).unwrap();
        assert_eq!(req["recipient"]["id"], "26171369109181060");
        assert_eq!(req["message"]["text"], "hola");
    }

    #[test]
    fn image_request_uses_attachment_url() {
        let media = MessageMedia {
            url: Some("https://cdn.example/p.jpg".into()),
            ..Default::default()
        };
        let req = build_request("1", MessageType::Image, None, Some(&media)).unwrap();
        assert_eq!(req["message"]["attachment"]["type"], "image");
        assert_eq!(
            req["message"]["attachment"]["payload"]["url"],
            "https://cdn.example/p.jpg"
        );
    }

    #[test]
    fn document_maps_to_file_attachment() {
        let media = MessageMedia {
            url: Some("https://cdn.example/f.pdf".into()),
            ..Default::default()
        };
        let req = build_request("1", MessageType::Document, None, Some(&media)).unwrap();
        assert_eq!(req["message"]["attachment"]["type"], "file");
    }

    #[test]
    fn media_without_url_is_invalid() {
        let media = MessageMedia {
            whatsapp_media_id: Some("media-1".into()),
            ..Default::default()
        };
        let err = build_request("1", MessageType::Image, None, Some(&media)).unwrap_err();
        assert!(matches!(err, Error::InvalidContent(_)));
    }

    #[tokio::test]
    async fn send_message_parses_ack() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/me/messages")
            .match_header("authorization", "Bearer ig-token")
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "recipient_id": "26171369109181060",
                    "message_id": "mid.out1"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = InstagramClient::new(server.url());
        let ack = client
            .send_message(
                &token(),
                "26171369109181060",
                MessageType::Text,
                Some("hola"),
                None,
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(ack.recipient_id, "26171369109181060");
        assert_eq!(ack.message_id, "mid.out1");
    }

    #[tokio::test]
    async fn send_message_surfaces_upstream_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/me/messages")
            .with_status(403)
            .with_body(r#"{"error":{"message":"token expired"}}"#)
            .create_async()
            .await;

        let client = InstagramClient::new(server.url());
        let err = client
            .send_message(&token(), "1", MessageType::Text, Some("x"), None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Upstream { status: 403, .. }));
    }
}
