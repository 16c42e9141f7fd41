//! Outbound sends through the WhatsApp Cloud API.

use {
    secrecy::{ExposeSecret, Secret},
    serde_json::json,
    tracing::info,
};

use parley_common::{MessageMedia, MessageType};

use crate::types::SendResponse;

/// Default Graph API base. Overridable so tests can point at a local double.
pub const DEFAULT_GRAPH_BASE: &str = "https://graph.facebook.com/v23.0";

/// Typed errors for the send path.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The Cloud API answered with a non-success status.
    #[error("whatsapp api rejected send ({status}): {body}")]
    Upstream { status: u16, body: String },

    /// The outbound content cannot be expressed as a Cloud API request.
    #[error("invalid outbound whatsapp message: {0}")]
    InvalidContent(String),

    /// Transport-level failure.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Thin client over `POST /{phone_number_id}/messages`.
#[derive(Debug, Clone)]
pub struct WhatsAppClient {
    http: reqwest::Client,
    base_url: String,
}

impl Default for WhatsAppClient {
    fn default() -> Self {
        Self::new(DEFAULT_GRAPH_BASE)
    }
}

impl WhatsAppClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Send a message to `to` (a wa_id) and return the Cloud API ack.
    ///
    /// A non-success response is an error before anything is persisted by
    /// the caller.
    pub async fn send_message(
        &self,
        access_token: &Secret<String>,
        phone_number_id: &str,
        to: &str,
        message_type: MessageType,
        body: Option<&str>,
        media: Option<&MessageMedia>,
    ) -> Result<SendResponse, Error> {
        let request = build_request(to, message_type, body, media)?;

        let url = format!("{}/{phone_number_id}/messages", self.base_url);
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
            phone_number_id,
            to,
            message_type = %message_type,
            wamid = ack.message_id().unwrap_or("<missing>"),
            "whatsapp outbound sent"
        );
        Ok(ack)
    }
}

/// Build the Cloud API request body for the given content.
fn build_request(
    to: &str,
    message_type: MessageType,
    body: Option<&str>,
    media: Option<&MessageMedia>,
) -> Result<serde_json::Value, Error> {
    if message_type == MessageType::Text {
        let body = body
            .filter(|b| !b.is_empty())
            .ok_or_else(|| Error::InvalidContent("text message requires a body".into()))?;
        return Ok(json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "text",
            "text": { "body": body },
        }));
    }

    if !message_type.is_media() {
        return Err(Error::InvalidContent(format!(
            "unsupported outbound type {message_type}"
        )));
    }

    let media = media
        .ok_or_else(|| Error::InvalidContent(format!("{message_type} message requires media")))?;

    // Uploaded-media id wins over a direct link.
    let mut object = if let Some(id) = &media.whatsapp_media_id {
        json!({ "id": id })
    } else if let Some(url) = &media.url {
        json!({ "link": url })
    } else {
        return Err(Error::InvalidContent(
            "media requires a whatsapp media id or a link".into(),
        ));
    };

    // Captions are supported on image/video/document; filename on document.
    if let Some(obj) = object.as_object_mut() {
        if matches!(
            message_type,
            MessageType::Image | MessageType::Video | MessageType::Document
        ) && let Some(caption) = &media.caption
        {
            obj.insert("caption".into(), json!(caption));
        }
        if message_type == MessageType::Document
            && let Some(filename) = &media.filename
        {
            obj.insert("filename".into(), json!(filename));
        }
    }

    let kind = match message_type {
        MessageType::Image => "image",
        MessageType::Audio => "audio",
        MessageType::Video => "video",
        MessageType::Document => "document",
        // is_media() leaves only sticker.
        _ => "sticker",
    };

    Ok(json!({
        "messaging_product": "whatsapp",
        "to": to,
        "type": kind,
        kind: object,
    }))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> Secret<String> {
        Secret::new("test-token".to_string())
    }

    #[test]
    fn text_request_shape() {
        let req = build_request("584147083834", MessageType::Text, Some("hi"), None).unwrap();
        assert_eq!(req["messaging_product"], "whatsapp");
        assert_eq!(req["to"], "584147083834");
        assert_eq!(req["type"], "text");
        assert_eq!(req["text"]["body"], "hi");
    }

    #[test]
    fn text_without_body_is_invalid() {
        let err = build_request("1", MessageType::Text, None, None).unwrap_err();
        assert!(matches!(err, Error::InvalidContent(_)));
    }

    #[test]
    fn document_request_uses_link_caption_and_filename() {
        let media = MessageMedia {
            url: Some("https://cdn.example/f.pdf".into()),
            caption: Some("invoice".into()),
            filename: Some("invoice.pdf".into()),
            ..Default::default()
        };
        let req = build_request("1", MessageType::Document, None, Some(&media)).unwrap();
        assert_eq!(req["type"], "document");
        assert_eq!(req["document"]["link"], "https://cdn.example/f.pdf");
        assert_eq!(req["document"]["caption"], "invoice");
        assert_eq!(req["document"]["filename"], "invoice.pdf");
    }

    #[test]
    fn uploaded_media_id_wins_over_link() {
        let media = MessageMedia {
            whatsapp_media_id: Some("media-9".into()),
            url: Some("https://cdn.example/x.jpg".into()),
            ..Default::default()
        };
        let req = build_request("1", MessageType::Image, None, Some(&media)).unwrap();
        assert_eq!(req["image"]["id"], "media-9");
        assert!(req["image"].get("link").is_none());
    }

    #[test]
    fn non_media_non_text_type_is_invalid() {
        let err = build_request("1", MessageType::Reaction, Some("x"), None).unwrap_err();
        assert!(matches!(err, Error::InvalidContent(_)));
    }

    #[tokio::test]
    async fn send_message_parses_ack() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/642317185638668/messages")
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "messaging_product": "whatsapp",
                    "contacts": [{ "input": "584147083834", "wa_id": "584147083834" }],
                    "messages": [{ "id": "wamid.out1" }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = WhatsAppClient::new(server.url());
        let ack = client
            .send_message(
                &token(),
                "642317185638668",
                "584147083834",
                MessageType::Text,
                Some("hello"),
                None,
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(ack.message_id(), Some("wamid.out1"));
        assert_eq!(ack.recipient_wa_id(), Some("584147083834"));
    }

    #[tokio::test]
    async fn send_message_surfaces_upstream_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/pn/messages")
            .with_status(400)
            .with_body(r#"{"error":{"message":"bad token"}}"#)
            .create_async()
            .await;

        let client = WhatsAppClient::new(server.url());
        let err = client
            .send_message(&token(), "pn", "1", MessageType::Text, Some("x"), None)
            .await
            .unwrap_err();

        match err {
            Error::Upstream { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("bad token"));
            },
            other => panic!("unexpected error: {other}"),
        }
    }
}
