//! Telegram Bot API `sendMessage` client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{NotificationTransport, TransportError, UNKNOWN_ERROR};

/// Default Bot API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.telegram.org";

/// Default per-call timeout.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct SendMessageResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    description: String,
}

/// HTTP client for the Telegram Bot API.
#[derive(Debug, Clone)]
pub struct TelegramClient {
    client: Client,
    base_url: String,
}

impl TelegramClient {
    /// Build a client with the given per-call timeout. A zero timeout falls
    /// back to [`DEFAULT_SEND_TIMEOUT`].
    pub fn new(send_timeout: Duration) -> Result<Self, TransportError> {
        let send_timeout = if send_timeout.is_zero() {
            DEFAULT_SEND_TIMEOUT
        } else {
            send_timeout
        };

        let client = Client::builder().timeout(send_timeout).build()?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the client at a different Bot API host (self-hosted server or test stub).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn send_message_url(&self, bot_token: &str) -> String {
        format!("{}/bot{}/sendMessage", self.base_url, bot_token)
    }
}

#[async_trait]
impl NotificationTransport for TelegramClient {
    async fn notify(
        &self,
        bot_token: &str,
        chat_id: &str,
        text: &str,
    ) -> Result<(), TransportError> {
        if bot_token.is_empty() || chat_id.is_empty() {
            return Err(TransportError::InvalidDestination);
        }

        // The request URL embeds the bot token; strip it from errors before
        // they end up in the send log.
        let response = self
            .client
            .post(self.send_message_url(bot_token))
            .json(&SendMessageRequest { chat_id, text })
            .send()
            .await
            .map_err(|e| TransportError::Request(e.without_url()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Request(e.without_url()))?;

        let parsed = match serde_json::from_slice::<SendMessageResponse>(&body) {
            Ok(parsed) => parsed,
            Err(e) if status.is_success() => return Err(TransportError::Decode(e.to_string())),
            Err(_) => SendMessageResponse::default(),
        };

        if !status.is_success() || !parsed.ok {
            let description = if parsed.description.is_empty() {
                UNKNOWN_ERROR.to_string()
            } else {
                parsed.description
            };
            tracing::debug!(
                status = status.as_u16(),
                %description,
                "Telegram rejected sendMessage"
            );
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                description,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> TelegramClient {
        TelegramClient::new(Duration::from_secs(2))
            .unwrap()
            .with_base_url(base_url)
    }

    #[tokio::test]
    async fn test_send_message_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .and(body_json(serde_json::json!({
                "chat_id": "-100500",
                "text": "hello"
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        client.notify("123:abc", "-100500", "hello").await.unwrap();
    }

    #[tokio::test]
    async fn test_not_ok_flag_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": false,
                "description": "Bad Request: chat not found"
            })))
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .notify("t", "c", "x")
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "telegram sendMessage failed (status=200): Bad Request: chat not found"
        );
    }

    #[tokio::test]
    async fn test_error_status_without_description_uses_default() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .notify("t", "c", "x")
            .await
            .unwrap_err();
        match err {
            TransportError::Rejected {
                status,
                description,
            } => {
                assert_eq!(status, 502);
                assert_eq!(description, UNKNOWN_ERROR);
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unauthorized_keeps_description() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "ok": false,
                "error_code": 401,
                "description": "Unauthorized"
            })))
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .notify("t", "c", "x")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unauthorized"));
        assert!(err.to_string().contains("status=401"));
    }

    #[tokio::test]
    async fn test_blank_destination_rejected_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        assert!(matches!(
            client.notify("", "chat", "x").await,
            Err(TransportError::InvalidDestination)
        ));
        assert!(matches!(
            client.notify("token", "", "x").await,
            Err(TransportError::InvalidDestination)
        ));
    }

    #[tokio::test]
    async fn test_undecodable_success_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .notify("t", "c", "x")
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Decode(_)));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = TelegramClient::new(Duration::ZERO)
            .unwrap()
            .with_base_url("http://localhost:8081/");
        assert_eq!(
            client.send_message_url("42:x"),
            "http://localhost:8081/bot42:x/sendMessage"
        );
    }
}
