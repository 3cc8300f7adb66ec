pub mod message;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{error, info};

use crate::config::TelegramConfig;
use crate::error::NotifyError;

pub use message::format_message;

/// Delivers one text message. A single attempt per call.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), NotifyError>;
}

pub struct TelegramNotifier {
    client: Client,
    endpoint: String,
    chat_id: String,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

impl TelegramNotifier {
    pub fn new(client: Client, config: &TelegramConfig) -> Self {
        Self {
            client,
            endpoint: format!(
                "{}/bot{}/sendMessage",
                config.api_url.trim_end_matches('/'),
                config.bot_token
            ),
            chat_id: config.chat_id.clone(),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text,
        };

        // The endpoint embeds the bot token, keep it out of error messages.
        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.without_url()))?;

        if response.status().is_success() {
            info!("Telegram message sent successfully");
            Ok(())
        } else {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("Telegram error: {} - {}", status, error_text);
            Err(NotifyError::Status {
                status,
                body: error_text,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notifier(server: &MockServer) -> TelegramNotifier {
        let config = TelegramConfig {
            api_url: format!("{}/", server.uri()),
            bot_token: "123:abc".to_string(),
            chat_id: "-100200".to_string(),
        };
        TelegramNotifier::new(Client::new(), &config)
    }

    #[tokio::test]
    async fn posts_chat_id_and_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .and(body_json(json!({ "chat_id": "-100200", "text": "Studio\n5000 грн" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;

        notifier(&server).send("Studio\n5000 грн").await.unwrap();
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string("Bad Request: chat not found"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = notifier(&server).send("hello").await.unwrap_err();

        match err {
            NotifyError::Status { status, body } => {
                assert_eq!(status.as_u16(), 400);
                assert_eq!(body, "Bad Request: chat not found");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn transport_error_does_not_leak_token() {
        let config = TelegramConfig {
            api_url: "http://127.0.0.1:1".to_string(),
            bot_token: "123:secret".to_string(),
            chat_id: "1".to_string(),
        };
        let notifier = TelegramNotifier::new(Client::new(), &config);

        let err = notifier.send("hello").await.unwrap_err();

        assert!(matches!(err, NotifyError::Request(_)));
        assert!(!err.to_string().contains("secret"));
    }
}
