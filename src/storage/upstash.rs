use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::StoreError;
use crate::storage::SeenStore;

/// Seen-set backed by an Upstash Redis REST endpoint.
///
/// Commands are posted as JSON arrays (`["SISMEMBER", key, member]`) with bearer
/// auth. Only SISMEMBER and SADD are ever issued.
pub struct UpstashStore {
    client: Client,
    endpoint: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct CommandResponse {
    result: Option<Value>,
    error: Option<String>,
}

impl UpstashStore {
    pub fn new(client: Client, endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            token: token.into(),
        }
    }

    async fn command(&self, args: &[&str]) -> Result<Value, StoreError> {
        debug!("Upstash {} {}", args[0], args.get(1).unwrap_or(&""));

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(args)
            .send()
            .await
            .map_err(StoreError::Request)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(StoreError::Status { status, body });
        }

        let body: CommandResponse = response.json().await.map_err(StoreError::Request)?;
        if let Some(error) = body.error {
            return Err(StoreError::Rejected(error));
        }

        body.result
            .ok_or_else(|| StoreError::MalformedResponse("missing `result` field".to_string()))
    }
}

#[async_trait]
impl SeenStore for UpstashStore {
    async fn is_member(&self, key: &str, url: &str) -> Result<bool, StoreError> {
        let result = self.command(&["SISMEMBER", key, url]).await?;

        match result.as_i64() {
            Some(1) => Ok(true),
            Some(0) => Ok(false),
            _ => Err(StoreError::MalformedResponse(format!(
                "SISMEMBER returned {}",
                result
            ))),
        }
    }

    async fn add_all(&self, key: &str, urls: &[String]) -> Result<(), StoreError> {
        if urls.is_empty() {
            return Ok(());
        }

        let mut args = Vec::with_capacity(urls.len() + 2);
        args.push("SADD");
        args.push(key);
        args.extend(urls.iter().map(String::as_str));

        self.command(&args).await?;
        Ok(())
    }
}
