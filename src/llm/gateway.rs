//! AI gateway chat client
//!
//! Opens a streaming completion against a Workers AI model routed through
//! the account's AI gateway.

use super::sse::ByteStream;
use super::{ChatClient, ChatRequest};
use crate::config::{GatewayConfig, REQUEST_TIMEOUT_SECS};
use crate::error::TurnError;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::time::Duration;

/// Streaming chat client for the AI gateway
pub struct GatewayChatClient {
    client: Client,
    config: GatewayConfig,
}

impl GatewayChatClient {
    /// # Errors
    /// Returns an unexpected error if the HTTP client cannot be built.
    pub fn new(config: GatewayConfig) -> Result<Self, TurnError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| TurnError::unexpected(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn endpoint(base_url: &str, account_id: &str, gateway_id: &str, model_id: &str) -> String {
        format!(
            "{}/{account_id}/{gateway_id}/workers-ai/{model_id}",
            base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl ChatClient for GatewayChatClient {
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, TurnError> {
        let creds = self.config.chat_credentials()?;
        let url = Self::endpoint(
            &creds.base_url,
            &creds.account_id,
            &creds.gateway_id,
            &request.model_id,
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&creds.token)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TurnError::transport(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    TurnError::transport(format!("Connection failed: {e}"))
                } else {
                    TurnError::transport(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TurnError::transport(format!("HTTP {status}: {body}")));
        }

        Ok(Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(std::io::Error::other)),
        ))
    }
}
