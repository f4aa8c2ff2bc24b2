//! Workers AI image client

use crate::config::{GatewayConfig, REQUEST_TIMEOUT_SECS};
use crate::error::TurnError;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Text-to-image request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRequest {
    pub prompt: String,
    pub num_steps: u32,
    pub width: u32,
    pub height: u32,
}

/// Raw response; interpretation depends on the content type
#[derive(Debug, Clone)]
pub struct ImageResponse {
    pub content_type: String,
    pub body: Bytes,
}

/// Common interface for image backends
#[async_trait]
pub trait ImageClient: Send + Sync {
    async fn run(&self, model_id: &str, request: &ImageRequest)
        -> Result<ImageResponse, TurnError>;
}

#[async_trait]
impl<T: ImageClient + ?Sized> ImageClient for Arc<T> {
    async fn run(
        &self,
        model_id: &str,
        request: &ImageRequest,
    ) -> Result<ImageResponse, TurnError> {
        (**self).run(model_id, request).await
    }
}

/// Image client for the account's Workers AI endpoint
pub struct CloudflareImageClient {
    client: Client,
    config: GatewayConfig,
}

impl CloudflareImageClient {
    /// # Errors
    /// Returns an unexpected error if the HTTP client cannot be built.
    pub fn new(config: GatewayConfig) -> Result<Self, TurnError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| TurnError::unexpected(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn endpoint(base_url: &str, account_id: &str, model_id: &str) -> String {
        format!(
            "{}/{account_id}/ai/run/{model_id}",
            base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl ImageClient for CloudflareImageClient {
    async fn run(
        &self,
        model_id: &str,
        request: &ImageRequest,
    ) -> Result<ImageResponse, TurnError> {
        let creds = self.config.image_credentials()?;
        let url = Self::endpoint(&creds.base_url, &creds.account_id, model_id);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&creds.token)
            .json(request)
            .send()
            .await
            .map_err(|e| TurnError::transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TurnError::transport(format!("HTTP {status}: {body}")));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response
            .bytes()
            .await
            .map_err(|e| TurnError::transport(e.to_string()))?;

        Ok(ImageResponse { content_type, body })
    }
}
