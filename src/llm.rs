//! Chat model access
//!
//! Provides the streaming chat interface and its gateway implementation.

mod gateway;
mod models;
pub mod sse;
mod types;

pub use gateway::GatewayChatClient;
pub use models::{all_chat_models, chat_model_id, ChatModelDef, DEFAULT_CHAT_MODEL};
pub use sse::{payload_stream, ByteStream, PayloadStream};
pub use types::*;

use crate::error::TurnError;
use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for streaming chat backends
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Open a streaming completion and return the raw response body.
    /// Non-success statuses are reported as errors before any body is read.
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, TurnError>;
}

#[async_trait]
impl<T: ChatClient + ?Sized> ChatClient for Arc<T> {
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, TurnError> {
        (**self).open_stream(request).await
    }
}

/// Logging wrapper for chat clients
pub struct LoggingChatClient<C> {
    inner: C,
}

impl<C: ChatClient> LoggingChatClient<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<C: ChatClient> ChatClient for LoggingChatClient<C> {
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, TurnError> {
        let start = std::time::Instant::now();
        let result = self.inner.open_stream(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(_) => {
                tracing::info!(
                    model = %request.model_id,
                    duration_ms = %duration.as_millis(),
                    messages = request.messages.len(),
                    "Chat stream opened"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %request.model_id,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    kind = ?e.kind,
                    "Chat stream failed to open"
                );
            }
        }

        result
    }
}
