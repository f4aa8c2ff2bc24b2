//! Image generation workflow
//!
//! Builds the request from the current settings, interprets the response by
//! content type and records the result. Never touches conversation state;
//! callers decide how to surface the outcome.

use super::client::{ImageClient, ImageRequest};
use super::settings::{image_model_id, ImageSettings, DEFAULT_STEPS};
use crate::error::TurnError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Chat tool calls ignore the quality setting
const TOOL_STEPS: u32 = DEFAULT_STEPS;

/// One entry in the image history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    /// Full prompt sent to the model, style suffix included
    pub prompt: String,
    /// Data URI
    pub image_data: String,
    /// Unix seconds
    pub timestamp: i64,
}

#[derive(Deserialize)]
struct JsonEnvelope {
    result: JsonResult,
}

#[derive(Deserialize)]
struct JsonResult {
    image: String,
}

/// Turn a response body into a data URI.
///
/// # Errors
/// Unknown content types and JSON bodies without `result.image` are
/// unexpected errors.
pub fn decode_image_response(content_type: &str, body: &[u8]) -> Result<String, TurnError> {
    if content_type.contains("image/png") {
        Ok(format!("{DATA_URI_PREFIX}{}", STANDARD.encode(body)))
    } else if content_type.contains("application/json") {
        let envelope: JsonEnvelope = serde_json::from_slice(body)
            .map_err(|e| TurnError::unexpected(format!("Malformed image response: {e}")))?;
        Ok(format!("{DATA_URI_PREFIX}{}", envelope.result.image))
    } else {
        Err(TurnError::unexpected(format!(
            "Unexpected content type: {content_type}"
        )))
    }
}

#[derive(Debug, Default)]
struct StudioState {
    settings: ImageSettings,
    history: Vec<GeneratedImage>,
    is_generating: bool,
    error_message: String,
}

/// Image generation component shared by the image page and the chat tool
pub struct ImageGenerator<I> {
    client: I,
    state: Arc<Mutex<StudioState>>,
}

impl<I: ImageClient> ImageGenerator<I> {
    pub fn new(client: I) -> Self {
        Self {
            client,
            state: Arc::new(Mutex::new(StudioState::default())),
        }
    }

    pub async fn settings(&self) -> ImageSettings {
        self.state.lock().await.settings.clone()
    }

    pub async fn update_settings<R>(&self, f: impl FnOnce(&mut ImageSettings) -> R) -> R {
        f(&mut self.state.lock().await.settings)
    }

    pub async fn history(&self) -> Vec<GeneratedImage> {
        self.state.lock().await.history.clone()
    }

    pub async fn latest_image(&self) -> Option<GeneratedImage> {
        self.state.lock().await.history.last().cloned()
    }

    pub async fn is_generating(&self) -> bool {
        self.state.lock().await.is_generating
    }

    /// Banner text from the last direct generation
    pub async fn error_message(&self) -> String {
        self.state.lock().await.error_message.clone()
    }

    /// Direct generation with the selected style. Tracks its own progress
    /// flag and error banner.
    ///
    /// # Errors
    /// Rejects empty prompts and overlapping requests; otherwise returns the
    /// failure that was also written to the banner.
    pub async fn generate(&self, prompt: &str) -> Result<GeneratedImage, TurnError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(TurnError::protocol("Please enter a prompt."));
        }

        let (style, steps) = {
            let mut state = self.state.lock().await;
            if state.is_generating {
                return Err(TurnError::protocol("An image is already being generated."));
            }
            state.is_generating = true;
            state.error_message.clear();
            (state.settings.style().to_string(), state.settings.steps())
        };

        let result = self.run(prompt, &style, steps).await;

        let mut state = self.state.lock().await;
        state.is_generating = false;
        if let Err(e) = &result {
            state.error_message = e.banner_text();
        }
        result
    }

    /// Generation requested by a chat tool call. Returns the data URI.
    ///
    /// # Errors
    /// Any configuration, transport or decoding failure.
    pub async fn generate_for_tool(&self, prompt: &str, style: &str) -> Result<String, TurnError> {
        self.run(prompt, style, TOOL_STEPS)
            .await
            .map(|image| image.image_data)
    }

    async fn run(
        &self,
        prompt: &str,
        style: &str,
        num_steps: u32,
    ) -> Result<GeneratedImage, TurnError> {
        let full_prompt = format!("{prompt}, {style} style");
        let settings = self.settings().await;
        let model_id = image_model_id(settings.model())
            .ok_or_else(|| TurnError::configuration("Invalid image model selected."))?;
        let size = settings.size();
        let request = ImageRequest {
            prompt: full_prompt.clone(),
            num_steps,
            width: size.width,
            height: size.height,
        };

        let start = std::time::Instant::now();
        let decoded = match self.client.run(model_id, &request).await {
            Ok(response) => decode_image_response(&response.content_type, &response.body),
            Err(e) => Err(e),
        };
        let image_data = match decoded {
            Ok(data) => data,
            Err(e) => {
                tracing::error!(model = %model_id, error = %e, kind = ?e.kind, "Image generation failed");
                return Err(e);
            }
        };
        tracing::info!(
            model = %model_id,
            duration_ms = %start.elapsed().as_millis(),
            width = size.width,
            height = size.height,
            "Image generated"
        );

        let image = GeneratedImage {
            prompt: full_prompt,
            image_data,
            timestamp: Utc::now().timestamp(),
        };
        self.state.lock().await.history.push(image.clone());
        Ok(image)
    }
}
