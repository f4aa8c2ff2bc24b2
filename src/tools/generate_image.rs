//! `generate_image` tool input and declaration

use crate::directive::ToolCallDescriptor;
use crate::error::TurnError;
use crate::image::DEFAULT_STYLE;
use crate::llm::ToolDefinition;
use serde::Deserialize;
use serde_json::{json, Value};

pub const GENERATE_IMAGE: &str = "generate_image";

/// Validated tool input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateImageInput {
    pub prompt: String,
    pub style: String,
}

#[derive(Deserialize)]
struct RawInput {
    prompt: String,
    #[serde(default)]
    style: Option<String>,
}

impl GenerateImageInput {
    /// # Errors
    /// A protocol error for any tool other than `generate_image` or a
    /// missing or empty prompt.
    pub fn from_descriptor(descriptor: &ToolCallDescriptor) -> Result<Self, TurnError> {
        if descriptor.name != GENERATE_IMAGE {
            return Err(TurnError::protocol(format!(
                "unknown tool '{}'",
                descriptor.name
            )));
        }

        let raw: RawInput = serde_json::from_value(Value::Object(descriptor.arguments.clone()))
            .map_err(|e| TurnError::protocol(format!("invalid arguments: {e}")))?;

        let prompt = raw.prompt.trim().to_string();
        if prompt.is_empty() {
            return Err(TurnError::protocol("invalid arguments: empty prompt"));
        }
        let style = raw
            .style
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_STYLE.to_string());
        Ok(Self { prompt, style })
    }

    /// Short description shown while the image is generated
    pub fn describe(&self) -> String {
        format!("Generating image: {} ({})", self.prompt, self.style)
    }
}

/// Declaration sent with every chat request
pub fn image_tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: GENERATE_IMAGE.to_string(),
        description: "Generate an image from a text description.".to_string(),
        input_schema: json!({
            "type": "object",
            "required": ["prompt"],
            "properties": {
                "prompt": {
                    "type": "string",
                    "description": "Detailed description of the image to generate"
                },
                "style": {
                    "type": "string",
                    "description": "Art style, e.g. photorealistic, anime, watercolor"
                }
            }
        }),
    }
}
