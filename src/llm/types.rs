//! Wire types for the streaming chat endpoint

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Streaming chat request
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Routed through the URL path, not the body
    #[serde(skip)]
    pub model_id: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

/// Message in the outgoing history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Message role on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// Tool definition
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "parameters")]
    pub input_schema: Value,
}

/// One decoded server-sent-event payload
#[derive(Debug, Clone, PartialEq)]
pub enum StreamPayload {
    /// Plain text fragment (`{"response": "..."}`)
    Text(String),
    /// Structured tool invocation (`{"type": "tool_use", ...}`); the whole
    /// object is kept so the directive parser can pick the arguments field
    ToolUse {
        name: String,
        fields: Map<String, Value>,
    },
}

impl StreamPayload {
    /// Classify a decoded JSON payload. Non-object payloads carry nothing
    /// and yield `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(fields) = value else {
            return None;
        };

        if fields.get("type").and_then(Value::as_str) == Some("tool_use") {
            let name = fields
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            return Some(StreamPayload::ToolUse { name, fields });
        }

        let text = fields
            .get("response")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Some(StreamPayload::Text(text))
    }
}
