//! Chat model catalog
//!
//! Users pick a model by display name; requests are routed by model ID.

/// Chat model definition
#[derive(Debug, Clone, Copy)]
pub struct ChatModelDef {
    /// User-facing name (e.g., "Llama 3.1 8B Instruct")
    pub name: &'static str,
    /// Workers AI model ID used in the gateway path
    pub id: &'static str,
}

/// Model selected for a fresh session
pub const DEFAULT_CHAT_MODEL: &str = "Llama 3.1 8B Instruct";

/// All chat models, in display order
pub fn all_chat_models() -> &'static [ChatModelDef] {
    &[
        ChatModelDef {
            name: "Llama 3.1 8B Instruct",
            id: "@cf/meta/llama-3.1-8b-instruct",
        },
        ChatModelDef {
            name: "Llama 2 7B Chat",
            id: "@cf/meta/llama-2-7b-chat-int8",
        },
        ChatModelDef {
            name: "Mistral 7B Instruct",
            id: "@cf/mistral/mistral-7b-instruct-v0.1",
        },
    ]
}

/// Look up a model ID by display name
pub fn chat_model_id(name: &str) -> Option<&'static str> {
    all_chat_models()
        .iter()
        .find(|m| m.name == name)
        .map(|m| m.id)
}
