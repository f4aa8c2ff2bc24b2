//! Tool dispatch
//!
//! Resolved tool calls are checked here and, when valid, run against the
//! image generation workflow. The outcome is written into the assistant
//! message that carried the call.

mod generate_image;

pub use generate_image::{image_tool_definition, GenerateImageInput, GENERATE_IMAGE};

use crate::conversation::{SharedConversation, ToolCallStatus, TurnTicket};
use crate::directive::ToolCallDescriptor;
use crate::error::TurnError;
use crate::image::{ImageClient, ImageGenerator};
use std::sync::Arc;

/// Narration for tool calls that cannot be run
pub const INVALID_REQUEST_NARRATION: &str =
    "Sorry, I received an invalid image generation request.";

/// Narration accompanying a generated image
pub const IMAGE_CONFIRMATION: &str = "Here is the image you requested:";

/// How a dispatched call ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The image was generated and attached
    Generated { image_data: String },
    /// The call was invalid; nothing was run
    Rejected { reason: String },
    /// The workflow ran and failed
    Failed { reason: String },
    /// The message was gone before the outcome could be written
    Abandoned,
}

/// Runs resolved tool calls against the image workflow
pub struct ToolDispatcher<I> {
    images: Arc<ImageGenerator<I>>,
}

impl<I: ImageClient> ToolDispatcher<I> {
    pub fn new(images: Arc<ImageGenerator<I>>) -> Self {
        Self { images }
    }

    pub fn images(&self) -> &Arc<ImageGenerator<I>> {
        &self.images
    }

    /// Validate `descriptor`, run it and write the result into the message
    /// owned by `ticket`.
    pub async fn dispatch(
        &self,
        conversation: &SharedConversation,
        ticket: TurnTicket,
        descriptor: &ToolCallDescriptor,
    ) -> DispatchOutcome {
        let input = match GenerateImageInput::from_descriptor(descriptor) {
            Ok(input) => input,
            Err(e) => {
                tracing::warn!(tool = %descriptor.name, error = %e, "Rejected tool call");
                let reason = e.message.clone();
                let written = conversation
                    .with(|c| {
                        c.write_message(&ticket, |m| {
                            m.content = INVALID_REQUEST_NARRATION.to_string();
                            m.tool_call_status = Some(ToolCallStatus::Error);
                            m.tool_call_error = Some(reason.clone());
                        })
                    })
                    .await;
                return if written {
                    DispatchOutcome::Rejected { reason }
                } else {
                    DispatchOutcome::Abandoned
                };
            }
        };

        let info = input.describe();
        let written = conversation
            .with(|c| {
                c.write_message(&ticket, |m| {
                    m.content.clear();
                    m.tool_call_status = Some(ToolCallStatus::Loading);
                    m.image_data = None;
                    m.tool_call_info = Some(info);
                    m.tool_call_error = None;
                })
            })
            .await;
        if !written {
            return DispatchOutcome::Abandoned;
        }

        tracing::info!(prompt = %input.prompt, style = %input.style, "Dispatching image generation");
        match self
            .images
            .generate_for_tool(&input.prompt, &input.style)
            .await
        {
            Ok(image_data) => {
                let attached = conversation
                    .with(|c| c.attach_image(&ticket, IMAGE_CONFIRMATION, &image_data))
                    .await;
                if attached {
                    DispatchOutcome::Generated { image_data }
                } else {
                    DispatchOutcome::Abandoned
                }
            }
            Err(e) => {
                let reason = e.reason();
                let written = conversation
                    .with(|c| write_failure(c, &ticket, &reason))
                    .await;
                if written {
                    DispatchOutcome::Failed { reason }
                } else {
                    DispatchOutcome::Abandoned
                }
            }
        }
    }
}

/// Surface a failure that happened outside the workflow, such as a
/// crashed dispatch task.
pub async fn fail_dispatch(conversation: &SharedConversation, ticket: TurnTicket, error: &TurnError) {
    let reason = error.reason();
    conversation
        .with(|c| write_failure(c, &ticket, &reason))
        .await;
}

fn write_failure(
    conversation: &mut crate::conversation::Conversation,
    ticket: &TurnTicket,
    reason: &str,
) -> bool {
    conversation.write_message(ticket, |m| {
        m.content = format!("Sorry, I couldn't generate the image. {reason}");
        m.tool_call_status = Some(ToolCallStatus::Error);
        m.tool_call_error = Some(reason.to_string());
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Conversation;
    use crate::image::DATA_URI_PREFIX;
    use crate::testing::MockImageClient;
    use serde_json::{json, Map, Value};

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    async fn setup(client: MockImageClient) -> (ToolDispatcher<MockImageClient>, SharedConversation, TurnTicket) {
        let dispatcher = ToolDispatcher::new(Arc::new(ImageGenerator::new(client)));
        let conversation = SharedConversation::new(Conversation::new());
        let ticket = conversation.with(|c| c.begin_turn("draw")).await;
        (dispatcher, conversation, ticket)
    }

    #[tokio::test]
    async fn test_success_attaches_image() {
        let client = MockImageClient::new();
        client.push_png(&[1, 2, 3]);
        let (dispatcher, conversation, ticket) = setup(client.clone()).await;

        let descriptor = ToolCallDescriptor::new("generate_image", args(json!({"prompt": "sunset"})));
        let outcome = dispatcher.dispatch(&conversation, ticket, &descriptor).await;
        assert!(matches!(outcome, DispatchOutcome::Generated { .. }));

        let snapshot = conversation.snapshot().await;
        let message = &snapshot.messages()[ticket.index];
        assert_eq!(message.content, IMAGE_CONFIRMATION);
        assert_eq!(message.tool_call_status, Some(ToolCallStatus::Success));
        assert!(message.image_data.as_deref().unwrap().starts_with(DATA_URI_PREFIX));

        // Style defaulted
        assert_eq!(client.requests()[0].1.prompt, "sunset, photorealistic style");
    }

    #[tokio::test]
    async fn test_missing_prompt_is_rejected() {
        let client = MockImageClient::new();
        let (dispatcher, conversation, ticket) = setup(client.clone()).await;

        let descriptor = ToolCallDescriptor::new("generate_image", args(json!({"style": "anime"})));
        let outcome = dispatcher.dispatch(&conversation, ticket, &descriptor).await;
        assert!(matches!(outcome, DispatchOutcome::Rejected { .. }));

        let snapshot = conversation.snapshot().await;
        let message = &snapshot.messages()[ticket.index];
        assert_eq!(message.content, INVALID_REQUEST_NARRATION);
        assert_eq!(message.tool_call_status, Some(ToolCallStatus::Error));
        assert!(message.image_data.is_none());
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tool_is_rejected() {
        let (dispatcher, conversation, ticket) = setup(MockImageClient::new()).await;
        let descriptor = ToolCallDescriptor::new("web_search", args(json!({"prompt": "x"})));
        let outcome = dispatcher.dispatch(&conversation, ticket, &descriptor).await;
        assert!(matches!(outcome, DispatchOutcome::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_workflow_failure_is_written() {
        let client = MockImageClient::new();
        client.push_error(TurnError::transport("HTTP 429: slow down"));
        let (dispatcher, conversation, ticket) = setup(client).await;

        let descriptor = ToolCallDescriptor::new("generate_image", args(json!({"prompt": "a cat"})));
        let outcome = dispatcher.dispatch(&conversation, ticket, &descriptor).await;
        assert_eq!(
            outcome,
            DispatchOutcome::Failed {
                reason: "API Error: HTTP 429: slow down".to_string()
            }
        );

        let snapshot = conversation.snapshot().await;
        let message = &snapshot.messages()[ticket.index];
        assert_eq!(
            message.content,
            "Sorry, I couldn't generate the image. API Error: HTTP 429: slow down"
        );
        assert_eq!(message.tool_call_status, Some(ToolCallStatus::Error));
        assert!(message.image_data.is_none());
    }

    #[tokio::test]
    async fn test_cleared_conversation_is_abandoned() {
        let client = MockImageClient::new();
        client.push_png(&[1]);
        let (dispatcher, conversation, ticket) = setup(client).await;
        conversation.with(Conversation::clear).await;

        let descriptor = ToolCallDescriptor::new("generate_image", args(json!({"prompt": "a cat"})));
        let outcome = dispatcher.dispatch(&conversation, ticket, &descriptor).await;
        assert_eq!(outcome, DispatchOutcome::Abandoned);
        assert!(conversation.snapshot().await.messages().is_empty());
    }
}
