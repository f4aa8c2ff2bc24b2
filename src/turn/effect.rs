//! Effects produced by turn transitions

use crate::directive::ToolCallDescriptor;
use crate::error::TurnError;

/// Writes into the open assistant message, executed by the runner
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Replace the live narration
    PublishContent(String),

    /// Freeze the narration and show the pending tool call
    MarkToolLoading { narration: String },

    /// Hand the resolved call to the tool dispatcher
    DispatchTool(ToolCallDescriptor),

    /// The directive could not be used. Sets the message content and marks
    /// the tool call as failed; the error banner is left alone.
    FailDirective { content: String, reason: String },

    /// The turn failed as a whole. Sets the message content and the banner.
    FailTurn(TurnError),
}
