//! Turn states

use crate::directive::{DirectiveDetector, ToolCallDescriptor};
use crate::error::TurnError;

/// Where a turn is in its lifecycle
#[derive(Debug, Clone)]
pub enum TurnState {
    /// Streaming plain narration; the buffer is published after every fragment
    Narrating { detector: DirectiveDetector },

    /// A start delimiter arrived; narration is frozen and the directive is
    /// being accumulated
    DirectiveOpen {
        narration: String,
        detector: DirectiveDetector,
    },

    /// A tool call was resolved and is waiting for the dispatcher
    DirectiveResolved { descriptor: ToolCallDescriptor },

    /// The turn ended in an error
    Errored { error: TurnError },

    /// The stream ended with plain narration only
    Completed { content: String },
}

impl Default for TurnState {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnState {
    pub fn new() -> Self {
        TurnState::Narrating {
            detector: DirectiveDetector::new(),
        }
    }

    /// No further stream events are accepted
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TurnState::DirectiveResolved { .. }
                | TurnState::Errored { .. }
                | TurnState::Completed { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            TurnState::Narrating { .. } => "narrating",
            TurnState::DirectiveOpen { .. } => "directive_open",
            TurnState::DirectiveResolved { .. } => "directive_resolved",
            TurnState::Errored { .. } => "errored",
            TurnState::Completed { .. } => "completed",
        }
    }
}
