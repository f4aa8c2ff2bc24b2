//! Pure turn transitions
//!
//! Given the same state and event this always produces the same result.
//! Nothing here touches the conversation; the runner applies the effects.

use super::effect::Effect;
use super::event::TurnEvent;
use super::state::TurnState;
use crate::directive::{parse_inline, parse_structured, Detection, ToolCallDescriptor};
use crate::error::{TurnError, TurnErrorKind};
use crate::llm::StreamPayload;
use crate::tools::INVALID_REQUEST_NARRATION;
use thiserror::Error;

/// Narration shown when an inline directive is not a literal mapping
pub const MALFORMED_DIRECTIVE_NARRATION: &str =
    "Sorry, I couldn't understand the image request.";

/// Narration shown when the stream ends inside an open directive
pub const TRUNCATED_DIRECTIVE_NARRATION: &str =
    "Sorry, the image request was cut off before it finished.";

/// Result of a state transition
#[derive(Debug, Clone)]
pub struct TransitionResult {
    pub new_state: TurnState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: TurnState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
///
/// # Errors
/// Any event delivered to a terminal state.
pub fn transition(state: TurnState, event: TurnEvent) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // Structured tool calls resolve the turn on arrival
        (
            TurnState::Narrating { .. } | TurnState::DirectiveOpen { .. },
            TurnEvent::Payload(StreamPayload::ToolUse { name, fields }),
        ) => Ok(resolve(parse_structured(&name, fields), vec![])),

        (TurnState::Narrating { mut detector }, TurnEvent::Payload(StreamPayload::Text(fragment))) => {
            Ok(match detector.push(&fragment) {
                Detection::Narration(content) => TransitionResult::new(TurnState::Narrating { detector })
                    .with_effect(Effect::PublishContent(content)),
                Detection::Opened { narration } => TransitionResult::new(TurnState::DirectiveOpen {
                    narration: narration.clone(),
                    detector,
                })
                .with_effect(Effect::MarkToolLoading { narration }),
                Detection::Closed { narration, payload } => {
                    let leading = narration
                        .map(|narration| Effect::MarkToolLoading { narration })
                        .into_iter()
                        .collect();
                    resolve(parse_inline(&payload), leading)
                }
                Detection::Pending => TransitionResult::new(TurnState::Narrating { detector }),
            })
        }

        (
            TurnState::DirectiveOpen {
                narration,
                mut detector,
            },
            TurnEvent::Payload(StreamPayload::Text(fragment)),
        ) => Ok(match detector.push(&fragment) {
            Detection::Closed { payload, .. } => resolve(parse_inline(&payload), vec![]),
            _ => TransitionResult::new(TurnState::DirectiveOpen { narration, detector }),
        }),

        (TurnState::Narrating { detector }, TurnEvent::StreamEnded) => {
            Ok(TransitionResult::new(TurnState::Completed {
                content: detector.buffer().to_string(),
            }))
        }

        (TurnState::DirectiveOpen { .. }, TurnEvent::StreamEnded) => {
            let error = TurnError::parse("stream ended before the directive was closed");
            Ok(TransitionResult::new(TurnState::Errored {
                error: error.clone(),
            })
            .with_effect(Effect::FailDirective {
                content: TRUNCATED_DIRECTIVE_NARRATION.to_string(),
                reason: error.message,
            }))
        }

        (
            TurnState::Narrating { .. } | TurnState::DirectiveOpen { .. },
            TurnEvent::StreamFailed(error),
        ) => Ok(TransitionResult::new(TurnState::Errored {
            error: error.clone(),
        })
        .with_effect(Effect::FailTurn(error))),

        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "{} does not accept {event:?}",
            state.name()
        ))),
    }
}

fn resolve(parsed: Result<ToolCallDescriptor, TurnError>, leading: Vec<Effect>) -> TransitionResult {
    match parsed {
        Ok(descriptor) => TransitionResult::new(TurnState::DirectiveResolved {
            descriptor: descriptor.clone(),
        })
        .with_effects(leading)
        .with_effect(Effect::DispatchTool(descriptor)),
        Err(error) => {
            let content = match error.kind {
                TurnErrorKind::Protocol => INVALID_REQUEST_NARRATION,
                _ => MALFORMED_DIRECTIVE_NARRATION,
            };
            let reason = error.message.clone();
            TransitionResult::new(TurnState::Errored { error })
                .with_effects(leading)
                .with_effect(Effect::FailDirective {
                    content: content.to_string(),
                    reason,
                })
        }
    }
}
