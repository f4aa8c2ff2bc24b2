//! Conversation turn state machine
//!
//! One turn follows one assistant message from the user's submission to its
//! final resolution. Transitions are pure; [`runner`] performs the effects.

mod effect;
pub mod event;
pub mod runner;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::TurnEvent;
pub use runner::{ChatSession, SubmitRejection, TurnHandle, TurnOutcome};
pub use state::TurnState;
pub use transition::{transition, TransitionError, TransitionResult};
