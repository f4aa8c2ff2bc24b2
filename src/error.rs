//! Turn error types
//!
//! Every failure that can end a chat turn or an image request is a
//! [`TurnError`]. The kind decides how the failure is surfaced to the user.

use thiserror::Error;

/// Error with classification
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TurnError {
    pub kind: TurnErrorKind,
    pub message: String,
    /// Short text for the conversation-level error banner, when it differs
    /// from `message`
    pub banner: Option<String>,
}

impl TurnError {
    pub fn new(kind: TurnErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            banner: None,
        }
    }

    pub fn with_banner(mut self, banner: impl Into<String>) -> Self {
        self.banner = Some(banner.into());
        self
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(TurnErrorKind::Configuration, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(TurnErrorKind::Transport, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(TurnErrorKind::Parse, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(TurnErrorKind::Protocol, message)
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(TurnErrorKind::Unexpected, message)
    }

    /// Text written into the open assistant message when this error ends a turn.
    pub fn user_content(&self) -> String {
        match self.kind {
            TurnErrorKind::Transport => {
                format!("Sorry, I encountered an error. API Error: {}", self.message)
            }
            TurnErrorKind::Unexpected => {
                format!("An unexpected error occurred: {}", self.message)
            }
            TurnErrorKind::Configuration | TurnErrorKind::Parse | TurnErrorKind::Protocol => {
                self.message.clone()
            }
        }
    }

    /// Text for the conversation-level error banner.
    pub fn banner_text(&self) -> String {
        if let Some(banner) = &self.banner {
            return banner.clone();
        }
        match self.kind {
            TurnErrorKind::Transport => format!("API Error: {}", self.message),
            _ => self.message.clone(),
        }
    }

    /// Failure reason as reported by the image workflow.
    pub fn reason(&self) -> String {
        match self.kind {
            TurnErrorKind::Transport => format!("API Error: {}", self.message),
            TurnErrorKind::Unexpected => format!("An unexpected error occurred: {}", self.message),
            _ => self.message.clone(),
        }
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnErrorKind {
    /// Missing credentials or unknown model
    Configuration,
    /// Connection failure, timeout or non-success HTTP status
    Transport,
    /// Malformed stream payload or directive literal
    Parse,
    /// Well-formed directive that is semantically invalid
    Protocol,
    /// Anything else
    Unexpected,
}
