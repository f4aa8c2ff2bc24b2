//! Conversation state
//!
//! The conversation is shared between the interactive side and the
//! background turn tasks. All mutation happens through
//! [`SharedConversation::with`], which holds the exclusive section for the
//! duration of one closure and then broadcasts whatever changed.

use crate::error::TurnError;
use crate::llm::{ChatMessage, DEFAULT_CHAT_MODEL};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Progress of the tool call attached to an assistant message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Loading,
    Success,
    Error,
}

/// One chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub is_initial_greeting: bool,
    /// Generated image as a data URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_status: Option<ToolCallStatus>,
    /// What the tool call was asked to do
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_error: Option<String>,
}

impl ConversationMessage {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            is_initial_greeting: false,
            image_data: None,
            tool_call_status: None,
            tool_call_info: None,
            tool_call_error: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Empty assistant message a turn streams into
    pub fn placeholder() -> Self {
        Self::new(Role::Assistant, "")
    }

    pub fn greeting(content: impl Into<String>) -> Self {
        Self {
            is_initial_greeting: true,
            ..Self::new(Role::Assistant, content)
        }
    }
}

/// Identifies the assistant message a turn owns.
///
/// `epoch` changes whenever the conversation is cleared, so a ticket from
/// before a clear never matches a message created after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnTicket {
    pub turn_id: u64,
    pub epoch: u64,
    pub index: usize,
}

/// Change notifications for observers
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    MessageUpdated {
        index: usize,
        message: ConversationMessage,
    },
    StreamingChanged {
        is_streaming: bool,
    },
    ErrorChanged {
        message: String,
    },
    ImageGenerated {
        index: usize,
        image_data: String,
    },
    Cleared,
}

/// Ordered messages plus the turn bookkeeping
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<ConversationMessage>,
    error_message: String,
    selected_model: String,
    /// Turn holding the streaming flag
    active_turn: Option<u64>,
    /// Turn not yet fully resolved, tool dispatch included
    in_flight: Option<u64>,
    next_turn_id: u64,
    epoch: u64,
    pending_events: Vec<SessionEvent>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            error_message: String::new(),
            selected_model: DEFAULT_CHAT_MODEL.to_string(),
            active_turn: None,
            in_flight: None,
            next_turn_id: 1,
            epoch: 0,
            pending_events: Vec::new(),
        }
    }

    /// Conversation seeded with an assistant greeting
    pub fn with_greeting(text: impl Into<String>) -> Self {
        let mut conv = Self::new();
        conv.messages.push(ConversationMessage::greeting(text));
        conv
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn last_message(&self) -> Option<&ConversationMessage> {
        self.messages.last()
    }

    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    pub fn selected_model(&self) -> &str {
        &self.selected_model
    }

    pub fn is_streaming(&self) -> bool {
        self.active_turn.is_some()
    }

    /// Whether a turn is still running. Stays set after streaming stops
    /// while the turn's tool call is dispatched.
    pub fn is_busy(&self) -> bool {
        self.active_turn.is_some() || self.in_flight.is_some()
    }

    /// Switch the chat model. Only catalog names are accepted.
    pub fn select_model(&mut self, name: &str) -> bool {
        if crate::llm::chat_model_id(name).is_none() {
            return false;
        }
        self.selected_model = name.to_string();
        true
    }

    /// Append the user prompt and an empty assistant placeholder, and mark
    /// the conversation as streaming. Callers check [`Self::is_busy`]
    /// first; at most one turn is in flight.
    pub fn begin_turn(&mut self, prompt: &str) -> TurnTicket {
        self.messages.push(ConversationMessage::user(prompt));
        let user_index = self.messages.len() - 1;
        self.messages.push(ConversationMessage::placeholder());
        let index = self.messages.len() - 1;

        let turn_id = self.next_turn_id;
        self.next_turn_id += 1;
        self.active_turn = Some(turn_id);
        self.in_flight = Some(turn_id);

        self.pending_events.push(SessionEvent::MessageUpdated {
            index: user_index,
            message: self.messages[user_index].clone(),
        });
        self.pending_events.push(SessionEvent::MessageUpdated {
            index,
            message: self.messages[index].clone(),
        });
        self.pending_events
            .push(SessionEvent::StreamingChanged { is_streaming: true });
        self.set_error_message("");

        TurnTicket {
            turn_id,
            epoch: self.epoch,
            index,
        }
    }

    /// Whether the turn may still write narration
    pub fn is_live(&self, ticket: &TurnTicket) -> bool {
        self.active_turn == Some(ticket.turn_id) && self.epoch == ticket.epoch
    }

    /// Release the streaming flag held by `ticket`. Returns false if the
    /// flag was already released (by a clear or a newer turn).
    pub fn finish_turn(&mut self, ticket: &TurnTicket) -> bool {
        if self.active_turn != Some(ticket.turn_id) {
            return false;
        }
        self.active_turn = None;
        self.pending_events
            .push(SessionEvent::StreamingChanged { is_streaming: false });
        true
    }

    /// Mark the turn fully resolved. Returns false if it already was, or if
    /// a clear abandoned it.
    pub fn end_turn(&mut self, ticket: &TurnTicket) -> bool {
        if self.in_flight != Some(ticket.turn_id) {
            return false;
        }
        self.in_flight = None;
        true
    }

    /// Mutate the message owned by `ticket`. Returns false if the message no
    /// longer exists.
    pub fn write_message(
        &mut self,
        ticket: &TurnTicket,
        update: impl FnOnce(&mut ConversationMessage),
    ) -> bool {
        if self.epoch != ticket.epoch {
            return false;
        }
        let Some(message) = self.messages.get_mut(ticket.index) else {
            return false;
        };
        if message.role != Role::Assistant {
            return false;
        }
        update(message);
        self.pending_events.push(SessionEvent::MessageUpdated {
            index: ticket.index,
            message: message.clone(),
        });
        true
    }

    /// Resolve the owned message with a generated image
    pub fn attach_image(&mut self, ticket: &TurnTicket, content: &str, image_data: &str) -> bool {
        let attached = self.write_message(ticket, |m| {
            m.content = content.to_string();
            m.image_data = Some(image_data.to_string());
            m.tool_call_status = Some(ToolCallStatus::Success);
            m.tool_call_error = None;
        });
        if attached {
            self.pending_events.push(SessionEvent::ImageGenerated {
                index: ticket.index,
                image_data: image_data.to_string(),
            });
        }
        attached
    }

    /// Replace the owned message with the error text and raise the banner
    pub fn fail_turn(&mut self, ticket: &TurnTicket, error: &TurnError) {
        let content = error.user_content();
        if self.write_message(ticket, |m| m.content = content) {
            self.set_error_message(&error.banner_text());
        }
    }

    pub fn set_error_message(&mut self, message: &str) {
        if self.error_message == message {
            return;
        }
        self.error_message = message.to_string();
        self.pending_events.push(SessionEvent::ErrorChanged {
            message: message.to_string(),
        });
    }

    /// Drop every message and invalidate any in-flight turn
    pub fn clear(&mut self) {
        self.messages.clear();
        self.error_message.clear();
        self.epoch += 1;
        let was_streaming = self.active_turn.take().is_some();
        self.in_flight = None;
        self.pending_events.push(SessionEvent::Cleared);
        if was_streaming {
            self.pending_events
                .push(SessionEvent::StreamingChanged { is_streaming: false });
        }
    }

    /// Outgoing history for the request made by `ticket`: everything before
    /// its placeholder, minus greetings and empty assistant messages.
    pub fn history_for(&self, ticket: &TurnTicket) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .take(ticket.index)
            .filter(|m| !m.is_initial_greeting)
            .filter(|m| !(m.role == Role::Assistant && m.content.is_empty()))
            .map(|m| match m.role {
                Role::User => ChatMessage::user(&m.content),
                Role::Assistant => ChatMessage::assistant(&m.content),
            })
            .collect()
    }

    fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.pending_events)
    }
}

/// Handle to the conversation shared with background tasks
#[derive(Clone)]
pub struct SharedConversation {
    inner: Arc<Mutex<Conversation>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SharedConversation {
    pub fn new(conversation: Conversation) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Mutex::new(conversation)),
            events,
        }
    }

    /// Run `f` inside the exclusive section, then broadcast its changes
    pub async fn with<R>(&self, f: impl FnOnce(&mut Conversation) -> R) -> R {
        let mut conv = self.inner.lock().await;
        let result = f(&mut conv);
        for event in conv.take_events() {
            // No subscribers is fine
            let _ = self.events.send(event);
        }
        result
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> Conversation {
        self.inner.lock().await.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatRole;

    #[test]
    fn test_begin_turn_appends_pair() {
        let mut conv = Conversation::new();
        let ticket = conv.begin_turn("hello");
        assert_eq!(conv.messages().len(), 2);
        assert_eq!(conv.messages()[0].role, Role::User);
        assert_eq!(conv.messages()[1], ConversationMessage::placeholder());
        assert_eq!(ticket.index, 1);
        assert!(conv.is_streaming());
        assert!(conv.is_live(&ticket));
        assert_eq!(conv.last_message().unwrap().role, Role::Assistant);
    }

    #[test]
    fn test_finish_turn_once() {
        let mut conv = Conversation::new();
        let ticket = conv.begin_turn("hello");
        assert!(conv.finish_turn(&ticket));
        assert!(!conv.finish_turn(&ticket));
        assert!(!conv.is_streaming());
    }

    #[test]
    fn test_busy_until_turn_ends() {
        let mut conv = Conversation::new();
        let ticket = conv.begin_turn("draw a cat");
        assert!(conv.is_busy());

        conv.finish_turn(&ticket);
        assert!(!conv.is_streaming());
        assert!(conv.is_busy());

        assert!(conv.end_turn(&ticket));
        assert!(!conv.is_busy());
        assert!(!conv.end_turn(&ticket));
    }

    #[test]
    fn test_clear_abandons_turn_in_flight() {
        let mut conv = Conversation::new();
        let ticket = conv.begin_turn("draw a cat");
        conv.finish_turn(&ticket);
        conv.clear();
        assert!(!conv.is_busy());

        let fresh = conv.begin_turn("again");
        assert!(!conv.end_turn(&ticket));
        assert!(conv.is_busy());
        assert!(conv.end_turn(&fresh));
    }

    #[test]
    fn test_clear_invalidates_ticket() {
        let mut conv = Conversation::new();
        let ticket = conv.begin_turn("hello");
        conv.clear();
        assert!(!conv.is_live(&ticket));
        assert!(!conv.write_message(&ticket, |m| m.content = "late".to_string()));

        // A new turn at the same index is not reachable through the old ticket
        let fresh = conv.begin_turn("again");
        assert_eq!(fresh.index, ticket.index);
        assert!(!conv.write_message(&ticket, |m| m.content = "late".to_string()));
        assert!(!conv.finish_turn(&ticket));
        assert!(conv.is_live(&fresh));
    }

    #[test]
    fn test_fail_turn_sets_banner() {
        let mut conv = Conversation::new();
        let ticket = conv.begin_turn("hello");
        conv.fail_turn(&ticket, &TurnError::transport("boom"));
        assert_eq!(
            conv.messages()[1].content,
            "Sorry, I encountered an error. API Error: boom"
        );
        assert_eq!(conv.error_message(), "API Error: boom");

        // Next turn clears the banner
        conv.finish_turn(&ticket);
        conv.begin_turn("retry");
        assert_eq!(conv.error_message(), "");
    }

    #[test]
    fn test_history_skips_greeting_and_placeholder() {
        let mut conv = Conversation::with_greeting("Hi, how can I help?");
        let first = conv.begin_turn("draw a cat");
        conv.write_message(&first, |m| m.content = "Here it is".to_string());
        conv.finish_turn(&first);
        let second = conv.begin_turn("and a dog");

        let history = conv.history_for(&second);
        assert_eq!(history.len(), 3);
        assert_eq!(history[0], ChatMessage::user("draw a cat"));
        assert_eq!(history[1].role, ChatRole::Assistant);
        assert_eq!(history[2], ChatMessage::user("and a dog"));
    }

    #[test]
    fn test_select_model() {
        let mut conv = Conversation::new();
        assert!(conv.select_model("Mistral 7B Instruct"));
        assert_eq!(conv.selected_model(), "Mistral 7B Instruct");
        assert!(!conv.select_model("Nonexistent"));
        assert_eq!(conv.selected_model(), "Mistral 7B Instruct");
    }

    #[tokio::test]
    async fn test_shared_broadcasts_changes() {
        let shared = SharedConversation::new(Conversation::new());
        let mut rx = shared.subscribe();
        let ticket = shared.with(|c| c.begin_turn("hello")).await;

        let mut saw_streaming = false;
        while let Ok(event) = rx.try_recv() {
            if event == (SessionEvent::StreamingChanged { is_streaming: true }) {
                saw_streaming = true;
            }
        }
        assert!(saw_streaming);

        shared
            .with(|c| c.write_message(&ticket, |m| m.content = "Hi".to_string()))
            .await;
        match rx.try_recv().unwrap() {
            SessionEvent::MessageUpdated { index, message } => {
                assert_eq!(index, 1);
                assert_eq!(message.content, "Hi");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
