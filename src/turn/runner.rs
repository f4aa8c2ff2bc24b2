//! Turn runner
//!
//! A turn runs as two background tasks chained one after the other: the
//! stream phase reads the chat response and drives the state machine, then
//! the dispatch phase runs a resolved tool call. The streaming flag is
//! released between the two, exactly once, whatever the stream phase did.
//! The turn stays in flight until the dispatch phase is done, and no other
//! submission is accepted until then.

use super::effect::Effect;
use super::event::TurnEvent;
use super::state::TurnState;
use super::transition::transition;
use crate::conversation::{
    Conversation, SessionEvent, SharedConversation, ToolCallStatus, TurnTicket,
};
use crate::directive::ToolCallDescriptor;
use crate::error::{TurnError, TurnErrorKind};
use crate::image::{ImageClient, ImageGenerator};
use crate::llm::{
    all_chat_models, chat_model_id, payload_stream, ChatClient, ChatMessage, ChatRequest,
};
use crate::system_prompt::build_system_prompt;
use crate::tools::{fail_dispatch, image_tool_definition, DispatchOutcome, ToolDispatcher};
use futures::StreamExt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Why a submission was not accepted. Shown as a transient notice; the
/// conversation is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitRejection {
    #[error("Please enter a message.")]
    EmptyPrompt,
    #[error("Please wait for the current response to finish.")]
    Busy,
}

/// How a turn ended
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Plain narration, stream finished normally
    Completed,
    /// A tool call was resolved and handed to the dispatcher
    Dispatched(DispatchOutcome),
    /// The directive was malformed, truncated or invalid
    DirectiveFailed(TurnError),
    /// Configuration, transport or unexpected failure
    Failed(TurnError),
    /// The conversation was cleared while the turn was streaming
    Cancelled,
}

/// Result of the stream phase
#[derive(Debug)]
enum StreamPhase {
    Completed,
    Resolved(ToolCallDescriptor),
    DirectiveFailed(TurnError),
    Failed(TurnError),
    Cancelled,
}

/// Handle to a running turn
pub struct TurnHandle {
    ticket: TurnTicket,
    join: JoinHandle<TurnOutcome>,
}

impl TurnHandle {
    pub fn ticket(&self) -> TurnTicket {
        self.ticket
    }

    /// Wait for both phases to finish
    pub async fn wait(self) -> TurnOutcome {
        match self.join.await {
            Ok(outcome) => outcome,
            Err(e) => TurnOutcome::Failed(TurnError::unexpected(e.to_string())),
        }
    }
}

/// Interactive chat session: one conversation, one chat backend and the
/// image generator its tool calls run against
pub struct ChatSession<C, I>
where
    C: ChatClient + 'static,
    I: ImageClient + 'static,
{
    conversation: SharedConversation,
    chat: Arc<C>,
    dispatcher: Arc<ToolDispatcher<I>>,
}

impl<C, I> ChatSession<C, I>
where
    C: ChatClient + 'static,
    I: ImageClient + 'static,
{
    pub fn new(conversation: Conversation, chat: C, images: Arc<ImageGenerator<I>>) -> Self {
        Self {
            conversation: SharedConversation::new(conversation),
            chat: Arc::new(chat),
            dispatcher: Arc::new(ToolDispatcher::new(images)),
        }
    }

    pub fn conversation(&self) -> &SharedConversation {
        &self.conversation
    }

    pub fn images(&self) -> &Arc<ImageGenerator<I>> {
        self.dispatcher.images()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.conversation.subscribe()
    }

    pub async fn snapshot(&self) -> Conversation {
        self.conversation.snapshot().await
    }

    /// Chat model names in display order
    pub fn model_options() -> Vec<&'static str> {
        all_chat_models().iter().map(|m| m.name).collect()
    }

    pub async fn select_model(&self, name: &str) -> bool {
        self.conversation.with(|c| c.select_model(name)).await
    }

    /// Drop all messages; any in-flight turn stops at its next write
    pub async fn clear(&self) {
        self.conversation.with(Conversation::clear).await;
        tracing::info!("Conversation cleared");
    }

    /// Submit a prompt to the current conversation.
    ///
    /// # Errors
    /// Rejects empty prompts and submissions while a turn is in flight.
    pub async fn submit(&self, prompt: &str) -> Result<TurnHandle, SubmitRejection> {
        self.begin(prompt, false).await
    }

    /// Start over with `prompt` as the first message
    ///
    /// # Errors
    /// Rejects empty prompts, and leaves the conversation untouched while a
    /// turn is in flight.
    pub async fn start_conversation(&self, prompt: &str) -> Result<TurnHandle, SubmitRejection> {
        self.begin(prompt, true).await
    }

    /// Start over from a suggestion chip such as "Create an image"
    ///
    /// # Errors
    /// Same as [`Self::start_conversation`].
    pub async fn submit_suggestion(&self, text: &str) -> Result<TurnHandle, SubmitRejection> {
        if text.trim().is_empty() {
            return Err(SubmitRejection::EmptyPrompt);
        }
        self.start_conversation(&format!("Help me {}", text.trim().to_lowercase()))
            .await
    }

    async fn begin(&self, prompt: &str, fresh: bool) -> Result<TurnHandle, SubmitRejection> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(SubmitRejection::EmptyPrompt);
        }

        // Busy check, reset and turn start happen in one exclusive section
        let (ticket, history, model) = self
            .conversation
            .with(|c| {
                if c.is_busy() {
                    return Err(SubmitRejection::Busy);
                }
                if fresh {
                    c.clear();
                }
                let ticket = c.begin_turn(prompt);
                Ok((ticket, c.history_for(&ticket), c.selected_model().to_string()))
            })
            .await?;

        tracing::debug!(turn = ticket.turn_id, fresh, "Turn submitted");
        let join = tokio::spawn(run_turn(
            self.conversation.clone(),
            Arc::clone(&self.chat),
            Arc::clone(&self.dispatcher),
            ticket,
            history,
            model,
        ));
        Ok(TurnHandle { ticket, join })
    }
}

async fn run_turn<C, I>(
    conversation: SharedConversation,
    chat: Arc<C>,
    dispatcher: Arc<ToolDispatcher<I>>,
    ticket: TurnTicket,
    history: Vec<ChatMessage>,
    model: String,
) -> TurnOutcome
where
    C: ChatClient + 'static,
    I: ImageClient + 'static,
{
    let outcome = run_phases(
        conversation.clone(),
        chat,
        dispatcher,
        ticket,
        history,
        model,
    )
    .await;
    conversation.with(|c| c.end_turn(&ticket)).await;
    tracing::debug!(turn = ticket.turn_id, "Turn ended");
    outcome
}

async fn run_phases<C, I>(
    conversation: SharedConversation,
    chat: Arc<C>,
    dispatcher: Arc<ToolDispatcher<I>>,
    ticket: TurnTicket,
    history: Vec<ChatMessage>,
    model: String,
) -> TurnOutcome
where
    C: ChatClient + 'static,
    I: ImageClient + 'static,
{
    let stream_task = tokio::spawn(stream_phase(
        conversation.clone(),
        chat,
        ticket,
        history,
        model,
    ));
    let phase = match stream_task.await {
        Ok(phase) => phase,
        Err(e) => {
            tracing::error!(turn = ticket.turn_id, error = %e, "Stream task crashed");
            let error = TurnError::unexpected(e.to_string());
            conversation.with(|c| c.fail_turn(&ticket, &error)).await;
            StreamPhase::Failed(error)
        }
    };

    conversation.with(|c| c.finish_turn(&ticket)).await;

    match phase {
        StreamPhase::Completed => TurnOutcome::Completed,
        StreamPhase::Cancelled => TurnOutcome::Cancelled,
        StreamPhase::DirectiveFailed(error) => TurnOutcome::DirectiveFailed(error),
        StreamPhase::Failed(error) => TurnOutcome::Failed(error),
        StreamPhase::Resolved(descriptor) => {
            let task_conversation = conversation.clone();
            let dispatch = tokio::spawn(async move {
                dispatcher
                    .dispatch(&task_conversation, ticket, &descriptor)
                    .await
            });
            match dispatch.await {
                Ok(outcome) => TurnOutcome::Dispatched(outcome),
                Err(e) => {
                    tracing::error!(turn = ticket.turn_id, error = %e, "Dispatch task crashed");
                    let error = TurnError::unexpected(e.to_string());
                    fail_dispatch(&conversation, ticket, &error).await;
                    TurnOutcome::Failed(error)
                }
            }
        }
    }
}

async fn stream_phase<C: ChatClient>(
    conversation: SharedConversation,
    chat: Arc<C>,
    ticket: TurnTicket,
    history: Vec<ChatMessage>,
    model: String,
) -> StreamPhase {
    let Some(model_id) = chat_model_id(&model) else {
        let error = TurnError::configuration("Invalid model selected.").with_banner("Invalid model.");
        return fail(&conversation, ticket, error).await;
    };

    let request = build_request(model_id, history);
    tracing::info!(turn = ticket.turn_id, model = %model_id, "Starting chat turn");

    let body = match chat.open_stream(&request).await {
        Ok(body) => body,
        Err(error) => return fail(&conversation, ticket, error).await,
    };

    // Dropping this on any return closes the response
    let mut payloads = payload_stream(body);
    let mut state = TurnState::new();
    loop {
        let event = match payloads.next().await {
            Some(Ok(payload)) => TurnEvent::Payload(payload),
            Some(Err(error)) => TurnEvent::StreamFailed(error),
            None => TurnEvent::StreamEnded,
        };

        let result = match transition(state, event) {
            Ok(result) => result,
            Err(e) => {
                return fail(&conversation, ticket, TurnError::unexpected(e.to_string())).await;
            }
        };
        state = result.new_state;

        let live = conversation
            .with(|c| apply_effects(c, &ticket, &result.effects))
            .await;
        if !live {
            tracing::info!(turn = ticket.turn_id, "Turn no longer active, closing stream");
            return StreamPhase::Cancelled;
        }
        if state.is_terminal() {
            break;
        }
    }

    tracing::info!(turn = ticket.turn_id, state = state.name(), "Chat stream finished");
    match state {
        TurnState::Completed { .. } => StreamPhase::Completed,
        TurnState::DirectiveResolved { descriptor } => StreamPhase::Resolved(descriptor),
        TurnState::Errored { error } => match error.kind {
            TurnErrorKind::Parse | TurnErrorKind::Protocol => StreamPhase::DirectiveFailed(error),
            _ => StreamPhase::Failed(error),
        },
        other => StreamPhase::Failed(TurnError::unexpected(format!(
            "stream stopped in {} state",
            other.name()
        ))),
    }
}

/// Apply effects inside the exclusive section. Returns false, writing
/// nothing, if the turn is no longer live.
fn apply_effects(conversation: &mut Conversation, ticket: &TurnTicket, effects: &[Effect]) -> bool {
    if !conversation.is_live(ticket) {
        return false;
    }
    for effect in effects {
        match effect {
            Effect::PublishContent(content) => {
                conversation.write_message(ticket, |m| m.content.clone_from(content));
            }
            Effect::MarkToolLoading { narration } => {
                conversation.write_message(ticket, |m| {
                    m.content.clone_from(narration);
                    m.tool_call_status = Some(ToolCallStatus::Loading);
                });
            }
            Effect::FailDirective { content, reason } => {
                tracing::warn!(turn = ticket.turn_id, reason = %reason, "Directive failed");
                conversation.write_message(ticket, |m| {
                    m.content.clone_from(content);
                    m.tool_call_status = Some(ToolCallStatus::Error);
                    m.tool_call_error = Some(reason.clone());
                });
            }
            Effect::FailTurn(error) => {
                tracing::error!(turn = ticket.turn_id, error = %error, "Chat stream failed");
                conversation.fail_turn(ticket, error);
            }
            // Runs after the stream phase has committed
            Effect::DispatchTool(_) => {}
        }
    }
    true
}

async fn fail(conversation: &SharedConversation, ticket: TurnTicket, error: TurnError) -> StreamPhase {
    tracing::error!(turn = ticket.turn_id, error = %error, kind = ?error.kind, "Chat turn failed");
    let live = conversation
        .with(|c| {
            let live = c.is_live(&ticket);
            if live {
                c.fail_turn(&ticket, &error);
            }
            live
        })
        .await;
    if live {
        StreamPhase::Failed(error)
    } else {
        StreamPhase::Cancelled
    }
}

fn build_request(model_id: &str, history: Vec<ChatMessage>) -> ChatRequest {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage::system(build_system_prompt()));
    messages.extend(history);
    ChatRequest {
        model_id: model_id.to_string(),
        messages,
        stream: true,
        tools: vec![image_tool_definition()],
    }
}
