//! Console chat session
//!
//! Reads prompts from stdin and prints assistant replies. Lines starting
//! with `/` are commands; `/help` lists them.

use flarechat::config::GatewayConfig;
use flarechat::conversation::{Conversation, ConversationMessage, SessionEvent, ToolCallStatus};
use flarechat::image::{CloudflareImageClient, ImageGenerator};
use flarechat::llm::{all_chat_models, GatewayChatClient, LoggingChatClient};
use flarechat::turn::{ChatSession, SubmitRejection, TurnHandle};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const GREETING: &str = "Hello! I'm your AI assistant. Ask me anything, or ask me to draw something.";

const HELP: &str = "\
/new <prompt>       start a fresh conversation
/suggest <text>     start a fresh conversation from a suggestion
/clear              drop all messages
/model [name]       list or select the chat model
/image <prompt>     generate an image with the current settings
/style <name>       set the image style
/size <WxH>         set the image size
/steps <n>          set the image quality steps
/quit               exit";

enum Command<'a> {
    Prompt(&'a str),
    New(&'a str),
    Suggest(&'a str),
    Clear,
    Model(Option<&'a str>),
    Image(&'a str),
    Style(&'a str),
    Size(&'a str),
    Steps(&'a str),
    Help,
    Quit,
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            return Command::Prompt(line);
        };
        let (name, arg) = rest.split_once(' ').unwrap_or((rest, ""));
        let arg = arg.trim();
        match name {
            "new" => Command::New(arg),
            "suggest" => Command::Suggest(arg),
            "clear" => Command::Clear,
            "model" => Command::Model(Some(arg).filter(|a| !a.is_empty())),
            "image" => Command::Image(arg),
            "style" => Command::Style(arg),
            "size" => Command::Size(arg),
            "steps" => Command::Steps(arg),
            "quit" | "exit" => Command::Quit,
            _ => Command::Help,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr; stdout is the conversation
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flarechat=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = GatewayConfig::from_env();
    if config.chat_credentials().is_err() {
        tracing::warn!(
            "Chat credentials not configured. Set CLOUDFLARE_ACCOUNT_ID, CLOUDFLARE_AI_GATEWAY and CLOUDFLARE_AI_GATEWAY_TOKEN."
        );
    }
    if config.image_credentials().is_err() {
        tracing::warn!("Image credentials not configured. Set CLOUDFLARE_AUTH_TOKEN.");
    }

    let chat = LoggingChatClient::new(GatewayChatClient::new(config.clone())?);
    let images = Arc::new(ImageGenerator::new(CloudflareImageClient::new(config)?));
    let session = ChatSession::new(Conversation::with_greeting(GREETING), chat, images);

    let mut events = BroadcastStream::new(session.subscribe());
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            match event {
                Ok(event) => render_event(&event),
                Err(e) => tracing::debug!(error = %e, "Event renderer lagged"),
            }
        }
    });

    println!("{GREETING}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let submitted = match Command::parse(&line) {
            Command::Prompt("") => continue,
            Command::Prompt(prompt) => session.submit(prompt).await,
            Command::New(prompt) => session.start_conversation(prompt).await,
            Command::Suggest(text) => session.submit_suggestion(text).await,
            Command::Clear => {
                session.clear().await;
                println!("(conversation cleared)");
                continue;
            }
            Command::Model(None) => {
                let current = session.snapshot().await.selected_model().to_string();
                for model in all_chat_models() {
                    let marker = if model.name == current { "*" } else { " " };
                    println!("{marker} {}", model.name);
                }
                continue;
            }
            Command::Model(Some(name)) => {
                if !session.select_model(name).await {
                    println!("Unknown model: {name}");
                }
                continue;
            }
            Command::Image(prompt) => {
                match session.images().generate(prompt).await {
                    Ok(image) => println!(
                        "[image: {} ({} bytes as data URI)]",
                        image.prompt,
                        image.image_data.len()
                    ),
                    Err(e) => println!("{}", e.banner_text()),
                }
                continue;
            }
            Command::Style(name) => {
                if !session.images().update_settings(|s| s.set_style(name)).await {
                    println!("Unknown style: {name}");
                }
                continue;
            }
            Command::Size(value) => {
                if !session.images().update_settings(|s| s.set_size(value)).await {
                    println!("Unknown size: {value}");
                }
                continue;
            }
            Command::Steps(value) => {
                match value.parse::<u32>() {
                    Ok(steps) => {
                        let steps = session
                            .images()
                            .update_settings(|s| {
                                s.set_steps(steps);
                                s.steps()
                            })
                            .await;
                        println!("(quality steps: {steps})");
                    }
                    Err(_) => println!("Steps must be a number"),
                }
                continue;
            }
            Command::Help => {
                println!("{HELP}");
                continue;
            }
            Command::Quit => break,
        };

        finish_turn(&session, submitted).await;
    }

    Ok(())
}

async fn finish_turn<C, I>(
    session: &ChatSession<C, I>,
    submitted: Result<TurnHandle, SubmitRejection>,
) where
    C: flarechat::llm::ChatClient + 'static,
    I: flarechat::image::ImageClient + 'static,
{
    let handle = match submitted {
        Ok(handle) => handle,
        Err(rejection) => {
            println!("({rejection})");
            return;
        }
    };

    let index = handle.ticket().index;
    let outcome = handle.wait().await;
    tracing::debug!(?outcome, "Turn finished");

    let snapshot = session.snapshot().await;
    if let Some(message) = snapshot.messages().get(index) {
        print_message(message);
    }
}

fn print_message(message: &ConversationMessage) {
    println!("{}", message.content);
    if let Some(image) = &message.image_data {
        println!("[image attached: {} bytes as data URI]", image.len());
    }
    if let (Some(ToolCallStatus::Error), Some(reason)) =
        (message.tool_call_status, &message.tool_call_error)
    {
        println!("[tool call failed: {reason}]");
    }
}

fn render_event(event: &SessionEvent) {
    match event {
        SessionEvent::MessageUpdated { message, .. }
            if message.tool_call_status == Some(ToolCallStatus::Loading) =>
        {
            if let Some(info) = &message.tool_call_info {
                println!("[{info}]");
            }
        }
        SessionEvent::ErrorChanged { message } if !message.is_empty() => {
            println!("! {message}");
        }
        _ => {}
    }
}
