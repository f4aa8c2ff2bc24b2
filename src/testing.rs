//! Mock clients for testing
//!
//! Scripted chat and image backends so turns can run end to end without
//! any network.

use crate::error::TurnError;
use crate::image::{ImageClient, ImageRequest, ImageResponse};
use crate::llm::{ByteStream, ChatClient, ChatRequest};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};
use tokio_stream::wrappers::ReceiverStream;

/// `data:` line carrying a text fragment
pub fn sse_text(fragment: &str) -> String {
    format!("data: {}\n\n", json!({ "response": fragment }))
}

/// `data:` line carrying a structured tool call
pub fn sse_tool_use(arguments: serde_json::Value) -> String {
    format!(
        "data: {}\n\n",
        json!({ "type": "tool_use", "name": "generate_image", "input": arguments })
    )
}

pub fn sse_done() -> String {
    "data: [DONE]\n\n".to_string()
}

// ============================================================================
// Mock chat client
// ============================================================================

/// What the next `open_stream` call does
pub enum MockStream {
    /// Each string is delivered as one body chunk, then the body ends
    Chunks(Vec<String>),
    /// Opening the stream fails
    Fail(TurnError),
    /// Body chunks are fed by the test
    Channel(mpsc::Receiver<Result<Bytes, io::Error>>),
    /// Opening the stream panics
    Panic,
}

/// Chat client that replays queued streams
#[derive(Default)]
pub struct MockChatClient {
    streams: Mutex<VecDeque<MockStream>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockChatClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self, stream: MockStream) {
        self.streams.lock().unwrap().push_back(stream);
    }

    /// Queue a body made of text fragments followed by `[DONE]`
    pub fn queue_text(&self, fragments: &[&str]) {
        let mut chunks: Vec<String> = fragments.iter().map(|f| sse_text(f)).collect();
        chunks.push(sse_done());
        self.queue(MockStream::Chunks(chunks));
    }

    /// Queue a body fed through the returned sender
    pub fn queue_channel(&self) -> mpsc::Sender<Result<Bytes, io::Error>> {
        let (tx, rx) = mpsc::channel(16);
        self.queue(MockStream::Channel(rx));
        tx
    }

    pub fn recorded_requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatClient for MockChatClient {
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, TurnError> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.streams.lock().unwrap().pop_front();
        match next {
            Some(MockStream::Chunks(chunks)) => Ok(Box::pin(futures::stream::iter(
                chunks.into_iter().map(|c| Ok(Bytes::from(c))),
            ))),
            Some(MockStream::Fail(error)) => Err(error),
            Some(MockStream::Channel(rx)) => Ok(Box::pin(ReceiverStream::new(rx))),
            Some(MockStream::Panic) => panic!("scripted stream panic"),
            None => Err(TurnError::transport("No mock stream queued")),
        }
    }
}

// ============================================================================
// Mock image client
// ============================================================================

#[derive(Default)]
struct MockImageInner {
    responses: VecDeque<Result<ImageResponse, TurnError>>,
    requests: Vec<(String, ImageRequest)>,
    gate: Option<Arc<Notify>>,
}

/// Image client that replays queued responses. Clones share the queue.
#[derive(Clone, Default)]
pub struct MockImageClient {
    inner: Arc<Mutex<MockImageInner>>,
}

impl MockImageClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_png(&self, bytes: &[u8]) {
        self.push(Ok(ImageResponse {
            content_type: "image/png".to_string(),
            body: Bytes::copy_from_slice(bytes),
        }));
    }

    pub fn push_json(&self, image_b64: &str) {
        let body = json!({ "result": { "image": image_b64 } }).to_string();
        self.push(Ok(ImageResponse {
            content_type: "application/json".to_string(),
            body: Bytes::from(body),
        }));
    }

    pub fn push_error(&self, error: TurnError) {
        self.push(Err(error));
    }

    fn push(&self, response: Result<ImageResponse, TurnError>) {
        self.inner.lock().unwrap().responses.push_back(response);
    }

    /// Make every call wait until the returned gate is notified
    pub fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.inner.lock().unwrap().gate = Some(Arc::clone(&gate));
        gate
    }

    /// `(model_id, request)` pairs in call order
    pub fn requests(&self) -> Vec<(String, ImageRequest)> {
        self.inner.lock().unwrap().requests.clone()
    }
}

#[async_trait]
impl ImageClient for MockImageClient {
    async fn run(
        &self,
        model_id: &str,
        request: &ImageRequest,
    ) -> Result<ImageResponse, TurnError> {
        let gate = {
            let mut inner = self.inner.lock().unwrap();
            inner.requests.push((model_id.to_string(), request.clone()));
            inner.gate.clone()
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.inner
            .lock()
            .unwrap()
            .responses
            .pop_front()
            .unwrap_or_else(|| Err(TurnError::transport("No mock image queued")))
    }
}
