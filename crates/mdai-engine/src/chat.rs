//! Chat completion client.
//!
//! Talks to any OpenAI-compatible `/chat/completions` endpoint, either
//! waiting for the whole reply or streaming it as server-sent events.

use crate::config::{DefaultConfig, QualityConfig};
use futures::StreamExt;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Role in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System message (instructions to the model).
    System,
    /// User message.
    User,
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message author.
    pub role: Role,
    /// Message content.
    pub content: String,
}

impl ChatMessage {
    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Request body for `/chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f64,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamOptions>,
}

/// Streaming options.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StreamOptions {
    pub include_usage: bool,
}

/// Token usage reported by the API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkResponse {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

/// One parsed line of a server-sent event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// A `data:` payload with optional content delta and usage.
    Chunk {
        content: Option<String>,
        usage: Option<Usage>,
    },
    /// The `data: [DONE]` terminator.
    Done,
    /// Blank lines, comments and non-data fields.
    Skip,
}

/// Parse a single line of a chat completion event stream.
pub fn parse_sse_line(line: &str) -> Result<SseEvent, ChatError> {
    let line = line.trim_end_matches('\r');
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(SseEvent::Skip);
    };
    let data = data.trim_start();
    if data == "[DONE]" {
        return Ok(SseEvent::Done);
    }

    let chunk: ChunkResponse = serde_json::from_str(data)?;
    let content = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|c| !c.is_empty());

    Ok(SseEvent::Chunk {
        content,
        usage: chunk.usage,
    })
}

/// Result of a chat invocation.
#[derive(Debug, Clone)]
pub struct ChatResult {
    /// Model that generated the response.
    pub model: String,
    /// Response content.
    pub content: String,
    /// Token usage, when reported.
    pub usage: Option<Usage>,
    /// Duration in milliseconds.
    pub duration_ms: u64,
}

/// Client for an OpenAI-compatible chat completion API.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ChatClient {
    /// Create a client for the given endpoint and model.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, ChatError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    /// Create a client from configuration and the `OPENAI_API_KEY` variable.
    pub fn from_config(config: &DefaultConfig) -> Result<Self, ChatError> {
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or(ChatError::MissingApiKey)?;
        Self::new(&config.base_url, api_key, &config.model)
    }

    /// Model identifier used for requests.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Full URL of the completions endpoint.
    pub fn completions_url(&self) -> String {
        if self.base_url.contains("/chat/completions") {
            self.base_url.clone()
        } else {
            format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
        }
    }

    /// Build a request body for a system and user message pair.
    pub fn build_request(
        &self,
        system: &str,
        user: &str,
        quality: &QualityConfig,
        stream: bool,
    ) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            max_tokens: quality.effective_max_tokens(),
            temperature: quality.effective_temperature(),
            stream,
            stream_options: stream.then_some(StreamOptions {
                include_usage: true,
            }),
        }
    }

    async fn send(&self, request: &ChatRequest) -> Result<reqwest::Response, ChatError> {
        debug!(url = %self.completions_url(), model = %request.model, stream = request.stream, "sending chat request");

        let response = self
            .http
            .post(self.completions_url())
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CONTENT_TYPE, "application/json")
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Api { status, body });
        }

        Ok(response)
    }

    /// Request a completion and wait for the whole reply.
    pub async fn complete(
        &self,
        system: &str,
        user: &str,
        quality: &QualityConfig,
    ) -> Result<ChatResult, ChatError> {
        let start = Instant::now();
        let request = self.build_request(system, user, quality, false);
        let response = self.send(&request).await?;

        let body = response.text().await?;
        let completion: CompletionResponse = serde_json::from_str(&body)?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .ok_or(ChatError::EmptyResponse)?
            .message
            .content
            .unwrap_or_default();

        Ok(ChatResult {
            model: self.model.clone(),
            content,
            usage: completion.usage,
            duration_ms: elapsed_ms(start),
        })
    }

    /// Request a completion and hand each content delta to `on_delta` as it arrives.
    pub async fn complete_streaming<F>(
        &self,
        system: &str,
        user: &str,
        quality: &QualityConfig,
        mut on_delta: F,
    ) -> Result<ChatResult, ChatError>
    where
        F: FnMut(&str) -> std::io::Result<()>,
    {
        let start = Instant::now();
        let request = self.build_request(system, user, quality, true);
        let response = self.send(&request).await?;

        let mut stream = response.bytes_stream();
        let mut pending: Vec<u8> = Vec::new();
        let mut content = String::new();
        let mut usage = None;

        'outer: while let Some(chunk) = stream.next().await {
            pending.extend_from_slice(&chunk?);

            while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
                let line_bytes: Vec<u8> = pending.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line_bytes);
                match parse_sse_line(line.trim_end_matches('\n'))? {
                    SseEvent::Chunk {
                        content: delta,
                        usage: chunk_usage,
                    } => {
                        if let Some(delta) = delta {
                            on_delta(&delta)?;
                            content.push_str(&delta);
                        }
                        if chunk_usage.is_some() {
                            usage = chunk_usage;
                        }
                    }
                    SseEvent::Done => break 'outer,
                    SseEvent::Skip => {}
                }
            }
        }

        Ok(ChatResult {
            model: self.model.clone(),
            content,
            usage,
            duration_ms: elapsed_ms(start),
        })
    }
}

#[cfg(test)]
impl ChatClient {
    /// Client for a server on the loopback interface, bypassing any proxy.
    pub(crate) fn local(base_url: &str) -> Self {
        Self {
            http: Client::builder().no_proxy().build().unwrap(),
            base_url: base_url.into(),
            api_key: "sk-test".into(),
            model: "gpt-4o-mini".into(),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Errors that can occur when talking to the chat API.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// The API key environment variable is unset or empty.
    #[error("environment variable OPENAI_API_KEY is not set")]
    MissingApiKey,

    /// Transport-level failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The response contained no choices.
    #[error("no response from chat API")]
    EmptyResponse,

    /// Writing a streamed delta failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
