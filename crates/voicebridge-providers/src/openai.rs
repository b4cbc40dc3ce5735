//! OpenAI Chat Completions provider.
//!
//! Streams replies via `/v1/chat/completions` with `stream: true`. Also works
//! against any OpenAI-compatible endpoint by overriding the base URL.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_stream::StreamExt;
use tracing::{debug, trace};

use voicebridge_core::types::{ChatMessage, Role};

use crate::sse::parse_sse_stream;
use crate::{ChatChunk, ChatRequest, ChatStream, LlmProvider};

const OPENAI_BASE_URL: &str = "https://api.openai.com";

pub struct OpenAiProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, base_url: Option<&str>) -> Self {
        Self {
            base_url: base_url
                .unwrap_or(OPENAI_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionsBody {
    model: String,
    messages: Vec<serde_json::Value>,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Map conversation turns to the OpenAI message format.
fn format_messages(messages: &[ChatMessage]) -> Vec<serde_json::Value> {
    messages
        .iter()
        .map(|m| {
            let role = match m.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            json!({ "role": role, "content": m.content })
        })
        .collect()
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn id(&self) -> &str {
        "openai"
    }

    async fn stream(&self, request: &ChatRequest) -> anyhow::Result<ChatStream> {
        let body = CompletionsBody {
            model: request.model.clone(),
            messages: format_messages(&request.messages),
            max_tokens: request.max_tokens,
            stream: true,
            temperature: request.temperature,
        };

        debug!(model = %body.model, messages = body.messages.len(), "Streaming chat completion");

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("content-type", "application/json")
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API error {status}: {body}");
        }

        let sse_stream = parse_sse_stream(response);

        let chunk_stream = sse_stream.filter_map(|event| match event {
            Err(e) => Some(Err(e)),
            Ok(event) => chunk_from_data(&event.data).map(Ok),
        });

        Ok(Box::pin(chunk_stream))
    }
}

/// Map one SSE `data:` payload to a chunk.
///
/// Returns `None` for the `[DONE]` terminator, unparseable payloads (logged
/// and skipped without ending the stream), and chunks carrying neither text
/// nor a finish reason.
fn chunk_from_data(data: &str) -> Option<ChatChunk> {
    let data = data.trim();
    // OpenAI terminates the stream with "data: [DONE]"
    if data == "[DONE]" {
        return None;
    }
    let chunk: ChatCompletionChunk = match serde_json::from_str(data) {
        Ok(c) => c,
        Err(e) => {
            trace!(%e, data, "Skipping unparseable chunk");
            return None;
        }
    };
    let choice = chunk.choices.into_iter().next()?;
    let delta = choice.delta.content.filter(|c| !c.is_empty());
    if delta.is_none() && choice.finish_reason.is_none() {
        return None;
    }
    Some(ChatChunk { delta, stop_reason: choice.finish_reason })
}
