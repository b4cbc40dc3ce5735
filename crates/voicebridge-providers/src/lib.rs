//! LLM provider abstraction.
//!
//! The bot pipeline only needs streaming chat completions, so the trait is
//! deliberately small: one [`LlmProvider::stream`] call per conversation turn.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use voicebridge_core::types::ChatMessage;

pub mod openai;
pub mod sse;

pub use openai::OpenAiProvider;

/// A streaming chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
}

/// A streamed chunk of the assistant's reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChunk {
    /// Incremental reply text, if this chunk carries any.
    pub delta: Option<String>,
    /// Set on the final chunk (e.g. "stop", "length").
    pub stop_reason: Option<String>,
}

pub type ChatStream = Pin<Box<dyn Stream<Item = anyhow::Result<ChatChunk>> + Send>>;

/// The core LLM provider trait.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider identifier (e.g. "openai").
    fn id(&self) -> &str;

    /// Stream a chat completion.
    async fn stream(&self, request: &ChatRequest) -> anyhow::Result<ChatStream>;
}
