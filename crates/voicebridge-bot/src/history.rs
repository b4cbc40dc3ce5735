//! Rolling conversation history for the LLM context.

use voicebridge_core::types::{ChatMessage, Role};

/// System prompt plus a bounded window of user/assistant turns.
///
/// One turn is a user/assistant exchange, so `max_turns` bounds the window to
/// twice that many messages. The oldest messages fall off first.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    system: ChatMessage,
    messages: Vec<ChatMessage>,
    max_turns: usize,
}

impl ConversationHistory {
    pub fn new(system_prompt: impl Into<String>, max_turns: usize) -> Self {
        Self {
            system: ChatMessage::system(system_prompt),
            messages: Vec::new(),
            max_turns,
        }
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.push(ChatMessage::user(text));
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.push(ChatMessage::assistant(text));
    }

    fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
        let cap = self.max_turns * 2;
        if self.messages.len() > cap {
            let excess = self.messages.len() - cap;
            self.messages.drain(..excess);
        }
    }

    /// Full message list to send to the provider.
    pub fn context(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        messages.push(self.system.clone());
        messages.extend(self.messages.iter().cloned());
        messages
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}
