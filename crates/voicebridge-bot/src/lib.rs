//! Bot sessions — the transcript → LLM → TTS pipeline and its manager.

pub mod history;
pub mod manager;
pub mod sentence;
pub mod session;

pub use manager::{BotError, BotManager};
pub use session::{BotOutput, BotSession, TransportChannels};
