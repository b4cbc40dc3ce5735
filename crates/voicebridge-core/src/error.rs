use thiserror::Error;

#[derive(Debug, Error)]
pub enum VoicebridgeError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Rooms error: {0}")]
    Rooms(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("TTS error: {0}")]
    Tts(String),

    #[error("Bot error: {0}")]
    Bot(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, VoicebridgeError>;
