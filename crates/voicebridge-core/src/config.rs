//! Configuration loading and validation.
//!
//! The primary surface is environment variables (`DAILY_API_KEY`,
//! `OPENAI_API_KEY`, `PONDER_API_KEY`, `HOST`, `FAST_API_PORT`). An optional
//! JSON5 config file can layer in the non-secret knobs; environment variables
//! always win for secrets and the bind address.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Top-level Voicebridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub daily: DailyConfig,

    #[serde(default)]
    pub openai: OpenAiConfig,

    #[serde(default)]
    pub tts: TtsConfig,

    #[serde(default)]
    pub bot: BotConfig,
}

/// HTTP server bind configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (env: `HOST`).
    #[serde(default = "default_host")]
    pub host: String,

    /// Listening port (env: `FAST_API_PORT`).
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port() }
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    7860
}

/// Room/video platform (Daily) REST configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_daily_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_daily_base_url")]
    pub base_url: String,

    /// Room (and token) lifetime in seconds.
    #[serde(default = "default_room_expiry_secs")]
    pub room_expiry_secs: u64,
}

impl Default for DailyConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_daily_api_key_env(),
            base_url: default_daily_base_url(),
            room_expiry_secs: default_room_expiry_secs(),
        }
    }
}

fn default_daily_api_key_env() -> String {
    "DAILY_API_KEY".into()
}

fn default_daily_base_url() -> String {
    "https://api.daily.co/v1".into()
}

fn default_room_expiry_secs() -> u64 {
    300
}

impl DailyConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret(&self.api_key, &self.api_key_env)
    }
}

/// LLM (OpenAI chat completions) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_openai_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    #[serde(default = "default_openai_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_openai_api_key_env(),
            base_url: default_openai_base_url(),
            model: default_openai_model(),
            max_tokens: default_max_tokens(),
            temperature: None,
        }
    }
}

fn default_openai_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com".into()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".into()
}

fn default_max_tokens() -> u32 {
    1024
}

impl OpenAiConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret(&self.api_key, &self.api_key_env)
    }
}

/// Streaming TTS (Ponder) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_ponder_api_key_env")]
    pub api_key_env: String,

    /// TTS host — can also be a self-hosted instance.
    #[serde(default = "default_tts_host")]
    pub host: String,

    #[serde(default = "default_voice_id")]
    pub voice_id: String,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_ponder_api_key_env(),
            host: default_tts_host(),
            voice_id: default_voice_id(),
        }
    }
}

fn default_ponder_api_key_env() -> String {
    "PONDER_API_KEY".into()
}

fn default_tts_host() -> String {
    "inf.useponder.ai".into()
}

fn default_voice_id() -> String {
    "default".into()
}

impl TtsConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret(&self.api_key, &self.api_key_env)
    }

    /// WebSocket URL for a streaming synthesis connection.
    pub fn websocket_url(&self, api_key: &str) -> String {
        format!(
            "wss://{}/v1/ws/tts?api_key={}&voice_id={}",
            self.host, api_key, self.voice_id
        )
    }
}

/// Bot session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Maximum concurrently running bot sessions.
    #[serde(default = "default_max_bots")]
    pub max_bots: usize,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// User/assistant exchanges kept when building LLM context.
    #[serde(default = "default_max_history_turns")]
    pub max_history_turns: usize,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            max_bots: default_max_bots(),
            system_prompt: default_system_prompt(),
            max_history_turns: default_max_history_turns(),
        }
    }
}

fn default_max_bots() -> usize {
    10
}

fn default_system_prompt() -> String {
    "You are a friendly voice assistant. Keep your responses short and \
     conversational — they will be spoken aloud."
        .into()
}

fn default_max_history_turns() -> usize {
    20
}

/// Resolve a secret: direct value first, then the env-var reference.
fn resolve_secret(direct: &Option<String>, env_var: &str) -> Option<String> {
    if let Some(val) = direct {
        if !val.is_empty() {
            return Some(val.clone());
        }
    }
    if let Ok(val) = std::env::var(env_var) {
        if !val.is_empty() {
            return Some(val);
        }
    }
    None
}

/// Substitute `${ENV_VAR}` patterns in a string with their environment values.
fn substitute_env_vars(input: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_default()
    })
    .into_owned()
}

impl Config {
    /// Build config from environment variables alone.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references,
    /// then overlay the documented environment variables.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(crate::error::VoicebridgeError::Io)?;
            let substituted = substitute_env_vars(&raw);
            json5::from_str(&substituted)
                .map_err(|e| crate::error::VoicebridgeError::Config(e.to_string()))?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// Overlay `HOST` and `FAST_API_PORT` from the environment. Secrets are
    /// resolved lazily through their `*_env` references, so they need no
    /// overlay here.
    fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("HOST") {
            if !host.is_empty() {
                self.server.host = host;
            }
        }
        if let Ok(port) = std::env::var("FAST_API_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        for (name, key) in [
            (self.daily.api_key_env.as_str(), self.daily.resolve_api_key()),
            (self.openai.api_key_env.as_str(), self.openai.resolve_api_key()),
            (self.tts.api_key_env.as_str(), self.tts.resolve_api_key()),
        ] {
            if key.is_none() {
                errors.push(format!("Required credential {name} is not set"));
            }
        }

        if self.server.port == 0 {
            errors.push("Server port cannot be 0".to_string());
        }

        if self.bot.max_bots == 0 {
            warnings.push("bot.max_bots is 0 — no sessions can be spawned".to_string());
        }

        if self.daily.room_expiry_secs < 60 {
            warnings.push(format!(
                "daily.room_expiry_secs is {} — rooms may expire mid-session",
                self.daily.room_expiry_secs
            ));
        }

        (warnings, errors)
    }
}
