//! Ponder WebSocket streaming TTS client.
//!
//! Real-time text-to-speech over a persistent WebSocket. Synthesis commands
//! are JSON text frames; audio arrives as binary frames which are forwarded
//! to the event channel, except the leading WAV header frame (`RIFF`) which
//! is skipped. Text frames carrying an `"error"` key become error events.

use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, warn};
use uuid::Uuid;

use voicebridge_core::config::TtsConfig;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

#[derive(Debug, Error)]
pub enum TtsError {
    #[error("No TTS API key configured")]
    MissingApiKey,

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Not connected")]
    NotConnected,
}

pub type Result<T> = std::result::Result<T, TtsError>;

/// Event emitted by the TTS service while synthesizing.
#[derive(Debug, Clone, PartialEq)]
pub enum TtsEvent {
    /// A new synthesis request began.
    Started,
    /// A chunk of raw audio.
    Audio(Vec<u8>),
    /// The service reported an error for the current request.
    Error(String),
}

/// Ponder WebSocket TTS client.
///
/// One client per bot session. The receive task runs for the lifetime of the
/// connection and forwards [`TtsEvent`]s to the channel handed out by
/// [`PonderTts::new`].
pub struct PonderTts {
    websocket_url: String,
    write: Option<WsSink>,
    receive_task: Option<JoinHandle<()>>,
    request_id: Option<Uuid>,
    event_tx: mpsc::UnboundedSender<TtsEvent>,
}

impl PonderTts {
    /// Build a client from config, returning it with its event receiver.
    pub fn new(config: &TtsConfig) -> Result<(Self, mpsc::UnboundedReceiver<TtsEvent>)> {
        let api_key = config.resolve_api_key().ok_or(TtsError::MissingApiKey)?;
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let client = Self {
            websocket_url: config.websocket_url(&api_key),
            write: None,
            receive_task: None,
            request_id: None,
            event_tx,
        };
        Ok((client, event_rx))
    }

    pub fn is_connected(&self) -> bool {
        self.write.is_some()
    }

    /// Connect and start the receive task. No-op when already connected.
    pub async fn connect(&mut self) -> Result<()> {
        if self.write.is_some() {
            return Ok(());
        }

        debug!("Connecting to Ponder");
        let (ws, _) = connect_async(&self.websocket_url).await?;
        let (write, read) = ws.split();
        self.write = Some(write);

        let event_tx = self.event_tx.clone();
        self.receive_task = Some(tokio::spawn(async move {
            receive_loop(read, event_tx).await;
        }));

        Ok(())
    }

    /// Disconnect, stopping the receive task and clearing the request id.
    pub async fn disconnect(&mut self) {
        if let Some(task) = self.receive_task.take() {
            task.abort();
        }
        if let Some(mut write) = self.write.take() {
            debug!("Disconnecting from Ponder");
            if let Err(e) = write.close().await {
                warn!(%e, "Error closing TTS websocket");
            }
        }
        self.request_id = None;
    }

    /// Queue `text` for synthesis.
    ///
    /// Reconnects lazily if the socket is closed. The first synthesis of a
    /// request emits [`TtsEvent::Started`] and assigns a fresh request id; a
    /// send failure tears the connection down and reconnects so the next
    /// call starts clean.
    pub async fn synthesize(&mut self, text: &str) -> Result<()> {
        debug!(text_len = text.len(), "Synthesizing");

        if self.write.is_none() {
            self.connect().await?;
        }

        if self.request_id.is_none() {
            self.request_id = Some(Uuid::new_v4());
            let _ = self.event_tx.send(TtsEvent::Started);
        }

        let command = json!({
            "type": "text",
            "text": text,
        });

        let write = self.write.as_mut().ok_or(TtsError::NotConnected)?;
        if let Err(e) = write.send(Message::Text(command.to_string().into())).await {
            error!(%e, "Error sending TTS command");
            self.disconnect().await;
            self.connect().await?;
            return Err(TtsError::WebSocket(e));
        }

        Ok(())
    }

    /// Abandon the in-flight request (user interruption). The next
    /// [`synthesize`](Self::synthesize) starts a new request.
    pub fn interrupt(&mut self) {
        self.request_id = None;
    }
}

async fn receive_loop(
    mut read: impl futures::Stream<Item = std::result::Result<Message, tokio_tungstenite::tungstenite::Error>>
        + Unpin,
    event_tx: mpsc::UnboundedSender<TtsEvent>,
) {
    while let Some(message) = read.next().await {
        let message = match message {
            Ok(m) => m,
            Err(e) => {
                error!(%e, "TTS websocket receive error");
                break;
            }
        };

        match message {
            Message::Binary(data) => {
                if let Some(event) = audio_event(&data) {
                    if event_tx.send(event).is_err() {
                        break;
                    }
                }
            }
            Message::Text(text) => {
                if let Some(event) = control_event(&text) {
                    if event_tx.send(event).is_err() {
                        break;
                    }
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    debug!("TTS receive loop ended");
}

/// Classify a binary frame. The WAV header frame is skipped.
fn audio_event(data: &[u8]) -> Option<TtsEvent> {
    if data.starts_with(b"RIFF") {
        return None;
    }
    Some(TtsEvent::Audio(data.to_vec()))
}

/// Classify a text frame: JSON with an `"error"` key becomes an error event,
/// everything else (including invalid JSON) is logged and dropped.
fn control_event(text: &str) -> Option<TtsEvent> {
    debug!(message = text, "Received TTS text message");
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(msg) => msg
            .get("error")
            .map(|e| TtsEvent::Error(e.as_str().map(str::to_string).unwrap_or_else(|| e.to_string()))),
        Err(_) => {
            error!(message = text, "Invalid JSON message from TTS service");
            None
        }
    }
}
