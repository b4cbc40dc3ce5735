//! A bot session: one conversation bridging a transport, an LLM, and TTS.
//!
//! The session is a single task. It waits for transport events, and while a
//! turn is in flight it keeps polling the transport so user speech can
//! interrupt synthesis mid-reply.

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use voicebridge_core::config::OpenAiConfig;
use voicebridge_core::types::{BotId, TransportEvent};
use voicebridge_providers::{ChatRequest, LlmProvider};
use voicebridge_tts::{PonderTts, TtsEvent};

use crate::history::ConversationHistory;
use crate::sentence::SentenceChunker;

/// Outbound payload for the connected client.
#[derive(Debug, Clone, PartialEq)]
pub enum BotOutput {
    /// TTS began a new reply.
    SpeechStarted,
    /// Raw audio chunk.
    Audio(Vec<u8>),
    /// Full text of a completed (or interrupted) assistant reply.
    BotReply { text: String },
    /// Non-fatal error surfaced to the client.
    Error(String),
}

/// The session's side of a transport: events in, outputs back.
pub struct TransportChannels {
    pub events_rx: mpsc::UnboundedReceiver<TransportEvent>,
    pub output_tx: mpsc::UnboundedSender<BotOutput>,
}

/// Speech synthesis seam — lets tests run sessions without a live TTS socket.
#[async_trait]
pub trait SpeechService: Send {
    async fn open(&mut self) -> anyhow::Result<()>;
    async fn speak(&mut self, text: &str) -> anyhow::Result<()>;
    fn interrupt(&mut self);
    async fn close(&mut self);
}

#[async_trait]
impl SpeechService for PonderTts {
    async fn open(&mut self) -> anyhow::Result<()> {
        Ok(self.connect().await?)
    }

    async fn speak(&mut self, text: &str) -> anyhow::Result<()> {
        Ok(self.synthesize(text).await?)
    }

    fn interrupt(&mut self) {
        PonderTts::interrupt(self)
    }

    async fn close(&mut self) {
        self.disconnect().await
    }
}

/// How a turn ended.
enum TurnOutcome {
    /// The LLM stream finished (or failed non-fatally).
    Completed,
    /// The user started speaking; the reply was cut short.
    Interrupted,
    /// A new final transcript arrived mid-turn and replaces this one.
    Superseded(String),
    /// The transport went away.
    Closed,
}

pub struct BotSession<S: SpeechService> {
    id: BotId,
    provider: std::sync::Arc<dyn LlmProvider>,
    llm: OpenAiConfig,
    history: ConversationHistory,
    tts: S,
    tts_rx: mpsc::UnboundedReceiver<TtsEvent>,
    events_rx: mpsc::UnboundedReceiver<TransportEvent>,
    output_tx: mpsc::UnboundedSender<BotOutput>,
}

impl<S: SpeechService> BotSession<S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: BotId,
        provider: std::sync::Arc<dyn LlmProvider>,
        llm: OpenAiConfig,
        system_prompt: impl Into<String>,
        max_history_turns: usize,
        tts: S,
        tts_rx: mpsc::UnboundedReceiver<TtsEvent>,
        transport: TransportChannels,
    ) -> Self {
        Self {
            id,
            provider,
            llm,
            history: ConversationHistory::new(system_prompt, max_history_turns),
            tts,
            tts_rx,
            events_rx: transport.events_rx,
            output_tx: transport.output_tx,
        }
    }

    /// Run the session to completion (transport disconnect).
    pub async fn run(mut self) {
        info!(bot_id = %self.id, "Bot session started");

        if let Err(e) = self.tts.open().await {
            warn!(bot_id = %self.id, %e, "TTS connect failed; will retry on first reply");
        }

        // A final transcript that superseded an in-flight turn.
        let mut pending: Option<String> = None;

        loop {
            let event = match pending.take() {
                Some(text) => TransportEvent::UserTranscript { text, is_final: true },
                None => tokio::select! {
                    event = self.events_rx.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                    tts_event = self.tts_rx.recv() => {
                        if let Some(tts_event) = tts_event {
                            self.forward_tts(tts_event);
                        }
                        continue;
                    }
                },
            };

            match event {
                TransportEvent::UserTranscript { text, is_final: true } => {
                    match self.take_turn(&text).await {
                        TurnOutcome::Completed | TurnOutcome::Interrupted => {}
                        TurnOutcome::Superseded(next) => pending = Some(next),
                        TurnOutcome::Closed => break,
                    }
                }
                TransportEvent::UserStartedSpeaking => self.tts.interrupt(),
                TransportEvent::UserTranscript { .. } | TransportEvent::UserStoppedSpeaking => {}
                TransportEvent::Disconnected => break,
            }
        }

        self.tts.close().await;
        info!(bot_id = %self.id, "Bot session ended");
    }

    /// Stream one assistant reply, speaking sentences as they complete.
    async fn take_turn(&mut self, user_text: &str) -> TurnOutcome {
        debug!(bot_id = %self.id, text = user_text, "Taking turn");
        self.history.push_user(user_text);

        let request = ChatRequest {
            model: self.llm.model.clone(),
            messages: self.history.context(),
            max_tokens: self.llm.max_tokens,
            temperature: self.llm.temperature,
        };

        let mut stream = match self.provider.stream(&request).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(bot_id = %self.id, %e, "LLM request failed");
                let _ = self.output_tx.send(BotOutput::Error(format!("llm: {e}")));
                return TurnOutcome::Completed;
            }
        };

        let mut chunker = SentenceChunker::new();
        let mut spoken = String::new();

        let outcome = loop {
            tokio::select! {
                chunk = stream.next() => match chunk {
                    Some(Ok(chunk)) => {
                        if let Some(delta) = chunk.delta {
                            for sentence in chunker.push(&delta) {
                                self.speak_sentence(&sentence, &mut spoken).await;
                            }
                        }
                    }
                    Some(Err(e)) => {
                        warn!(bot_id = %self.id, %e, "LLM stream error");
                        let _ = self.output_tx.send(BotOutput::Error(format!("llm: {e}")));
                        break TurnOutcome::Completed;
                    }
                    None => {
                        if let Some(rest) = chunker.flush() {
                            self.speak_sentence(&rest, &mut spoken).await;
                        }
                        break TurnOutcome::Completed;
                    }
                },
                event = self.events_rx.recv() => match event {
                    Some(TransportEvent::UserStartedSpeaking) => {
                        debug!(bot_id = %self.id, "Interrupted by user speech");
                        self.tts.interrupt();
                        break TurnOutcome::Interrupted;
                    }
                    Some(TransportEvent::UserTranscript { text, is_final: true }) => {
                        self.tts.interrupt();
                        break TurnOutcome::Superseded(text);
                    }
                    Some(TransportEvent::Disconnected) | None => break TurnOutcome::Closed,
                    Some(_) => {}
                },
                tts_event = self.tts_rx.recv() => {
                    if let Some(tts_event) = tts_event {
                        self.forward_tts(tts_event);
                    }
                }
            }
        };

        // Record what was actually spoken, even for cut-short replies, so the
        // next turn's context matches what the user heard.
        if !spoken.is_empty() {
            self.history.push_assistant(spoken.clone());
            let _ = self.output_tx.send(BotOutput::BotReply { text: spoken });
        }

        outcome
    }

    async fn speak_sentence(&mut self, sentence: &str, spoken: &mut String) {
        if !spoken.is_empty() {
            spoken.push(' ');
        }
        spoken.push_str(sentence);

        if let Err(e) = self.tts.speak(sentence).await {
            warn!(bot_id = %self.id, %e, "TTS synthesis failed");
            let _ = self.output_tx.send(BotOutput::Error(format!("tts: {e}")));
        }
    }

    fn forward_tts(&self, event: TtsEvent) {
        let output = match event {
            TtsEvent::Started => BotOutput::SpeechStarted,
            TtsEvent::Audio(bytes) => BotOutput::Audio(bytes),
            TtsEvent::Error(msg) => BotOutput::Error(format!("tts: {msg}")),
        };
        let _ = self.output_tx.send(output);
    }
}
