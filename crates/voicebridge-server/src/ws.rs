//! WebSocket transport for bot sessions.
//!
//! The client sends JSON transport events (transcripts, speaking signals) as
//! text frames and receives bot output: audio as binary frames, everything
//! else as JSON text frames.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use voicebridge_bot::BotOutput;
use voicebridge_core::types::{BotId, TransportEvent};

use crate::state::AppState;

/// `GET /ws/{bot_id}` — attach a client to a spawned bot session.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(bot_id): Path<String>,
) -> impl IntoResponse {
    let id: BotId = match bot_id.parse() {
        Ok(id) => id,
        Err(_) => return (StatusCode::BAD_REQUEST, "invalid bot id").into_response(),
    };

    let (events_tx, output_rx) = {
        let transports = state.transports.read().await;
        let Some(handle) = transports.get(&id) else {
            return (StatusCode::NOT_FOUND, "unknown bot").into_response();
        };
        let Some(output_rx) = handle.output_rx.lock().await.take() else {
            return (StatusCode::CONFLICT, "bot already has a client").into_response();
        };
        (handle.events_tx.clone(), output_rx)
    };

    ws.on_upgrade(move |socket| handle_socket(state, id, socket, events_tx, output_rx))
}

async fn handle_socket(
    state: Arc<AppState>,
    id: BotId,
    mut socket: WebSocket,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    mut output_rx: mpsc::UnboundedReceiver<BotOutput>,
) {
    info!(bot_id = %id, "Transport connected");

    loop {
        tokio::select! {
            msg = socket.recv() => match msg {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<TransportEvent>(&text) {
                        Ok(event) => {
                            if events_tx.send(event).is_err() {
                                // Session is gone; nothing left to drive.
                                break;
                            }
                        }
                        Err(e) => {
                            debug!(bot_id = %id, %e, "Ignoring malformed transport event");
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(bot_id = %id, %e, "Transport receive error");
                    break;
                }
            },
            output = output_rx.recv() => match output {
                Some(output) => {
                    if send_output(&mut socket, output).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
        }
    }

    let _ = events_tx.send(TransportEvent::Disconnected);
    state.remove_transport(id).await;
    info!(bot_id = %id, "Transport disconnected");
}

async fn send_output(socket: &mut WebSocket, output: BotOutput) -> Result<(), axum::Error> {
    let message = match output {
        BotOutput::Audio(bytes) => Message::Binary(bytes.into()),
        BotOutput::SpeechStarted => {
            Message::Text(json!({ "type": "speech_started" }).to_string().into())
        }
        BotOutput::BotReply { text } => {
            Message::Text(json!({ "type": "bot_reply", "text": text }).to_string().into())
        }
        BotOutput::Error(message) => {
            Message::Text(json!({ "type": "error", "message": message }).to_string().into())
        }
    };
    socket.send(message).await
}
