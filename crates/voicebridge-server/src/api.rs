//! HTTP API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{info, warn};

use voicebridge_bot::{BotError, BotSession, TransportChannels};
use voicebridge_core::types::BotId;
use voicebridge_rooms::RoomProperties;
use voicebridge_tts::PonderTts;

use crate::state::AppState;

/// `POST /connect` — provision a room and token, spawn a bot session, and
/// return everything a client needs to join.
pub async fn connect_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    // Check capacity before touching the room API so a refused request never
    // provisions an orphaned room. The spawn below re-checks authoritatively.
    let active = state.bots.active_count().await;
    if active >= state.config.bot.max_bots {
        warn!(active, "Refusing to provision: at bot capacity");
        return error_response(
            StatusCode::TOO_MANY_REQUESTS,
            &BotError::AtCapacity(active).to_string(),
        );
    }

    let expiry = state.config.daily.room_expiry_secs;
    let props = RoomProperties::expiring_in(expiry);

    let room = match state.daily.create_room(&props).await {
        Ok(room) => room,
        Err(e) => {
            warn!(%e, "Room creation failed");
            return error_response(StatusCode::BAD_GATEWAY, &format!("room creation failed: {e}"));
        }
    };

    let token = match state.daily.create_token(&room.url, false, props.exp).await {
        Ok(token) => token,
        Err(e) => {
            warn!(%e, "Token creation failed");
            return error_response(StatusCode::BAD_GATEWAY, &format!("token creation failed: {e}"));
        }
    };

    let (tts, tts_rx) = match PonderTts::new(&state.config.tts) {
        Ok(pair) => pair,
        Err(e) => {
            warn!(%e, "TTS client construction failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string());
        }
    };

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (output_tx, output_rx) = mpsc::unbounded_channel();

    let bot_id = BotId::new();
    let session = BotSession::new(
        bot_id,
        state.provider.clone(),
        state.config.openai.clone(),
        state.config.bot.system_prompt.clone(),
        state.config.bot.max_history_turns,
        tts,
        tts_rx,
        TransportChannels { events_rx, output_tx },
    );

    let bot_id = match state.bots.spawn(bot_id, session.run()).await {
        Ok(id) => id,
        Err(e @ BotError::AtCapacity(_)) => {
            warn!(%e, "Refusing to spawn bot");
            return error_response(StatusCode::TOO_MANY_REQUESTS, &e.to_string());
        }
        Err(e) => {
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string());
        }
    };

    state.register_transport(bot_id, events_tx, output_rx).await;
    info!(%bot_id, room_url = %room.url, "Bot session provisioned");

    (
        StatusCode::OK,
        Json(json!({
            "room_url": room.url,
            "token": token,
            "bot_id": bot_id,
        })),
    )
        .into_response()
}

/// `GET /status/{bot_id}`.
pub async fn status_handler(
    State(state): State<Arc<AppState>>,
    Path(bot_id): Path<String>,
) -> impl IntoResponse {
    let id: BotId = match bot_id.parse() {
        Ok(id) => id,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "invalid bot id"),
    };

    match state.bots.status(id).await {
        Ok(status) => (
            StatusCode::OK,
            Json(json!({ "bot_id": id, "status": status })),
        )
            .into_response(),
        Err(e @ BotError::UnknownBot(_)) => {
            error_response(StatusCode::NOT_FOUND, &e.to_string())
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// `GET /health`.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let version = env!("CARGO_PKG_VERSION");
    let active_bots = state.bots.active_count().await;

    Json(json!({
        "status": "ok",
        "version": version,
        "active_bots": active_bots,
    }))
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (status, Json(json!({ "error": message }))).into_response()
}
