//! Server integration tests — start a real server against mock Daily/OpenAI
//! backends and interact via HTTP + WS.
//!
//! Run with: `cargo test -p voicebridge-server --test integration`

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::response::IntoResponse;
use axum::routing::post;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use voicebridge_core::config::Config;
use voicebridge_providers::OpenAiProvider;
use voicebridge_rooms::DailyClient;
use voicebridge_server::{start_server, AppState};

/// Find an available port.
fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Mock Daily REST API: fixed room and token responses, counting how many
/// rooms were actually provisioned.
struct MockDaily {
    url: String,
    rooms_created: Arc<AtomicUsize>,
}

async fn start_mock_daily() -> MockDaily {
    let rooms_created = Arc::new(AtomicUsize::new(0));
    let counter = rooms_created.clone();
    let app = axum::Router::new()
        .route(
            "/rooms",
            post(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    axum::Json(json!({
                        "name": "vb-test",
                        "url": "https://mock.daily.co/vb-test",
                    }))
                }
            }),
        )
        .route(
            "/meeting-tokens",
            post(|| async { axum::Json(json!({ "token": "tok-123" })) }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    MockDaily { url: format!("http://{addr}"), rooms_created }
}

/// Mock Daily that rejects every call, for the provisioning-failure path.
async fn start_failing_mock_daily() -> String {
    let app = axum::Router::new().route(
        "/rooms",
        post(|| async {
            (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                "internal error",
            )
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

/// Mock OpenAI chat completions: a short scripted SSE reply.
async fn start_mock_openai() -> String {
    let app = axum::Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            // The garbage line must be skipped without ending the stream.
            let body = concat!(
                "data: {this is not json\n\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"Hello there.\"},\"finish_reason\":null}]}\n\n",
                "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
                "data: [DONE]\n\n",
            );
            ([("content-type", "text/event-stream")], body).into_response()
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

/// Start a full server wired to mock backends. The TTS host points at a
/// closed port so synthesis fails fast instead of dialing out.
async fn start_test_server(max_bots: usize) -> (u16, MockDaily) {
    let daily = start_mock_daily().await;
    let port = start_server_with_daily(&daily.url, max_bots).await;
    (port, daily)
}

async fn start_server_with_daily(daily_url: &str, max_bots: usize) -> u16 {
    let port = find_free_port();

    let mut config = Config::default();
    config.server.host = "127.0.0.1".into();
    config.server.port = port;
    config.daily.api_key = Some("dk-test".into());
    config.daily.base_url = daily_url.to_string();
    config.openai.api_key = Some("sk-test".into());
    config.openai.base_url = start_mock_openai().await;
    config.tts.api_key = Some("pk-test".into());
    config.tts.host = "127.0.0.1:1".into();
    config.bot.max_bots = max_bots;

    let daily = DailyClient::new(&config.daily.base_url, "dk-test");
    let provider = Arc::new(OpenAiProvider::new("sk-test", Some(&config.openai.base_url)));
    let state = Arc::new(AppState::new(Arc::new(config), daily, provider));

    tokio::spawn(async move {
        let _ = start_server(state).await;
    });

    // Wait for the server to be ready
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if reqwest::get(format!("http://127.0.0.1:{port}/health"))
            .await
            .is_ok()
        {
            break;
        }
    }

    port
}

#[tokio::test]
async fn test_health_endpoint() {
    let (port, _daily) = start_test_server(10).await;

    let resp = reqwest::get(format!("http://127.0.0.1:{port}/health"))
        .await
        .expect("Health request failed");

    assert!(resp.status().is_success());
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
    assert_eq!(body["active_bots"], 0);
}

#[tokio::test]
async fn test_connect_and_status() {
    let (port, _daily) = start_test_server(10).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://127.0.0.1:{port}/connect"))
        .send()
        .await
        .expect("Connect request failed");
    assert!(resp.status().is_success());

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["room_url"], "https://mock.daily.co/vb-test");
    assert_eq!(body["token"], "tok-123");
    let bot_id = body["bot_id"].as_str().expect("bot_id missing").to_string();

    let resp = client
        .get(format!("http://127.0.0.1:{port}/status/{bot_id}"))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let status: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(status["bot_id"], bot_id.as_str());
    assert_eq!(status["status"], "running");

    // Unknown (but well-formed) bot id
    let resp = client
        .get(format!(
            "http://127.0.0.1:{port}/status/00000000-0000-4000-8000-000000000000"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

    // Malformed bot id
    let resp = client
        .get(format!("http://127.0.0.1:{port}/status/not-a-bot"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_connect_refused_at_capacity() {
    let (port, daily) = start_test_server(0).await;

    let resp = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{port}/connect"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::TOO_MANY_REQUESTS);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("capacity"));

    // A refused request must not leave an orphaned room behind.
    assert_eq!(daily.rooms_created.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_connect_502_when_provisioning_fails() {
    let daily_url = start_failing_mock_daily().await;
    let port = start_server_with_daily(&daily_url, 10).await;

    let resp = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{port}/connect"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_GATEWAY);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("room creation failed"));
}

#[tokio::test]
async fn test_ws_conversation_turn() {
    let (port, _daily) = start_test_server(10).await;

    let resp = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{port}/connect"))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    let bot_id = body["bot_id"].as_str().unwrap().to_string();

    let url = format!("ws://127.0.0.1:{port}/ws/{bot_id}");
    let (mut ws, _) = connect_async(&url).await.expect("WS connect failed");

    let transcript = json!({ "type": "user_transcript", "text": "hi", "final": true });
    ws.send(Message::Text(transcript.to_string().into()))
        .await
        .unwrap();

    // Synthesis fails (TTS host is unreachable), so skip error frames and
    // wait for the reply text.
    let mut reply = None;
    for _ in 0..10 {
        let Some(Ok(Message::Text(text))) = ws.next().await else {
            break;
        };
        let msg: serde_json::Value = serde_json::from_str(&text).unwrap();
        if msg["type"] == "bot_reply" {
            reply = Some(msg["text"].as_str().unwrap().to_string());
            break;
        }
    }
    assert_eq!(reply.as_deref(), Some("Hello there."));

    ws.close(None).await.ok();

    // The session ends once its transport disconnects.
    let client = reqwest::Client::new();
    let mut finished = false;
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let resp = client
            .get(format!("http://127.0.0.1:{port}/status/{bot_id}"))
            .send()
            .await
            .unwrap();
        let status: serde_json::Value = resp.json().await.unwrap();
        if status["status"] == "finished" {
            finished = true;
            break;
        }
    }
    assert!(finished, "Bot session did not finish after WS close");
}

#[tokio::test]
async fn test_ws_unknown_bot_rejected() {
    let (port, _daily) = start_test_server(10).await;

    let url = format!(
        "ws://127.0.0.1:{port}/ws/00000000-0000-4000-8000-000000000000"
    );
    assert!(connect_async(&url).await.is_err());
}

#[tokio::test]
async fn test_ui_served_at_root() {
    let (port, _daily) = start_test_server(10).await;

    let resp = reqwest::get(format!("http://127.0.0.1:{port}/"))
        .await
        .expect("UI request failed");

    assert!(resp.status().is_success());
    let body = resp.text().await.unwrap();
    assert!(body.contains("Voicebridge"));
}
