//! Room/token provisioning client for the Daily REST API.
//!
//! Creates short-lived rooms and meeting tokens for bot sessions. All calls
//! go over HTTPS with rustls; a non-2xx response surfaces as
//! [`RoomsError::Api`] carrying the status and body.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RoomsError {
    #[error("Daily API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, RoomsError>;

/// A room created on the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub name: String,
    pub url: String,
}

/// Properties applied to rooms created for bot sessions.
#[derive(Debug, Clone)]
pub struct RoomProperties {
    /// Absolute unix expiry timestamp.
    pub exp: i64,
}

impl RoomProperties {
    /// Expire `ttl_secs` from now.
    pub fn expiring_in(ttl_secs: u64) -> Self {
        Self { exp: Utc::now().timestamp() + ttl_secs as i64 }
    }
}

/// Daily REST API client.
#[derive(Clone)]
pub struct DailyClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl DailyClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Create a room configured for a bot session.
    ///
    /// Chat and reactions are disabled and participants are ejected when the
    /// room expires.
    pub async fn create_room(&self, props: &RoomProperties) -> Result<Room> {
        let body = json!({
            "properties": {
                "exp": props.exp,
                "enable_chat": false,
                "enable_emoji_reactions": false,
                "eject_at_room_exp": true,
            }
        });

        debug!(exp = props.exp, "Creating room");

        let resp = self
            .client
            .post(format!("{}/rooms", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let resp = check_status(resp).await?;
        Ok(resp.json().await?)
    }

    /// Create a meeting token for joining `room_url`.
    pub async fn create_token(
        &self,
        room_url: &str,
        is_owner: bool,
        exp: i64,
    ) -> Result<String> {
        let room_name = room_name_from_url(room_url);
        let body = json!({
            "properties": {
                "room_name": room_name,
                "is_owner": is_owner,
                "exp": exp,
            }
        });

        debug!(room_name, is_owner, "Creating meeting token");

        let resp = self
            .client
            .post(format!("{}/meeting-tokens", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let resp = check_status(resp).await?;
        let token: TokenResponse = resp.json().await?;
        Ok(token.token)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(RoomsError::Api { status, body })
}

/// Extract the room name from a room URL (the last path segment).
pub fn room_name_from_url(room_url: &str) -> &str {
    room_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(room_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_name_from_url() {
        assert_eq!(
            room_name_from_url("https://example.daily.co/vb-abc123"),
            "vb-abc123"
        );
        assert_eq!(
            room_name_from_url("https://example.daily.co/vb-abc123/"),
            "vb-abc123"
        );
        assert_eq!(room_name_from_url("bare-name"), "bare-name");
    }

    #[test]
    fn test_expiry_is_in_the_future() {
        let props = RoomProperties::expiring_in(300);
        let now = Utc::now().timestamp();
        assert!(props.exp >= now + 299);
        assert!(props.exp <= now + 301);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = DailyClient::new("https://api.daily.co/v1/", "key");
        assert_eq!(client.base_url, "https://api.daily.co/v1");
    }

    #[test]
    fn test_room_deserialization() {
        let json = r#"{"name":"vb-1","url":"https://x.daily.co/vb-1","privacy":"public"}"#;
        let room: Room = serde_json::from_str(json).unwrap();
        assert_eq!(room.name, "vb-1");
        assert_eq!(room.url, "https://x.daily.co/vb-1");
    }

    #[tokio::test]
    async fn test_non_2xx_surfaces_status_and_body() {
        use axum::http::StatusCode;
        use axum::routing::post;

        let app = axum::Router::new().route(
            "/rooms",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "rate limited, try later") }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let client = DailyClient::new(format!("http://{addr}"), "key");
        let err = client
            .create_room(&RoomProperties::expiring_in(60))
            .await
            .unwrap_err();
        match err {
            RoomsError::Api { status, body } => {
                assert_eq!(status, 500);
                assert!(body.contains("rate limited"));
            }
            other => panic!("expected Api error, got {other}"),
        }
    }
}
