//! Prebuilt browser UI, embedded static assets served at the server root.
//!
//! Uses `rust-embed` to bake the `ui/` directory into the binary. In debug
//! mode (`debug-embed` feature) files are read from disk so the UI can be
//! edited without rebuilding.

use axum::{
    extract::Path,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use rust_embed::Embed;

#[derive(Embed)]
#[folder = "ui/"]
struct UiAssets;

/// Build an axum `Router` serving the embedded UI.
///
/// Register this after the API routes so they take priority over the
/// catch-all.
pub fn ui_router() -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/{*path}", get(static_handler))
}

async fn index_handler() -> impl IntoResponse {
    serve_file("index.html")
}

async fn static_handler(Path(path): Path<String>) -> impl IntoResponse {
    serve_file(&path)
}

fn serve_file(path: &str) -> Response {
    match UiAssets::get(path) {
        Some(asset) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, mime.as_ref())],
                asset.data.into_owned(),
            )
                .into_response()
        }
        None => (StatusCode::NOT_FOUND, Html("<h1>404</h1>")).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_asset_is_embedded() {
        let asset = UiAssets::get("index.html").expect("index.html must be embedded");
        let body = String::from_utf8_lossy(&asset.data);
        assert!(body.contains("Voicebridge"));
    }

    #[test]
    fn test_missing_asset() {
        assert!(UiAssets::get("nope.js").is_none());
    }
}
