//! HTTP/WebSocket server: room provisioning endpoints, bot transports, and
//! the embedded browser UI.

pub mod api;
pub mod server;
pub mod state;
pub mod ws;

pub use server::start_server;
pub use state::AppState;
