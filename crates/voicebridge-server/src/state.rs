//! Shared server state.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, RwLock};

use voicebridge_bot::{BotManager, BotOutput};
use voicebridge_core::config::Config;
use voicebridge_core::types::{BotId, TransportEvent};
use voicebridge_providers::LlmProvider;
use voicebridge_rooms::DailyClient;

/// Transport endpoints for a spawned bot, parked until its client connects
/// over `/ws/{bot_id}`.
pub struct TransportHandle {
    pub events_tx: mpsc::UnboundedSender<TransportEvent>,
    /// Taken exactly once by the WebSocket handler.
    pub output_rx: Mutex<Option<mpsc::UnboundedReceiver<BotOutput>>>,
}

/// Shared state accessible from all handlers.
pub struct AppState {
    pub config: Arc<Config>,
    pub daily: DailyClient,
    pub provider: Arc<dyn LlmProvider>,
    pub bots: Arc<BotManager>,
    pub transports: RwLock<HashMap<BotId, TransportHandle>>,
}

impl AppState {
    pub fn new(config: Arc<Config>, daily: DailyClient, provider: Arc<dyn LlmProvider>) -> Self {
        let bots = Arc::new(BotManager::new(config.bot.max_bots));
        Self {
            config,
            daily,
            provider,
            bots,
            transports: RwLock::new(HashMap::new()),
        }
    }

    /// Park a transport handle for a freshly spawned bot.
    pub async fn register_transport(
        &self,
        id: BotId,
        events_tx: mpsc::UnboundedSender<TransportEvent>,
        output_rx: mpsc::UnboundedReceiver<BotOutput>,
    ) {
        let handle = TransportHandle {
            events_tx,
            output_rx: Mutex::new(Some(output_rx)),
        };
        self.transports.write().await.insert(id, handle);
    }

    pub async fn remove_transport(&self, id: BotId) {
        self.transports.write().await.remove(&id);
    }
}
