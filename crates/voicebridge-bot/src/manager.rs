//! Bot session registry.
//!
//! Sessions run as tokio tasks; the manager tracks them by id, enforces the
//! concurrency cap, and tears everything down on server shutdown.

use std::collections::HashMap;
use std::future::Future;

use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use voicebridge_core::types::{BotId, BotStatus};

#[derive(Debug, Error)]
pub enum BotError {
    #[error("Bot session capacity reached ({0} running)")]
    AtCapacity(usize),

    #[error("Unknown bot: {0}")]
    UnknownBot(BotId),
}

pub struct BotManager {
    max_bots: usize,
    sessions: RwLock<HashMap<BotId, JoinHandle<()>>>,
}

impl BotManager {
    pub fn new(max_bots: usize) -> Self {
        Self { max_bots, sessions: RwLock::new(HashMap::new()) }
    }

    /// Spawn a session task under `id`.
    ///
    /// Finished sessions are swept first, so the cap counts only running
    /// bots. Fails when the cap is reached.
    pub async fn spawn(
        &self,
        id: BotId,
        session: impl Future<Output = ()> + Send + 'static,
    ) -> Result<BotId, BotError> {
        let mut sessions = self.sessions.write().await;
        sessions.retain(|id, handle| {
            let running = !handle.is_finished();
            if !running {
                debug!(bot_id = %id, "Sweeping finished bot session");
            }
            running
        });

        if sessions.len() >= self.max_bots {
            return Err(BotError::AtCapacity(sessions.len()));
        }

        sessions.insert(id, tokio::spawn(session));
        info!(bot_id = %id, running = sessions.len(), "Spawned bot session");
        Ok(id)
    }

    /// Status of a known session.
    pub async fn status(&self, id: BotId) -> Result<BotStatus, BotError> {
        let sessions = self.sessions.read().await;
        match sessions.get(&id) {
            Some(handle) if handle.is_finished() => Ok(BotStatus::Finished),
            Some(_) => Ok(BotStatus::Running),
            None => Err(BotError::UnknownBot(id)),
        }
    }

    /// Number of sessions still running.
    pub async fn active_count(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.values().filter(|h| !h.is_finished()).count()
    }

    /// Abort every session (server shutdown).
    pub async fn shutdown_all(&self) {
        let mut sessions = self.sessions.write().await;
        let count = sessions.len();
        for (id, handle) in sessions.drain() {
            debug!(bot_id = %id, "Aborting bot session");
            handle.abort();
        }
        if count > 0 {
            info!(count, "Shut down bot sessions");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_and_status() {
        let manager = BotManager::new(2);
        let id = BotId::new();
        manager.spawn(id, std::future::pending()).await.unwrap();

        assert_eq!(manager.status(id).await.unwrap(), BotStatus::Running);
        assert_eq!(manager.active_count().await, 1);

        manager.shutdown_all().await;
        assert_eq!(manager.active_count().await, 0);
    }

    #[tokio::test]
    async fn test_capacity_enforced() {
        let manager = BotManager::new(1);
        manager.spawn(BotId::new(), std::future::pending()).await.unwrap();

        let err = manager.spawn(BotId::new(), std::future::pending()).await.unwrap_err();
        assert!(matches!(err, BotError::AtCapacity(1)));
        manager.shutdown_all().await;
    }

    #[tokio::test]
    async fn test_finished_sessions_are_swept() {
        let manager = BotManager::new(1);
        let id = BotId::new();
        manager.spawn(id, async {}).await.unwrap();

        // Give the empty session a moment to finish.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(manager.status(id).await.unwrap(), BotStatus::Finished);

        // The cap counts running bots only, so a new spawn succeeds…
        let id2 = BotId::new();
        manager.spawn(id2, std::future::pending()).await.unwrap();
        assert_eq!(manager.status(id2).await.unwrap(), BotStatus::Running);

        // …and the finished session has been swept from the registry.
        assert!(matches!(
            manager.status(id).await,
            Err(BotError::UnknownBot(_))
        ));
        manager.shutdown_all().await;
    }

    #[tokio::test]
    async fn test_unknown_bot() {
        let manager = BotManager::new(1);
        assert!(matches!(
            manager.status(BotId::new()).await,
            Err(BotError::UnknownBot(_))
        ));
    }
}
