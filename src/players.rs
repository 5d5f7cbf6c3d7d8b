use std::{collections::HashMap, net::SocketAddr, time::Instant};

use tokio::sync::RwLock;
use uuid::Uuid;

/// A player that finished login.
#[derive(Debug, Clone)]
pub struct PlayerRecord {
    pub uuid: Uuid,
    pub username: String,
    pub address: SocketAddr,
    pub protocol_version: i32,
    pub joined_at: Instant,
}

/// Completed logins, shared by every connection task.
#[derive(Default)]
pub struct PlayerRegistry {
    players: RwLock<HashMap<Uuid, PlayerRecord>>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `record`, returning the entry it replaced when the same player
    /// logs in twice.
    pub async fn insert(&self, record: PlayerRecord) -> Option<PlayerRecord> {
        self.players.write().await.insert(record.uuid, record)
    }

    /// Removes `uuid` only if it still belongs to the session that joined at
    /// `joined_at`.
    pub async fn remove_session(&self, uuid: &Uuid, joined_at: Instant) -> Option<PlayerRecord> {
        let mut players = self.players.write().await;
        match players.get(uuid) {
            Some(record) if record.joined_at == joined_at => players.remove(uuid),
            _ => None,
        }
    }

    pub async fn get(&self, uuid: &Uuid) -> Option<PlayerRecord> {
        self.players.read().await.get(uuid).cloned()
    }

    pub async fn len(&self) -> usize {
        self.players.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.players.read().await.is_empty()
    }

    /// Up to `limit` players, for the server list sample.
    pub async fn sample(&self, limit: usize) -> Vec<(String, Uuid)> {
        self.players
            .read()
            .await
            .values()
            .take(limit)
            .map(|p| (p.username.clone(), p.uuid))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;

    fn record(name: &str) -> PlayerRecord {
        PlayerRecord {
            uuid: crate::crypto::offline_uuid(name),
            username: name.to_string(),
            address: "127.0.0.1:5000".parse().unwrap(),
            protocol_version: 758,
            joined_at: Instant::now(),
        }
    }

    #[tokio::test]
    async fn concurrent_inserts_are_all_kept() {
        let registry = Arc::new(PlayerRegistry::new());
        let mut tasks = Vec::new();
        for i in 0..32 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                registry.insert(record(&format!("player{i}"))).await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(registry.len().await, 32);
        assert_eq!(registry.sample(5).await.len(), 5);
    }

    #[tokio::test]
    async fn relogin_replaces_and_old_session_cannot_remove_new() {
        let registry = PlayerRegistry::new();
        let first = record("Alice");
        registry.insert(first.clone()).await;

        tokio::time::sleep(Duration::from_millis(2)).await;
        let second = record("Alice");
        let replaced = registry.insert(second.clone()).await.unwrap();
        assert_eq!(replaced.joined_at, first.joined_at);

        assert!(registry
            .remove_session(&first.uuid, first.joined_at)
            .await
            .is_none());
        assert!(registry.get(&second.uuid).await.is_some());
        assert!(registry
            .remove_session(&second.uuid, second.joined_at)
            .await
            .is_some());
        assert!(registry.is_empty().await);
    }
}
