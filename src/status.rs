use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::{config::StatusConfig, players::PlayerRegistry};

const SAMPLE_SIZE: usize = 12;

/// Produces the server list JSON sent in a StatusResponse.
#[async_trait]
pub trait StatusProvider: Send + Sync {
    async fn status_json(&self) -> anyhow::Result<String>;
}

/// Status built from configuration and the live player registry.
pub struct ServerStatus {
    config: StatusConfig,
    players: Arc<PlayerRegistry>,
}

impl ServerStatus {
    pub fn new(config: StatusConfig, players: Arc<PlayerRegistry>) -> Self {
        Self { config, players }
    }
}

#[async_trait]
impl StatusProvider for ServerStatus {
    async fn status_json(&self) -> anyhow::Result<String> {
        let online = self.players.len().await;
        let sample: Vec<_> = self
            .players
            .sample(SAMPLE_SIZE)
            .await
            .into_iter()
            .map(|(name, id)| json!({ "name": name, "id": id.to_string() }))
            .collect();
        let v = json! {
            {
              "version": {
                "name": self.config.version_name,
                "protocol": self.config.protocol
              },
              "players": {
                "max": self.config.max_players,
                "online": online,
                "sample": sample
              },
              "description": {
                "text": self.config.motd
              }
            }
        };
        Ok(serde_json::to_string(&v)?)
    }
}

#[cfg(test)]
mod tests {
    use std::{net::SocketAddr, time::Instant};

    use crate::{crypto::offline_uuid, players::PlayerRecord};

    use super::*;

    #[tokio::test]
    async fn reports_config_and_player_count() {
        let players = Arc::new(PlayerRegistry::new());
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        players
            .insert(PlayerRecord {
                uuid: offline_uuid("Alice"),
                username: "Alice".into(),
                address: addr,
                protocol_version: 758,
                joined_at: Instant::now(),
            })
            .await;

        let status = ServerStatus::new(StatusConfig::default(), players);
        let raw = status.status_json().await.unwrap();
        let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(v["version"]["name"], "1.18.2");
        assert_eq!(v["version"]["protocol"], 758);
        assert_eq!(v["players"]["max"], 100);
        assert_eq!(v["players"]["online"], 1);
        assert_eq!(v["players"]["sample"][0]["name"], "Alice");
        assert_eq!(v["description"]["text"], "Hello world");
    }
}
