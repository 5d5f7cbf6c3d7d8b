use std::{
    collections::HashMap,
    fs::{self, File},
    io::prelude::*,
    path::Path,
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::logging::ServerLogger;

/// Top-level configuration for the server, loaded from a TOML file.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    /// Socket address to bind to, e.g. "0.0.0.0:25565".
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Maximum concurrent client connections.
    #[serde(default = "default_max_conn")]
    pub max_conn: u32,

    /// Seconds a client may take to finish status or login. Unset means no
    /// deadline.
    #[serde(default)]
    pub handshake_timeout: Option<u64>,

    /// RSA modulus size for login key pairs.
    #[serde(default = "default_key_bits")]
    pub key_bits: usize,

    /// Generate one key pair at first login and reuse it for every later one.
    #[serde(default)]
    pub share_key_pair: bool,

    /// Server list response.
    #[serde(default)]
    pub status: StatusConfig,

    #[serde(flatten)]
    pub other_fields: HashMap<String, toml::Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct StatusConfig {
    pub version_name: String,
    pub protocol: i32,
    pub max_players: u32,
    pub motd: String,
}

fn default_bind() -> String {
    "0.0.0.0:25565".to_string()
}

fn default_max_conn() -> u32 {
    65535
}

fn default_key_bits() -> usize {
    1024
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            version_name: "1.18.2".to_string(),
            protocol: 758,
            max_players: 100,
            motd: "Hello world".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_conn: default_max_conn(),
            handshake_timeout: None,
            key_bits: default_key_bits(),
            share_key_pair: false,
            status: StatusConfig::default(),
            other_fields: HashMap::new(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigLoadError> {
        let raw = fs::read_to_string(path).map_err(ConfigLoadError::Io)?;
        let config = Self::parse(&raw)?;

        for (key, value) in &config.other_fields {
            ServerLogger::unknown_config(key, value);
        }

        Ok(config)
    }

    pub fn parse(raw: &str) -> Result<Self, ConfigLoadError> {
        toml::from_str(raw).map_err(ConfigLoadError::Parse)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let config_str = toml::to_string(&self)?;
        let mut file = File::create(path)?;
        file.write_all(config_str.as_bytes())?;
        Ok(())
    }

    pub fn handshake_deadline(&self) -> Option<Duration> {
        self.handshake_timeout
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Could not open config")]
    Io(#[from] std::io::Error),
    #[error("Could not parse")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = ServerConfig::parse("").unwrap();
        assert_eq!(config.bind, "0.0.0.0:25565");
        assert_eq!(config.key_bits, 1024);
        assert!(!config.share_key_pair);
        assert_eq!(config.handshake_deadline(), None);
        assert_eq!(config.status.protocol, 758);
        assert_eq!(config.status.version_name, "1.18.2");
        assert_eq!(config.status.max_players, 100);
        assert_eq!(config.status.motd, "Hello world");
    }

    #[test]
    fn partial_status_table_keeps_other_defaults() {
        let config = ServerConfig::parse(
            r#"
            bind = "127.0.0.1:30000"
            handshake_timeout = 7
            mystery = 1

            [status]
            motd = "Lodestone"
            "#,
        )
        .unwrap();
        assert_eq!(config.bind, "127.0.0.1:30000");
        assert_eq!(config.handshake_deadline(), Some(Duration::from_secs(7)));
        assert_eq!(config.status.motd, "Lodestone");
        assert_eq!(config.status.protocol, 758);
        assert!(config.other_fields.contains_key("mystery"));
    }

    #[test]
    fn zero_timeout_means_no_deadline() {
        let config = ServerConfig::parse("handshake_timeout = 0").unwrap();
        assert_eq!(config.handshake_deadline(), None);
    }

    #[test]
    fn bad_toml_is_a_parse_error() {
        assert!(matches!(
            ServerConfig::parse("bind = ["),
            Err(ConfigLoadError::Parse(_))
        ));
    }

    #[test]
    fn defaults_survive_a_save_cycle() {
        let raw = toml::to_string(&ServerConfig::default()).unwrap();
        let config = ServerConfig::parse(&raw).unwrap();
        assert_eq!(config.max_conn, 65535);
        assert_eq!(config.status.motd, "Hello world");
    }
}
