//! Minecraft Java-edition front door: accepts TCP clients, answers server
//! list queries and runs the login handshake up to the encryption exchange.

pub mod config;
pub mod connection;
pub mod crypto;
pub mod error;
pub mod handshake;
pub mod logging;
pub mod metrics;
pub mod players;
pub mod server;
pub mod status;
pub mod telemetry;
pub mod utils;

pub use lodestone_net as net;
