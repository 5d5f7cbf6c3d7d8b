use std::{fmt::Display, net::SocketAddr, time::Duration};

use log::{debug, error, info, warn};
use lodestone_net::{Direction, ProtocolState};
use uuid::Uuid;

pub struct ServerLogger;

impl ServerLogger {
    pub fn preparing_socket(address: &str) {
        info!("Preparing socket {}", address);
    }

    pub fn tcp_nodelay_failed(err: &std::io::Error) {
        error!("Failed to set TCP_NODELAY: {err}");
    }

    pub fn accept_failed(err: &std::io::Error) {
        error!("Failed to accept connection: {err}");
    }

    pub fn connection_rejected(address: &SocketAddr) {
        debug!("Rejected {address}: connection limit reached");
    }

    pub fn new_connection(address: &SocketAddr, id: &Uuid) {
        info!("New connection {} ({})", address, id);
    }

    pub fn unknown_packet(id: &Uuid, packet_id: i32, state: ProtocolState, direction: Direction) {
        debug!(
            "[{id}] Unknown packet 0x{packet_id:02x} in {} ({direction:?}), skipped",
            state.as_str()
        );
    }

    pub fn out_of_sequence(id: &Uuid, step: &str, packet: &str) {
        debug!("[{id}] Ignoring {packet} during step {step}");
    }

    pub fn state_changed(id: &Uuid, from: ProtocolState, to: ProtocolState) {
        debug!("[{id}] State {} -> {}", from.as_str(), to.as_str());
    }

    pub fn handshake_completed(elapsed_ms: u64, next_state: &str) {
        debug!(
            "Handshake completed in {}ms, next state: {}",
            elapsed_ms, next_state
        );
    }

    pub fn status_served(addr: &SocketAddr) {
        debug!("Status query from {addr} answered");
    }

    pub fn login_completed(addr: &SocketAddr, username: &str, uuid: &Uuid) {
        info!("{username} ({uuid}) logged in from {addr}");
    }

    pub fn player_left(username: &str, uuid: &Uuid) {
        info!("{username} ({uuid}) left");
    }

    pub fn key_generation_failed(addr: &SocketAddr, err: &dyn Display) {
        error!("Key pair generation failed for {addr}: {err}");
    }

    pub fn connection_closed(addr: &SocketAddr) {
        debug!("Connection {addr} closed");
    }

    pub fn connection_error(client: &SocketAddr, err: &dyn Display) {
        if dotenvy::var("DO_NOT_LOG_CONNECTION_ERROR").is_ok() {
            return;
        }
        error!("connection error@{client}: {}", err);
    }

    pub fn disconnect_warning(addr: &SocketAddr, reason: &str) {
        warn!("Disconnecting client {addr}: {reason}");
    }

    pub fn disconnect_failure(addr: &SocketAddr, err: &dyn Display) {
        debug!("Failed to send disconnect to {addr}: {err}");
    }

    pub fn deadline_missed(stage: &str, duration: Duration, client: Option<&SocketAddr>) {
        let context = client
            .map(|addr| format!(" client={addr}"))
            .unwrap_or_default();
        warn!(
            "Deadline exceeded while {stage} (limit {:?}){}",
            duration, context
        );
    }

    pub fn unknown_config(key: &str, value: &dyn Display) {
        warn!("Unknown configuration '{key}' with value {value}");
    }
}
