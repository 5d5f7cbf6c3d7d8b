//! Per-connection negotiation: handshake, then either a status/ping round or
//! the login encryption exchange.

use std::{net::SocketAddr, sync::Arc};

use lodestone_net::{
    EncryptionRequestS2c, EncryptionResponseC2s, HandshakeNextState, Packet, ProtocolState,
    StatusPongS2c, StatusResponseS2c,
};
use tokio::io::{AsyncRead, AsyncWrite};
use uuid::Uuid;

use crate::{
    connection::Connection,
    crypto::{offline_uuid, KeyPairSource, ServerKeyPair},
    error::HandshakeError,
    logging::ServerLogger,
    status::StatusProvider,
};

const VERIFY_TOKEN_LEN: usize = 16;
const SHARED_SECRET_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStep {
    Initial,
    Status,
    Ping,
    Login,
    Encryption,
}

impl HandshakeStep {
    pub const fn as_str(self) -> &'static str {
        match self {
            HandshakeStep::Initial => "initial",
            HandshakeStep::Status => "status",
            HandshakeStep::Ping => "ping",
            HandshakeStep::Login => "login",
            HandshakeStep::Encryption => "encryption",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeType {
    Status,
    Login,
}

impl HandshakeType {
    pub const fn as_str(self) -> &'static str {
        match self {
            HandshakeType::Status => "status",
            HandshakeType::Login => "login",
        }
    }
}

/// A finished login. Stream encryption is not switched on; the shared secret
/// is handed over for whoever takes the connection next.
pub struct LoginResult<S> {
    pub connection_id: Uuid,
    pub address: SocketAddr,
    pub username: String,
    pub uuid: Uuid,
    pub protocol_version: i32,
    pub server_address: String,
    pub server_port: u16,
    pub key_pair: Arc<ServerKeyPair>,
    pub shared_secret: [u8; SHARED_SECRET_LEN],
    pub connection: Connection<S>,
}

pub enum HandshakeOutcome<S> {
    /// Status and ping answered; the connection is closed.
    Status,
    Login(Box<LoginResult<S>>),
    /// The peer went away before either finished.
    Closed,
}

enum Resolution {
    Status,
    Login(LoginDetails),
}

struct LoginDetails {
    username: String,
    protocol_version: i32,
    server_address: String,
    server_port: u16,
    key_pair: Arc<ServerKeyPair>,
    shared_secret: [u8; SHARED_SECRET_LEN],
}

/// Negotiation state for one connection.
pub struct HandshakeSession {
    step: HandshakeStep,
    kind: HandshakeType,
    username: String,
    protocol_version: i32,
    server_address: String,
    server_port: u16,
    key_pair: Option<Arc<ServerKeyPair>>,
    verify_token: [u8; VERIFY_TOKEN_LEN],
}

impl Default for HandshakeSession {
    fn default() -> Self {
        Self::new()
    }
}

impl HandshakeSession {
    pub fn new() -> Self {
        Self {
            step: HandshakeStep::Initial,
            kind: HandshakeType::Status,
            username: String::new(),
            protocol_version: 0,
            server_address: String::new(),
            server_port: 0,
            key_pair: None,
            verify_token: rand::random(),
        }
    }

    pub fn step(&self) -> HandshakeStep {
        self.step
    }

    pub fn kind(&self) -> HandshakeType {
        self.kind
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Whether a Handshake packet has been accepted.
    pub fn started(&self) -> bool {
        self.step != HandshakeStep::Initial
    }

    /// Handles one packet. Packets that do not fit the current step are
    /// ignored without a reply.
    async fn advance<S>(
        &mut self,
        negotiator: &Negotiator,
        conn: &mut Connection<S>,
        packet: Packet,
    ) -> Result<Option<Resolution>, HandshakeError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match (self.step, packet) {
            (HandshakeStep::Initial, Packet::Handshake(hs)) => {
                let next = match hs.next_state() {
                    HandshakeNextState::Status => {
                        self.kind = HandshakeType::Status;
                        self.step = HandshakeStep::Status;
                        ProtocolState::Status
                    }
                    HandshakeNextState::Login => {
                        self.kind = HandshakeType::Login;
                        self.step = HandshakeStep::Login;
                        ProtocolState::Login
                    }
                };
                conn.change_state(next)?;
                self.protocol_version = hs.protocol_version;
                self.server_address = hs.server_address;
                self.server_port = hs.server_port;
                Ok(None)
            }
            (HandshakeStep::Status, Packet::StatusRequest(_)) => {
                let json = negotiator
                    .status
                    .status_json()
                    .await
                    .map_err(HandshakeError::Status)?;
                conn.send(&StatusResponseS2c { json }).await?;
                self.step = HandshakeStep::Ping;
                Ok(None)
            }
            (HandshakeStep::Ping, Packet::StatusPing(ping)) => {
                conn.send(&StatusPongS2c {
                    payload: ping.payload,
                })
                .await?;
                conn.close().await?;
                Ok(Some(Resolution::Status))
            }
            (HandshakeStep::Login, Packet::LoginStart(start)) => {
                self.username = start.username;
                let key_pair = match negotiator.keys.key_pair().await {
                    Ok(pair) => pair,
                    Err(err) => {
                        ServerLogger::key_generation_failed(conn.address(), &err);
                        Self::kick(conn, "Failed to prepare encryption").await;
                        return Err(HandshakeError::KeyGeneration(err));
                    }
                };
                conn.send(&EncryptionRequestS2c {
                    server_id: String::new(),
                    public_key: key_pair.public_der().to_vec(),
                    verify_token: self.verify_token.to_vec(),
                })
                .await?;
                self.key_pair = Some(key_pair);
                self.step = HandshakeStep::Encryption;
                Ok(None)
            }
            (HandshakeStep::Encryption, Packet::EncryptionResponse(response)) => {
                match self.verify(&response) {
                    Ok(details) => Ok(Some(Resolution::Login(details))),
                    Err(err) => {
                        Self::kick(conn, "Encryption failed").await;
                        Err(err)
                    }
                }
            }
            (step, packet) => {
                ServerLogger::out_of_sequence(conn.id(), step.as_str(), packet.name());
                Ok(None)
            }
        }
    }

    fn verify(&mut self, response: &EncryptionResponseC2s) -> Result<LoginDetails, HandshakeError> {
        let Some(key_pair) = self.key_pair.take() else {
            return Err(HandshakeError::KeyGeneration(anyhow::anyhow!(
                "no key pair issued for this session"
            )));
        };

        let token = key_pair.decrypt(&response.verify_token)?;
        if token != self.verify_token {
            return Err(HandshakeError::VerifyTokenMismatch);
        }

        let secret = key_pair.decrypt(&response.shared_secret)?;
        let shared_secret: [u8; SHARED_SECRET_LEN] = secret
            .as_slice()
            .try_into()
            .map_err(|_| HandshakeError::BadSharedSecret(secret.len()))?;

        Ok(LoginDetails {
            username: std::mem::take(&mut self.username),
            protocol_version: self.protocol_version,
            server_address: std::mem::take(&mut self.server_address),
            server_port: self.server_port,
            key_pair,
            shared_secret,
        })
    }

    async fn kick<S>(conn: &mut Connection<S>, reason: &str)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if let Err(e) = conn.disconnect(reason).await {
            ServerLogger::disconnect_failure(conn.address(), &e);
        }
    }
}

/// Drives connections through the handshake.
#[derive(Clone)]
pub struct Negotiator {
    keys: Arc<dyn KeyPairSource>,
    status: Arc<dyn StatusProvider>,
}

impl Negotiator {
    pub fn new(keys: Arc<dyn KeyPairSource>, status: Arc<dyn StatusProvider>) -> Self {
        Self { keys, status }
    }

    /// Runs the handshake on `conn` until it resolves. Packets are handled
    /// strictly in arrival order; bytes that arrive while a key pair is being
    /// generated stay buffered in the connection.
    pub async fn negotiate<S>(
        &self,
        conn: Connection<S>,
    ) -> Result<HandshakeOutcome<S>, HandshakeError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.negotiate_session(&mut HandshakeSession::new(), conn).await
    }

    /// Like [`Negotiator::negotiate`], but progress is kept in `session`, so
    /// the caller can still see how far a failed or abandoned negotiation got.
    pub async fn negotiate_session<S>(
        &self,
        session: &mut HandshakeSession,
        mut conn: Connection<S>,
    ) -> Result<HandshakeOutcome<S>, HandshakeError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        loop {
            let Some(packet) = conn.recv().await? else {
                return Ok(HandshakeOutcome::Closed);
            };

            match session.advance(self, &mut conn, packet).await? {
                None => continue,
                Some(Resolution::Status) => return Ok(HandshakeOutcome::Status),
                Some(Resolution::Login(details)) => {
                    let result = LoginResult {
                        connection_id: *conn.id(),
                        address: *conn.address(),
                        uuid: offline_uuid(&details.username),
                        username: details.username,
                        protocol_version: details.protocol_version,
                        server_address: details.server_address,
                        server_port: details.server_port,
                        key_pair: details.key_pair,
                        shared_secret: details.shared_secret,
                        connection: conn,
                    };
                    return Ok(HandshakeOutcome::Login(Box::new(result)));
                }
            }
        }
    }
}
