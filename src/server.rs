use std::{
    future::Future,
    io,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::{
    net::{TcpListener, TcpStream},
    sync::{broadcast, Semaphore},
    time::{sleep, timeout},
};

use crate::{
    config::ServerConfig,
    connection::Connection,
    crypto::RsaKeyGenerator,
    error::HandshakeError,
    handshake::{HandshakeOutcome, HandshakeSession, LoginResult, Negotiator},
    logging::ServerLogger,
    metrics::HandshakeMetrics,
    players::{PlayerRecord, PlayerRegistry},
    status::ServerStatus,
    telemetry::get_meter,
    utils::apply_nodelay,
};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Source of inbound client sockets.
pub trait Listener {
    fn accept(&mut self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send;
}

impl Listener for TcpListener {
    async fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }
}

pub struct Server {
    config: ServerConfig,
    negotiator: Negotiator,
    players: Arc<PlayerRegistry>,
    metrics: HandshakeMetrics,
    stop: broadcast::Sender<()>,
}

impl Server {
    pub fn new(config: ServerConfig, stop: broadcast::Sender<()>) -> Server {
        let players = Arc::new(PlayerRegistry::new());
        let keys = Arc::new(RsaKeyGenerator::new(config.key_bits, config.share_key_pair));
        let status = Arc::new(ServerStatus::new(config.status.clone(), players.clone()));
        Server {
            negotiator: Negotiator::new(keys, status),
            players,
            metrics: HandshakeMetrics::new(&get_meter()),
            config,
            stop,
        }
    }

    pub fn players(&self) -> &Arc<PlayerRegistry> {
        &self.players
    }

    pub async fn bind(&self) -> anyhow::Result<TcpListener> {
        ServerLogger::preparing_socket(&self.config.bind);
        let address: SocketAddr = self.config.bind.parse()?;
        Ok(TcpListener::bind(address).await?)
    }

    /// Binds the configured address and serves until stopped.
    pub async fn start(self: &Arc<Self>) -> anyhow::Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await;
        Ok(())
    }

    /// Accepts connections on `listener` until the stop signal fires. A failed
    /// accept is logged and retried after a short pause.
    pub async fn serve<L>(self: &Arc<Self>, mut listener: L)
    where
        L: Listener + Send,
    {
        let semaphore = Arc::new(Semaphore::new(self.config.max_conn as usize));
        let mut stop = self.stop.subscribe();

        loop {
            let accepted = tokio::select! {
                accepted = listener.accept() => accepted,
                _ = stop.recv() => return,
            };
            let (client, addr) = match accepted {
                Ok(pair) => pair,
                Err(err) => {
                    ServerLogger::accept_failed(&err);
                    tokio::select! {
                        _ = sleep(ACCEPT_BACKOFF) => {}
                        _ = stop.recv() => return,
                    }
                    continue;
                }
            };

            // Try to acquire semaphore (non-blocking)
            let Ok(permit) = semaphore.clone().try_acquire_owned() else {
                ServerLogger::connection_rejected(&addr);
                drop(client);
                continue;
            };

            apply_nodelay(&client);
            self.metrics.record_open();

            let server = self.clone();
            tokio::spawn(async move {
                server.handle_connection(client, addr).await;
                drop(permit);
            });
        }
    }

    pub async fn handle_connection(&self, client: TcpStream, addr: SocketAddr) {
        let connection = Connection::new(client, addr);
        ServerLogger::new_connection(&addr, connection.id());

        let started = Instant::now();
        let mut session = HandshakeSession::new();
        let negotiation = self.negotiator.negotiate_session(&mut session, connection);
        let result = match self.config.handshake_deadline() {
            Some(limit) => match timeout(limit, negotiation).await {
                Ok(result) => result,
                Err(elapsed) => {
                    ServerLogger::deadline_missed("negotiating", limit, Some(&addr));
                    Err(HandshakeError::from(elapsed))
                }
            },
            None => negotiation.await,
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;
        if session.started() {
            self.metrics.record_attempt(session.kind().as_str());
        }

        match result {
            Ok(HandshakeOutcome::Status) => {
                self.metrics.record_duration(elapsed_ms, "status");
                ServerLogger::handshake_completed(elapsed_ms, "status");
                ServerLogger::status_served(&addr);
            }
            Ok(HandshakeOutcome::Login(login)) => {
                self.metrics.record_duration(elapsed_ms, "login");
                ServerLogger::handshake_completed(elapsed_ms, "login");
                self.hold_player(*login).await;
            }
            Ok(HandshakeOutcome::Closed) => ServerLogger::connection_closed(&addr),
            Err(err) => {
                self.metrics.record_failure(err.stage());
                ServerLogger::connection_error(&addr, &err);
            }
        }
    }

    /// Registers the player and keeps the record until the peer leaves or the
    /// server stops.
    async fn hold_player(&self, login: LoginResult<TcpStream>) {
        let LoginResult {
            address,
            username,
            uuid,
            protocol_version,
            mut connection,
            ..
        } = login;

        self.metrics.record_login();
        ServerLogger::login_completed(&address, &username, &uuid);
        let joined_at = Instant::now();
        self.players
            .insert(PlayerRecord {
                uuid,
                username: username.clone(),
                address,
                protocol_version,
                joined_at,
            })
            .await;

        let mut stop = self.stop.subscribe();
        tokio::select! {
            res = connection.wait_closed() => {
                if let Err(err) = res {
                    ServerLogger::connection_error(&address, &err);
                }
            }
            _ = stop.recv() => {
                let _ = connection.close().await;
            }
        }

        self.players.remove_session(&uuid, joined_at).await;
        ServerLogger::player_left(&username, &uuid);
    }
}
