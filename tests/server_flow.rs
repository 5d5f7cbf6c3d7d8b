//! End-to-end tests over a loopback socket: status query, login start and the
//! verified login, all through the real accept loop.

use std::{
    io,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};

use lodestone::{
    config::ServerConfig,
    crypto::offline_uuid,
    net::{
        write_frame, Direction, EncryptionResponseC2s, FrameDecoder, HandshakeC2s, LoginStartC2s,
        Packet, PacketEncode, PacketRegistry, ProtocolState, StatusPingC2s, StatusRequestC2s,
    },
    server::{Listener, Server},
};
use rand::rngs::OsRng;
use rsa::{BigUint, Pkcs1v15Encrypt, RsaPublicKey};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::broadcast,
    time::{sleep, timeout},
};

struct Client {
    stream: TcpStream,
    dec: FrameDecoder,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        Self {
            stream: TcpStream::connect(addr).await.expect("connect"),
            dec: FrameDecoder::new(),
        }
    }

    async fn send<P: PacketEncode>(&mut self, pkt: &P) {
        let mut out = Vec::new();
        pkt.encode_frame(&mut out).unwrap();
        self.stream.write_all(&out).await.unwrap();
    }

    async fn recv(&mut self, state: ProtocolState) -> Option<Packet> {
        loop {
            if let Some(frame) = self.dec.try_next_frame().unwrap() {
                return Some(
                    PacketRegistry::global()
                        .decode(&frame, state, Direction::ClientBound)
                        .unwrap(),
                );
            }
            let mut buf = [0u8; 1024];
            let n = timeout(Duration::from_secs(10), self.stream.read(&mut buf))
                .await
                .expect("server did not answer")
                .unwrap_or(0);
            if n == 0 {
                return None;
            }
            self.dec.queue_slice(&buf[..n]);
        }
    }
}

fn handshake(next_state: i32) -> HandshakeC2s {
    HandshakeC2s {
        protocol_version: 758,
        server_address: "localhost".into(),
        server_port: 25565,
        next_state,
    }
}

/// Fails the first `failures` accepts the way an exhausted fd table does.
struct FlakyListener {
    inner: TcpListener,
    failures: usize,
}

impl Listener for FlakyListener {
    async fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(io::Error::other("too many open files"));
        }
        self.inner.accept().await
    }
}

fn test_config() -> ServerConfig {
    ServerConfig {
        bind: "127.0.0.1:0".into(),
        key_bits: 512,
        share_key_pair: true,
        ..ServerConfig::default()
    }
}

fn spawn_server<L>(config: ServerConfig, listener: L) -> (Arc<Server>, broadcast::Sender<()>)
where
    L: Listener + Send + 'static,
{
    let (stop, _) = broadcast::channel(1);
    let server = Arc::new(Server::new(config, stop.clone()));
    let serving = server.clone();
    tokio::spawn(async move { serving.serve(listener).await });
    (server, stop)
}

async fn start_server_with(
    config: ServerConfig,
) -> (Arc<Server>, SocketAddr, broadcast::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (server, stop) = spawn_server(config, listener);
    (server, addr, stop)
}

async fn start_server() -> (Arc<Server>, SocketAddr, broadcast::Sender<()>) {
    start_server_with(test_config()).await
}

async fn status_online(addr: SocketAddr) -> serde_json::Value {
    let mut client = Client::connect(addr).await;
    client.send(&handshake(1)).await;
    client.send(&StatusRequestC2s).await;
    let Some(Packet::StatusResponse(response)) = client.recv(ProtocolState::Status).await else {
        panic!("expected StatusResponse");
    };
    serde_json::from_str(&response.json).unwrap()
}

#[tokio::test]
async fn status_round_trip_then_close() {
    let (_server, addr, stop) = start_server().await;
    let mut client = Client::connect(addr).await;

    client.send(&handshake(1)).await;
    client.send(&StatusRequestC2s).await;
    client.send(&StatusPingC2s { payload: 42 }).await;

    let Some(Packet::StatusResponse(response)) = client.recv(ProtocolState::Status).await else {
        panic!("expected StatusResponse");
    };
    let status: serde_json::Value = serde_json::from_str(&response.json).unwrap();
    assert_eq!(status["version"]["protocol"], 758);
    assert_eq!(status["description"]["text"], "Hello world");

    assert_eq!(
        client.recv(ProtocolState::Status).await,
        Some(Packet::StatusPong(lodestone::net::StatusPongS2c { payload: 42 }))
    );
    assert_eq!(client.recv(ProtocolState::Status).await, None);
    let _ = stop.send(());
}

#[tokio::test]
async fn login_start_gets_an_encryption_request() {
    let (_server, addr, stop) = start_server().await;
    let mut client = Client::connect(addr).await;

    client.send(&handshake(2)).await;
    client
        .send(&LoginStartC2s {
            username: "Alice".into(),
        })
        .await;

    let Some(Packet::EncryptionRequest(request)) = client.recv(ProtocolState::Login).await else {
        panic!("expected EncryptionRequest");
    };
    assert!(request.server_id.is_empty());
    assert!(!request.public_key.is_empty());
    assert!(!request.verify_token.is_empty());
    let _ = stop.send(());
}

#[tokio::test]
async fn verified_login_registers_the_player_until_they_leave() {
    let (server, addr, stop) = start_server().await;
    let mut client = Client::connect(addr).await;

    client.send(&handshake(2)).await;
    client
        .send(&LoginStartC2s {
            username: "Alice".into(),
        })
        .await;
    let Some(Packet::EncryptionRequest(request)) = client.recv(ProtocolState::Login).await else {
        panic!("expected EncryptionRequest");
    };

    let (n, e) = rsa_der::public_key_from_der(&request.public_key).unwrap();
    let public_key =
        RsaPublicKey::new(BigUint::from_bytes_be(&n), BigUint::from_bytes_be(&e)).unwrap();
    client
        .send(&EncryptionResponseC2s {
            shared_secret: public_key
                .encrypt(&mut OsRng, Pkcs1v15Encrypt, &[3u8; 16])
                .unwrap(),
            verify_token: public_key
                .encrypt(&mut OsRng, Pkcs1v15Encrypt, &request.verify_token)
                .unwrap(),
        })
        .await;

    let uuid = offline_uuid("Alice");
    let mut registered = false;
    for _ in 0..100 {
        if server.players().get(&uuid).await.is_some() {
            registered = true;
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }
    assert!(registered, "player was never registered");
    assert_eq!(status_online(addr).await["players"]["online"], 1);

    drop(client);
    let mut removed = false;
    for _ in 0..100 {
        if server.players().is_empty().await {
            removed = true;
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }
    assert!(removed, "player record outlived the connection");
    let _ = stop.send(());
}

#[tokio::test]
async fn unknown_packet_does_not_close_the_connection() {
    let (_server, addr, stop) = start_server().await;
    let mut client = Client::connect(addr).await;

    client.send(&handshake(1)).await;
    let mut junk = Vec::new();
    write_frame(&mut junk, 0x33, |body| {
        body.extend_from_slice(&[0xde, 0xad]);
        Ok(())
    })
    .unwrap();
    client.stream.write_all(&junk).await.unwrap();
    client.send(&StatusRequestC2s).await;

    assert!(matches!(
        client.recv(ProtocolState::Status).await,
        Some(Packet::StatusResponse(_))
    ));
    let _ = stop.send(());
}

#[tokio::test]
async fn stalled_negotiation_is_cut_off_at_the_deadline() {
    let config = ServerConfig {
        handshake_timeout: Some(1),
        ..test_config()
    };
    let (_server, addr, stop) = start_server_with(config).await;
    let mut client = Client::connect(addr).await;

    client.send(&handshake(2)).await;
    let sent = Instant::now();
    let mut buf = [0u8; 64];
    let read = timeout(Duration::from_secs(3), client.stream.read(&mut buf))
        .await
        .expect("connection outlived the handshake deadline");

    assert_eq!(read.unwrap_or(0), 0);
    assert!(sent.elapsed() >= Duration::from_millis(500));
    let _ = stop.send(());
}

#[tokio::test]
async fn failed_accepts_do_not_stop_the_listener() {
    let inner = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = inner.local_addr().unwrap();
    let (_server, stop) = spawn_server(test_config(), FlakyListener { inner, failures: 3 });

    let status = status_online(addr).await;
    assert_eq!(status["players"]["online"], 0);
    let _ = stop.send(());
}
