use std::net::SocketAddr;

use bytes::BytesMut;
use lodestone_net::{
    Direction, FrameDecoder, LoginDisconnectS2c, Packet, PacketEncode, PacketRegistry,
    ProtocolState, Resolved,
};
use serde_json::json;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

use crate::{
    error::ConnectionError, logging::ServerLogger, metrics::ConnectionMetrics,
    telemetry::get_meter,
};

const MAX_CHUNK_SIZE: usize = 1024;

/// One client socket and its protocol state.
///
/// Inbound bytes are buffered by [`Connection::feed`] and turned into packets
/// one at a time by [`Connection::next_packet`], always using the state the
/// connection is in at that moment.
pub struct Connection<S> {
    id: Uuid,
    address: SocketAddr,
    stream: S,
    state: ProtocolState,
    dec: FrameDecoder,
    out: Vec<u8>,
    read_buf: BytesMut,
    closed: bool,
    metric: ConnectionMetrics,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, address: SocketAddr) -> Self {
        Self {
            id: Uuid::new_v4(),
            address,
            stream,
            state: ProtocolState::Handshake,
            dec: FrameDecoder::new(),
            out: Vec::new(),
            read_buf: BytesMut::with_capacity(MAX_CHUNK_SIZE),
            closed: false,
            metric: ConnectionMetrics::new(&get_meter()),
        }
    }

    pub fn id(&self) -> &Uuid {
        &self.id
    }

    pub fn address(&self) -> &SocketAddr {
        &self.address
    }

    pub fn state(&self) -> ProtocolState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Queues received bytes. Nothing is decoded here.
    pub fn feed(&mut self, bytes: &[u8]) {
        if self.closed {
            return;
        }
        self.metric.record_volume(bytes.len(), "c2s");
        self.dec.queue_slice(bytes);
    }

    /// Pulls the next decodable packet out of the buffered bytes.
    ///
    /// Frames with ids unknown to the current state are logged and skipped.
    /// `Ok(None)` means only a partial frame (or nothing) is buffered.
    pub fn next_packet(&mut self) -> Result<Option<Packet>, ConnectionError> {
        if self.closed {
            return Ok(None);
        }

        let registry = PacketRegistry::global();
        while let Some(frame) = self.dec.try_next_frame()? {
            match registry.resolve(frame.id, self.state, Direction::ServerBound) {
                Resolved::Known(decoder) => {
                    self.metric.record_packet("c2s");
                    return Ok(Some(decoder.decode(&frame.body)?));
                }
                Resolved::Unknown => {
                    self.metric.record_unknown(self.state.as_str());
                    ServerLogger::unknown_packet(
                        &self.id,
                        frame.id,
                        self.state,
                        Direction::ServerBound,
                    );
                }
            }
        }
        Ok(None)
    }

    /// Waits for the next packet, reading from the socket as needed.
    /// Returns `Ok(None)` once the peer has closed the stream.
    pub async fn recv(&mut self) -> Result<Option<Packet>, ConnectionError> {
        loop {
            if let Some(packet) = self.next_packet()? {
                return Ok(Some(packet));
            }
            if self.closed {
                return Ok(None);
            }

            self.read_buf.clear();
            self.read_buf.reserve(MAX_CHUNK_SIZE);
            if self.stream.read_buf(&mut self.read_buf).await? == 0 {
                self.release();
                return Ok(None);
            }

            let chunk = self.read_buf.split();
            self.feed(&chunk);
        }
    }

    pub async fn send<P>(&mut self, pkt: &P) -> Result<(), ConnectionError>
    where
        P: PacketEncode,
    {
        if self.closed {
            return Err(ConnectionError::Closed);
        }
        self.out.clear();
        pkt.encode_frame(&mut self.out)?;
        self.stream.write_all(&self.out).await?;
        self.stream.flush().await?;
        self.metric.record_packet("s2c");
        self.metric.record_volume(self.out.len(), "s2c");
        Ok(())
    }

    /// Moves to `next`. Only forward transitions are accepted.
    pub fn change_state(&mut self, next: ProtocolState) -> Result<(), ConnectionError> {
        if !self.state.can_advance_to(next) {
            return Err(ConnectionError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        ServerLogger::state_changed(&self.id, self.state, next);
        self.state = next;
        Ok(())
    }

    /// Shuts the socket down. Buffered input is dropped and no packet is
    /// returned afterwards.
    pub async fn close(&mut self) -> Result<(), ConnectionError> {
        if self.closed {
            return Ok(());
        }
        self.release();
        self.stream.shutdown().await?;
        ServerLogger::connection_closed(&self.address);
        Ok(())
    }

    /// Sends a red DisconnectLogin reason, then closes.
    pub async fn disconnect(&mut self, reason: &str) -> Result<(), ConnectionError> {
        ServerLogger::disconnect_warning(&self.address, reason);
        let kick = LoginDisconnectS2c {
            reason: json!({ "text": reason, "color": "red" }).to_string(),
        };
        let sent = self.send(&kick).await;
        let closed = self.close().await;
        sent.and(closed)
    }

    /// Reads and discards input until the peer goes away.
    pub async fn wait_closed(&mut self) -> Result<(), ConnectionError> {
        while !self.closed {
            self.read_buf.clear();
            self.read_buf.reserve(MAX_CHUNK_SIZE);
            if self.stream.read_buf(&mut self.read_buf).await? == 0 {
                self.release();
            }
        }
        Ok(())
    }

    fn release(&mut self) {
        self.closed = true;
        self.dec.clear();
        self.out = Vec::new();
        self.read_buf = BytesMut::new();
    }
}

#[cfg(test)]
mod tests {
    use lodestone_net::{
        write_frame, HandshakeC2s, LoginStartC2s, StatusPingC2s, StatusPongS2c,
        StatusRequestC2s,
    };
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

    use super::*;

    fn pipe() -> (Connection<DuplexStream>, DuplexStream) {
        let (client, server) = duplex(4096);
        let addr = "127.0.0.1:40000".parse().unwrap();
        (Connection::new(server, addr), client)
    }

    fn handshake(next_state: i32) -> Vec<u8> {
        let mut out = Vec::new();
        HandshakeC2s {
            protocol_version: 758,
            server_address: "localhost".into(),
            server_port: 25565,
            next_state,
        }
        .encode_frame(&mut out)
        .unwrap();
        out
    }

    #[tokio::test]
    async fn feed_keeps_partial_frames() {
        let (mut conn, _client) = pipe();
        let mut bytes = handshake(1);
        StatusRequestC2s.encode_frame(&mut bytes).unwrap();

        let mut packets = Vec::new();
        for byte in &bytes {
            conn.feed(std::slice::from_ref(byte));
            while let Some(packet) = conn.next_packet().unwrap() {
                if matches!(packet, Packet::Handshake(_)) {
                    conn.change_state(ProtocolState::Status).unwrap();
                }
                packets.push(packet);
            }
        }

        assert_eq!(packets.len(), 2);
        assert!(matches!(packets[0], Packet::Handshake(ref hs) if hs.next_state == 1));
        assert_eq!(packets[1], Packet::StatusRequest(StatusRequestC2s));
    }

    #[tokio::test]
    async fn state_change_applies_to_the_next_buffered_frame() {
        let (mut conn, _client) = pipe();
        let mut bytes = handshake(2);
        LoginStartC2s {
            username: "Alice".into(),
        }
        .encode_frame(&mut bytes)
        .unwrap();
        conn.feed(&bytes);

        assert!(matches!(
            conn.next_packet().unwrap(),
            Some(Packet::Handshake(_))
        ));
        conn.change_state(ProtocolState::Login).unwrap();
        assert_eq!(
            conn.next_packet().unwrap(),
            Some(Packet::LoginStart(LoginStartC2s {
                username: "Alice".into()
            }))
        );
    }

    #[tokio::test]
    async fn unknown_ids_are_skipped() {
        let (mut conn, _client) = pipe();
        let mut bytes = Vec::new();
        write_frame(&mut bytes, 0x42, |body| {
            body.extend_from_slice(&[1, 2, 3]);
            Ok(())
        })
        .unwrap();
        bytes.extend(handshake(1));
        conn.feed(&bytes);

        assert!(matches!(
            conn.next_packet().unwrap(),
            Some(Packet::Handshake(_))
        ));
        assert!(!conn.is_closed());
        assert_eq!(conn.next_packet().unwrap(), None);
    }

    #[tokio::test]
    async fn oversized_varint_is_fatal() {
        let (mut conn, _client) = pipe();
        conn.feed(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x01]);
        assert!(matches!(
            conn.next_packet(),
            Err(ConnectionError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn transitions_only_move_forward() {
        let (mut conn, _client) = pipe();
        conn.change_state(ProtocolState::Status).unwrap();
        assert!(matches!(
            conn.change_state(ProtocolState::Login),
            Err(ConnectionError::InvalidTransition { .. })
        ));
        assert_eq!(conn.state(), ProtocolState::Status);
    }

    #[tokio::test]
    async fn recv_reads_until_a_packet_is_complete() {
        let (mut conn, mut client) = pipe();
        conn.change_state(ProtocolState::Status).unwrap();

        let mut bytes = Vec::new();
        StatusPingC2s { payload: 42 }
            .encode_frame(&mut bytes)
            .unwrap();
        let (head, tail) = bytes.split_at(3);
        client.write_all(head).await.unwrap();
        let tail = tail.to_vec();
        let writer = tokio::spawn(async move {
            client.write_all(&tail).await.unwrap();
            client
        });

        let packet = conn.recv().await.unwrap();
        assert_eq!(packet, Some(Packet::StatusPing(StatusPingC2s { payload: 42 })));

        let client = writer.await.unwrap();
        drop(client);
        assert_eq!(conn.recv().await.unwrap(), None);
        assert!(conn.is_closed());
    }

    #[tokio::test]
    async fn send_writes_a_frame_and_close_stops_everything() {
        let (mut conn, mut client) = pipe();
        conn.send(&StatusPongS2c { payload: 9 }).await.unwrap();
        conn.feed(&handshake(1));
        conn.close().await.unwrap();

        assert_eq!(conn.next_packet().unwrap(), None);
        assert!(matches!(
            conn.send(&StatusPongS2c { payload: 9 }).await,
            Err(ConnectionError::Closed)
        ));

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        let mut dec = FrameDecoder::new();
        dec.queue_slice(&received);
        let frame = dec.try_next_frame().unwrap().unwrap();
        assert_eq!(frame.id, 0x01);
        assert_eq!(&frame.body[..], &9i64.to_be_bytes()[..]);
    }

    #[tokio::test]
    async fn disconnect_sends_a_red_reason() {
        let (mut conn, mut client) = pipe();
        conn.change_state(ProtocolState::Login).unwrap();
        conn.disconnect("Bye").await.unwrap();

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        let mut dec = FrameDecoder::new();
        dec.queue_slice(&received);
        let frame = dec.try_next_frame().unwrap().unwrap();
        let packet = PacketRegistry::global()
            .decode(&frame, ProtocolState::Login, Direction::ClientBound)
            .unwrap();
        let Packet::LoginDisconnect(kick) = packet else {
            panic!("expected DisconnectLogin, got {packet:?}");
        };
        let reason: serde_json::Value = serde_json::from_str(&kick.reason).unwrap();
        assert_eq!(reason["text"], "Bye");
        assert_eq!(reason["color"], "red");
    }
}
