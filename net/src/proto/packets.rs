use uuid::Uuid;

use super::{
    error::Result,
    frame::{PacketDecode, PacketEncode, PacketKind},
    io::{
        read_bool, read_byte_array, read_i64_be, read_string_bounded, read_u16_be, read_uuid,
        write_bool, write_byte_array, write_i64_be, write_string_bounded, write_u16_be,
        write_uuid,
    },
    state::{Direction, HandshakeNextState, PacketDescriptor, ProtocolState},
    varint::{read_varint, write_varint},
};

const MAX_SERVER_ADDRESS: usize = 255;
const MAX_JSON: usize = 32_767;
const MAX_USERNAME: usize = 16;
const MAX_SERVER_ID: usize = 20;
const MAX_CHANNEL: usize = 32_767;

const fn c2s(id: i32, state: ProtocolState) -> PacketDescriptor {
    PacketDescriptor::new(id, state, Direction::ServerBound)
}

const fn s2c(id: i32, state: ProtocolState) -> PacketDescriptor {
    PacketDescriptor::new(id, state, Direction::ClientBound)
}

/// Handshake (C2S) packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeC2s {
    pub protocol_version: i32,
    pub server_address: String,
    pub server_port: u16,
    /// Raw value; see [`HandshakeC2s::next_state`].
    pub next_state: i32,
}

impl HandshakeC2s {
    #[must_use]
    pub const fn next_state(&self) -> HandshakeNextState {
        HandshakeNextState::from_raw(self.next_state)
    }
}

impl PacketKind for HandshakeC2s {
    const DESCRIPTOR: PacketDescriptor = c2s(0x00, ProtocolState::Handshake);
    const NAME: &'static str = "Handshake";
}

impl PacketDecode for HandshakeC2s {
    fn decode_body(input: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            protocol_version: read_varint(input)?,
            server_address: read_string_bounded(input, MAX_SERVER_ADDRESS)?,
            server_port: read_u16_be(input)?,
            next_state: read_varint(input)?,
        })
    }
}

impl PacketEncode for HandshakeC2s {
    fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
        write_varint(out, self.protocol_version);
        write_string_bounded(out, &self.server_address, MAX_SERVER_ADDRESS)?;
        write_u16_be(out, self.server_port);
        write_varint(out, self.next_state);
        Ok(())
    }
}

/// Status request (C2S) packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRequestC2s;

impl PacketKind for StatusRequestC2s {
    const DESCRIPTOR: PacketDescriptor = c2s(0x00, ProtocolState::Status);
    const NAME: &'static str = "StatusRequest";
}

impl PacketDecode for StatusRequestC2s {
    fn decode_body(_input: &mut &[u8]) -> Result<Self> {
        Ok(Self)
    }
}

impl PacketEncode for StatusRequestC2s {
    fn encode_body(&self, _out: &mut Vec<u8>) -> Result<()> {
        Ok(())
    }
}

/// Status response (S2C) packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusResponseS2c {
    pub json: String,
}

impl PacketKind for StatusResponseS2c {
    const DESCRIPTOR: PacketDescriptor = s2c(0x00, ProtocolState::Status);
    const NAME: &'static str = "StatusResponse";
}

impl PacketDecode for StatusResponseS2c {
    fn decode_body(input: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            json: read_string_bounded(input, MAX_JSON)?,
        })
    }
}

impl PacketEncode for StatusResponseS2c {
    fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
        write_string_bounded(out, &self.json, MAX_JSON)
    }
}

/// Status ping (C2S) packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPingC2s {
    pub payload: i64,
}

impl PacketKind for StatusPingC2s {
    const DESCRIPTOR: PacketDescriptor = c2s(0x01, ProtocolState::Status);
    const NAME: &'static str = "Ping";
}

impl PacketDecode for StatusPingC2s {
    fn decode_body(input: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            payload: read_i64_be(input)?,
        })
    }
}

impl PacketEncode for StatusPingC2s {
    fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
        write_i64_be(out, self.payload);
        Ok(())
    }
}

/// Status pong (S2C) packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPongS2c {
    pub payload: i64,
}

impl PacketKind for StatusPongS2c {
    const DESCRIPTOR: PacketDescriptor = s2c(0x01, ProtocolState::Status);
    const NAME: &'static str = "Pong";
}

impl PacketDecode for StatusPongS2c {
    fn decode_body(input: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            payload: read_i64_be(input)?,
        })
    }
}

impl PacketEncode for StatusPongS2c {
    fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
        write_i64_be(out, self.payload);
        Ok(())
    }
}

/// Login disconnect (S2C) packet. `reason` is a JSON text component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginDisconnectS2c {
    pub reason: String,
}

impl PacketKind for LoginDisconnectS2c {
    const DESCRIPTOR: PacketDescriptor = s2c(0x00, ProtocolState::Login);
    const NAME: &'static str = "DisconnectLogin";
}

impl PacketDecode for LoginDisconnectS2c {
    fn decode_body(input: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            reason: read_string_bounded(input, MAX_JSON)?,
        })
    }
}

impl PacketEncode for LoginDisconnectS2c {
    fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
        write_string_bounded(out, &self.reason, MAX_JSON)
    }
}

/// Login start (C2S) packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginStartC2s {
    pub username: String,
}

impl PacketKind for LoginStartC2s {
    const DESCRIPTOR: PacketDescriptor = c2s(0x00, ProtocolState::Login);
    const NAME: &'static str = "LoginStart";
}

impl PacketDecode for LoginStartC2s {
    fn decode_body(input: &mut &[u8]) -> Result<Self> {
        let username = read_string_bounded(input, MAX_USERNAME)?;
        // Newer clients append signature data or a profile id.
        *input = &[];
        Ok(Self { username })
    }
}

impl PacketEncode for LoginStartC2s {
    fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
        write_string_bounded(out, &self.username, MAX_USERNAME)
    }
}

/// Encryption request (S2C) packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionRequestS2c {
    pub server_id: String,
    /// DER-encoded public key.
    pub public_key: Vec<u8>,
    pub verify_token: Vec<u8>,
}

impl PacketKind for EncryptionRequestS2c {
    const DESCRIPTOR: PacketDescriptor = s2c(0x01, ProtocolState::Login);
    const NAME: &'static str = "EncryptionRequest";
}

impl PacketDecode for EncryptionRequestS2c {
    fn decode_body(input: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            server_id: read_string_bounded(input, MAX_SERVER_ID)?,
            public_key: read_byte_array(input)?,
            verify_token: read_byte_array(input)?,
        })
    }
}

impl PacketEncode for EncryptionRequestS2c {
    fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
        write_string_bounded(out, &self.server_id, MAX_SERVER_ID)?;
        write_byte_array(out, &self.public_key)?;
        write_byte_array(out, &self.verify_token)
    }
}

/// Encryption response (C2S) packet. Both fields are encrypted with the
/// server's public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionResponseC2s {
    pub shared_secret: Vec<u8>,
    pub verify_token: Vec<u8>,
}

impl PacketKind for EncryptionResponseC2s {
    const DESCRIPTOR: PacketDescriptor = c2s(0x01, ProtocolState::Login);
    const NAME: &'static str = "EncryptionResponse";
}

impl PacketDecode for EncryptionResponseC2s {
    fn decode_body(input: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            shared_secret: read_byte_array(input)?,
            verify_token: read_byte_array(input)?,
        })
    }
}

impl PacketEncode for EncryptionResponseC2s {
    fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
        write_byte_array(out, &self.shared_secret)?;
        write_byte_array(out, &self.verify_token)
    }
}

/// Login success (S2C) packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSuccessS2c {
    pub uuid: Uuid,
    pub username: String,
}

impl PacketKind for LoginSuccessS2c {
    const DESCRIPTOR: PacketDescriptor = s2c(0x02, ProtocolState::Login);
    const NAME: &'static str = "LoginSuccess";
}

impl PacketDecode for LoginSuccessS2c {
    fn decode_body(input: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            uuid: read_uuid(input)?,
            username: read_string_bounded(input, MAX_USERNAME)?,
        })
    }
}

impl PacketEncode for LoginSuccessS2c {
    fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
        write_uuid(out, &self.uuid);
        write_string_bounded(out, &self.username, MAX_USERNAME)
    }
}

/// Set compression (S2C) packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetCompressionS2c {
    pub threshold: i32,
}

impl PacketKind for SetCompressionS2c {
    const DESCRIPTOR: PacketDescriptor = s2c(0x03, ProtocolState::Login);
    const NAME: &'static str = "SetCompression";
}

impl PacketDecode for SetCompressionS2c {
    fn decode_body(input: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            threshold: read_varint(input)?,
        })
    }
}

impl PacketEncode for SetCompressionS2c {
    fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
        write_varint(out, self.threshold);
        Ok(())
    }
}

/// Login plugin request (S2C) packet. `data` runs to the end of the frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginPluginRequestS2c {
    pub message_id: i32,
    pub channel: String,
    pub data: Vec<u8>,
}

impl PacketKind for LoginPluginRequestS2c {
    const DESCRIPTOR: PacketDescriptor = s2c(0x04, ProtocolState::Login);
    const NAME: &'static str = "LoginPluginRequest";
}

impl PacketDecode for LoginPluginRequestS2c {
    fn decode_body(input: &mut &[u8]) -> Result<Self> {
        let message_id = read_varint(input)?;
        let channel = read_string_bounded(input, MAX_CHANNEL)?;
        let data = std::mem::take(input).to_vec();
        Ok(Self {
            message_id,
            channel,
            data,
        })
    }
}

impl PacketEncode for LoginPluginRequestS2c {
    fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
        write_varint(out, self.message_id);
        write_string_bounded(out, &self.channel, MAX_CHANNEL)?;
        out.extend_from_slice(&self.data);
        Ok(())
    }
}

/// Login plugin response (C2S) packet. `data` is only present when the
/// client understood the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginPluginResponseC2s {
    pub message_id: i32,
    pub successful: bool,
    pub data: Vec<u8>,
}

impl PacketKind for LoginPluginResponseC2s {
    const DESCRIPTOR: PacketDescriptor = c2s(0x02, ProtocolState::Login);
    const NAME: &'static str = "LoginPluginResponse";
}

impl PacketDecode for LoginPluginResponseC2s {
    fn decode_body(input: &mut &[u8]) -> Result<Self> {
        let message_id = read_varint(input)?;
        let successful = read_bool(input)?;
        let data = std::mem::take(input).to_vec();
        Ok(Self {
            message_id,
            successful,
            data,
        })
    }
}

impl PacketEncode for LoginPluginResponseC2s {
    fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
        write_varint(out, self.message_id);
        write_bool(out, self.successful);
        out.extend_from_slice(&self.data);
        Ok(())
    }
}

/// Any packet known to this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Handshake(HandshakeC2s),
    StatusRequest(StatusRequestC2s),
    StatusResponse(StatusResponseS2c),
    StatusPing(StatusPingC2s),
    StatusPong(StatusPongS2c),
    LoginStart(LoginStartC2s),
    EncryptionRequest(EncryptionRequestS2c),
    EncryptionResponse(EncryptionResponseC2s),
    LoginSuccess(LoginSuccessS2c),
    SetCompression(SetCompressionS2c),
    LoginDisconnect(LoginDisconnectS2c),
    LoginPluginRequest(LoginPluginRequestS2c),
    LoginPluginResponse(LoginPluginResponseC2s),
}

macro_rules! packet_dispatch {
    ($self:ident, $inner:ident => $body:expr) => {
        match $self {
            Packet::Handshake($inner) => $body,
            Packet::StatusRequest($inner) => $body,
            Packet::StatusResponse($inner) => $body,
            Packet::StatusPing($inner) => $body,
            Packet::StatusPong($inner) => $body,
            Packet::LoginStart($inner) => $body,
            Packet::EncryptionRequest($inner) => $body,
            Packet::EncryptionResponse($inner) => $body,
            Packet::LoginSuccess($inner) => $body,
            Packet::SetCompression($inner) => $body,
            Packet::LoginDisconnect($inner) => $body,
            Packet::LoginPluginRequest($inner) => $body,
            Packet::LoginPluginResponse($inner) => $body,
        }
    };
}

impl Packet {
    #[must_use]
    pub fn descriptor(&self) -> PacketDescriptor {
        fn of<P: PacketKind>(_: &P) -> PacketDescriptor {
            P::DESCRIPTOR
        }
        packet_dispatch!(self, p => of(p))
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        fn of<P: PacketKind>(_: &P) -> &'static str {
            P::NAME
        }
        packet_dispatch!(self, p => of(p))
    }

    /// Appends the complete length-prefixed frame for this packet to `out`.
    pub fn encode_frame(&self, out: &mut Vec<u8>) -> Result<()> {
        packet_dispatch!(self, p => p.encode_frame(out))
    }
}
